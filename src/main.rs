use anyhow::{bail, Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::sync::{mpsc, Arc};
use std::{ops::Deref, panic, time::Duration};
use vallox_lib::connection::{Settings, Transmission, ValloxSerial};
use vallox_lib::property::Property;
use vallox_lib::scheduler::ThreadScheduler;
use vallox_lib::store::ValloxStore;

mod commandline;
mod daemon;
mod mqtt;

use commandline::{CliArgs, CliCommands};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn print_value(store: &ValloxStore, property: Property) {
    match store.value(property) {
        Some(value) => println!("{property}: {value}"),
        None => println!("{property}: -"),
    }
}

fn check_transmission(transmission: Transmission) -> Result<()> {
    match transmission {
        Transmission::Sent => Ok(()),
        Transmission::Suspended => bail!("Bus is reserved by a CO2 sensor, try again later"),
        Transmission::NotPollable => bail!("Value is calculated and cannot be requested"),
    }
}

/// Polls `property` and waits for the telegram answering it.
fn poll(vallox: &ValloxSerial, property: Property, timeout: Duration) -> Result<()> {
    let Some(variable) = property.variable() else {
        bail!("Property '{property}' is calculated and cannot be polled");
    };
    let (tx, rx) = mpsc::channel();
    vallox.add_value_listener(Arc::new(move |changed: Property, store: &ValloxStore| {
        if changed.variable() == Some(variable) {
            let _ = tx.send(store.clone());
        }
    }));
    vallox.start_listening()?;
    check_transmission(vallox.send_poll(property)?)?;

    let store = rx
        .recv_timeout(timeout)
        .with_context(|| format!("No answer for '{property}' within {timeout:?}"))?;
    Property::ALL
        .iter()
        .filter(|p| p.variable() == Some(variable))
        .for_each(|p| print_value(&store, *p));
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let settings = Settings {
        sender_id: args.sender,
        receiver_id: args.receiver,
        heartbeat_interval: args.heartbeat,
        heartbeat_initial_delay: args.heartbeat,
        ..Settings::default()
    };
    let vallox = ValloxSerial::new(Arc::new(ThreadScheduler::new()), settings);
    vallox
        .connect(&args.host, args.port)
        .with_context(|| format!("Cannot connect to bridge '{}:{}'", args.host, args.port))?;

    match args.command {
        CliCommands::Listen { duration } => {
            vallox.add_value_listener(Arc::new(|property: Property, store: &ValloxStore| {
                print_value(store, property)
            }));
            vallox.start_listening()?;
            vallox.start_heartbeat()?;
            match duration {
                Some(duration) => std::thread::sleep(duration),
                None => loop {
                    std::thread::sleep(Duration::from_secs(3600));
                },
            }
            vallox.stop_listening();
        }
        CliCommands::Poll { property, timeout } => {
            let result = poll(&vallox, property, timeout);
            vallox.stop_listening();
            result?;
        }
        CliCommands::All => {
            vallox.start_listening()?;
            vallox
                .send_poll_all(args.delay)
                .with_context(|| "Cannot poll values")?;
            // answer to the last request
            std::thread::sleep(args.delay);
            vallox.stop_listening();
            let store = vallox.store();
            for property in Property::ALL {
                if store.value(property).is_some() {
                    print_value(&store, property);
                }
            }
        }
        CliCommands::SetFanSpeed { level } => {
            check_transmission(
                vallox
                    .set_fan_speed(level)
                    .with_context(|| "Cannot set fan speed")?,
            )?;
        }
        CliCommands::SetTemperature { target, celsius } => {
            check_transmission(
                vallox
                    .set_temperature(target.variable(), celsius)
                    .with_context(|| format!("Cannot set {target:?}"))?,
            )?;
        }
        CliCommands::Daemon { output } => daemon::run(vallox.clone(), output, args.delay)?,
    }

    vallox.close();
    Ok(())
}
