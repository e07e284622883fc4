use crate::mqtt;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;
use vallox_lib::property::Property;
use vallox_lib::protocol::{address, Variable};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum TemperatureTarget {
    HeatingSetPoint,
    PreHeatingSetPoint,
    InputFanStop,
    HrcBypass,
    CellDefrosting,
}

impl TemperatureTarget {
    pub fn variable(self) -> Variable {
        match self {
            TemperatureTarget::HeatingSetPoint => Variable::HeatingSetPoint,
            TemperatureTarget::PreHeatingSetPoint => Variable::PreHeatingSetPoint,
            TemperatureTarget::InputFanStop => Variable::InputFanStop,
            TemperatureTarget::HrcBypass => Variable::HrcBypass,
            TemperatureTarget::CellDefrosting => Variable::CellDefrosting,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Print every value change seen on the bus
    Listen {
        /// Stop after this time (e.g., "30s", "5m"), runs until interrupted if omitted
        #[clap(long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,
    },
    /// Poll a single property and print the answer (e.g., fan-speed, temp-inside, select-status)
    Poll {
        property: Property,
        /// Time to wait for the answer
        #[clap(long, value_parser = humantime::parse_duration, default_value = "5s")]
        timeout: Duration,
    },
    /// Poll every variable once and print the resulting state
    All,
    /// Set the fan speed level
    SetFanSpeed {
        #[clap(value_parser = clap::value_parser!(u8).range(1..=8))]
        level: u8,
    },
    /// Set a temperature threshold in °C
    SetTemperature {
        #[arg(value_enum)]
        target: TemperatureTarget,
        #[clap(allow_negative_numbers = true)]
        celsius: i8,
    },
    /// Run in daemon mode, keep listening and output every value change
    Daemon {
        /// Output destination for the values
        #[command(subcommand)]
        output: DaemonOutput,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum MqttFormat {
    Simple,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DaemonOutput {
    /// Print value changes to the standard output (console).
    Console,
    /// Publish value changes to an MQTT broker.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = mqtt::MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
        /// Output format for MQTT messages
        #[arg(long, value_enum, default_value_t = MqttFormat::Simple)]
        format: MqttFormat,
    },
}

const fn about_text() -> &'static str {
    "vallox ventilation command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Host name or address of the serial-to-Ethernet bridge
    #[arg(long)]
    pub host: String,

    /// TCP port of the serial-to-Ethernet bridge
    #[arg(long, default_value_t = 26)]
    pub port: u16,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Bus address we send from (e.g., 0x28 for panel 8)
    #[arg(long, value_parser = clap_num::maybe_hex::<u8>, default_value_t = address::PANEL8)]
    pub sender: u8,

    /// Bus address of the panel we listen to (e.g., 0x21 for panel 1)
    #[arg(long, value_parser = clap_num::maybe_hex::<u8>, default_value_t = address::PANEL1)]
    pub receiver: u8,

    /// Interval of the connection check poll (e.g., "60s", "5m")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "60s")]
    pub heartbeat: Duration,

    // The unit only answers the latest of several quick requests correctly
    /// Delay between consecutive poll requests (e.g., "300ms", "1s")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "300ms")]
    pub delay: Duration,
}
