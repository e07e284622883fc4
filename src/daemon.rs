use anyhow::{Context, Result};
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vallox_lib::connection::{
    Status, StatusChangeListener, StatusDetail, ValloxSerial, ValueChangeListener,
};
use vallox_lib::property::Property;
use vallox_lib::store::ValloxStore;

use crate::{commandline, mqtt};

struct ConsolePrinter;

impl ValueChangeListener for ConsolePrinter {
    fn notify_changed(&self, property: Property, store: &ValloxStore) {
        if let Some(value) = store.value(property) {
            println!("{} {property}: {value}", chrono::Local::now().to_rfc3339());
        }
    }
}

struct MqttOutput {
    publisher: mqtt::MqttPublisher,
    format: commandline::MqttFormat,
}

impl MqttOutput {
    fn publish_simple(&self, property: Property, store: &ValloxStore) {
        let Some(value) = store.value(property) else {
            return;
        };
        let topic = format!("{}/{property}", self.publisher.topic());
        if let Err(e) = self.publisher.publish(&topic, &value.to_string()) {
            error!("Failed to publish message to topic {topic}: {e}");
        }
    }

    fn publish_json(&self, store: &ValloxStore) {
        let payload = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "state": store,
        });
        match serde_json::to_string(&payload) {
            Ok(json_payload) => {
                if let Err(e) = self.publisher.publish(self.publisher.topic(), &json_payload) {
                    error!("Failed to publish data to MQTT: {e:?}");
                }
            }
            Err(e) => error!("Failed to serialize data to JSON string: {e}"),
        }
    }
}

impl ValueChangeListener for MqttOutput {
    fn notify_changed(&self, property: Property, store: &ValloxStore) {
        match self.format {
            commandline::MqttFormat::Simple => self.publish_simple(property, store),
            commandline::MqttFormat::Json => self.publish_json(store),
        }
    }
}

impl StatusChangeListener for MqttOutput {
    fn status_changed(&self, status: Status, _detail: StatusDetail, _message: Option<&str>) {
        let topic = format!("{}/status", self.publisher.topic());
        let payload = match status {
            Status::Online => "online",
            Status::Offline => "offline",
        };
        if let Err(e) = self.publisher.publish(&topic, payload) {
            error!("Failed to publish message to topic {topic}: {e}");
        }
    }
}

struct StatusLogger;

impl StatusChangeListener for StatusLogger {
    fn status_changed(&self, status: Status, detail: StatusDetail, message: Option<&str>) {
        match status {
            Status::Online => info!("Vallox connection online"),
            Status::Offline => warn!(
                "Vallox connection offline ({detail:?}): {}",
                message.unwrap_or("-")
            ),
        }
    }
}

pub fn run(vallox: ValloxSerial, output: commandline::DaemonOutput, delay: Duration) -> Result<()> {
    info!("Starting daemon mode: output={output:?}");

    vallox.add_status_listener(Arc::new(StatusLogger));
    match output {
        commandline::DaemonOutput::Console => {
            vallox.add_value_listener(Arc::new(ConsolePrinter));
        }
        commandline::DaemonOutput::Mqtt {
            config_file,
            format,
        } => {
            let config = mqtt::MqttConfig::load(&config_file)
                .with_context(|| format!("Failed to open MQTT config file at '{config_file}'"))?;
            info!("Successfully loaded MQTT config from {config_file}: {config:?}");
            let publisher = mqtt::MqttPublisher::new(config)
                .with_context(|| "Failed to create MQTT publisher")?;
            info!("MQTT Publisher created successfully.");
            let output = Arc::new(MqttOutput { publisher, format });
            vallox.add_value_listener(output.clone());
            vallox.add_status_listener(output);
        }
    }

    vallox
        .start_listening()
        .with_context(|| "Cannot start listening")?;
    vallox
        .start_heartbeat()
        .with_context(|| "Cannot start heartbeat")?;

    // Values are only known once the unit sends them
    if let Err(e) = vallox.send_poll_all(delay) {
        error!("Initial poll failed: {e}");
    }

    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
