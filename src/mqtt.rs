use anyhow::{bail, Context, Result};
use rumqttc::{Client, MqttOptions, QoS};
use serde::Deserialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    host: String,
    #[serde(default = "MqttConfig::default_port")]
    port: u16,
    username: Option<String>,
    password: Option<String>,
    #[serde(default = "MqttConfig::default_topic")]
    topic: String,
    #[serde(default = "MqttConfig::default_qos")]
    qos: u8,
    #[serde(default = "MqttConfig::default_client_id")]
    client_id: String,
    #[serde(
        default = "MqttConfig::default_keep_alive_interval",
        with = "humantime_serde"
    )]
    keep_alive_interval: Duration,
    #[serde(
        default = "MqttConfig::default_reconnect_interval",
        with = "humantime_serde"
    )]
    reconnect_interval: Duration,
}

impl MqttConfig {
    fn default_port() -> u16 {
        1883
    }

    fn default_topic() -> String {
        "vallox".into()
    }

    fn default_qos() -> u8 {
        0
    }

    fn generate_random_string(len: usize) -> String {
        use rand::distributions::Alphanumeric;
        use rand::Rng;

        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn default_client_id() -> String {
        format!("vallox-{}", Self::generate_random_string(8))
    }

    fn default_keep_alive_interval() -> Duration {
        Duration::from_secs(30)
    }

    fn default_reconnect_interval() -> Duration {
        Duration::from_secs(5)
    }

    pub const DEFAULT_CONFIG_FILE: &str = "mqtt.yaml";

    pub fn load(config_file_path: &str) -> Result<Self> {
        log::debug!("Loading config file from {config_file_path:?}");
        let config_file = std::fs::File::open(config_file_path)
            .with_context(|| format!("Cannot open MQTT config file {config_file_path:?}"))?;
        let config: Self = serde_yaml::from_reader(&config_file)
            .with_context(|| format!("Cannot read MQTT config from file: {config_file_path:?}"))?;
        Ok(config)
    }

    fn quality_of_service(&self) -> Result<QoS> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => bail!("Invalid MQTT QoS {other}, expected 0, 1 or 2"),
        }
    }

    pub fn create_client(&self) -> Result<Client> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive_interval);
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }

        log::info!(
            "Connecting to MQTT broker: {}:{} with client_id: {}",
            self.host,
            self.port,
            self.client_id
        );

        let (client, mut connection) = Client::new(options, 10);
        let reconnect_interval = self.reconnect_interval;
        // The event loop has to be driven for any publish to reach the broker,
        // it reconnects on the next iteration after an error.
        std::thread::Builder::new()
            .name("mqtt-eventloop".to_string())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(event) => log::trace!("MQTT event: {event:?}"),
                        Err(err) => {
                            log::error!("MQTT connection error: {err}");
                            std::thread::sleep(reconnect_interval);
                        }
                    }
                }
            })
            .with_context(|| "Cannot start MQTT event loop")?;
        Ok(client)
    }
}

pub struct MqttPublisher {
    client: Mutex<Client>,
    config: MqttConfig,
    qos: QoS,
}

impl MqttPublisher {
    pub fn new(config: MqttConfig) -> Result<Self> {
        let qos = config.quality_of_service()?;
        let client = config.create_client()?;
        Ok(Self {
            client: Mutex::new(client),
            config,
            qos,
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        log::debug!(
            "Publishing to MQTT: Topic='{}', Payload='{payload}', QoS={:?}",
            topic,
            self.qos
        );

        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publish(topic, self.qos, false, payload.as_bytes())
            .with_context(|| format!("Failed to publish message to MQTT topic: {}", topic))?;

        Ok(())
    }
}
