//! Live connection to the ventilation unit.
//!
//! [`ValloxSerial`] owns the transport and the [`ValloxStore`]. After
//! [`ValloxSerial::start_listening`] a single background task reads telegrams
//! in arrival order and projects them onto the store; it is the only writer
//! of the store. [`ValloxSerial::start_heartbeat`] periodically polls one
//! property and reconnects if that fails.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vallox_lib::connection::{Settings, ValloxSerial};
//! use vallox_lib::property::Property;
//! use vallox_lib::scheduler::ThreadScheduler;
//!
//! fn main() -> Result<(), vallox_lib::Error> {
//!     let vallox = ValloxSerial::new(Arc::new(ThreadScheduler::new()), Settings::default());
//!     vallox.add_value_listener(Arc::new(|property: Property, store: &vallox_lib::store::ValloxStore| {
//!         println!("{property} = {:?}", store.value(property));
//!     }));
//!     vallox.connect("192.168.1.20", 26)?;
//!     vallox.start_listening()?;
//!     vallox.start_heartbeat()?;
//!     vallox.send_poll(Property::FanSpeed)?;
//!     Ok(())
//! }
//! ```

use crate::conversion::{bytes_to_hex, convert_back_fan_speed, convert_back_temperature};
use crate::property::Property;
use crate::protocol::{address, Addressing, Telegram, Variable};
use crate::scheduler::{CancelToken, Scheduler};
use crate::store::ValloxStore;
use crate::transport::{read_telegram, Connector, TcpConnector, Transport};
use crate::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, Error>;

/// Back-off durations of the receive loop, per error kind.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    /// Wait for more bytes to arrive.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub insufficient_data: Duration,
    /// Low-level read errors, retry but not too quickly.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub transport_error: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            insufficient_data: Duration::from_millis(200),
            transport_error: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    /// We send commands in the name of this panel.
    pub sender_id: u8,
    /// We listen to the telegrams exchanged between the master and this panel.
    pub receiver_id: u8,
    pub retry: RetryPolicy,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub heartbeat_interval: Duration,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub heartbeat_initial_delay: Duration,
    pub heartbeat_property: Property,
    /// How long [`ValloxSerial::stop_listening`] waits before cancelling.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub shutdown_grace: Duration,
    /// Upper bound for checking the number of buffered TCP bytes.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub probe_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let addressing = Addressing::default();
        Self {
            sender_id: addressing.sender_id,
            receiver_id: addressing.receiver_id,
            retry: RetryPolicy::default(),
            heartbeat_interval: Duration::from_secs(60),
            heartbeat_initial_delay: Duration::from_secs(60),
            heartbeat_property: Property::SelectStatus,
            shutdown_grace: Duration::from_secs(5),
            probe_timeout: Duration::from_millis(10),
        }
    }
}

impl Settings {
    pub fn addressing(&self) -> Addressing {
        Addressing {
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDetail {
    None,
    CommunicationError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Listening,
}

/// Outcome of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    Sent,
    /// Skipped because a CO2 sensor exchange reserves the bus.
    Suspended,
    /// The property is calculated and cannot be polled.
    NotPollable,
}

/// Called from the receive loop after a telegram updated `property`.
///
/// `store` is the state right after the update.
pub trait ValueChangeListener: Send + Sync {
    fn notify_changed(&self, property: Property, store: &ValloxStore);
}

impl<F> ValueChangeListener for F
where
    F: Fn(Property, &ValloxStore) + Send + Sync,
{
    fn notify_changed(&self, property: Property, store: &ValloxStore) {
        self(property, store)
    }
}

pub trait StatusChangeListener: Send + Sync {
    fn status_changed(&self, status: Status, detail: StatusDetail, message: Option<&str>);
}

impl<F> StatusChangeListener for F
where
    F: Fn(Status, StatusDetail, Option<&str>) + Send + Sync,
{
    fn status_changed(&self, status: Status, detail: StatusDetail, message: Option<&str>) {
        self(status, detail, message)
    }
}

struct Shared {
    settings: Settings,
    addressing: Addressing,
    scheduler: Arc<dyn Scheduler>,
    connector: Mutex<Option<Arc<dyn Connector>>>,
    reader: Mutex<Option<Box<dyn Transport>>>,
    writer: Mutex<Option<Box<dyn Transport>>>,
    store: RwLock<ValloxStore>,
    value_listeners: RwLock<Vec<Arc<dyn ValueChangeListener>>>,
    status_listeners: RwLock<Vec<Arc<dyn StatusChangeListener>>>,
    shutdown: AtomicBool,
    listening: AtomicBool,
    /// Cleared by write failures and read errors, set again by a successful open.
    link_up: AtomicBool,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connection to a Vallox unit through a serial-to-Ethernet bridge.
#[derive(Clone)]
pub struct ValloxSerial {
    shared: Arc<Shared>,
}

impl ValloxSerial {
    pub fn new(scheduler: Arc<dyn Scheduler>, settings: Settings) -> Self {
        Self {
            shared: Arc::new(Shared {
                addressing: settings.addressing(),
                settings,
                scheduler,
                connector: Mutex::new(None),
                reader: Mutex::new(None),
                writer: Mutex::new(None),
                store: RwLock::new(ValloxStore::new()),
                value_listeners: RwLock::new(Vec::new()),
                status_listeners: RwLock::new(Vec::new()),
                shutdown: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                link_up: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    /// Copy of the latest known state.
    ///
    /// Values are initially zero resp. `false` and are only updated once the
    /// unit sends them, which can be triggered by [`ValloxSerial::send_poll`].
    pub fn store(&self) -> ValloxStore {
        self.shared
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.is_suspended()
    }

    pub fn state(&self) -> ConnectionState {
        if !self.shared.link_up.load(Ordering::SeqCst) {
            ConnectionState::Disconnected
        } else if self.shared.listening.load(Ordering::SeqCst) {
            ConnectionState::Listening
        } else {
            ConnectionState::Connected
        }
    }

    pub fn add_value_listener(&self, listener: Arc<dyn ValueChangeListener>) {
        self.shared
            .value_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn add_status_listener(&self, listener: Arc<dyn StatusChangeListener>) {
        self.shared
            .status_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Connects to a bridge that tunnels the RS485 bus through a TCP server.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        let mut connector = TcpConnector::new(host, port);
        connector.probe_timeout = self.shared.settings.probe_timeout;
        self.connect_with(Arc::new(connector))
    }

    /// Connects through any [`Connector`], which is also used for reconnects.
    pub fn connect_with(&self, connector: Arc<dyn Connector>) -> Result<()> {
        *lock(&self.shared.connector) = Some(connector.clone());
        self.shared.open(connector.as_ref())
    }

    /// Reopens the last connected endpoint.
    pub fn reconnect(&self) -> Result<()> {
        self.shared.reconnect()
    }

    pub fn close(&self) {
        self.shared.close();
    }

    /// Starts the receive loop on the scheduler.
    ///
    /// Does nothing if the receive loop is already running.
    pub fn start_listening(&self) -> Result<()> {
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            log::debug!("Already listening to vallox telegrams");
            return Ok(());
        }
        self.shared.shutdown.store(false, Ordering::SeqCst);
        let shared = self.shared.clone();
        if let Err(err) = self
            .shared
            .scheduler
            .submit(Box::new(move |token| shared.listen(token)))
        {
            self.shared.listening.store(false, Ordering::SeqCst);
            return Err(err);
        }
        log::debug!("Start listening to vallox telegrams");
        Ok(())
    }

    /// Polls the heartbeat property periodically, reconnecting on failure.
    pub fn start_heartbeat(&self) -> Result<()> {
        let shared = self.shared.clone();
        self.shared.scheduler.schedule_with_fixed_delay(
            self.shared.settings.heartbeat_initial_delay,
            self.shared.settings.heartbeat_interval,
            Box::new(move |_| shared.heartbeat()),
        )?;
        log::debug!("Start heartbeat check to vallox");
        Ok(())
    }

    /// Stops the receive loop and the heartbeat.
    ///
    /// Tasks get [`Settings::shutdown_grace`] to finish before they are
    /// cancelled.
    pub fn stop_listening(&self) {
        let scheduler = &self.shared.scheduler;
        log::debug!("attempt to shutdown listener");
        self.shared.shutdown.store(true, Ordering::SeqCst);
        scheduler.shutdown();
        if !scheduler.await_termination(self.shared.settings.shutdown_grace) {
            log::warn!("Listener cancel non-finished tasks");
        }
        scheduler.shutdown_now();
        self.shared.listening.store(false, Ordering::SeqCst);
        log::debug!("shutdown of vallox listener finished");
    }

    /// Requests an update of `property` from the unit.
    ///
    /// The answer arrives asynchronously through the receive loop. The unit
    /// cannot handle many requests in short succession and only answers the
    /// latest one correctly.
    pub fn send_poll(&self, property: Property) -> Result<Transmission> {
        self.shared.send_poll(property)
    }

    /// Polls every pollable variable once, `spacing` apart.
    pub fn send_poll_all(&self, spacing: Duration) -> Result<()> {
        let mut polled: Vec<Variable> = Vec::new();
        for property in Property::ALL {
            if let Some(variable) = property.variable() {
                if polled.contains(&variable) {
                    continue;
                }
                polled.push(variable);
                self.shared.send_poll(property)?;
                std::thread::sleep(spacing);
            }
        }
        Ok(())
    }

    /// Sends one telegram to the master unit.
    ///
    /// `value` has to be encoded already, see [`crate::conversion`].
    pub fn send(&self, variable: Variable, value: u8) -> Result<Transmission> {
        self.shared.send(variable, value, address::MASTER)
    }

    pub fn send_to(&self, variable: Variable, value: u8, destination: u8) -> Result<Transmission> {
        self.shared.send(variable, value, destination)
    }

    /// Sets the fan speed level 1-8.
    pub fn set_fan_speed(&self, level: u8) -> Result<Transmission> {
        self.send(Variable::FanSpeed, convert_back_fan_speed(level)?)
    }

    /// Writes a temperature variable such as [`Variable::HeatingSetPoint`].
    ///
    /// The nearest table value at or above `celsius` is sent.
    pub fn set_temperature(&self, variable: Variable, celsius: i8) -> Result<Transmission> {
        self.send(variable, convert_back_temperature(celsius))
    }
}

impl Shared {
    fn is_suspended(&self) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .suspended
    }

    fn notify_status(&self, status: Status, detail: StatusDetail, message: Option<&str>) {
        let listeners = self
            .status_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener.status_changed(status, detail, message);
        }
    }

    fn open(&self, connector: &dyn Connector) -> Result<()> {
        let transport = connector.open()?;
        let writer = transport
            .try_clone_transport()
            .map_err(|source| Error::Connect {
                endpoint: connector.endpoint(),
                source,
            })?;
        self.close();
        *lock(&self.reader) = Some(transport);
        *lock(&self.writer) = Some(writer);
        // A resume sent while we were away is lost
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .suspended = false;
        self.link_up.store(true, Ordering::SeqCst);
        log::debug!("Connected to {}", connector.endpoint());
        self.notify_status(Status::Online, StatusDetail::None, None);
        Ok(())
    }

    fn reconnect(&self) -> Result<()> {
        let connector = lock(&self.connector).clone().ok_or(Error::NotConnected)?;
        log::debug!("Trying to reconnect: {}", connector.endpoint());
        self.open(connector.as_ref())
    }

    fn close(&self) {
        self.link_up.store(false, Ordering::SeqCst);
        let reader = lock(&self.reader).take();
        let writer = lock(&self.writer).take();
        for mut transport in reader.into_iter().chain(writer) {
            if let Err(err) = transport.close() {
                log::error!("Error while closing the connection: {err}");
            }
        }
    }

    fn receive(&self) -> Result<Telegram> {
        let mut reader = lock(&self.reader);
        let transport = reader.as_mut().ok_or(Error::NotConnected)?;
        let result = read_telegram(transport.as_mut(), &self.addressing);
        if let Err(Error::Io(_)) = result {
            // under the reader lock, so a concurrent reopen is not overridden
            self.link_up.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Projects `telegram` onto the store, then notifies the value listeners.
    fn process(&self, telegram: &Telegram) {
        let (changed, snapshot) = {
            let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
            let changed = store.update(telegram);
            (changed, store.clone())
        };
        if changed.is_empty() {
            return;
        }
        let listeners = self
            .value_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for property in changed {
            for listener in &listeners {
                listener.notify_changed(property, &snapshot);
            }
        }
    }

    fn listen(&self, token: CancelToken) {
        while !self.shutdown.load(Ordering::SeqCst) && !token.is_cancelled() {
            match self.receive() {
                Ok(telegram) => {
                    log::trace!("Received message: {telegram}");
                    self.process(&telegram);
                }
                Err(err) => {
                    match &err {
                        Error::InsufficientData { .. } => {}
                        Error::MalformedFrame(_) => {
                            log::warn!("Issue receiving telegram. Discarding. {err}")
                        }
                        Error::WrongRecipient(_) => log::debug!("{err}"),
                        _ => log::error!("Error reading input stream: {err}"),
                    }
                    if let Some(delay) = err.retry_delay(&self.settings.retry) {
                        token.sleep(delay);
                    }
                }
            }
        }
        self.listening.store(false, Ordering::SeqCst);
        log::debug!("Receive loop stopped");
    }

    fn heartbeat(&self) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        // A skipped poll on a suspended bus says nothing about the link
        let failure = match self.send_poll(self.settings.heartbeat_property) {
            Err(err) => Some(format!("Error sending heartbeat poll. {err}")),
            Ok(_) if !self.link_up.load(Ordering::SeqCst) => {
                Some("Connection to vallox lost.".to_string())
            }
            Ok(_) => None,
        };
        if let Some(msg) = failure {
            log::error!("{msg}");
            self.notify_status(
                Status::Offline,
                StatusDetail::CommunicationError,
                Some(&msg),
            );
            if let Err(err) = self.reconnect() {
                log::error!("Error reconnecting vallox: {err}");
            }
        }
    }

    fn send_poll(&self, property: Property) -> Result<Transmission> {
        if self.scheduler.is_terminated() {
            log::error!("Poll requested while no-one is listening for answers");
        }
        match property.variable() {
            Some(variable) => {
                log::debug!("Sending poll request for property {property} with variable {variable:?}");
                self.send(Variable::Poll, variable.code(), address::MASTER)
            }
            None => Ok(Transmission::NotPollable),
        }
    }

    fn send(&self, variable: Variable, value: u8, destination: u8) -> Result<Transmission> {
        if self.is_suspended() {
            log::debug!("Bus suspended, skipping {variable:?}={value:02X}");
            return Ok(Transmission::Suspended);
        }
        let tx_buffer = self.addressing.request(variable, value, destination);
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("sending telegram: {}", bytes_to_hex(&tx_buffer));
        }
        self.serial_write(&tx_buffer)?;
        Ok(Transmission::Sent)
    }

    fn serial_write(&self, tx_buffer: &[u8]) -> Result<()> {
        let result = {
            let mut writer = lock(&self.writer);
            let transport = writer.as_mut().ok_or(Error::NotConnected)?;
            let result = transport
                .write_all(tx_buffer)
                .and_then(|_| transport.flush());
            if result.is_err() {
                self.link_up.store(false, Ordering::SeqCst);
            }
            result
        };
        if let Err(err) = result {
            let msg = "Error writing to vallox.";
            log::error!("{msg} {err}");
            self.notify_status(
                Status::Offline,
                StatusDetail::CommunicationError,
                Some(&format!("{msg} {err}")),
            );
            return Err(err.into());
        }
        Ok(())
    }
}
