#![cfg_attr(docsrs, feature(doc_cfg))]
//! # vallox_lib
//!
//! This crate provides a library for talking to Vallox ventilation units over
//! their RS485 bus, usually through a serial-to-Ethernet bridge.
//!
//! The bus carries 6 byte telegrams `[domain, sender, receiver, variable, value, checksum]`.
//! The library passively listens to the traffic between the master unit and one
//! control panel, keeps the latest known state in a [`store::ValloxStore`] and
//! sends commands and poll requests in the name of a second panel.
//!
//! ## Features
//!
//! This crate uses a feature-based system to keep dependencies minimal.
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `vallox` command-line tool and pulls in `serde`.
//!
//! ### Transport Features
//! - `serialport`: Enables a direct RS485 connection using the `serialport` crate.
//! - `tokio`: Enables a scheduler running the background tasks on a `tokio` runtime.
//!
//! ### Utility Features
//! - `serde`: Enables `serde` support for the state and the connection settings.
//! - `bin-dependencies`: Enables all features required by the `vallox` binary executable.

/// Contains error types for the library.
mod error;
/// Value tables of the bus encoding.
pub mod conversion;
/// Telegram encoding and validation.
pub mod protocol;
/// Observable properties and their values.
pub mod property;
/// Projection of telegrams onto the device state.
pub mod store;
/// Byte streams to the bus.
pub mod transport;
/// Background tasks.
pub mod scheduler;
/// Live connection with receive loop and heartbeat.
pub mod connection;

pub use error::{Error, FrameError};

/// Scheduler on a tokio runtime.
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
#[cfg(feature = "tokio")]
pub mod tokio_scheduler;
