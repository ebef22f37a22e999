//! This crate provides the hardware-communication core of a driver for astronomy
//! power distribution boxes: 12V ports, a DSLR output, dew heater PWM channels and
//! an environment sensor, all controlled over a serial line.
//!
//! The core is independent of any device framework. Hand it an open serial
//! interface implementing [`embedded_io::Read`], [`embedded_io::ReadReady`] &
//! [`embedded_io::Write`] plus a [`PropertySink`] that receives telemetry, and it will:
//! * translate user intents (power-on-boot mask, dew heater duty cycle, automatic
//!   dew control) into commands and check they are acknowledged,
//! * poll the box in the background and publish only the field groups that changed,
//! * keep every request/response exchange on the wire strictly one at a time.
//!
//! The protocol is newline terminated ASCII, see [`command`] for the command set.
//!
//! The serial port used for the box should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None

pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod poller;
pub mod powerbox;
pub mod sink;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;

pub use cache::ChangedGroups;
pub use config::DriverConfig;
pub use error::{CommandError, DecodeError, InvalidArgument};
pub use poller::PollerHandle;
pub use powerbox::PowerBox;
pub use sink::PropertySink;
pub use types::{FieldGroup, LinkState, PowerOnBootMask, SensorSnapshot};
