//! Our error types for the power box.

use thiserror::Error;

use crate::command::StatusField;

pub type Result<T, I> = core::result::Result<T, CommandError<I>>;

/// A value was rejected before anything was sent to the device.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum InvalidArgument {
    #[error("Duty cycle {0} is outside 0-100%")]
    DutyCycle(f32),
    #[error("Dew channel {channel} does not exist (device has {available})")]
    DewChannel { channel: u8, available: u8 },
    #[error("Current divisor {0} must be finite and non-zero")]
    CurrentDivisor(f32),
}

/// A status reply could not be turned into a [`SensorSnapshot`](crate::types::SensorSnapshot).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Expected {expected} fields, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },
    #[error("Field {field:?} is not a valid number")]
    NumericParse { field: StatusField },
}

/// Errors from a request/response exchange with the power box.
#[derive(Error, Debug)]
pub enum CommandError<I: embedded_io::Error> {
    #[error("Serial communication error")]
    Serial(I),
    #[error("Communication timeout")]
    Timeout,
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),
    #[error("Malformed status reply: {0}")]
    Decode(#[from] DecodeError),
    #[error("Expected acknowledgement {expected:?}, got {received:?}")]
    Unacknowledged {
        expected: heapless::String<16>,
        received: heapless::String<32>,
    },
    #[error("Reply did not fit in the line buffer")]
    BufferError,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Device is not connected")]
    Disconnected,
    #[error("Serial interface closed")]
    Closed,
}

impl<I: embedded_io::Error> CommandError<I> {
    /// Whether repeating the same exchange could reasonably succeed.
    ///
    /// A reply that arrived intact but said the wrong thing is never retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CommandError::Timeout | CommandError::BufferError | CommandError::InvalidResponse
        )
    }
}
