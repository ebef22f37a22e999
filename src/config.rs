//! Runtime settings for a [`PowerBox`](crate::powerbox::PowerBox).

use fugit::MillisDurationU32;

use crate::{command::Calibration, error::InvalidArgument};

/// How often the box is polled unless configured otherwise.
pub const DEFAULT_POLL_PERIOD: MillisDurationU32 = MillisDurationU32::millis(1000);
/// The box normally answers within a few tens of milliseconds.
pub const DEFAULT_READ_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(1000);
/// Dew heater channels on the box.
pub const DEFAULT_DEW_CHANNELS: u8 = 2;

/// Settings that shape how the driver talks to the box.
///
/// Build one with [`DriverConfig::default`] and the `with_*` methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    /// Delay between status polls. Re-read before every tick.
    pub poll_period: MillisDurationU32,
    /// Longest we wait for any single reply line.
    pub read_timeout: MillisDurationU32,
    /// Raw telemetry conversion constants.
    pub calibration: Calibration,
    /// Number of dew heater channels accepted by [`set_dew_pwm`](crate::powerbox::PowerBox::set_dew_pwm).
    pub dew_channels: u8,
    /// Extra attempts for a command whose reply timed out or arrived garbled.
    pub command_retries: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_period: DEFAULT_POLL_PERIOD,
            read_timeout: DEFAULT_READ_TIMEOUT,
            calibration: Calibration::default(),
            dew_channels: DEFAULT_DEW_CHANNELS,
            command_retries: 1,
        }
    }
}

impl DriverConfig {
    pub fn with_poll_period(mut self, period: MillisDurationU32) -> Self {
        self.poll_period = period;
        self
    }

    pub fn with_read_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the divisor that turns the raw current reading into amps.
    ///
    /// Fails on zero or a non-finite divisor, which would turn every reading into NaN or infinity.
    pub fn with_current_divisor(mut self, divisor: f32) -> Result<Self, InvalidArgument> {
        self.calibration = Calibration::new(divisor)?;
        Ok(self)
    }

    pub fn with_dew_channels(mut self, channels: u8) -> Self {
        self.dew_channels = channels;
        self
    }

    pub fn with_command_retries(mut self, retries: u8) -> Self {
        self.command_retries = retries;
        self
    }

    pub(crate) fn poll_period_std(&self) -> std::time::Duration {
        to_std(self.poll_period)
    }

    pub(crate) fn read_timeout_std(&self) -> std::time::Duration {
        to_std(self.read_timeout)
    }
}

fn to_std(duration: MillisDurationU32) -> std::time::Duration {
    std::time::Duration::from_millis(duration.to_millis() as u64)
}
