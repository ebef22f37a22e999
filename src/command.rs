//! Encoding and decoding of the power box's ASCII command set.
//!
//! Every function here is pure: it builds or inspects text and never touches the
//! serial interface.
//!
//! | Command       | Meaning                     | Acknowledgement          |
//! |---------------|-----------------------------|--------------------------|
//! | `PE:<pppp>`   | Power-on-boot mask          | `PE:1`                   |
//! | `P<id>:<ddd>` | Dew heater duty, 0-255      | Echo of the command      |
//! | `PD:<b>`      | Automatic dew control       | Echo of the command      |
//! | `PV`          | Firmware version            | Version string           |
//! | `PA`          | Full status                 | `:` separated telemetry  |

use core::fmt::Write;

use strum::EnumCount;
use strum_macros::{EnumCount as EnumCountMacro, EnumIter};

use crate::{
    error::{DecodeError, InvalidArgument},
    types::{MAX_DEW_CHANNELS, MAX_PORTS, PowerOnBootMask, SensorSnapshot},
};

/// An encoded command, without its line terminator.
pub type Command = heapless::String<16>;

/// Separates the fields of a status reply.
pub const FIELD_DELIMITER: char = ':';
/// Largest duty value the wire format can carry.
pub const WIRE_DUTY_MAX: u8 = 255;
/// Reply to a successful `PE` command.
pub const POWER_ON_BOOT_ACK: &str = "PE:1";

const POWER_ON_BOOT_PREFIX: &str = "PE:";
const AUTO_DEW_PREFIX: &str = "PD:";
const STATUS_QUERY: &str = "PA";
const FIRMWARE_QUERY: &str = "PV";

/// Fields of a `PA` reply, in the order the device sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCountMacro)]
pub enum StatusField {
    Voltage,
    Current,
    Temperature,
    Humidity,
    DewPoint,
    PortStatus,
    DslrStatus,
    Dew1,
    Dew2,
    AutoDew,
}

/// Positional layout of a `PA` reply. Index `n` holds the field found after the `n`th delimiter.
pub const STATUS_SCHEMA: [StatusField; StatusField::COUNT] = [
    StatusField::Voltage,
    StatusField::Current,
    StatusField::Temperature,
    StatusField::Humidity,
    StatusField::DewPoint,
    StatusField::PortStatus,
    StatusField::DslrStatus,
    StatusField::Dew1,
    StatusField::Dew2,
    StatusField::AutoDew,
];

/// Device specific conversion constants for raw telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    current_divisor: f32,
}

impl Calibration {
    /// `current_divisor` must be finite and non-zero.
    pub fn new(current_divisor: f32) -> Result<Self, InvalidArgument> {
        if !current_divisor.is_finite() || current_divisor == 0.0 {
            return Err(InvalidArgument::CurrentDivisor(current_divisor));
        }
        Ok(Self { current_divisor })
    }

    /// The current field is divided by this to get amps.
    pub fn current_divisor(&self) -> f32 {
        self.current_divisor
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            current_divisor: 65.0,
        }
    }
}

/// Something in a reply was out of range but could still be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeWarning {
    /// The field that had to be clamped.
    pub field: StatusField,
}

/// A decoded `PA` reply together with anything that had to be clamped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStatus {
    pub snapshot: SensorSnapshot,
    pub warnings: heapless::Vec<DecodeWarning, { StatusField::COUNT }>,
}

/// Build the command which sets which ports come up powered after a reboot.
pub fn encode_power_on_boot(mask: PowerOnBootMask) -> Command {
    let mut command = Command::new();
    // Infallible: prefix + 4 digits is well below capacity.
    let _ = command.push_str(POWER_ON_BOOT_PREFIX);
    for on in mask.ports() {
        let _ = command.push(if on { '1' } else { '0' });
    }
    command
}

/// Map a duty cycle percentage onto the 0-255 wire scale.
pub fn duty_to_wire(duty_percent: f32) -> Result<u8, InvalidArgument> {
    if !(0.0..=100.0).contains(&duty_percent) {
        return Err(InvalidArgument::DutyCycle(duty_percent));
    }
    let scaled = (duty_percent * WIRE_DUTY_MAX as f32 / 100.0).round();
    Ok(scaled.clamp(0.0, WIRE_DUTY_MAX as f32) as u8)
}

/// Map a wire duty value back onto 0-100%. Values above 255 are clamped first.
pub fn wire_to_duty(wire: f32) -> f32 {
    wire.clamp(0.0, WIRE_DUTY_MAX as f32) * 100.0 / WIRE_DUTY_MAX as f32
}

/// Build the command which sets the duty cycle of one dew heater channel.
///
/// `duty_percent` must lie within `0.0..=100.0`.
pub fn encode_dew_pwm(channel: u8, duty_percent: f32) -> Result<Command, InvalidArgument> {
    let wire = duty_to_wire(duty_percent)?;
    let mut command = Command::new();
    // Longest possible form is `P255:255`.
    let _ = write!(command, "P{}:{:03}", channel, wire);
    Ok(command)
}

/// Build the command which switches automatic dew control on or off.
pub fn encode_auto_dew(enabled: bool) -> Command {
    let mut command = Command::new();
    let _ = command.push_str(AUTO_DEW_PREFIX);
    let _ = command.push(if enabled { '1' } else { '0' });
    command
}

/// Build the full status query.
pub fn encode_status_query() -> Command {
    let mut command = Command::new();
    let _ = command.push_str(STATUS_QUERY);
    command
}

/// Build the firmware version query.
pub fn encode_firmware_query() -> Command {
    let mut command = Command::new();
    let _ = command.push_str(FIRMWARE_QUERY);
    command
}

/// Whether `reply` acknowledges `command`.
///
/// `PE` is acknowledged with [`POWER_ON_BOOT_ACK`]; every other setter is
/// acknowledged by echoing the command back verbatim.
pub fn is_acknowledged(command: &str, reply: &str) -> bool {
    if command.starts_with(POWER_ON_BOOT_PREFIX) {
        reply == POWER_ON_BOOT_ACK
    } else {
        reply == command
    }
}

/// The reply we expect for `command`. See [`is_acknowledged`].
pub fn expected_ack(command: &str) -> Command {
    let mut expected = Command::new();
    let text = if command.starts_with(POWER_ON_BOOT_PREFIX) {
        POWER_ON_BOOT_ACK
    } else {
        command
    };
    let _ = expected.push_str(text);
    expected
}

/// Decode a `PA` reply.
///
/// The reply must contain exactly [`STATUS_SCHEMA`]`.len()` fields. Leading
/// and trailing whitespace is ignored.
pub fn decode_status_response(
    raw: &str,
    calibration: &Calibration,
) -> Result<DecodedStatus, DecodeError> {
    let raw = raw.trim();
    let found = raw.split(FIELD_DELIMITER).count();
    if found != STATUS_SCHEMA.len() {
        return Err(DecodeError::FieldCountMismatch {
            expected: STATUS_SCHEMA.len(),
            found,
        });
    }

    let mut fields: [&str; StatusField::COUNT] = [""; StatusField::COUNT];
    for (slot, text) in fields.iter_mut().zip(raw.split(FIELD_DELIMITER)) {
        *slot = text.trim();
    }
    let field = |f: StatusField| fields[f as usize];

    let mut warnings: heapless::Vec<DecodeWarning, { StatusField::COUNT }> = heapless::Vec::new();
    let mut real = |f: StatusField, divisor: f64| -> Result<f32, DecodeError> {
        let value = parse_real(field(f), f)? / divisor;
        let (value, clamped) = narrow(value);
        if clamped {
            // One warning per field at most, and there are COUNT fields.
            let _ = warnings.push(DecodeWarning { field: f });
        }
        Ok(value)
    };

    let voltage = real(StatusField::Voltage, 1.0)?;
    let current = real(StatusField::Current, calibration.current_divisor() as f64)?;
    let temperature = real(StatusField::Temperature, 1.0)?;
    let humidity = real(StatusField::Humidity, 1.0)?;
    let dew_point = real(StatusField::DewPoint, 1.0)?;

    let mut dew_pwm: heapless::Vec<f32, MAX_DEW_CHANNELS> = heapless::Vec::new();
    for f in [StatusField::Dew1, StatusField::Dew2] {
        let wire = parse_real(field(f), f)?;
        let _ = dew_pwm.push(wire_to_duty(wire as f32));
    }

    Ok(DecodedStatus {
        snapshot: SensorSnapshot {
            voltage,
            current,
            temperature,
            humidity,
            dew_point,
            ports: parse_ports(field(StatusField::PortStatus))?,
            dslr_power: parse_flag(field(StatusField::DslrStatus), StatusField::DslrStatus)?,
            dew_pwm,
            auto_dew: parse_flag(field(StatusField::AutoDew), StatusField::AutoDew)?,
        },
        warnings,
    })
}

fn parse_real(text: &str, field: StatusField) -> Result<f64, DecodeError> {
    match text.parse::<f64>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(DecodeError::NumericParse { field }),
    }
}

fn parse_flag(text: &str, field: StatusField) -> Result<bool, DecodeError> {
    text.parse::<u8>()
        .map(|value| value != 0)
        .map_err(|_| DecodeError::NumericParse { field })
}

fn parse_ports(text: &str) -> Result<heapless::Vec<bool, MAX_PORTS>, DecodeError> {
    let error = DecodeError::NumericParse {
        field: StatusField::PortStatus,
    };
    if text.is_empty() {
        return Err(error);
    }
    let mut ports: heapless::Vec<bool, MAX_PORTS> = heapless::Vec::new();
    for c in text.chars() {
        let on = match c {
            '0' => false,
            '1' => true,
            _ => return Err(error),
        };
        ports.push(on).map_err(|_| error)?;
    }
    Ok(ports)
}

/// Convert to `f32`, saturating at the representable range. NaN becomes 0. The flag
/// is set if either happened.
fn narrow(value: f64) -> (f32, bool) {
    let max = f32::MAX as f64;
    if value.is_nan() {
        (0.0, true)
    } else if value > max {
        (f32::MAX, true)
    } else if value < -max {
        (f32::MIN, true)
    } else {
        (value as f32, false)
    }
}
