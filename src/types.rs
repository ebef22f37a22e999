//! This module contains the domain types exchanged with the power box.

use modular_bitfield::prelude::*;
use strum_macros::{EnumCount, EnumIter, IntoStaticStr};

/// Number of switchable output ports on the box.
pub const PORT_COUNT: usize = 4;
/// Upper bound on ports a status reply may report.
pub const MAX_PORTS: usize = 8;
/// Upper bound on dew heater channels a status reply may report.
pub const MAX_DEW_CHANNELS: usize = 4;

/// Which ports the box energises by itself after a power cycle.
///
/// Ports are numbered from 1, matching the labels on the box.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOnBootMask {
    port1: bool,
    port2: bool,
    port3: bool,
    port4: bool,
    #[skip]
    __: B4,
}

impl PowerOnBootMask {
    /// Build a mask from per-port flags in port order 1..4.
    pub fn from_ports(ports: [bool; PORT_COUNT]) -> Self {
        Self::new()
            .with_port1(ports[0])
            .with_port2(ports[1])
            .with_port3(ports[2])
            .with_port4(ports[3])
    }

    /// Per-port flags in port order 1..4.
    pub fn ports(&self) -> [bool; PORT_COUNT] {
        [self.port1(), self.port2(), self.port3(), self.port4()]
    }

    /// Flag for a single port. Returns `None` for ports outside `1..=4`.
    pub fn port(&self, port: u8) -> Option<bool> {
        match port {
            1..=4 => Some(self.ports()[port as usize - 1]),
            _ => None,
        }
    }
}

impl From<[bool; PORT_COUNT]> for PowerOnBootMask {
    fn from(value: [bool; PORT_COUNT]) -> Self {
        Self::from_ports(value)
    }
}

/// One complete telemetry reading from the box.
///
/// A snapshot is never patched in place; each poll builds a new one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorSnapshot {
    /// Input voltage in volts.
    pub voltage: f32,
    /// Total output current in amps.
    pub current: f32,
    /// Ambient temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Dew point in degrees Celsius.
    pub dew_point: f32,
    /// Power state of each port, in port order.
    pub ports: heapless::Vec<bool, MAX_PORTS>,
    /// Whether the DSLR output is powered.
    pub dslr_power: bool,
    /// Dew heater duty cycle of each channel in percent, in channel order.
    pub dew_pwm: heapless::Vec<f32, MAX_DEW_CHANNELS>,
    /// Whether the box is regulating the dew heaters itself.
    pub auto_dew: bool,
}

/// Related telemetry fields that are diffed and republished as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FieldGroup {
    /// Voltage and current.
    PowerSensors,
    /// Temperature, humidity and dew point.
    EnvironmentSensors,
    PortStatus,
    DslrStatus,
    DewPwm,
    AutoDew,
}

/// Whether the driver may talk to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not connected, or the host has not finished setting up.
    Idle,
    /// Connected and ready for traffic.
    Active,
}
