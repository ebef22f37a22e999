//! The seam between the driver core and the host framework's property system.

use crate::types::{FieldGroup, PowerOnBootMask, SensorSnapshot};

/// Receives telemetry updates and settings worth keeping across restarts.
///
/// The host implements this to update whatever it shows the user. Calls come
/// from the polling thread, so implementations must not block for long.
pub trait PropertySink: Send + Sync {
    /// `group` differs from what was last published. `snapshot` is the complete new reading.
    fn publish(&self, group: FieldGroup, snapshot: &SensorSnapshot);

    /// The box accepted a new power-on-boot mask.
    fn save_power_on_boot(&self, _mask: PowerOnBootMask) {}
}

/// A sink that ignores everything, for hosts that only read [`PowerBox::snapshot`](crate::powerbox::PowerBox::snapshot).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PropertySink for NullSink {
    fn publish(&self, _group: FieldGroup, _snapshot: &SensorSnapshot) {}
}

/// A sink that writes every published group to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PropertySink for LogSink {
    fn publish(&self, group: FieldGroup, snapshot: &SensorSnapshot) {
        let name: &'static str = group.into();
        match group {
            FieldGroup::PowerSensors => log::info!(
                "{}: {:.2} V, {:.2} A",
                name,
                snapshot.voltage,
                snapshot.current
            ),
            FieldGroup::EnvironmentSensors => log::info!(
                "{}: {:.1} °C, {:.0} %, dew point {:.1} °C",
                name,
                snapshot.temperature,
                snapshot.humidity,
                snapshot.dew_point
            ),
            FieldGroup::PortStatus => log::info!("{}: {:?}", name, snapshot.ports),
            FieldGroup::DslrStatus => log::info!("{}: {}", name, snapshot.dslr_power),
            FieldGroup::DewPwm => log::info!("{}: {:?} %", name, snapshot.dew_pwm),
            FieldGroup::AutoDew => log::info!("{}: {}", name, snapshot.auto_dew),
        }
    }

    fn save_power_on_boot(&self, mask: PowerOnBootMask) {
        log::info!("power_on_boot: {:?}", mask.ports());
    }
}
