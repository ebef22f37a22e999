//! Last-known telemetry and the change detection used to limit republishing.

use modular_bitfield::prelude::*;
use strum::IntoEnumIterator;

use crate::types::{FieldGroup, SensorSnapshot};

/// Set of [`FieldGroup`]s that differ between two snapshots.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedGroups {
    power_sensors: bool,
    environment_sensors: bool,
    port_status: bool,
    dslr_status: bool,
    dew_pwm: bool,
    auto_dew: bool,
    #[skip]
    __: B2,
}

impl ChangedGroups {
    /// Every group marked as changed.
    pub fn all() -> Self {
        let mut set = Self::new();
        for group in FieldGroup::iter() {
            set.insert(group);
        }
        set
    }

    pub fn contains(&self, group: FieldGroup) -> bool {
        match group {
            FieldGroup::PowerSensors => self.power_sensors(),
            FieldGroup::EnvironmentSensors => self.environment_sensors(),
            FieldGroup::PortStatus => self.port_status(),
            FieldGroup::DslrStatus => self.dslr_status(),
            FieldGroup::DewPwm => self.dew_pwm(),
            FieldGroup::AutoDew => self.auto_dew(),
        }
    }

    pub fn insert(&mut self, group: FieldGroup) {
        match group {
            FieldGroup::PowerSensors => self.set_power_sensors(true),
            FieldGroup::EnvironmentSensors => self.set_environment_sensors(true),
            FieldGroup::PortStatus => self.set_port_status(true),
            FieldGroup::DslrStatus => self.set_dslr_status(true),
            FieldGroup::DewPwm => self.set_dew_pwm(true),
            FieldGroup::AutoDew => self.set_auto_dew(true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.into_bytes() == [0]
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// The groups in this set, in [`FieldGroup`] declaration order.
    pub fn iter(&self) -> impl Iterator<Item = FieldGroup> + '_ {
        FieldGroup::iter().filter(|group| self.contains(*group))
    }
}

impl Default for ChangedGroups {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<FieldGroup> for ChangedGroups {
    fn from_iter<T: IntoIterator<Item = FieldGroup>>(iter: T) -> Self {
        let mut set = Self::new();
        for group in iter {
            set.insert(group);
        }
        set
    }
}

/// Compare two snapshots group by group.
pub fn diff(old: &SensorSnapshot, new: &SensorSnapshot) -> ChangedGroups {
    let mut changed = ChangedGroups::new();
    if old.voltage != new.voltage || old.current != new.current {
        changed.insert(FieldGroup::PowerSensors);
    }
    if old.temperature != new.temperature
        || old.humidity != new.humidity
        || old.dew_point != new.dew_point
    {
        changed.insert(FieldGroup::EnvironmentSensors);
    }
    if old.ports != new.ports {
        changed.insert(FieldGroup::PortStatus);
    }
    if old.dslr_power != new.dslr_power {
        changed.insert(FieldGroup::DslrStatus);
    }
    if old.dew_pwm != new.dew_pwm {
        changed.insert(FieldGroup::DewPwm);
    }
    if old.auto_dew != new.auto_dew {
        changed.insert(FieldGroup::AutoDew);
    }
    changed
}

/// Holds the most recently applied snapshot, if any poll has succeeded yet.
#[derive(Debug, Default)]
pub struct SensorCache {
    last: Option<SensorSnapshot>,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&SensorSnapshot> {
        self.last.as_ref()
    }

    /// Replace the cached snapshot and report what changed.
    ///
    /// The first snapshot ever applied reports every group.
    pub fn apply(&mut self, snapshot: SensorSnapshot) -> ChangedGroups {
        let changed = match &self.last {
            Some(last) => diff(last, &snapshot),
            None => ChangedGroups::all(),
        };
        self.last = Some(snapshot);
        changed
    }

    /// Forget the cached snapshot, so the next one is reported in full.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::EnumCount;

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            voltage: 12.1,
            current: 0.5,
            temperature: 22.3,
            humidity: 45.0,
            dew_point: 10.1,
            ports: heapless::Vec::from_slice(&[true, false, true, true]).unwrap(),
            dslr_power: false,
            dew_pwm: heapless::Vec::from_slice(&[50.0, 0.0]).unwrap(),
            auto_dew: true,
        }
    }

    #[test]
    fn identical_snapshots_do_not_differ() {
        assert!(diff(&snapshot(), &snapshot()).is_empty());
    }

    #[test]
    fn voltage_only_change() {
        let mut new = snapshot();
        new.voltage = 11.9;
        let changed = diff(&snapshot(), &new);
        assert_eq!(changed.iter().collect::<Vec<_>>(), [FieldGroup::PowerSensors]);
    }

    #[test]
    fn each_group_detected() {
        let mut new = snapshot();
        new.humidity = 80.0;
        new.ports[1] = true;
        new.dslr_power = true;
        new.dew_pwm[0] = 10.0;
        new.auto_dew = false;
        let changed = diff(&snapshot(), &new);
        assert_eq!(
            changed.iter().collect::<Vec<_>>(),
            [
                FieldGroup::EnvironmentSensors,
                FieldGroup::PortStatus,
                FieldGroup::DslrStatus,
                FieldGroup::DewPwm,
                FieldGroup::AutoDew,
            ]
        );
    }

    #[test]
    fn port_count_change_is_detected() {
        let mut new = snapshot();
        new.ports.pop();
        assert!(diff(&snapshot(), &new).contains(FieldGroup::PortStatus));
    }

    #[test]
    fn first_apply_reports_everything() {
        let mut cache = SensorCache::new();
        assert!(cache.get().is_none());
        let changed = cache.apply(snapshot());
        assert_eq!(changed, ChangedGroups::all());
        assert_eq!(changed.len(), FieldGroup::COUNT);
        assert_eq!(cache.get(), Some(&snapshot()));
    }

    #[test]
    fn apply_replaces_wholesale() {
        let mut cache = SensorCache::new();
        cache.apply(snapshot());
        assert!(cache.apply(snapshot()).is_empty());

        let mut new = snapshot();
        new.current = 2.0;
        new.temperature = -3.0;
        let changed = cache.apply(new.clone());
        assert_eq!(
            changed,
            [FieldGroup::PowerSensors, FieldGroup::EnvironmentSensors]
                .into_iter()
                .collect()
        );
        assert_eq!(cache.get(), Some(&new));

        cache.clear();
        assert_eq!(cache.apply(new), ChangedGroups::all());
    }
}
