use std::sync::{
    Arc, Mutex, PoisonError, RwLock,
    atomic::{AtomicBool, Ordering},
};

use fugit::MillisDurationU32;

use crate::{
    cache::{ChangedGroups, SensorCache},
    command::{self, Command},
    config::DriverConfig,
    error::{CommandError, InvalidArgument, Result},
    sink::PropertySink,
    transport::LineTransport,
    types::{LinkState, PowerOnBootMask, SensorSnapshot},
};

/// You can create a PowerBox using any interface which implements [embedded_io::Read],
/// [embedded_io::ReadReady] & [embedded_io::Write].
///
/// A `PowerBox` is a cheap handle: clones share the same serial interface, cache and
/// configuration. Every exchange with the device holds the interface for exactly one
/// request and its reply, so intents from several threads and the background poller
/// never interleave on the wire.
///
/// For its methods we use "set" to mean sending a setting to the box, and "poll" to
/// mean fetching telemetry.
pub struct PowerBox<
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
    const L: usize = 128,
> {
    inner: Arc<Inner<S, L>>,
}

struct Inner<S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write, const L: usize>
{
    transport: Mutex<LineTransport<S, L>>,
    active: AtomicBool,
    /// Raised on disconnect to abort a read in progress.
    cancel: AtomicBool,
    config: RwLock<DriverConfig>,
    cache: RwLock<SensorCache>,
    power_on_boot: Mutex<Option<PowerOnBootMask>>,
    sink: Arc<dyn PropertySink>,
}

impl<S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write, const L: usize> Clone
    for PowerBox<S, L>
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write, const L: usize>
    PowerBox<S, L>
{
    /// Create a new PowerBox on an already opened interface. It starts out [`LinkState::Idle`].
    pub fn new(interface: S, config: DriverConfig, sink: Arc<dyn PropertySink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: Mutex::new(LineTransport::new(interface)),
                active: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                config: RwLock::new(config),
                cache: RwLock::new(SensorCache::new()),
                power_on_boot: Mutex::new(None),
                sink,
            }),
        }
    }

    /// Start talking to the device.
    ///
    /// Call once the host has opened the port and registered its properties. The next
    /// poll republishes every field group.
    pub fn connect(&self) {
        self.inner
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.inner.cancel.store(false, Ordering::Release);
        self.inner.active.store(true, Ordering::Release);
        log::info!("Power box connected");
    }

    /// Stop talking to the device. A read in progress is abandoned straight away.
    ///
    /// The last snapshot stays readable through [`Self::snapshot`].
    pub fn disconnect(&self) {
        self.inner.active.store(false, Ordering::Release);
        self.inner.cancel.store(true, Ordering::Release);
        log::info!("Power box disconnected");
    }

    pub fn link_state(&self) -> LinkState {
        if self.inner.active.load(Ordering::Acquire) {
            LinkState::Active
        } else {
            LinkState::Idle
        }
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> DriverConfig {
        *self.inner.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the configuration. Takes effect from the next exchange or poll tick.
    pub fn set_config(&self, config: DriverConfig) {
        *self.inner.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Change how often the poller runs, without restarting it.
    pub fn set_poll_period(&self, period: MillisDurationU32) {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .poll_period = period;
        log::debug!("Poll period set to {} ms", period.to_millis());
    }

    /// A copy of the most recent telemetry, or `None` before the first successful poll.
    pub fn snapshot(&self) -> Option<SensorSnapshot> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get()
            .cloned()
    }

    /// The power-on-boot mask last accepted by the box through [`Self::set_power_on_boot`].
    pub fn power_on_boot(&self) -> Option<PowerOnBootMask> {
        *self
            .inner
            .power_on_boot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Choose which ports the box powers up by itself after a reboot.
    pub fn set_power_on_boot(&self, mask: PowerOnBootMask) -> Result<(), S::Error> {
        self.send_setting(&command::encode_power_on_boot(mask))?;
        *self
            .inner
            .power_on_boot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(mask);
        self.inner.sink.save_power_on_boot(mask);
        Ok(())
    }

    /// Set the duty cycle of dew heater `channel` (numbered from 1), in percent.
    ///
    /// Nothing is sent if the channel or the duty cycle is out of range.
    pub fn set_dew_pwm(&self, channel: u8, duty_percent: f32) -> Result<(), S::Error> {
        let available = self.config().dew_channels;
        if channel == 0 || channel > available {
            return Err(InvalidArgument::DewChannel { channel, available }.into());
        }
        let setting = command::encode_dew_pwm(channel, duty_percent)?;
        self.send_setting(&setting)
    }

    /// Let the box regulate the dew heaters itself, or hand control back to [`Self::set_dew_pwm`].
    pub fn set_auto_dew(&self, enabled: bool) -> Result<(), S::Error> {
        self.send_setting(&command::encode_auto_dew(enabled))
    }

    /// Read the firmware version reported by the box.
    pub fn firmware_version(&self) -> Result<heapless::String<L>, S::Error> {
        self.exchange_with_retries(&command::encode_firmware_query())
    }

    /// Fetch and decode the status once, update the cache and publish changed groups.
    ///
    /// On any error the cached snapshot is left as it was.
    pub fn poll_once(&self) -> Result<ChangedGroups, S::Error> {
        let calibration = self.config().calibration;
        let reply = self.exchange(&command::encode_status_query())?;
        let decoded = command::decode_status_response(&reply, &calibration)?;
        for warning in &decoded.warnings {
            log::warn!("{:?} reading out of range, clamped", warning.field);
        }

        let changed = self
            .inner
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(decoded.snapshot.clone());
        for group in changed.iter() {
            self.inner.sink.publish(group, &decoded.snapshot);
        }
        Ok(changed)
    }

    /// Run `f` with exclusive access to the serial interface.
    pub(crate) fn with_transport<R>(&self, f: impl FnOnce(&mut LineTransport<S, L>) -> R) -> R {
        let mut transport = self
            .inner
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut transport)
    }

    /// Send a setter and check the acknowledgement.
    fn send_setting(&self, setting: &Command) -> Result<(), S::Error> {
        let reply = self.exchange_with_retries(setting)?;
        if command::is_acknowledged(setting, &reply) {
            Ok(())
        } else {
            log::warn!("{} was not acknowledged, got {:?}", setting, reply.as_str());
            let mut received = heapless::String::new();
            for c in reply.chars() {
                if received.push(c).is_err() {
                    break;
                }
            }
            Err(CommandError::Unacknowledged {
                expected: command::expected_ack(setting),
                received,
            })
        }
    }

    /// [`Self::exchange`], repeated while the failure looks transient.
    fn exchange_with_retries(&self, request: &str) -> Result<heapless::String<L>, S::Error> {
        let retries = self.config().command_retries;
        let mut attempt = 0;
        loop {
            match self.exchange(request) {
                Err(e) if e.is_transient() && attempt < retries => {
                    attempt += 1;
                    log::warn!("{} failed ({}), retry {}/{}", request, e, attempt, retries);
                }
                result => return result,
            }
        }
    }

    /// One request/response round trip, holding the interface throughout.
    fn exchange(&self, request: &str) -> Result<heapless::String<L>, S::Error> {
        if self.link_state() == LinkState::Idle {
            return Err(CommandError::Disconnected);
        }
        let timeout = self.config().read_timeout_std();
        self.with_transport(|transport| {
            // We may have waited for the lock across a disconnect.
            if self.link_state() == LinkState::Idle {
                return Err(CommandError::Disconnected);
            }
            transport.exchange(request, timeout, &self.inner.cancel)
        })
    }
}
