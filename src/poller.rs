//! Background polling of the power box status.
//!
//! The poller runs on its own OS thread and sleeps on a condition variable between
//! ticks, so stopping it takes effect immediately instead of after a full period.
//!
//! # Behaviour
//!
//! Each tick:
//! 1. Re-reads the poll period from the [`DriverConfig`](crate::config::DriverConfig), so
//!    changes made through [`PowerBox::set_poll_period`] apply from the next tick.
//! 2. Does nothing else while the box is [`LinkState::Idle`].
//! 3. Otherwise runs [`PowerBox::poll_once`]. A timeout or malformed reply is logged and the
//!    tick is skipped; the next tick is the retry.
//!
//! Ticks run back to back on the one thread, so there is never more than one status request
//! in flight.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::{error::CommandError, powerbox::PowerBox, types::LinkState};

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Keeps the polling thread alive. Dropping it stops the thread.
pub struct PollerHandle {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling and wait for the thread to finish its current tick.
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        *self
            .signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.wake.notify_all();
        if thread.join().is_err() {
            log::error!("Polling thread panicked");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S, const L: usize> PowerBox<S, L>
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write + Send + 'static,
{
    /// Start polling the box in the background.
    pub fn start_polling(&self) -> std::io::Result<PollerHandle> {
        let signal = Arc::new(StopSignal::default());
        let powerbox = self.clone();
        let thread_signal = Arc::clone(&signal);
        let thread = thread::Builder::new()
            .name("powerbox-poll".into())
            .spawn(move || poll_loop(powerbox, thread_signal))?;
        Ok(PollerHandle {
            signal,
            thread: Some(thread),
        })
    }
}

fn poll_loop<S, const L: usize>(powerbox: PowerBox<S, L>, signal: Arc<StopSignal>)
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    log::info!("Polling thread started");
    loop {
        tick(&powerbox);

        let period = powerbox.config().poll_period_std();
        let stopped = signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = signal
            .wake
            .wait_timeout_while(stopped, period, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if *stopped {
            break;
        }
    }
    log::info!("Polling thread exiting");
}

fn tick<S, const L: usize>(powerbox: &PowerBox<S, L>)
where
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    if powerbox.link_state() == LinkState::Idle {
        log::trace!("Idle, skipping poll");
        return;
    }
    match powerbox.poll_once() {
        Ok(changed) if !changed.is_empty() => {
            log::debug!("Status changed: {:?}", changed.iter().collect::<Vec<_>>());
        }
        Ok(_) => {}
        // Lost the race with a disconnect.
        Err(CommandError::Disconnected) => log::debug!("Poll abandoned, disconnected"),
        Err(e) => log::warn!("Status poll failed, keeping last state: {}", e),
    }
}
