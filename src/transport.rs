//! Line oriented request/response framing on top of any [`embedded_io`] interface.

use core::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embedded_io::Error;

use crate::error::{CommandError, Result};

/// Terminates every command and every reply.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Wraps a serial interface and speaks newline terminated ASCII over it.
///
/// `L` is the capacity of the receive buffer, and so the longest reply we can accept.
pub struct LineTransport<
    S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
    const L: usize = 128,
> {
    interface: S,
    /// Bytes received but not yet returned as a line.
    pending: heapless::Vec<u8, L>,
}

impl<S: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write, const L: usize>
    LineTransport<S, L>
{
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            pending: heapless::Vec::new(),
        }
    }

    /// Access the wrapped interface.
    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    /// Give back the wrapped interface.
    pub fn into_inner(self) -> S {
        self.interface
    }

    /// Drop anything left over from an earlier exchange, buffered here or still
    /// waiting in the interface, such as a reply that arrived after its timeout.
    pub fn discard_pending(&mut self) -> Result<(), S::Error> {
        let mut discarded = self.pending.len();
        self.pending.clear();

        let mut temp_buf = [0u8; 16];
        while self.interface.read_ready().map_err(CommandError::Serial)? {
            match self.interface.read(&mut temp_buf) {
                Ok(0) => break,
                Ok(bytes_read) => discarded += bytes_read,
                Err(e) if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) => break,
                Err(e) => return Err(CommandError::Serial(e)),
            }
        }

        if discarded > 0 {
            log::debug!("Discarding {} stale bytes", discarded);
        }
        Ok(())
    }

    /// Write `line` followed by the terminator.
    pub fn send_line(&mut self, line: &str) -> Result<(), S::Error> {
        log::trace!("-> {}", line);
        self.interface
            .write_all(line.as_bytes())
            .map_err(CommandError::Serial)?;
        self.interface
            .write_all(&[LINE_TERMINATOR])
            .map_err(CommandError::Serial)?;
        self.interface.flush().map_err(CommandError::Serial)
    }

    /// Read one line, without its terminator or a trailing `\r`.
    ///
    /// Gives up with [`CommandError::Timeout`] once `timeout` has elapsed and with
    /// [`CommandError::Disconnected`] as soon as `cancel` is raised.
    pub fn read_line(
        &mut self,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<heapless::String<L>, S::Error> {
        let deadline = Instant::now() + timeout;
        let mut temp_buf = [0u8; 16];
        loop {
            if let Some(end) = self.pending.iter().position(|b| *b == LINE_TERMINATOR) {
                return self.take_line(end);
            }
            if cancel.load(Ordering::Acquire) {
                return Err(CommandError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Err(CommandError::Timeout);
            }

            match self.interface.read(&mut temp_buf) {
                // End of stream, nothing more will ever arrive.
                Ok(0) => return Err(CommandError::Closed),
                Ok(bytes_read) => {
                    if self
                        .pending
                        .extend_from_slice(&temp_buf[..bytes_read])
                        .is_err()
                    {
                        self.pending.clear();
                        return Err(CommandError::BufferError);
                    }
                }
                // The port's own read timeout elapsed with nothing to read, keep waiting.
                Err(e) if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) => {
                    std::thread::yield_now()
                }
                Err(e) => return Err(CommandError::Serial(e)),
            }
        }
    }

    /// Send `command` and wait for the single line it provokes.
    pub fn exchange(
        &mut self,
        command: &str,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<heapless::String<L>, S::Error> {
        self.discard_pending()?;
        self.send_line(command)?;
        let reply = self.read_line(timeout, cancel)?;
        log::trace!("<- {}", reply);
        Ok(reply)
    }

    fn take_line(&mut self, end: usize) -> Result<heapless::String<L>, S::Error> {
        let mut line_end = end;
        if line_end > 0 && self.pending[line_end - 1] == b'\r' {
            line_end -= 1;
        }

        let mut line = heapless::String::new();
        let decoded = core::str::from_utf8(&self.pending[..line_end])
            .map_err(|_| CommandError::InvalidResponse)
            .and_then(|text| line.push_str(text).map_err(|_| CommandError::BufferError));

        // Keep whatever followed the terminator for the next read.
        let rest = self.pending.len() - end - 1;
        self.pending.copy_within(end + 1.., 0);
        self.pending.truncate(rest);

        decoded.map(|_| line)
    }
}
