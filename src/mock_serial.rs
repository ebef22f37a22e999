//! We use this mocking module in unit tests to emulate the power box on a serial port.

use std::collections::VecDeque;

/// Produces the device's reply to one command line, or `None` to stay silent.
pub type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

/// Our mock type used to emulate a serial port with a device on the far end.
pub struct MockSerial {
    /// Everything written to the mock serial port, in order.
    write_buffer: Vec<u8>,
    /// Bytes of the command line currently being written.
    current_line: Vec<u8>,
    /// Data waiting to be read.
    read_buffer: VecDeque<u8>,
    /// Answers each complete command line.
    responder: Option<Responder>,
    /// Accept at most this many bytes per `write` call.
    max_write_chunk: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    /// Report end of stream once the read buffer is empty.
    end_of_stream: bool,
}

#[derive(Debug, PartialEq)]
pub enum MockSerialError {
    /// Nothing to read right now, as a port with a read timeout would report.
    Timeout,
    /// Generic simulated error for testing
    SimulatedError,
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        let accepted = buf.len().min(self.max_write_chunk);
        for &byte in &buf[..accepted] {
            self.write_buffer.push(byte);
            if byte == b'\n' {
                self.complete_line();
            } else {
                self.current_line.push(byte);
            }
        }

        Ok(accepted)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_buffer.is_empty() {
            if self.end_of_stream {
                return Ok(0);
            }
            return Err(MockSerialError::Timeout);
        }

        let bytes_to_read = buf.len().min(self.read_buffer.len());
        for (slot, byte) in buf.iter_mut().zip(self.read_buffer.drain(..bytes_to_read)) {
            *slot = byte;
        }
        Ok(bytes_to_read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(!self.read_buffer.is_empty())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers and no device attached.
    pub fn new() -> Self {
        Self {
            write_buffer: Vec::new(),
            current_line: Vec::new(),
            read_buffer: VecDeque::new(),
            responder: None,
            max_write_chunk: usize::MAX,
            should_error_on_write: false,
            should_error_on_read: false,
            end_of_stream: false,
        }
    }

    /// Create a mock whose device answers every command line via `responder`.
    ///
    /// Replies get a `\r\n` appended, as the real device sends them.
    pub fn with_responder(responder: impl FnMut(&str) -> Option<String> + Send + 'static) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) {
        self.read_buffer.clear();
        self.read_buffer.extend(data);
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Every complete line written so far, without terminators.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.write_buffer)
            .split_terminator('\n')
            .map(str::to_owned)
            .collect()
    }

    /// Only accept `chunk` bytes per write call, forcing callers to loop.
    pub fn set_max_write_chunk(&mut self, chunk: usize) {
        self.max_write_chunk = chunk.max(1);
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Behave like a closed port: reads return `Ok(0)` once the buffer runs dry.
    pub fn set_end_of_stream(&mut self, closed: bool) {
        self.end_of_stream = closed;
    }

    fn complete_line(&mut self) {
        let line = String::from_utf8_lossy(&self.current_line).into_owned();
        self.current_line.clear();
        if let Some(responder) = self.responder.as_mut() {
            if let Some(reply) = responder(&line) {
                self.read_buffer.extend(reply.as_bytes());
                self.read_buffer.extend(b"\r\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, ReadReady, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert!(mock.read_buffer.is_empty());
        assert!(!mock.should_error_on_write);
        assert!(!mock.should_error_on_read);
    }

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let test_data = b"PE:1101\n";

        let result = mock.write(test_data);
        assert_eq!(result, Ok(test_data.len()));
        assert_eq!(mock.written_data(), test_data);
        assert_eq!(mock.written_lines(), ["PE:1101"]);
    }

    #[test]
    fn test_chunked_write() {
        let mut mock = MockSerial::new();
        mock.set_max_write_chunk(3);
        assert_eq!(mock.write(b"P1:128\n"), Ok(3));
        mock.write_all(b"P1:128\n").unwrap();
        assert_eq!(mock.written_data(), b"P1:P1:128\n");
    }

    #[test]
    fn test_responder_answers_each_line() {
        let mut mock = MockSerial::with_responder(|line| match line {
            "PA" => Some("status".into()),
            _ => None,
        });
        mock.write_all(b"PX\nPA\n").unwrap();

        let mut buffer = [0u8; 16];
        let count = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"status\r\n");
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Long response data");

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer), Ok(5));
        assert_eq!(&buffer, b"Long ");
    }

    #[test]
    fn test_read_timeout_when_no_data() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];

        let result = mock.read(&mut buffer);
        assert_eq!(result, Err(MockSerialError::Timeout));
    }

    #[test]
    fn test_read_ready_tracks_buffer() {
        let mut mock = MockSerial::new();
        assert_eq!(mock.read_ready(), Ok(false));
        mock.set_read_data(b"PE:1\r\n");
        assert_eq!(mock.read_ready(), Ok(true));
    }

    #[test]
    fn test_end_of_stream() {
        let mut mock = MockSerial::new();
        mock.set_end_of_stream(true);
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Ok(0));
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert_eq!(mock.write(b"test"), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.flush(), Err(MockSerialError::SimulatedError));
        assert!(mock.written_data().is_empty());

        mock.set_read_data(b"data");
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
        assert!(matches!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }
}
