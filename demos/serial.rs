use std::{env, sync::Arc};

use astro_powerbox::{DriverConfig, PowerBox, PowerOnBootMask, sink::LogSink};
use fugit::MillisDurationU32;
use inquire::Select;
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 9600;
// Short port timeout; the driver applies its own per-reply deadline on top.
const SERIAL_TIMEOUT_MS: u64 = 50;
const POLL_PERIOD_MS: u32 = 1000;
const DEW_CHANNEL: u8 = 1;
const DEW_DUTY_PERCENT: f32 = 35.0;
const RUN_TIME_S: u64 = 10;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.0
            .bytes_to_read()
            .map(|count| count > 0)
            .map_err(|e| IoError(e.into()))
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let config = DriverConfig::default().with_poll_period(MillisDurationU32::millis(POLL_PERIOD_MS));
    let powerbox: PowerBox<PortWrapper> = PowerBox::new(PortWrapper(port), config, Arc::new(LogSink));
    powerbox.connect();

    match powerbox.firmware_version() {
        Ok(version) => println!("Firmware version: {}", version),
        Err(e) => println!("Could not read firmware version: {}", e),
    }

    let poller = powerbox.start_polling().expect("Failed to start polling thread");

    let mask = PowerOnBootMask::from_ports([true, true, false, false]);
    match powerbox.set_power_on_boot(mask) {
        Ok(()) => println!("Power-on-boot mask set to {:?}", mask.ports()),
        Err(e) => println!("Power-on-boot mask rejected: {}", e),
    }

    match powerbox.set_dew_pwm(DEW_CHANNEL, DEW_DUTY_PERCENT) {
        Ok(()) => println!("Dew channel {} set to {}%", DEW_CHANNEL, DEW_DUTY_PERCENT),
        Err(e) => println!("Dew channel {} not set: {}", DEW_CHANNEL, e),
    }

    std::thread::sleep(std::time::Duration::from_secs(RUN_TIME_S));

    poller.stop();
    powerbox.disconnect();

    println!("\n--- Last snapshot ---");
    println!("{:#?}", powerbox.snapshot());
}
