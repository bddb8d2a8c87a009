//! ==============================================================================
//! hal.rs - Serial Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     one interface for "open a writable serial port", whichever backend this
//!     binary was built with. the transmitter only ever sees SerialProvider.
//!
//! backends (cargo features):
//!     - hardware:   raspberry pi uart through `rppal` (e.g. /dev/serial0)
//!     - usb-serial: `serialport`, any platform (e.g. /dev/ttyUSB0, COM3)
//!     - neither:    no transport; `detect()` fails so main can stop early
//!
//! relationships:
//!     - used by: transmitter.rs (open + write), main.rs (capability check)
//!
//! ==============================================================================

use crate::error::TransportError;
use std::io::Write;
use std::time::Duration;

pub trait SerialProvider: Send + Sync + 'static {
    /// open port, released when dropped
    type Port: Write;

    /// short backend name for logs
    fn name(&self) -> &'static str;

    /// open `endpoint` at 8N1, no flow control
    fn open(
        &self,
        endpoint: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Self::Port, TransportError>;
}

/// check that a serial backend is usable before doing any work
pub fn detect() -> Result<Hal, TransportError> {
    Hal::new()
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================
#[cfg(feature = "hardware")]
pub struct Hal {}

#[cfg(feature = "hardware")]
impl Hal {
    pub fn new() -> Result<Self, TransportError> {
        let info = rppal::system::DeviceInfo::new()
            .map_err(|_| TransportError::Unavailable("not running on a Raspberry Pi"))?;
        tracing::info!("Using REAL HARDWARE HAL (rppal) on {}", info.model());
        Ok(Self {})
    }
}

/// rppal uart with std::io::Write on top
#[cfg(feature = "hardware")]
pub struct UartPort(rppal::uart::Uart);

#[cfg(feature = "hardware")]
impl Write for UartPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf).map_err(std::io::Error::other)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.drain().map_err(std::io::Error::other)
    }
}

#[cfg(feature = "hardware")]
impl SerialProvider for Hal {
    type Port = UartPort;

    fn name(&self) -> &'static str {
        "rppal-uart"
    }

    fn open(
        &self,
        endpoint: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Self::Port, TransportError> {
        use rppal::uart::{Parity, Uart};

        let open_err = |e: rppal::uart::Error| TransportError::Open {
            endpoint: endpoint.to_string(),
            source: std::io::Error::other(e),
        };

        let mut uart = Uart::with_path(endpoint, baud, Parity::None, 8, 1).map_err(open_err)?;
        // rppal has no write timeout; blocking mode waits for the tx queue instead
        uart.set_write_mode(true).map_err(open_err)?;
        tracing::debug!(
            "Opened {} at {} baud (write timeout {:?} not enforced by uart)",
            endpoint,
            baud,
            timeout
        );
        Ok(UartPort(uart))
    }
}

// ==============================================================================================
// PORTABLE IMPLEMENTATION (USB serial adapters)
// ==============================================================================================
#[cfg(all(feature = "usb-serial", not(feature = "hardware")))]
pub struct Hal {}

#[cfg(all(feature = "usb-serial", not(feature = "hardware")))]
impl Hal {
    pub fn new() -> Result<Self, TransportError> {
        tracing::info!("Using USB SERIAL HAL (serialport)");
        Ok(Self {})
    }
}

#[cfg(all(feature = "usb-serial", not(feature = "hardware")))]
impl SerialProvider for Hal {
    type Port = Box<dyn serialport::SerialPort>;

    fn name(&self) -> &'static str {
        "serialport"
    }

    fn open(
        &self,
        endpoint: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Self::Port, TransportError> {
        use serialport::{DataBits, FlowControl, Parity, StopBits};

        let port = serialport::new(endpoint, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| TransportError::Open {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(e),
            })?;

        tracing::debug!("Opened serial port: {} at {} baud", endpoint, baud);
        Ok(port)
    }
}

// ==============================================================================================
// NO BACKEND
// ==============================================================================================
#[cfg(not(any(feature = "usb-serial", feature = "hardware")))]
pub struct Hal {}

#[cfg(not(any(feature = "usb-serial", feature = "hardware")))]
impl Hal {
    pub fn new() -> Result<Self, TransportError> {
        Err(TransportError::Unavailable(
            "built without a serial backend (enable feature `usb-serial` or `hardware`)",
        ))
    }
}

#[cfg(not(any(feature = "usb-serial", feature = "hardware")))]
impl SerialProvider for Hal {
    type Port = std::io::Sink;

    fn name(&self) -> &'static str {
        "none"
    }

    fn open(
        &self,
        _endpoint: &str,
        _baud: u32,
        _timeout: Duration,
    ) -> Result<Self::Port, TransportError> {
        Err(TransportError::Unavailable("no serial backend compiled in"))
    }
}
