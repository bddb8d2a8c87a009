//! ==============================================================================
//! transmitter.rs - hand the payload to the esp32
//! ==============================================================================
//!
//! protocol:
//!     the firmware reads its uart until '\n', then parses what it got as
//!     json. so the frame is `<compact json>\n`, utf-8, written in one go.
//!     nothing is read back.
//!
//!     the firmware line buffer holds DEVICE_LINE_LIMIT bytes before the
//!     terminator. longer frames are cut there and fail to parse on the
//!     device, so they are sent anyway but logged as a warning.
//!
//! failure model:
//!     every failure is logged with its own message and collapsed to `false`.
//!     the port is dropped (closed) on every path out of `write_frame`.
//!
//! relationships:
//!     - uses: hal.rs (SerialProvider)
//!     - used by: pipeline.rs (stage 3 of 3)
//!
//! ==============================================================================

use crate::error::TransportError;
use crate::hal::SerialProvider;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// the esp32 reads until this byte
pub const LINE_TERMINATOR: char = '\n';

/// largest frame (terminator included) the firmware parses whole
pub const DEVICE_LINE_LIMIT: usize = 1023;

pub struct DeviceTransmitter<P> {
    provider: Arc<P>,
    /// pause after open; opening the port toggles DTR which resets most esp32 boards
    settle: Duration,
}

impl<P: SerialProvider> DeviceTransmitter<P> {
    pub fn new(provider: P, settle: Duration) -> Self {
        Self { provider: Arc::new(provider), settle }
    }

    /// write `payload` + newline to `endpoint`; true only if the write completed
    pub async fn send(&self, payload: &str, endpoint: &str, baud: u32, timeout: Duration) -> bool {
        if payload.is_empty() {
            tracing::error!("Communicator error: the provided data payload is empty");
            return false;
        }

        tracing::info!(
            backend = self.provider.name(),
            "Attempting to connect to ESP32 on port '{}' at {} baud",
            endpoint,
            baud
        );

        let provider = Arc::clone(&self.provider);
        let endpoint_owned = endpoint.to_string();
        let frame = encode_frame(payload);
        if !fits_device_line(&frame) {
            tracing::warn!(
                bytes = frame.len(),
                limit = DEVICE_LINE_LIMIT,
                "Payload exceeds the ESP32 line buffer and will be truncated; lower results_per_page"
            );
        }
        let settle = self.settle;

        // offload blocking io to dedicated thread
        let result = tokio::task::spawn_blocking(move || {
            write_frame(&*provider, &endpoint_owned, baud, timeout, settle, &frame)
        })
        .await
        .unwrap_or_else(|e| Err(TransportError::Unexpected(format!("task join error: {}", e))));

        match result {
            Ok(written) => {
                tracing::info!("Data sent successfully ({} bytes)", written);
                true
            }
            Err(e) => {
                report(&e, endpoint);
                false
            }
        }
    }
}

/// payload as the bytes that go on the wire
pub fn encode_frame(payload: &str) -> Vec<u8> {
    let mut line = String::with_capacity(payload.len() + 1);
    line.push_str(payload);
    line.push(LINE_TERMINATOR);
    line.into_bytes()
}

pub fn fits_device_line(frame: &[u8]) -> bool {
    frame.len() <= DEVICE_LINE_LIMIT
}

fn write_frame<P: SerialProvider>(
    provider: &P,
    endpoint: &str,
    baud: u32,
    timeout: Duration,
    settle: Duration,
    frame: &[u8],
) -> Result<usize, TransportError> {
    let mut port = provider.open(endpoint, baud, timeout)?;

    std::thread::sleep(settle);

    tracing::info!("Writing {} bytes to the serial port...", frame.len());
    let write_err = |source: std::io::Error| TransportError::Write {
        endpoint: endpoint.to_string(),
        source,
    };
    port.write_all(frame).map_err(write_err)?;
    port.flush().map_err(write_err)?;

    Ok(frame.len())
}

fn report(error: &TransportError, endpoint: &str) {
    match error {
        TransportError::Unavailable(reason) => {
            tracing::error!("Serial transport is not available: {}", reason);
            tracing::error!("Rebuild with `--features usb-serial` (USB adapters) or `--features hardware` (Pi UART)");
        }
        TransportError::Open { .. } | TransportError::Write { .. } => {
            tracing::error!("SERIAL COMMUNICATION FAILED: {}", error);
            tracing::error!("Could not open or write to the port '{}'. Please check:", endpoint);
            tracing::error!("  1. Is the ESP32 device plugged in?");
            tracing::error!("  2. Is the correct serial port specified? Try `ls /dev/tty*` to find it.");
            tracing::error!("  3. Do you have permission? You may need to add your user to the 'dialout' group.");
        }
        TransportError::Unexpected(msg) => {
            tracing::error!("An unexpected error occurred during serial communication: {}", msg);
        }
    }
}
