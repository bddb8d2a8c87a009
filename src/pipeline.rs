//! ==============================================================================
//! pipeline.rs - fetch -> format -> transmit
//! ==============================================================================
//!
//! strictly sequential. each stage must succeed before the next starts:
//!
//!     locator ──(ObservationSet)──> formatter ──(json)──> transmitter
//!
//! a locator error or an empty result stops the run before formatting; a
//! formatter error stops it before the port is touched.
//!
//! ==============================================================================

use crate::error::PipelineError;
use crate::formatter;
use crate::hal::SerialProvider;
use crate::locator::NetworkLocator;
use crate::transmitter::DeviceTransmitter;

use std::time::Duration;

/// one run's inputs
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub location: String,
    pub radius_m: u32,
    pub port: String,
    pub baud: u32,
    pub timeout: Duration,
}

/// run all three stages; Ok carries the number of networks handed to the device
pub async fn run<L, P>(
    locator: &L,
    transmitter: &DeviceTransmitter<P>,
    request: &PipelineRequest,
) -> Result<usize, PipelineError>
where
    L: NetworkLocator,
    P: SerialProvider,
{
    // 1. fetch
    println!("\n[1/3] Fetching network data...");
    let raw = locator
        .fetch(&request.location, request.radius_m)
        .await
        .inspect_err(|e| tracing::error!("Locator failed: {}", e))?;
    if raw.is_empty() {
        return Err(PipelineError::NoObservations);
    }
    println!("[+] Successfully fetched info for {} networks.", raw.len());

    // 2. format
    println!("\n[2/3] Formatting data for ESP32...");
    let payload = formatter::format_for_device(&raw)?;
    let json = payload.to_json()?;
    println!("[+] Data formatted successfully.");
    tracing::debug!(bytes = json.len(), "payload: {}", json);

    // 3. transmit
    println!("\n[3/3] Sending data to ESP32 on {}...", request.port);
    if transmitter
        .send(&json, &request.port, request.baud, request.timeout)
        .await
    {
        Ok(payload.results.len())
    } else {
        Err(PipelineError::Transmit(request.port.clone()))
    }
}
