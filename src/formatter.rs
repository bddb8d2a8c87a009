//! ==============================================================================
//! formatter.rs - wigle records -> esp32 payload
//! ==============================================================================
//!
//! purpose:
//!     projects each loose NetworkObservation onto the strict five-field
//!     DeviceNetworkEntry the firmware expects. pure, no i/o beyond logging.
//!
//! rules (per record, order preserved):
//!     - netid, type and rssi are mandatory; records missing one are skipped
//!     - ssid is trimmed; empty becomes "<hidden>" (firmware needs a name)
//!     - missing channel defaults by raw type: "BLE" -> 37, anything else -> 1
//!     - type is uppercased
//!     - coordinates, encryption flag and any extra keys are dropped
//!
//! ==============================================================================

use crate::domain::{DeviceNetworkEntry, DevicePayload, NetworkObservation, ObservationSet};
use crate::error::FormatError;

pub const HIDDEN_SSID: &str = "<hidden>";
pub const DEFAULT_NETID: &str = "00:00:00:00:00:00";
pub const DEFAULT_TYPE: &str = "WIFI";
pub const DEFAULT_RSSI: i32 = -99;
/// first ble advertising channel
pub const DEFAULT_BLE_CHANNEL: i32 = 37;
pub const DEFAULT_WIFI_CHANNEL: i32 = 1;

const BLE_TYPE: &str = "BLE";

/// format a lookup response for the device
///
/// only a missing `results` collection is an error. malformed records are
/// logged and skipped.
pub fn format_for_device(set: &ObservationSet) -> Result<DevicePayload, FormatError> {
    let records = set.results.as_ref().ok_or_else(|| {
        tracing::error!("Formatter error: invalid or empty data received");
        FormatError::MissingResults
    })?;

    let results: Vec<DeviceNetworkEntry> = records
        .iter()
        .filter_map(|record| {
            let entry = project(record);
            if entry.is_none() {
                tracing::warn!(
                    netid = ?record.netid,
                    kind = ?record.kind,
                    rssi = ?record.rssi,
                    "Skipping malformed network record"
                );
            }
            entry
        })
        .collect();

    tracing::debug!(
        kept = results.len(),
        skipped = records.len() - results.len(),
        "Formatted network records"
    );

    Ok(DevicePayload { results })
}

/// map one raw record, None if a mandatory field is missing
pub fn project(record: &NetworkObservation) -> Option<DeviceNetworkEntry> {
    if record.netid.is_none() || record.kind.is_none() || record.rssi.is_none() {
        return None;
    }

    let ssid = match record.ssid.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => HIDDEN_SSID.to_string(),
    };

    // case-sensitive, against the raw value
    let channel = record.channel.unwrap_or_else(|| {
        if record.kind.as_deref() == Some(BLE_TYPE) {
            DEFAULT_BLE_CHANNEL
        } else {
            DEFAULT_WIFI_CHANNEL
        }
    });

    Some(DeviceNetworkEntry {
        kind: record.kind.as_deref().unwrap_or(DEFAULT_TYPE).to_uppercase(),
        ssid,
        netid: record
            .netid
            .clone()
            .unwrap_or_else(|| DEFAULT_NETID.to_string()),
        channel,
        rssi: record.rssi.unwrap_or(DEFAULT_RSSI),
    })
}
