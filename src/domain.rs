//! ==============================================================================
//! domain.rs - data shapes flowing through the pipeline
//! ==============================================================================
//!
//! raw side (from the locator):
//!     NetworkObservation / ObservationSet mirror the wigle v2 search
//!     response. every field is optional, since wigle omits keys freely.
//!
//! device side (to the esp32):
//!     DeviceNetworkEntry / DevicePayload are the strict schema the firmware
//!     parses. field order here is the order on the wire.
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

/// raw emitter record as returned by the lookup service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkObservation {
    /// signal type ("WIFI", "BLE", ...), compared case-sensitively downstream
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// display name, empty for hidden networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,

    /// hardware address, e.g. "0A:1B:2C:3D:4E:5F"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<i32>,

    /// signal strength in dBm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,

    /// trilaterated latitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trilat: Option<f64>,

    /// trilaterated longitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trilong: Option<f64>,

    /// encryption indicator ("f", "1", "2", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wep: Option<String>,

    /// everything else the service sends (lasttime, qos, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// one lookup response: metadata plus the ordered records
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<u64>,

    /// None when the response carried no `results` key at all
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "records_lenient"
    )]
    pub results: Option<Vec<NetworkObservation>>,
}

/// decode each record on its own; a mistyped one is dropped, not the whole page
fn records_lenient<'de, D>(deserializer: D) -> Result<Option<Vec<NetworkObservation>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(raw.map(|values| {
        values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(index, "Skipping malformed network record: {}", e);
                    None
                }
            })
            .collect()
    }))
}

impl ObservationSet {
    /// wrap records with the metadata a successful single-page search carries
    pub fn from_results(results: Vec<NetworkObservation>) -> Self {
        let count = results.len() as u64;
        Self {
            success: Some(true),
            total_results: Some(count),
            first: Some(0),
            last: Some(count),
            result_count: Some(count),
            results: Some(results),
        }
    }

    /// number of records, zero when `results` is missing
    pub fn len(&self) -> usize {
        self.results.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// true when there is nothing to format (missing or empty `results`)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// one network the esp32 should advertise
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNetworkEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub ssid: String,
    pub netid: String,
    pub channel: i32,
    pub rssi: i32,
}

/// the single json object written to the serial link
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePayload {
    pub results: Vec<DeviceNetworkEntry>,
}

impl DevicePayload {
    /// compact json, no whitespace between tokens
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
