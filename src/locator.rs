//! ==============================================================================
//! locator.rs - where the network observations come from
//! ==============================================================================
//!
//! purpose:
//!     resolves "location + radius" into an ObservationSet.
//!
//! implementations:
//!     - SimulatedLocator: fixed eight-record sample (4 wifi, 1 hidden wifi,
//!       3 ble). ignores its inputs and never fails. this is the default so
//!       the esp32 side can be exercised without a wigle account.
//!     - WigleLocator (wigle.rs): the real wigle.net v2 search api.
//!
//! relationships:
//!     - used by: pipeline.rs (stage 1 of 3)
//!     - built by: main.rs from config::LocatorConfig
//!
//! ==============================================================================

use crate::config::{LocatorConfig, LocatorMode};
use crate::domain::{NetworkObservation, ObservationSet};
use crate::error::LocatorError;
use crate::wigle::WigleLocator;

/// anything that can answer "what networks are near here?"
pub trait NetworkLocator {
    async fn fetch(&self, location: &str, radius_m: u32) -> Result<ObservationSet, LocatorError>;
}

/// locator selected at startup
pub enum Locator {
    Simulated(SimulatedLocator),
    Wigle(WigleLocator),
}

impl Locator {
    pub fn from_config(config: &LocatorConfig) -> Result<Self, LocatorError> {
        match config.mode {
            LocatorMode::Simulated => Ok(Self::Simulated(SimulatedLocator)),
            LocatorMode::Wigle => Ok(Self::Wigle(WigleLocator::new(config)?)),
        }
    }
}

impl NetworkLocator for Locator {
    async fn fetch(&self, location: &str, radius_m: u32) -> Result<ObservationSet, LocatorError> {
        match self {
            Self::Simulated(l) => l.fetch(location, radius_m).await,
            Self::Wigle(l) => l.fetch(location, radius_m).await,
        }
    }
}

// ==============================================================================
// simulated locator
// ==============================================================================

/// returns the built-in sample regardless of input
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedLocator;

impl NetworkLocator for SimulatedLocator {
    async fn fetch(&self, location: &str, radius_m: u32) -> Result<ObservationSet, LocatorError> {
        tracing::info!(
            "(Simulation) Searching for networks near '{}' within a {}m radius",
            location,
            radius_m
        );
        let set = sample_observations();
        tracing::info!("(Simulation) Found {} networks", set.len());
        Ok(set)
    }
}

fn sample(
    ssid: &str,
    netid: &str,
    kind: &str,
    channel: i32,
    rssi: i32,
    (trilat, trilong): (f64, f64),
    wep: Option<&str>,
) -> NetworkObservation {
    NetworkObservation {
        kind: Some(kind.to_string()),
        ssid: Some(ssid.to_string()),
        netid: Some(netid.to_string()),
        channel: Some(channel),
        rssi: Some(rssi),
        trilat: Some(trilat),
        trilong: Some(trilong),
        wep: wep.map(str::to_string),
        extra: Default::default(),
    }
}

/// the fixture, shaped like a single-page wigle search response
#[rustfmt::skip]
pub fn sample_observations() -> ObservationSet {
    ObservationSet::from_results(vec![
        sample("Starbucks Free WiFi", "0A:1B:2C:3D:4E:5F", "WIFI", 11, -65, (40.7128, -74.0060), Some("f")),
        sample("xfinitywifi",         "1A:2B:3C:4D:5E:6F", "WIFI",  6, -72, (40.7129, -74.0061), Some("f")),
        sample("MySecureNetwork",     "A1:B2:C3:D4:E5:F6", "WIFI",  1, -50, (40.7130, -74.0062), Some("2")),
        sample("Another AP",          "AA:BB:CC:DD:EE:FF", "WIFI",  8, -85, (40.7131, -74.0063), Some("1")),
        sample("JBL Go 2",            "F0:E1:D2:C3:B4:A5", "BLE",  37, -88, (40.7127, -74.0059), None),
        sample("LE-Bose QC35 II",     "00:11:22:33:44:55", "BLE",  38, -75, (40.7126, -74.0058), None),
        sample("Fitbit Charge 3",     "DE:AD:BE:EF:CA:FE", "BLE",  39, -90, (40.7125, -74.0057), None),
        // hidden network
        sample("",                    "11:22:33:44:55:66", "WIFI",  4, -80, (40.7132, -74.0064), Some("2")),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_ignores_input() {
        let a = SimulatedLocator.fetch("40.7128,-74.0060", 500).await.unwrap();
        let b = SimulatedLocator.fetch("1600 Amphitheatre Pkwy", 1).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixture_metadata() {
        let set = sample_observations();
        assert_eq!(set.success, Some(true));
        assert_eq!(set.total_results, Some(8));
        assert_eq!(set.first, Some(0));
        assert_eq!(set.last, Some(8));
        assert_eq!(set.result_count, Some(8));
    }

    #[test]
    fn test_fixture_mix() {
        let set = sample_observations();
        let results = set.results.unwrap();
        let wifi = results.iter().filter(|r| r.kind.as_deref() == Some("WIFI")).count();
        let ble = results.iter().filter(|r| r.kind.as_deref() == Some("BLE")).count();
        let hidden = results.iter().filter(|r| r.ssid.as_deref() == Some("")).count();

        assert_eq!((wifi, ble, hidden), (5, 3, 1));
        assert!(results.iter().all(|r| r.wep.is_some() == (r.kind.as_deref() == Some("WIFI"))));
    }

    #[test]
    fn test_locator_from_default_config() {
        let locator = Locator::from_config(&LocatorConfig::default()).unwrap();
        assert!(matches!(locator, Locator::Simulated(_)));
    }
}
