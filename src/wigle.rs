//! ==============================================================================
//! wigle.rs - wigle.net v2 api client
//! ==============================================================================
//!
//! purpose:
//!     the real locator. one geocode call (only for free-text locations) and
//!     one search call per run. no retry, no pagination: the first page is
//!     plenty for a single esp32 to rebroadcast.
//!
//! endpoints:
//!     GET /api/v2/network/geocode?addresscode=...
//!     GET /api/v2/network/search?latrange1=..&latrange2=..&longrange1=..&longrange2=..
//!
//! auth:
//!     http basic, api name + api token from the wigle account page.
//!
//! ==============================================================================

use crate::config::LocatorConfig;
use crate::domain::ObservationSet;
use crate::error::LocatorError;
use crate::locator::NetworkLocator;

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// a resolved point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// search rectangle in wigle's latrange/longrange terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// square box of half-width `radius_m` around `center`
    pub fn around(center: Coordinates, radius_m: u32) -> Self {
        let radius = f64::from(radius_m);
        let dlat = radius / METERS_PER_DEGREE_LAT;
        // clamp so the poles don't blow up the longitude span
        let cos_lat = center.lat.to_radians().cos().max(1e-6);
        let dlon = (radius / (METERS_PER_DEGREE_LAT * cos_lat)).min(180.0);

        Self {
            lat_min: (center.lat - dlat).max(-90.0),
            lat_max: (center.lat + dlat).min(90.0),
            lon_min: (center.lon - dlon).max(-180.0),
            lon_max: (center.lon + dlon).min(180.0),
        }
    }
}

/// "lat,lon" -> Coordinates, None for anything else (treated as an address)
pub fn parse_coordinates(location: &str) -> Option<Coordinates> {
    let (lat, lon) = location.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;

    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some(Coordinates { lat, lon })
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    lat: f64,
    lon: f64,
}

pub struct WigleLocator {
    client: reqwest::Client,
    api_url: String,
    api_name: String,
    api_token: String,
    results_per_page: u32,
}

impl WigleLocator {
    pub fn new(config: &LocatorConfig) -> Result<Self, LocatorError> {
        Self::with_builder(config, reqwest::Client::builder())
    }

    /// same as `new`, starting from a caller-tuned client builder
    fn with_builder(
        config: &LocatorConfig,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, LocatorError> {
        if config.api_name.is_empty() || config.api_token.is_empty() {
            return Err(LocatorError::MissingCredentials);
        }

        let client = builder
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_name: config.api_name.clone(),
            api_token: config.api_token.clone(),
            results_per_page: config.results_per_page,
        })
    }

    /// GET an api path and hand back the body as json
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, LocatorError> {
        let url = format!("{}{}", self.api_url, path);
        tracing::debug!(%url, "wigle request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.api_name, Some(&self.api_token))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LocatorError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(LocatorError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;

        if value.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no message")
                .to_string();
            return Err(LocatorError::Service(message));
        }

        Ok(value)
    }

    async fn resolve(&self, location: &str) -> Result<Coordinates, LocatorError> {
        if let Some(coords) = parse_coordinates(location) {
            return Ok(coords);
        }

        tracing::info!("Geocoding '{}'", location);
        let value = self
            .get_json("/api/v2/network/geocode", &[("addresscode", location.to_string())])
            .await?;
        let geocode: GeocodeResponse = serde_json::from_value(value)?;

        geocode
            .results
            .first()
            .map(|r| Coordinates { lat: r.lat, lon: r.lon })
            .ok_or_else(|| LocatorError::LocationNotFound(location.to_string()))
    }
}

impl NetworkLocator for WigleLocator {
    async fn fetch(&self, location: &str, radius_m: u32) -> Result<ObservationSet, LocatorError> {
        let center = self.resolve(location).await?;
        let bbox = BoundingBox::around(center, radius_m);
        tracing::info!(
            lat = center.lat,
            lon = center.lon,
            radius_m,
            "Searching wigle for networks"
        );

        let value = self
            .get_json(
                "/api/v2/network/search",
                &[
                    ("latrange1", bbox.lat_min.to_string()),
                    ("latrange2", bbox.lat_max.to_string()),
                    ("longrange1", bbox.lon_min.to_string()),
                    ("longrange2", bbox.lon_max.to_string()),
                    ("resultsPerPage", self.results_per_page.to_string()),
                ],
            )
            .await?;

        let set: ObservationSet = serde_json::from_value(value)?;
        tracing::info!(
            returned = set.len(),
            total = ?set.total_results,
            "Wigle search complete"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::format_for_device;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// answer one connection per canned (status, body), in order.
    /// the handle yields each request head the server saw.
    async fn stub_server(
        responses: Vec<(&'static str, String)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut heads = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();

                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }

                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                heads.push(String::from_utf8_lossy(&head).into_owned());
            }
            heads
        });

        (base, handle)
    }

    fn locator_for(base: &str) -> WigleLocator {
        let config = LocatorConfig {
            api_url: base.to_string(),
            api_name: "AIDtest".to_string(),
            api_token: "token".to_string(),
            results_per_page: 8,
            request_timeout_seconds: 5,
            ..LocatorConfig::default()
        };
        WigleLocator::with_builder(&config, reqwest::Client::builder().no_proxy()).unwrap()
    }

    const NYC: &str = "40.7128,-74.0060";

    const SEARCH_PAGE: &str = r#"{"success":true,"totalResults":3,"first":1,"last":3,"resultCount":3,
        "searchAfter":"1718","results":[
            {"trilat":40.7128,"trilong":-74.006,"ssid":"CoffeeShop","qos":0,"transid":"20230101-00000",
             "firsttime":"2023-01-01T00:00:00.000Z","lasttime":"2023-06-01T00:00:00.000Z",
             "netid":"0A:1B:2C:3D:4E:5F","name":null,"type":"infra","comment":null,"wep":"2",
             "channel":6,"encryption":"wpa2","country":"US","region":"NY","city":"New York"},
            {"trilat":40.7129,"trilong":-74.0061,"ssid":"","qos":0,"netid":"1A:2B:3C:4D:5E:6F",
             "type":"infra","wep":"f","channel":null,"encryption":"none"},
            {"trilat":40.7130,"trilong":-74.0062,"ssid":"BadChannel","netid":"2A:3B:4C:5D:6E:7F",
             "type":"infra","channel":"11"}
        ]}"#;

    async fn fetch_with(status: &'static str, body: &str) -> Result<ObservationSet, LocatorError> {
        let (base, server) = stub_server(vec![(status, body.to_string())]).await;
        let result = locator_for(&base).fetch(NYC, 500).await;
        server.await.unwrap();
        result
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let result = fetch_with("401 Unauthorized", r#"{"success":false}"#).await;
        assert!(matches!(result, Err(LocatorError::Unauthorized(401))));

        let result = fetch_with("403 Forbidden", "{}").await;
        assert!(matches!(result, Err(LocatorError::Unauthorized(403))));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let result = fetch_with("500 Internal Server Error", "{}").await;
        assert!(matches!(result, Err(LocatorError::Status(500))));
    }

    #[tokio::test]
    async fn test_service_reported_failure() {
        let body = r#"{"success":false,"message":"too many queries"}"#;
        let result = fetch_with("200 OK", body).await;
        match result {
            Err(LocatorError::Service(message)) => assert_eq!(message, "too many queries"),
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let result = fetch_with("200 OK", "<html>maintenance</html>").await;
        assert!(matches!(result, Err(LocatorError::Decode(_))));
    }

    #[tokio::test]
    async fn test_search_page_decodes() {
        let (base, server) = stub_server(vec![("200 OK", SEARCH_PAGE.to_string())]).await;
        let set = locator_for(&base).fetch(NYC, 500).await.unwrap();
        let heads = server.await.unwrap();

        let request = heads[0].to_ascii_lowercase();
        assert!(request.starts_with("get /api/v2/network/search?"));
        assert!(request.contains("latrange1="));
        assert!(request.contains("longrange2="));
        assert!(request.contains("resultsperpage=8"));
        assert!(request.contains("authorization: basic "));

        // the mistyped channel record is dropped, the rest survive
        assert_eq!(set.total_results, Some(3));
        assert_eq!(set.len(), 2);
        let records = set.results.as_ref().unwrap();
        assert_eq!(records[0].kind.as_deref(), Some("infra"));
        assert_eq!(records[0].channel, Some(6));
        assert_eq!(records[1].channel, None);
        assert!(records[0].extra.contains_key("encryption"));

        // wigle search results carry no rssi, so nothing is broadcastable
        let payload = format_for_device(&set).unwrap();
        assert_eq!(payload.to_json().unwrap(), r#"{"results":[]}"#);
    }

    #[tokio::test]
    async fn test_address_is_geocoded_first() {
        let geocode = r#"{"success":true,"results":[{"lat":40.758,"lon":-73.9855}]}"#;
        let (base, server) = stub_server(vec![
            ("200 OK", geocode.to_string()),
            ("200 OK", SEARCH_PAGE.to_string()),
        ])
        .await;

        let set = locator_for(&base).fetch("Times Square", 200).await.unwrap();
        let heads = server.await.unwrap();

        assert_eq!(set.len(), 2);
        assert!(heads[0].starts_with("GET /api/v2/network/geocode?addresscode=Times"));
        assert!(heads[1].starts_with("GET /api/v2/network/search?"));
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let (base, server) =
            stub_server(vec![("200 OK", r#"{"success":true,"results":[]}"#.to_string())]).await;

        let result = locator_for(&base).fetch("Nowhere In Particular", 200).await;
        server.await.unwrap();

        assert!(matches!(result, Err(LocatorError::LocationNotFound(_))));
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(
            parse_coordinates("40.7128,-74.0060"),
            Some(Coordinates { lat: 40.7128, lon: -74.0060 })
        );
        assert_eq!(
            parse_coordinates(" 51.5 , -0.12 "),
            Some(Coordinates { lat: 51.5, lon: -0.12 })
        );
    }

    #[test]
    fn test_addresses_are_not_coordinates() {
        assert_eq!(parse_coordinates("Times Square, New York"), None);
        assert_eq!(parse_coordinates("40.7128"), None);
        assert_eq!(parse_coordinates("91.0,10.0"), None);
        assert_eq!(parse_coordinates("10.0,181.0"), None);
    }

    #[test]
    fn test_bounding_box_at_equator() {
        let bbox = BoundingBox::around(Coordinates { lat: 0.0, lon: 0.0 }, 111_320);
        assert!((bbox.lat_max - 1.0).abs() < 1e-9);
        assert!((bbox.lat_min + 1.0).abs() < 1e-9);
        assert!((bbox.lon_max - 1.0).abs() < 1e-9);
        assert!((bbox.lon_min + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_widens_with_latitude() {
        let bbox = BoundingBox::around(Coordinates { lat: 60.0, lon: 10.0 }, 500);
        let lat_span = bbox.lat_max - bbox.lat_min;
        let lon_span = bbox.lon_max - bbox.lon_min;
        // cos(60°) = 0.5
        assert!((lon_span / lat_span - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box_is_clamped() {
        let bbox = BoundingBox::around(Coordinates { lat: 89.99, lon: 179.99 }, 50_000);
        assert!(bbox.lat_max <= 90.0);
        assert!(bbox.lon_max <= 180.0);
        assert!(bbox.lon_min >= -180.0);
    }

    #[test]
    fn test_requires_credentials() {
        let config = LocatorConfig::default();
        assert!(matches!(
            WigleLocator::new(&config),
            Err(LocatorError::MissingCredentials)
        ));

        let config = LocatorConfig {
            api_name: "AIDxxxx".to_string(),
            ..LocatorConfig::default()
        };
        assert!(matches!(
            WigleLocator::new(&config),
            Err(LocatorError::MissingCredentials)
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = LocatorConfig {
            api_url: "https://api.wigle.net/".to_string(),
            api_name: "name".to_string(),
            api_token: "token".to_string(),
            ..LocatorConfig::default()
        };
        let locator = WigleLocator::new(&config).unwrap();
        assert_eq!(locator.api_url, "https://api.wigle.net");
    }

    #[test]
    fn test_geocode_response_shape() {
        let raw = r#"{"success":true,"results":[{"address":{"city":"New York"},"lat":40.758,"lon":-73.9855,"importance":0.9}]}"#;
        let geocode: GeocodeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(geocode.results.len(), 1);
        assert!((geocode.results[0].lat - 40.758).abs() < 1e-9);
    }
}
