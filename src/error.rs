//! Error types for the controller pipeline

/// Locator (fetch stage) failures
///
/// A failed lookup is always an `Err`; an empty-but-successful lookup is
/// an `Ok` with no records.
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    /// Wigle credentials not configured
    #[error("wigle api credentials missing (set api_name/api_token or WIGLE_API_NAME/WIGLE_API_TOKEN)")]
    MissingCredentials,

    /// Location string could not be parsed or geocoded
    #[error("location not found: {0}")]
    LocationNotFound(String),

    /// Service rejected the credentials
    #[error("wigle rejected credentials (http {0})")]
    Unauthorized(u16),

    /// Non-success HTTP status
    #[error("wigle returned http {0}")]
    Status(u16),

    /// Service answered but flagged the request as failed
    #[error("wigle reported failure: {0}")]
    Service(String),

    /// Transport-level HTTP failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected json
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Formatter failures (whole-input only; bad records are skipped, not errors)
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Input has no `results` collection
    #[error("invalid or empty data received (no results)")]
    MissingResults,
}

/// Serial transmission failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No serial backend compiled into this binary
    #[allow(dead_code)]
    #[error("serial transport unavailable: {0}")]
    Unavailable(&'static str),

    /// Endpoint could not be opened
    #[error("could not open '{endpoint}': {source}")]
    Open {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Write (or flush) failed after the endpoint was opened
    #[error("could not write to '{endpoint}': {source}")]
    Write {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Anything else, e.g. the blocking write task panicked
    #[error("unexpected transport failure: {0}")]
    Unexpected(String),
}

/// Why a pipeline run stopped before the device got its payload
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Locator failed outright
    #[error("failed to fetch network data: {0}")]
    Source(#[from] LocatorError),

    /// Locator succeeded but had nothing to send
    #[error("no networks found")]
    NoObservations,

    /// Formatter rejected the input
    #[error("failed to format data: {0}")]
    Format(#[from] FormatError),

    /// Payload could not be serialized
    #[error("failed to serialize payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Device transmitter reported failure (details already logged)
    #[error("failed to send data to the device on {0}")]
    Transmit(String),
}
