use thiserror::Error;

/// Failures from the device-facing HTTP client.
///
/// All of these are caught at the call site, logged with the device identity,
/// and converted to an outcome. They never abort a reconciliation pass for
/// other devices.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No route to the device: no address, connection refused, or timeout.
    /// Retryable by the next periodic pass.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device rejected the shared access key (HTTP 403). Indicates a
    /// provisioning mismatch rather than a transient fault.
    #[error("device rejected access key")]
    AuthRejected,

    /// The device answered but the body did not match the expected JSON shape.
    #[error("malformed device response: {0}")]
    MalformedResponse(String),

    /// HTTP-level success carrying a device-reported failure payload.
    #[error("device rejected command: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DeviceError::MalformedResponse(err.to_string())
        } else {
            DeviceError::Unreachable(err.to_string())
        }
    }
}

/// Local validation failures from the light configuration store.
///
/// Surfaced synchronously to the API caller as 400-class responses.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no light configured for {0}")]
    NotFound(String),

    #[error("light already configured for {0}")]
    AlreadyExists(String),

    #[error("brightness {0} out of range (expected 0-255)")]
    OutOfRange(i64),
}

/// Failures from the switcher request/response path. A failed resync leaves
/// the stale tracker state in place.
#[derive(Error, Debug)]
pub enum SwitcherError {
    #[error("switcher connection closed")]
    Disconnected,

    #[error("switcher query failed: {0}")]
    QueryFailed(String),

    #[error("switcher query timed out")]
    Timeout,
}
