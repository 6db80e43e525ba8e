use std::fmt;

/// Custom error types for the filament sync service.
///
/// Nothing in the telemetry path is allowed to take the process down, so these
/// errors are mostly produced, logged and dropped at the boundary of the
/// operation that failed. They still carry enough context to make the log
/// line useful.

/// Main error type for filament sync operations.
#[derive(Debug)]
pub enum FilamentSyncError {
    /// Errors related to decoding printer telemetry.
    TelemetryError(TelemetryError),

    /// Errors related to the vendor cloud task API.
    CloudError(CloudError),

    /// Errors related to the inventory deduction endpoint.
    DeductionError(DeductionError),

    /// Configuration and setup errors.
    ConfigError(ConfigError),

    /// Network and connectivity errors.
    NetworkError(NetworkError),
}

/// Errors raised while decoding a telemetry payload.
#[derive(Debug)]
pub enum TelemetryError {
    /// Payload was not valid JSON.
    InvalidJson { reason: String },

    /// Payload did not contain a `print` status object.
    MissingStatus,
}

/// Errors raised while looking up the most recent cloud task.
#[derive(Debug)]
pub enum CloudError {
    /// No bearer token is configured, so the API cannot be queried.
    MissingToken,

    /// The API answered with a non-success status.
    ApiError { status: u16, message: String },

    /// The API answered but listed no tasks for this device.
    NoTasks { device: String },

    /// The response body could not be decoded.
    InvalidResponse { reason: String },
}

/// Errors raised while posting a deduction to the inventory.
#[derive(Debug)]
pub enum DeductionError {
    /// The inventory rejected the deduction.
    Rejected { status: u16, body: String },

    /// The record does not describe a positive usage.
    NonPositiveUsage { grams: f64 },
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors related to network connectivity and communication.
#[derive(Debug)]
pub enum NetworkError {
    /// Generic network request failed.
    RequestFailed { url: String, reason: String },

    /// Network timeout occurred.
    Timeout { url: String, timeout_seconds: u64 },

    /// Broker connection dropped or could not be established.
    BrokerUnavailable { host: String, reason: String },

    /// An HTTP client could not be constructed.
    ClientSetup { reason: String },
}

impl fmt::Display for FilamentSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilamentSyncError::TelemetryError(e) => write!(f, "Telemetry error: {}", e),
            FilamentSyncError::CloudError(e) => write!(f, "Cloud error: {}", e),
            FilamentSyncError::DeductionError(e) => write!(f, "Deduction error: {}", e),
            FilamentSyncError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            FilamentSyncError::NetworkError(e) => write!(f, "Network error: {}", e),
        }
    }
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidJson { reason } => {
                write!(f, "Telemetry payload is not valid JSON: {}", reason)
            }
            TelemetryError::MissingStatus => {
                write!(f, "Telemetry payload has no 'print' status object")
            }
        }
    }
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudError::MissingToken => {
                write!(f, "No cloud token configured, cannot fetch task data")
            }
            CloudError::ApiError { status, message } => {
                write!(f, "Cloud API returned HTTP {}: {}", status, message)
            }
            CloudError::NoTasks { device } => {
                write!(f, "No tasks found for device '{}'", device)
            }
            CloudError::InvalidResponse { reason } => {
                write!(f, "Unexpected cloud API response: {}", reason)
            }
        }
    }
}

impl fmt::Display for DeductionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeductionError::Rejected { status, body } => {
                write!(f, "Inventory rejected deduction (HTTP {}): {}", status, body)
            }
            DeductionError::NonPositiveUsage { grams } => {
                write!(f, "Refusing to deduct non-positive usage of {}g", grams)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::RequestFailed { url, reason } => {
                write!(f, "Network request to '{}' failed: {}", url, reason)
            }
            NetworkError::Timeout {
                url,
                timeout_seconds,
            } => {
                write!(
                    f,
                    "Request to '{}' timed out after {} seconds",
                    url, timeout_seconds
                )
            }
            NetworkError::BrokerUnavailable { host, reason } => {
                write!(f, "MQTT broker '{}' unavailable: {}", host, reason)
            }
            NetworkError::ClientSetup { reason } => {
                write!(f, "Failed to create HTTP client: {}", reason)
            }
        }
    }
}

impl std::error::Error for FilamentSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilamentSyncError::TelemetryError(e) => Some(e),
            FilamentSyncError::CloudError(e) => Some(e),
            FilamentSyncError::DeductionError(e) => Some(e),
            FilamentSyncError::ConfigError(e) => Some(e),
            FilamentSyncError::NetworkError(e) => Some(e),
        }
    }
}

impl std::error::Error for TelemetryError {}
impl std::error::Error for CloudError {}
impl std::error::Error for DeductionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for NetworkError {}

impl From<TelemetryError> for FilamentSyncError {
    fn from(err: TelemetryError) -> Self {
        FilamentSyncError::TelemetryError(err)
    }
}

impl From<CloudError> for FilamentSyncError {
    fn from(err: CloudError) -> Self {
        FilamentSyncError::CloudError(err)
    }
}

impl From<DeductionError> for FilamentSyncError {
    fn from(err: DeductionError) -> Self {
        FilamentSyncError::DeductionError(err)
    }
}

impl From<ConfigError> for FilamentSyncError {
    fn from(err: ConfigError) -> Self {
        FilamentSyncError::ConfigError(err)
    }
}

impl From<NetworkError> for FilamentSyncError {
    fn from(err: NetworkError) -> Self {
        FilamentSyncError::NetworkError(err)
    }
}

/// Classify a reqwest failure into the network error taxonomy.
pub fn network_error(url: &str, err: &reqwest::Error, timeout_seconds: u64) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
            timeout_seconds,
        }
    } else {
        NetworkError::RequestFailed {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn client_setup_failure_surfaces_as_network_error() {
        let err: FilamentSyncError = NetworkError::ClientSetup {
            reason: "no TLS backend".to_string(),
        }
        .into();

        assert!(matches!(
            err,
            FilamentSyncError::NetworkError(NetworkError::ClientSetup { .. })
        ));
        assert_eq!(
            err.to_string(),
            "Network error: Failed to create HTTP client: no TLS backend"
        );
        assert!(err.source().is_some());
    }
}
