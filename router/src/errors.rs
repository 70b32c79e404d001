use thiserror::Error;

/// Result type alias for router operations
pub type Result<T, E = RouterError> = std::result::Result<T, E>;

/// Why a single endpoint attempt did not produce a usable response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("server returned status code {0}")]
    BadStatus(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FailureKind {
    /// Short label used for metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NoEndpoints => "no_endpoints",
            FailureKind::Timeout => "timeout",
            FailureKind::TransportError(_) => "transport_error",
            FailureKind::BadStatus(_) => "bad_status",
            FailureKind::MalformedResponse(_) => "malformed_response",
            FailureKind::Unexpected(_) => "unexpected",
        }
    }
}

/// Errors returned by [`crate::router::FailoverRouter::dispatch`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    /// Every endpoint was tried and failed. Only the last failure is kept.
    #[error("all endpoints are unavailable after {attempts} attempt(s), last error: {last_failure}")]
    AllEndpointsFailed {
        attempts: usize,
        last_endpoint: Option<String>,
        last_failure: FailureKind,
    },
}

impl RouterError {
    pub fn last_failure(&self) -> &FailureKind {
        match self {
            RouterError::AllEndpointsFailed { last_failure, .. } => last_failure,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            RouterError::AllEndpointsFailed { attempts, .. } => *attempts,
        }
    }
}
