/// Transport or protocol failure while fetching one resource type.
///
/// Missing fields inside a successfully fetched resource never produce this
/// error; they resolve to defaults during extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{resource_type} request failed with HTTP {status}: {body}")]
    Status {
        resource_type: String,
        status: u16,
        body: String,
    },
    #[error("{resource_type} request could not complete: {message}")]
    Transport {
        resource_type: String,
        message: String,
    },
    #[error("{resource_type} response is not a valid envelope: {reason}")]
    Envelope {
        resource_type: String,
        reason: String,
    },
}

impl FetchError {
    /// Resource type whose fetch failed.
    pub fn resource_type(&self) -> &str {
        match self {
            Self::Status { resource_type, .. }
            | Self::Transport { resource_type, .. }
            | Self::Envelope { resource_type, .. } => resource_type,
        }
    }

    pub fn envelope(resource_type: &str, reason: impl Into<String>) -> Self {
        Self::Envelope {
            resource_type: resource_type.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a whole chart aggregation.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("chart aggregation did not finish within {seconds}s")]
    Timeout { seconds: u64 },
    #[error("invalid configuration: {0}")]
    Config(String),
}
