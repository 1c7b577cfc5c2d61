use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ChartError;

/// Public HAPI R4 sandbox.
pub const DEFAULT_BASE_URL: &str = "https://hapi.fhir.org/baseR4";
/// Media type requested from the FHIR server.
pub const DEFAULT_ACCEPT: &str = "application/fhir+json";

/// Connection settings and query bounds for one FHIR source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChartConfig {
    pub base_url: String,
    pub accept: String,
    /// Per-request timeout, seconds.
    pub request_timeout_secs: u64,
    /// Deadline for assembling a whole chart, seconds.
    pub aggregate_timeout_secs: u64,
    pub page_sizes: PageSizes,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            request_timeout_secs: 30,
            aggregate_timeout_secs: 60,
            page_sizes: PageSizes::default(),
        }
    }
}

impl ChartConfig {
    /// Configuration pointing at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Base URL without trailing slashes.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        let base = self.base();
        if base.trim().is_empty() {
            return Err(ChartError::Config("base_url cannot be empty".into()));
        }

        let parsed = url::Url::parse(base)
            .map_err(|err| ChartError::Config(format!("invalid base_url '{base}': {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ChartError::Config(format!(
                "base_url must use http or https, got: {}",
                parsed.scheme()
            )));
        }

        if self.accept.trim().is_empty() {
            return Err(ChartError::Config("accept media type cannot be empty".into()));
        }
        if self.request_timeout_secs == 0 || self.aggregate_timeout_secs == 0 {
            return Err(ChartError::Config("timeouts must be at least one second".into()));
        }

        Ok(())
    }
}

/// `_count` sent with each bounded search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PageSizes {
    pub encounters: u32,
    pub vitals: u32,
    pub labs: u32,
    pub imaging: u32,
    pub notes: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            encounters: 1,
            vitals: 20,
            labs: 50,
            imaging: 5,
            notes: 5,
        }
    }
}
