//! Resource fetching: the [`ResourceSource`] seam and its HTTP implementation.

use async_trait::async_trait;
use chart_core::{ChartConfig, ChartError, FetchError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

/// Ordered search parameters for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    pub fn patient(self, id: &str) -> Self {
        self.param("patient", id)
    }

    pub fn subject(self, id: &str) -> Self {
        self.param("subject", id)
    }

    pub fn status(self, status: &str) -> Self {
        self.param("status", status)
    }

    pub fn clinical_status(self, status: &str) -> Self {
        self.param("clinical-status", status)
    }

    pub fn category(self, category: &str) -> Self {
        self.param("category", category)
    }

    /// Most recent first on `field`.
    pub fn sort_desc(self, field: &str) -> Self {
        self.param("_sort", format!("-{field}"))
    }

    pub fn count(self, count: u32) -> Self {
        self.param("_count", count)
    }

    /// First value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// A place resources can be fetched from.
///
/// One call is one attempt: implementations do not retry and do not follow
/// paging links.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Resources of `resource_type` matching `params`, from the first page.
    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<Value>, FetchError>;

    /// A single resource by id.
    async fn read(&self, resource_type: &str, id: &str) -> Result<Value, FetchError>;
}

/// FHIR REST client over HTTP.
#[derive(Debug, Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FhirClient {
    pub fn new(config: &ChartConfig) -> Result<Self, ChartError> {
        config.validate()?;

        let accept = HeaderValue::from_str(&config.accept)
            .map_err(|err| ChartError::Config(format!("invalid accept header: {err}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, accept);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| ChartError::Config(format!("failed to build HTTP client: {err}")))?;

        let base_url = Url::parse(config.base())
            .map_err(|err| ChartError::Config(format!("invalid base URL: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ChartError::Config(format!(
                "base URL {base_url} cannot take a resource path"
            )));
        }

        info!(base_url = config.base(), "FHIR client ready");

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `segments` appended to the base path, each percent-encoded so an id
    /// can't escape its own segment.
    fn resource_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(
        &self,
        resource_type: &str,
        url: Url,
        query: &[(String, String)],
    ) -> Result<Value, FetchError> {
        debug!(resource_type, url = %url, params = query.len(), "FHIR request");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| transport_error(resource_type, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(resource_type, status = status.as_u16(), "FHIR request rejected");
            return Err(FetchError::Status {
                resource_type: resource_type.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| transport_error(resource_type, err))?;

        serde_json::from_str(&body).map_err(|err| {
            warn!(resource_type, "FHIR response is not JSON");
            FetchError::envelope(resource_type, format!("body is not JSON: {err}"))
        })
    }
}

#[async_trait]
impl ResourceSource for FhirClient {
    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.resource_url(&[resource_type]);
        let bundle = self.get_json(resource_type, url, params.pairs()).await?;
        bundle_resources(resource_type, bundle)
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Value, FetchError> {
        let url = self.resource_url(&[resource_type, id]);
        let resource = self.get_json(resource_type, url, &[]).await?;
        expect_resource(resource_type, resource)
    }
}

fn transport_error(resource_type: &str, err: reqwest::Error) -> FetchError {
    warn!(resource_type, error = %err, "FHIR request failed");
    FetchError::Transport {
        resource_type: resource_type.to_string(),
        message: err.to_string(),
    }
}

/// Resources wrapped by a searchset bundle, in entry order.
///
/// A bundle without `entry` is an empty result. `OperationOutcome` entries
/// (server warnings) are skipped.
pub fn bundle_resources(resource_type: &str, bundle: Value) -> Result<Vec<Value>, FetchError> {
    let Value::Object(mut bundle) = bundle else {
        return Err(FetchError::envelope(resource_type, "bundle is not an object"));
    };

    match bundle.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") => {}
        Some(other) => {
            return Err(FetchError::envelope(
                resource_type,
                format!("expected resourceType Bundle, received {other}"),
            ))
        }
        None => return Err(FetchError::envelope(resource_type, "missing resourceType")),
    }

    let entries = match bundle.remove("entry") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(FetchError::envelope(resource_type, "entry is not an array")),
    };

    let mut resources = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let resource = match entry {
            Value::Object(mut entry) => entry.remove("resource"),
            _ => None,
        };
        let Some(resource @ Value::Object(_)) = resource else {
            return Err(FetchError::envelope(
                resource_type,
                format!("entry {index} has no resource"),
            ));
        };

        if resource.get("resourceType").and_then(Value::as_str) == Some("OperationOutcome") {
            debug!(resource_type, index, "skipping OperationOutcome entry");
            continue;
        }
        resources.push(resource);
    }

    Ok(resources)
}

/// Check that a directly read resource is of the requested type.
pub fn expect_resource(resource_type: &str, resource: Value) -> Result<Value, FetchError> {
    match resource.get("resourceType").and_then(Value::as_str) {
        Some(actual) if actual == resource_type => Ok(resource),
        Some(actual) => Err(FetchError::envelope(
            resource_type,
            format!("expected resourceType {resource_type}, received {actual}"),
        )),
        None => Err(FetchError::envelope(resource_type, "missing resourceType")),
    }
}
