//! Offline [`ResourceSource`] answering queries from an exported Bundle.

use async_trait::async_trait;
use chart_core::FetchError;
use serde_json::Value;

use crate::decode::{array, str_at};
use crate::source::{bundle_resources, ResourceSource, SearchParams};

/// Fields tried, in order, when sorting by `date`.
const DATE_FIELDS: [&[&str]; 9] = [
    &["effectiveDateTime"],
    &["effectivePeriod", "start"],
    &["issued"],
    &["period", "start"],
    &["date"],
    &["authoredOn"],
    &["recordedDate"],
    &["onsetDateTime"],
    &["meta", "lastUpdated"],
];

/// In-memory source over the resources of one Bundle (e.g. a Synthea or
/// `$everything` export).
///
/// Supports the subset of search semantics the chart queries use:
/// `patient`/`subject`, `status`, `clinical-status`, `category`,
/// `_sort=-date` and `_count`. Other parameters are ignored.
#[derive(Debug, Clone, Default)]
pub struct BundleSource {
    resources: Vec<Value>,
}

impl BundleSource {
    pub fn from_bundle(bundle: Value) -> Result<Self, FetchError> {
        Ok(Self {
            resources: bundle_resources("Bundle", bundle)?,
        })
    }

    pub fn from_bundle_str(bundle_json: &str) -> Result<Self, FetchError> {
        let bundle: Value = serde_json::from_str(bundle_json)
            .map_err(|err| FetchError::envelope("Bundle", format!("body is not JSON: {err}")))?;
        Self::from_bundle(bundle)
    }

    pub fn resources(&self) -> &[Value] {
        &self.resources
    }

    /// Id of the first Patient in the bundle.
    pub fn first_patient_id(&self) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| str_at(r, &["resourceType"]) == Some("Patient"))
            .and_then(|r| str_at(r, &["id"]))
    }

    fn matches(resource: &Value, resource_type: &str, params: &SearchParams) -> bool {
        if str_at(resource, &["resourceType"]) != Some(resource_type) {
            return false;
        }

        params.pairs().iter().all(|(key, value)| match key.as_str() {
            "patient" | "subject" => references_subject(resource, value),
            "status" => str_at(resource, &["status"]) == Some(value.as_str()),
            "clinical-status" => has_code(array(resource, &["clinicalStatus", "coding"]), value),
            "category" => array(resource, &["category"])
                .iter()
                .any(|category| has_code(array(category, &["coding"]), value)),
            _ => true,
        })
    }
}

#[async_trait]
impl ResourceSource for BundleSource {
    async fn search(
        &self,
        resource_type: &str,
        params: &SearchParams,
    ) -> Result<Vec<Value>, FetchError> {
        let mut found: Vec<Value> = self
            .resources
            .iter()
            .filter(|resource| Self::matches(resource, resource_type, params))
            .cloned()
            .collect();

        if params.get("_sort") == Some("-date") {
            // Stable, so undated resources keep bundle order at the end.
            found.sort_by(|a, b| resource_date(b).cmp(&resource_date(a)));
        }

        if let Some(count) = params.get("_count").and_then(|c| c.parse::<usize>().ok()) {
            found.truncate(count);
        }

        Ok(found)
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Value, FetchError> {
        self.resources
            .iter()
            .find(|r| {
                str_at(r, &["resourceType"]) == Some(resource_type) && str_at(r, &["id"]) == Some(id)
            })
            .cloned()
            .ok_or_else(|| FetchError::Status {
                resource_type: resource_type.to_string(),
                status: 404,
                body: format!("{resource_type}/{id} is not in the bundle"),
            })
    }
}

/// True when the resource's `subject` or `patient` reference points at `id`,
/// either as `Patient/<id>` or as `urn:uuid:<id>`.
fn references_subject(resource: &Value, id: &str) -> bool {
    ["subject", "patient"].into_iter().any(|field| {
        str_at(resource, &[field, "reference"])
            .and_then(|reference| reference.rsplit(['/', ':']).next())
            .is_some_and(|tail| tail == id)
    })
}

fn has_code(codings: &[Value], code: &str) -> bool {
    codings
        .iter()
        .any(|coding| str_at(coding, &["code"]) == Some(code))
}

fn resource_date(resource: &Value) -> Option<&str> {
    DATE_FIELDS
        .iter()
        .find_map(|path| str_at(resource, path))
}
