//! Chart assembly: nine independent fetches joined into one [`Chart`].

use std::sync::Arc;
use std::time::Instant;

use chart_core::{
    Allergies, Chart, ChartConfig, ChartError, ChartParts, ClinicalNote, EncounterSummary,
    FetchError, ImagingStudy, Medications, PageSizes, PatientSummary,
};
use tracing::info;

use crate::extract::{
    extract_allergies, extract_conditions, extract_encounter, extract_imaging, extract_labs,
    extract_medications, extract_notes, extract_patient, extract_vitals,
};
use crate::source::{FhirClient, ResourceSource, SearchParams};

pub const PATIENT: &str = "Patient";
pub const ENCOUNTER: &str = "Encounter";
pub const CONDITION: &str = "Condition";
pub const ALLERGY_INTOLERANCE: &str = "AllergyIntolerance";
pub const OBSERVATION: &str = "Observation";
pub const MEDICATION_REQUEST: &str = "MedicationRequest";
pub const DIAGNOSTIC_REPORT: &str = "DiagnosticReport";
pub const DOCUMENT_REFERENCE: &str = "DocumentReference";

/// Builds charts from one configured source.
#[derive(Clone)]
pub struct ChartAggregator {
    source: Arc<dyn ResourceSource>,
    config: ChartConfig,
}

impl ChartAggregator {
    pub fn new(source: Arc<dyn ResourceSource>, config: ChartConfig) -> Self {
        Self { source, config }
    }

    /// Aggregator backed by a [`FhirClient`] for `config.base_url`.
    pub fn connect(config: ChartConfig) -> Result<Self, ChartError> {
        let client = FhirClient::new(&config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub async fn aggregate(&self, subject: &str) -> Result<Chart, ChartError> {
        aggregate_chart(self.source.as_ref(), subject, &self.config).await
    }
}

/// Fetch every section for `subject` concurrently and assemble the chart.
///
/// Any fetch failure aborts the whole chart; the remaining fetches are
/// dropped. The whole call is bounded by `config.aggregate_timeout()`.
#[tracing::instrument(skip(source, config))]
pub async fn aggregate_chart(
    source: &dyn ResourceSource,
    subject: &str,
    config: &ChartConfig,
) -> Result<Chart, ChartError> {
    let started = Instant::now();

    let parts = tokio::time::timeout(
        config.aggregate_timeout(),
        collect_parts(source, subject, &config.page_sizes),
    )
    .await
    .map_err(|_| ChartError::Timeout {
        seconds: config.aggregate_timeout_secs,
    })??;

    let chart = Chart::new(parts);
    info!(
        conditions = chart.conditions().len(),
        vitals = chart.vitals().len(),
        labs = chart.labs().len(),
        medications = chart.medications().len(),
        imaging = chart.imaging().len(),
        notes = chart.notes().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "chart assembled"
    );

    Ok(chart)
}

async fn collect_parts(
    source: &dyn ResourceSource,
    subject: &str,
    pages: &PageSizes,
) -> Result<ChartParts, FetchError> {
    let (patient, encounter, conditions, allergies, vitals, labs, medications, imaging, notes) = tokio::try_join!(
        load_patient(source, subject),
        load_encounter(source, subject, pages),
        load_conditions(source, subject),
        load_allergies(source, subject),
        load_vitals(source, subject, pages),
        load_labs(source, subject, pages),
        load_medications(source, subject),
        load_imaging(source, subject, pages),
        load_notes(source, subject, pages),
    )?;

    Ok(ChartParts {
        patient,
        encounter,
        conditions,
        allergies,
        vitals,
        labs,
        medications,
        imaging,
        notes,
    })
}

async fn load_patient(
    source: &dyn ResourceSource,
    subject: &str,
) -> Result<PatientSummary, FetchError> {
    let resource = source.read(PATIENT, subject).await?;
    Ok(extract_patient(&resource))
}

async fn load_encounter(
    source: &dyn ResourceSource,
    subject: &str,
    pages: &PageSizes,
) -> Result<EncounterSummary, FetchError> {
    let params = SearchParams::new()
        .patient(subject)
        .sort_desc("date")
        .count(pages.encounters);
    let resources = source.search(ENCOUNTER, &params).await?;
    Ok(extract_encounter(&resources))
}

async fn load_conditions(
    source: &dyn ResourceSource,
    subject: &str,
) -> Result<Vec<String>, FetchError> {
    let params = SearchParams::new()
        .patient(subject)
        .clinical_status("active");
    let resources = source.search(CONDITION, &params).await?;
    Ok(extract_conditions(&resources))
}

async fn load_allergies(
    source: &dyn ResourceSource,
    subject: &str,
) -> Result<Allergies, FetchError> {
    let params = SearchParams::new().patient(subject);
    let resources = source.search(ALLERGY_INTOLERANCE, &params).await?;
    Ok(extract_allergies(&resources))
}

async fn load_vitals(
    source: &dyn ResourceSource,
    subject: &str,
    pages: &PageSizes,
) -> Result<Vec<String>, FetchError> {
    let params = SearchParams::new()
        .patient(subject)
        .category("vital-signs")
        .sort_desc("date")
        .count(pages.vitals);
    let resources = source.search(OBSERVATION, &params).await?;
    Ok(extract_vitals(&resources))
}

async fn load_labs(
    source: &dyn ResourceSource,
    subject: &str,
    pages: &PageSizes,
) -> Result<Vec<String>, FetchError> {
    let params = SearchParams::new()
        .patient(subject)
        .category("laboratory")
        .sort_desc("date")
        .count(pages.labs);
    let resources = source.search(OBSERVATION, &params).await?;
    Ok(extract_labs(&resources))
}

async fn load_medications(
    source: &dyn ResourceSource,
    subject: &str,
) -> Result<Medications, FetchError> {
    let params = SearchParams::new().patient(subject).status("active");
    let resources = source.search(MEDICATION_REQUEST, &params).await?;
    Ok(extract_medications(&resources))
}

async fn load_imaging(
    source: &dyn ResourceSource,
    subject: &str,
    pages: &PageSizes,
) -> Result<Vec<ImagingStudy>, FetchError> {
    let params = SearchParams::new()
        .patient(subject)
        .sort_desc("date")
        .count(pages.imaging);
    let resources = source.search(DIAGNOSTIC_REPORT, &params).await?;
    Ok(extract_imaging(&resources))
}

async fn load_notes(
    source: &dyn ResourceSource,
    subject: &str,
    pages: &PageSizes,
) -> Result<Vec<ClinicalNote>, FetchError> {
    let params = SearchParams::new()
        .patient(subject)
        .sort_desc("date")
        .count(pages.notes);
    let resources = source.search(DOCUMENT_REFERENCE, &params).await?;
    Ok(extract_notes(&resources))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    /// Canned responses keyed by resource type (plus category for observations).
    #[derive(Default)]
    struct CannedSource {
        searches: HashMap<String, Vec<Value>>,
        failing: Option<&'static str>,
        delay: Option<Duration>,
        seen: Mutex<Vec<(String, SearchParams)>>,
    }

    fn key(resource_type: &str, params: &SearchParams) -> String {
        match params.get("category") {
            Some(category) => format!("{resource_type}:{category}"),
            None => resource_type.to_string(),
        }
    }

    #[async_trait]
    impl ResourceSource for CannedSource {
        async fn search(
            &self,
            resource_type: &str,
            params: &SearchParams,
        ) -> Result<Vec<Value>, FetchError> {
            self.seen
                .lock()
                .unwrap()
                .push((resource_type.to_string(), params.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing == Some(resource_type) {
                return Err(FetchError::Status {
                    resource_type: resource_type.to_string(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(self
                .searches
                .get(&key(resource_type, params))
                .cloned()
                .unwrap_or_default())
        }

        async fn read(&self, resource_type: &str, id: &str) -> Result<Value, FetchError> {
            if self.failing == Some(resource_type) {
                return Err(FetchError::Transport {
                    resource_type: resource_type.to_string(),
                    message: "connection refused".into(),
                });
            }
            Ok(json!({
                "resourceType": "Patient",
                "id": id,
                "name": [{"given": ["Ada"], "family": "Lovelace"}]
            }))
        }
    }

    #[tokio::test]
    async fn sparse_source_yields_defaults() {
        let source = CannedSource::default();
        let chart = aggregate_chart(&source, "p1", &ChartConfig::default())
            .await
            .unwrap();

        assert_eq!(chart.patient().name, "Ada Lovelace");
        assert_eq!(chart.patient().birth_date, "Unknown");
        assert_eq!(chart.encounter().location, "Unknown");
        assert_eq!(chart.encounter().reason, "");
        assert_eq!(chart.allergies(), ["No allergies listed"]);
        assert!(chart.conditions().is_empty());
        assert!(chart.medications().is_empty());
    }

    #[tokio::test]
    async fn sends_bounded_queries() {
        let source = CannedSource::default();
        aggregate_chart(&source, "p1", &ChartConfig::default())
            .await
            .unwrap();

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen.len(), 8);
        let find = |resource_type: &str, category: Option<&str>| {
            seen.iter()
                .find(|(rt, params)| rt == resource_type && params.get("category") == category)
                .map(|(_, params)| params.clone())
                .unwrap()
        };

        let encounter = find(ENCOUNTER, None);
        assert_eq!(encounter.get("_sort"), Some("-date"));
        assert_eq!(encounter.get("_count"), Some("1"));
        assert_eq!(find(OBSERVATION, Some("vital-signs")).get("_count"), Some("20"));
        assert_eq!(find(OBSERVATION, Some("laboratory")).get("_count"), Some("50"));
        assert_eq!(find(DIAGNOSTIC_REPORT, None).get("_count"), Some("5"));
        assert_eq!(find(DOCUMENT_REFERENCE, None).get("_count"), Some("5"));
        assert_eq!(find(CONDITION, None).get("clinical-status"), Some("active"));
        assert_eq!(find(MEDICATION_REQUEST, None).get("status"), Some("active"));
        assert!(seen.iter().all(|(_, params)| params.get("patient") == Some("p1")));
    }

    #[tokio::test]
    async fn one_failed_fetch_fails_the_chart() {
        let mut searches = HashMap::new();
        searches.insert(
            CONDITION.to_string(),
            vec![json!({"code": {"text": "Hypertension"}})],
        );
        let source = CannedSource {
            searches,
            failing: Some(DIAGNOSTIC_REPORT),
            ..CannedSource::default()
        };

        let err = aggregate_chart(&source, "p1", &ChartConfig::default())
            .await
            .unwrap_err();
        match err {
            ChartError::Fetch(fetch) => assert_eq!(fetch.resource_type(), DIAGNOSTIC_REPORT),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn patient_read_failure_is_fetch_error() {
        let source = CannedSource {
            failing: Some(PATIENT),
            ..CannedSource::default()
        };
        let err = aggregate_chart(&source, "p1", &ChartConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChartError::Fetch(FetchError::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_hits_deadline() {
        let started = tokio::time::Instant::now();
        let source = CannedSource {
            delay: Some(Duration::from_secs(5)),
            ..CannedSource::default()
        };
        let config = ChartConfig {
            aggregate_timeout_secs: 1,
            ..ChartConfig::default()
        };

        let err = aggregate_chart(&source, "p1", &config).await.unwrap_err();
        assert!(matches!(err, ChartError::Timeout { seconds: 1 }));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn aggregator_wraps_shared_source() {
        let mut searches = HashMap::new();
        searches.insert(
            format!("{OBSERVATION}:vital-signs"),
            vec![json!({"code": {"text": "Heart rate"}, "valueQuantity": {"value": 112, "unit": "bpm"}})],
        );
        let aggregator = ChartAggregator::new(
            Arc::new(CannedSource {
                searches,
                ..CannedSource::default()
            }),
            ChartConfig::default(),
        );

        let chart = aggregator.aggregate("p1").await.unwrap();
        assert_eq!(chart.vitals(), ["Heart rate: 112 bpm"]);
        assert!(chart.labs().is_empty());
    }
}
