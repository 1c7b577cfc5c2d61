//! FHIR R4 chart aggregation: fetches a patient's resources, normalizes each
//! resource type into its chart section, and assembles a [`chart_core::Chart`].

mod aggregate;
mod bundle;
pub mod decode;
pub mod extract;
mod source;

pub use aggregate::{
    aggregate_chart, ChartAggregator, ALLERGY_INTOLERANCE, CONDITION, DIAGNOSTIC_REPORT,
    DOCUMENT_REFERENCE, ENCOUNTER, MEDICATION_REQUEST, OBSERVATION, PATIENT,
};
pub use bundle::BundleSource;
pub use source::{bundle_resources, expect_resource, FhirClient, ResourceSource, SearchParams};

use chart_core::{format_chart, ChartConfig, ChartError};

/// Aggregate `subject` from `source` and render the report text.
pub async fn chart_text(
    source: &dyn ResourceSource,
    subject: &str,
    config: &ChartConfig,
) -> Result<String, ChartError> {
    let chart = aggregate_chart(source, subject, config).await?;
    Ok(format_chart(&chart))
}
