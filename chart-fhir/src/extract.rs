//! Per-resource extraction rules.
//!
//! Each function takes raw resources of one type and produces the matching
//! chart section. None of them fail: absent or oddly shaped fields fall back
//! to the chart's documented placeholders.

use base64::{engine::general_purpose::STANDARD, Engine};
use chart_core::{
    Allergies, ClinicalNote, EncounterSummary, ImagingStudy, MedicationCategory, Medications,
    PatientSummary, CLINICAL_NOTE, NO_CONCLUSION, UNKNOWN, UNKNOWN_MEDICATION,
};
use serde_json::Value;
use tracing::debug;

use crate::decode::{array, at, concept_label, non_empty, scalar_text, str_at, str_or, text};

/// Demographics from a Patient resource.
pub fn extract_patient(resource: &Value) -> PatientSummary {
    let name = at(resource, &["name", "0"])
        .map(|name| {
            let given = array(name, &["given"])
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            let family = text(name, &["family"]);
            format!("{given} {family}").trim().to_string()
        })
        .unwrap_or_default();

    PatientSummary {
        name,
        identifier: text(resource, &["identifier", "0", "value"]),
        birth_date: str_or(resource, &["birthDate"], UNKNOWN),
        sex: str_or(resource, &["gender"], UNKNOWN),
    }
}

/// First encounter of a most-recent-first search.
pub fn extract_encounter(resources: &[Value]) -> EncounterSummary {
    let Some(encounter) = resources.first() else {
        return EncounterSummary::default();
    };

    EncounterSummary {
        location: str_or(encounter, &["location", "0", "location", "display"], UNKNOWN),
        reason: text(encounter, &["reasonCode", "0", "text"]),
        encounter_id: str_at(encounter, &["id"]).map(str::to_string),
    }
}

/// Active problem list as `"<text> (<code>)"` or `"<text>"`.
///
/// Conditions without `code.text` are dropped. A condition whose clinical
/// status is coded as something other than `active` is dropped too; one
/// without any clinical status is kept, since the search already asked for
/// active entries only.
pub fn extract_conditions(resources: &[Value]) -> Vec<String> {
    resources
        .iter()
        .filter(|resource| is_active_condition(resource))
        .filter_map(|resource| {
            let label = non_empty(resource, &["code", "text"])?;
            match non_empty(resource, &["code", "coding", "0", "code"]) {
                Some(code) => Some(format!("{label} ({code})")),
                None => Some(label.to_string()),
            }
        })
        .collect()
}

fn is_active_condition(resource: &Value) -> bool {
    let codes: Vec<&str> = array(resource, &["clinicalStatus", "coding"])
        .iter()
        .filter_map(|coding| str_at(coding, &["code"]))
        .collect();
    codes.is_empty() || codes.contains(&"active")
}

/// Allergy labels; never empty.
pub fn extract_allergies(resources: &[Value]) -> Allergies {
    let entries = resources
        .iter()
        .filter_map(|resource| non_empty(resource, &["code", "text"]))
        .map(str::to_string)
        .collect();
    Allergies::new(entries)
}

/// Vital-sign observations rendered one line each.
pub fn extract_vitals(resources: &[Value]) -> Vec<String> {
    resources.iter().map(render_observation).collect()
}

/// Laboratory observations rendered one line each.
pub fn extract_labs(resources: &[Value]) -> Vec<String> {
    resources.iter().map(render_observation).collect()
}

/// `"<name>: <value> <unit>"`, or for panels
/// `"<name>: <component>: <value> <unit> / <component>: <value> <unit>"`.
pub fn render_observation(resource: &Value) -> String {
    let name = concept_label(resource.get("code"));
    let components = array(resource, &["component"]);

    if components.is_empty() {
        return format!("{name}: {}", quantity_text(resource.get("valueQuantity")));
    }

    let parts = components
        .iter()
        .map(|component| {
            let label = str_at(component, &["code", "coding", "0", "display"])
                .map(str::to_string)
                .unwrap_or_else(|| concept_label(component.get("code")));
            format!("{label}: {}", quantity_text(component.get("valueQuantity")))
        })
        .collect::<Vec<_>>();

    format!("{name}: {}", parts.join(" / "))
}

fn quantity_text(quantity: Option<&Value>) -> String {
    let Some(quantity) = quantity else {
        return String::new();
    };
    let value = scalar_text(quantity.get("value"));
    let unit = text(quantity, &["unit"]);
    [value, unit]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Label and list for one medication order.
///
/// The category is the code of the last coding across all category
/// entries, in source order; a coding with no code counts as an empty
/// code. Multiple conflicting codings therefore resolve by position.
pub fn classify_medication(resource: &Value) -> (MedicationCategory, String) {
    let label = str_at(resource, &["medicationCodeableConcept", "text"])
        .or_else(|| str_at(resource, &["medicationReference", "display"]))
        .unwrap_or(UNKNOWN_MEDICATION)
        .to_string();

    let last_code = array(resource, &["category"])
        .iter()
        .flat_map(|category| array(category, &["coding"]))
        .last()
        .map(|coding| str_at(coding, &["code"]).unwrap_or(""));

    (MedicationCategory::from_code(last_code), label)
}

/// Active orders split into home and inpatient lists.
pub fn extract_medications(resources: &[Value]) -> Medications {
    resources.iter().map(classify_medication).collect()
}

/// Diagnostic reports with status carried verbatim.
pub fn extract_imaging(resources: &[Value]) -> Vec<ImagingStudy> {
    resources
        .iter()
        .map(|resource| ImagingStudy {
            study: text(resource, &["code", "text"]),
            status: text(resource, &["status"]),
            findings: str_or(resource, &["conclusion"], NO_CONCLUSION),
        })
        .collect()
}

/// Document references with their inline text.
///
/// Every attachment carrying `data` is decoded in order and the last one
/// that decodes wins.
pub fn extract_notes(resources: &[Value]) -> Vec<ClinicalNote> {
    resources
        .iter()
        .map(|resource| {
            let mut note_text = String::new();
            for content in array(resource, &["content"]) {
                let Some(data) = non_empty(content, &["attachment", "data"]) else {
                    continue;
                };
                match decode_attachment(data) {
                    Some(decoded) => note_text = decoded,
                    None => debug!(
                        id = str_at(resource, &["id"]).unwrap_or("-"),
                        "skipping attachment that is not valid base64"
                    ),
                }
            }

            ClinicalNote {
                note_type: str_or(resource, &["type", "text"], CLINICAL_NOTE),
                text: note_text,
            }
        })
        .collect()
}

/// Decode an attachment payload. Whitespace inside the payload is ignored
/// and invalid UTF-8 is replaced with U+FFFD.
pub fn decode_attachment(data: &str) -> Option<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
