//! Normalized clinical chart model shared by the fetch layer and the report formatter.

use serde::{Deserialize, Serialize};

mod config;
mod error;
mod format;

pub use config::{ChartConfig, PageSizes, DEFAULT_ACCEPT, DEFAULT_BASE_URL};
pub use error::{ChartError, FetchError};
pub use format::format_chart;

/// Placeholder used for demographic and location fields the source left empty.
pub const UNKNOWN: &str = "Unknown";
/// Sole allergy entry when the source lists none.
pub const NO_ALLERGIES: &str = "No allergies listed";
/// Medication label when an order carries no readable name.
pub const UNKNOWN_MEDICATION: &str = "Unknown medication";
/// Findings text for a diagnostic report without a conclusion.
pub const NO_CONCLUSION: &str = "No conclusion provided";
/// Note heading when a document has no type text.
pub const CLINICAL_NOTE: &str = "Clinical Note";
/// Category code that routes a medication order to the home list.
pub const HOME_CATEGORY_CODE: &str = "community";

/// Patient demographics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub name: String,
    /// First listed identifier value (MRN-equivalent).
    pub identifier: String,
    pub birth_date: String,
    pub sex: String,
}

impl Default for PatientSummary {
    fn default() -> Self {
        Self {
            name: String::new(),
            identifier: String::new(),
            birth_date: UNKNOWN.to_string(),
            sex: UNKNOWN.to_string(),
        }
    }
}

/// Most recent encounter, or the all-unknown default when none exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncounterSummary {
    pub location: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
}

impl Default for EncounterSummary {
    fn default() -> Self {
        Self {
            location: UNKNOWN.to_string(),
            reason: String::new(),
            encounter_id: None,
        }
    }
}

/// Allergy display strings. Never empty: an empty input becomes the
/// single [`NO_ALLERGIES`] entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Allergies(Vec<String>);

impl Allergies {
    pub fn new(entries: Vec<String>) -> Self {
        if entries.is_empty() {
            Self(vec![NO_ALLERGIES.to_string()])
        } else {
            Self(entries)
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// True when the list holds only the "no allergies" sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.0.len() == 1 && self.0[0] == NO_ALLERGIES
    }
}

impl Default for Allergies {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<String>> for Allergies {
    fn from(entries: Vec<String>) -> Self {
        Self::new(entries)
    }
}

impl From<Allergies> for Vec<String> {
    fn from(allergies: Allergies) -> Self {
        allergies.0
    }
}

/// Where a medication order belongs in the report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MedicationCategory {
    Home,
    Inpatient,
}

impl MedicationCategory {
    /// Only an exact `community` code is a home medication; anything else,
    /// including no code at all, is an inpatient order.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(HOME_CATEGORY_CODE) => Self::Home,
            _ => Self::Inpatient,
        }
    }
}

/// Active medication orders split into home and inpatient lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medications {
    pub home: Vec<String>,
    pub inpatient: Vec<String>,
}

impl Medications {
    /// Append one order to exactly one of the two lists.
    pub fn push(&mut self, category: MedicationCategory, label: String) {
        match category {
            MedicationCategory::Home => self.home.push(label),
            MedicationCategory::Inpatient => self.inpatient.push(label),
        }
    }

    pub fn len(&self) -> usize {
        self.home.len() + self.inpatient.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(MedicationCategory, String)> for Medications {
    fn from_iter<I: IntoIterator<Item = (MedicationCategory, String)>>(iter: I) -> Self {
        let mut medications = Self::default();
        for (category, label) in iter {
            medications.push(category, label);
        }
        medications
    }
}

/// One diagnostic / imaging report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagingStudy {
    pub study: String,
    pub status: String,
    pub findings: String,
}

/// One clinical note with its decoded text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicalNote {
    #[serde(rename = "type")]
    pub note_type: String,
    pub text: String,
}

/// Sub-structures produced by the extractors, assembled into a [`Chart`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartParts {
    pub patient: PatientSummary,
    pub encounter: EncounterSummary,
    pub conditions: Vec<String>,
    pub allergies: Allergies,
    pub vitals: Vec<String>,
    pub labs: Vec<String>,
    pub medications: Medications,
    pub imaging: Vec<ImagingStudy>,
    pub notes: Vec<ClinicalNote>,
}

/// Point-in-time snapshot of one subject's record. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chart {
    patient: PatientSummary,
    encounter: EncounterSummary,
    conditions: Vec<String>,
    allergies: Allergies,
    vitals: Vec<String>,
    labs: Vec<String>,
    medications: Medications,
    imaging: Vec<ImagingStudy>,
    notes: Vec<ClinicalNote>,
}

impl Chart {
    pub fn new(parts: ChartParts) -> Self {
        let ChartParts {
            patient,
            encounter,
            conditions,
            allergies,
            vitals,
            labs,
            medications,
            imaging,
            notes,
        } = parts;

        Self {
            patient,
            encounter,
            conditions,
            allergies,
            vitals,
            labs,
            medications,
            imaging,
            notes,
        }
    }

    pub fn patient(&self) -> &PatientSummary {
        &self.patient
    }

    pub fn encounter(&self) -> &EncounterSummary {
        &self.encounter
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn allergies(&self) -> &[String] {
        self.allergies.entries()
    }

    pub fn vitals(&self) -> &[String] {
        &self.vitals
    }

    pub fn labs(&self) -> &[String] {
        &self.labs
    }

    pub fn medications(&self) -> &Medications {
        &self.medications
    }

    pub fn imaging(&self) -> &[ImagingStudy] {
        &self.imaging
    }

    pub fn notes(&self) -> &[ClinicalNote] {
        &self.notes
    }
}

impl From<ChartParts> for Chart {
    fn from(parts: ChartParts) -> Self {
        Self::new(parts)
    }
}
