//! Plain-text chart report.

use crate::Chart;

const BULLET: &str = "  • ";

/// Render a chart into the sectioned report text.
///
/// Pure and total: list entries keep their stored order, nothing is
/// truncated or deduplicated, and there is no trailing newline.
pub fn format_chart(chart: &Chart) -> String {
    let mut lines: Vec<String> = Vec::new();

    let patient = chart.patient();
    let encounter = chart.encounter();
    lines.push(heading("PATIENT"));
    lines.push(format!("Name: {}", patient.name));
    lines.push(format!("MRN: {}", patient.identifier));
    lines.push(format!("DOB: {}  |  Sex: {}", patient.birth_date, patient.sex));
    lines.push(format!("Location: {}", encounter.location));
    lines.push(format!("Reason for Visit: {}", encounter.reason));

    lines.push(String::new());
    lines.push(format!("Allergies: {}", chart.allergies().join(", ")));

    push_list(&mut lines, "PROBLEM LIST", chart.conditions());
    push_list(&mut lines, "VITALS", chart.vitals());
    push_list(&mut lines, "LABS", chart.labs());
    push_list(&mut lines, "HOME MEDICATIONS", &chart.medications().home);
    push_list(&mut lines, "CURRENT ORDERS", &chart.medications().inpatient);

    lines.push(String::new());
    lines.push(heading("IMAGING"));
    for study in chart.imaging() {
        lines.push(format!("  [{}] {}", study.status.to_uppercase(), study.study));
        lines.push(format!("  {}", study.findings));
    }

    lines.push(String::new());
    lines.push(heading("CLINICAL NOTES"));
    for note in chart.notes() {
        lines.push(format!("--- {} ---", note.note_type));
        lines.push(note.text.clone());
    }

    lines.join("\n")
}

fn heading(title: &str) -> String {
    format!("═══ {title} ═══")
}

fn push_list(lines: &mut Vec<String>, title: &str, entries: &[String]) {
    lines.push(String::new());
    lines.push(heading(title));
    lines.extend(entries.iter().map(|entry| format!("{BULLET}{entry}")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Allergies, ChartParts, ClinicalNote, EncounterSummary, ImagingStudy, Medications,
        PatientSummary,
    };

    fn sample_parts() -> ChartParts {
        ChartParts {
            patient: PatientSummary {
                name: "Harold Whitaker".into(),
                identifier: "004593821".into(),
                birth_date: "1957-08-03".into(),
                sex: "male".into(),
            },
            encounter: EncounterSummary {
                location: "ED Room 12".into(),
                reason: "Abdominal pain".into(),
                encounter_id: Some("enc-1".into()),
            },
            conditions: vec!["Hypertension (I10)".into(), "Hyperlipidemia (E78.5)".into()],
            allergies: Allergies::new(vec!["Penicillin".into(), "Latex".into()]),
            vitals: vec!["Heart rate: 112 bpm".into()],
            labs: vec!["Lactate: 4.8 mmol/L".into()],
            medications: Medications {
                home: vec!["Aspirin 81 mg daily".into()],
                inpatient: vec!["Piperacillin-Tazobactam IV".into()],
            },
            imaging: vec![ImagingStudy {
                study: "CT Abdomen/Pelvis".into(),
                status: "preliminary".into(),
                findings: "Free air.".into(),
            }],
            notes: vec![ClinicalNote {
                note_type: "ED Provider Note".into(),
                text: "HPI: pain\nExam: guarding".into(),
            }],
        }
    }

    #[test]
    fn renders_sections_in_fixed_order() {
        let text = format_chart(&Chart::new(sample_parts()));
        let expected = "\
═══ PATIENT ═══
Name: Harold Whitaker
MRN: 004593821
DOB: 1957-08-03  |  Sex: male
Location: ED Room 12
Reason for Visit: Abdominal pain

Allergies: Penicillin, Latex

═══ PROBLEM LIST ═══
  • Hypertension (I10)
  • Hyperlipidemia (E78.5)

═══ VITALS ═══
  • Heart rate: 112 bpm

═══ LABS ═══
  • Lactate: 4.8 mmol/L

═══ HOME MEDICATIONS ═══
  • Aspirin 81 mg daily

═══ CURRENT ORDERS ═══
  • Piperacillin-Tazobactam IV

═══ IMAGING ═══
  [PRELIMINARY] CT Abdomen/Pelvis
  Free air.

═══ CLINICAL NOTES ═══
--- ED Provider Note ---
HPI: pain
Exam: guarding";
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_chart_still_has_every_heading() {
        let text = format_chart(&Chart::new(ChartParts::default()));
        assert!(text.contains("DOB: Unknown  |  Sex: Unknown"));
        assert!(text.contains("Location: Unknown"));
        assert!(text.contains("Allergies: No allergies listed"));
        for title in [
            "PATIENT",
            "PROBLEM LIST",
            "VITALS",
            "LABS",
            "HOME MEDICATIONS",
            "CURRENT ORDERS",
            "IMAGING",
            "CLINICAL NOTES",
        ] {
            assert!(text.contains(&heading(title)), "missing {title}");
        }
        assert!(text.ends_with(&heading("CLINICAL NOTES")));
    }

    #[test]
    fn formatting_is_repeatable() {
        let chart = Chart::new(sample_parts());
        assert_eq!(format_chart(&chart), format_chart(&chart));
    }

    #[test]
    fn list_order_follows_chart_order() {
        let mut parts = sample_parts();
        parts.vitals = vec!["A: 1".into(), "B: 2".into(), "C: 3".into()];
        let forward = format_chart(&Chart::new(parts.clone()));

        parts.vitals.reverse();
        parts.conditions.reverse();
        let reversed = format_chart(&Chart::new(parts));

        let position = |text: &str, needle: &str| text.find(needle).unwrap();
        assert!(position(&forward, "  • A: 1") < position(&forward, "  • C: 3"));
        assert!(position(&reversed, "  • C: 3") < position(&reversed, "  • A: 1"));
        assert!(
            position(&reversed, "Hyperlipidemia (E78.5)") < position(&reversed, "Hypertension (I10)")
        );
    }

    #[test]
    fn reordering_multi_line_sections_moves_whole_blocks() {
        let mut parts = sample_parts();
        parts.labs = vec!["Lactate: 4.8 mmol/L".into(), "WBC: 18.2 10*3/uL".into()];
        parts.imaging = vec![
            ImagingStudy {
                study: "CT Abdomen/Pelvis".into(),
                status: "preliminary".into(),
                findings: "Free air.".into(),
            },
            ImagingStudy {
                study: "XR Chest".into(),
                status: "final".into(),
                findings: "No acute process.".into(),
            },
        ];
        parts.notes = vec![
            ClinicalNote {
                note_type: "ED Provider Note".into(),
                text: "HPI: pain".into(),
            },
            ClinicalNote {
                note_type: "Triage".into(),
                text: "Arrived by EMS".into(),
            },
        ];
        let forward = format_chart(&Chart::new(parts.clone()));

        parts.labs.reverse();
        parts.imaging.reverse();
        parts.notes.reverse();
        let reversed = format_chart(&Chart::new(parts));

        let position = |text: &str, needle: &str| text.find(needle).unwrap();
        for (first, second) in [
            ("  • Lactate", "  • WBC"),
            ("  [PRELIMINARY] CT Abdomen/Pelvis", "  [FINAL] XR Chest"),
            ("--- ED Provider Note ---", "--- Triage ---"),
        ] {
            assert!(position(&forward, first) < position(&forward, second));
            assert!(position(&reversed, second) < position(&reversed, first));
        }

        for text in [&forward, &reversed] {
            assert!(text.contains("  [PRELIMINARY] CT Abdomen/Pelvis\n  Free air."));
            assert!(text.contains("  [FINAL] XR Chest\n  No acute process."));
            assert!(text.contains("--- ED Provider Note ---\nHPI: pain"));
            assert!(text.contains("--- Triage ---\nArrived by EMS"));
        }
        assert!(reversed.contains(
            "═══ IMAGING ═══\n  [FINAL] XR Chest\n  No acute process.\n  [PRELIMINARY] CT Abdomen/Pelvis"
        ));
    }

    #[test]
    fn duplicates_are_kept() {
        let mut parts = sample_parts();
        parts.labs = vec!["Sodium: 134 mEq/L".into(), "Sodium: 134 mEq/L".into()];
        let text = format_chart(&Chart::new(parts));
        assert_eq!(text.matches("  • Sodium: 134 mEq/L").count(), 2);
    }
}
