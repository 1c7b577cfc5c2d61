use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chart_core::{
    format_chart, Chart, ChartConfig, ClinicalNote, EncounterSummary, ImagingStudy, Medications,
};
use chart_fhir::{BundleSource, ChartAggregator};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "chart",
    about = "Pull a patient's chart from a FHIR server and print the consult report."
)]
struct Args {
    /// FHIR Patient id to aggregate.
    #[arg(short, long, env = "FHIR_PATIENT_ID")]
    patient_id: Option<String>,

    /// FHIR base URL; overrides the saved demo patient's server.
    #[arg(short, long, env = "FHIR_BASE_URL")]
    base_url: Option<String>,

    /// Saved demo patient (`patient_id`, `mrn`, `fhir_base`).
    #[arg(long, default_value = "demo_patient.json")]
    demo_config: PathBuf,

    /// JSON file with connection settings and page sizes.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read resources from an exported Bundle instead of a server.
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Overall deadline in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Print `{ "chart", "chart_text" }` instead of the report.
    #[arg(long)]
    json: bool,
}

/// Patient saved by the demo data loader.
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct DemoPatient {
    patient_id: String,
    #[serde(default)]
    mrn: Option<String>,
    #[serde(default)]
    fhir_base: Option<String>,
}

impl DemoPatient {
    fn from_json(data: &str) -> anyhow::Result<Self> {
        let patient: Self = serde_json::from_str(data).context("demo patient file is not valid")?;
        if patient.patient_id.trim().is_empty() {
            bail!("demo patient file has an empty patient_id");
        }
        Ok(patient)
    }

    fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {:?}", path))?;
        Self::from_json(&data).map(Some)
    }
}

/// Case document consumed by the web viewer.
#[derive(Serialize)]
struct CaseDocument<'a> {
    chart: CaseChart<'a>,
    chart_text: String,
}

impl<'a> CaseDocument<'a> {
    fn new(chart: &'a Chart) -> Self {
        Self {
            chart: CaseChart::from(chart),
            chart_text: format_chart(chart),
        }
    }
}

/// The chart as the viewer reads it; only the patient block is renamed.
#[derive(Serialize)]
struct CaseChart<'a> {
    patient: CasePatient<'a>,
    encounter: &'a EncounterSummary,
    allergies: &'a [String],
    conditions: &'a [String],
    vitals: &'a [String],
    labs: &'a [String],
    medications: &'a Medications,
    imaging: &'a [ImagingStudy],
    notes: &'a [ClinicalNote],
}

#[derive(Serialize)]
struct CasePatient<'a> {
    name: &'a str,
    mrn: &'a str,
    dob: &'a str,
    gender: &'a str,
}

impl<'a> From<&'a Chart> for CaseChart<'a> {
    fn from(chart: &'a Chart) -> Self {
        let patient = chart.patient();
        Self {
            patient: CasePatient {
                name: &patient.name,
                mrn: &patient.identifier,
                dob: &patient.birth_date,
                gender: &patient.sex,
            },
            encounter: chart.encounter(),
            allergies: chart.allergies(),
            conditions: chart.conditions(),
            vitals: chart.vitals(),
            labs: chart.labs(),
            medications: chart.medications(),
            imaging: chart.imaging(),
            notes: chart.notes(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chart_fhir=info".parse()?)
                .add_directive("chart=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let demo = DemoPatient::load(&args.demo_config)?;
    let config = build_config(&args, demo.as_ref())?;

    let (aggregator, bundle_patient) = match &args.bundle {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read {:?}", path))?;
            let source = BundleSource::from_bundle_str(&data)?;
            let first_patient = source.first_patient_id().map(str::to_string);
            (ChartAggregator::new(Arc::new(source), config), first_patient)
        }
        None => (ChartAggregator::connect(config)?, None),
    };

    let subject = match resolve_subject(&args, demo.as_ref(), bundle_patient) {
        Some(subject) => subject,
        None => prompt_subject()?,
    };

    if let Some(mrn) = demo.as_ref().and_then(|d| d.mrn.as_deref()) {
        info!(mrn, "demo patient loaded");
    }
    info!(subject = %subject, "pulling patient chart");
    let chart = aggregator
        .aggregate(&subject)
        .await
        .with_context(|| format!("Could not assemble chart for patient {subject}"))?;
    if args.json {
        let case = CaseDocument::new(&chart);
        println!("{}", serde_json::to_string_pretty(&case)?);
    } else {
        println!("{}", format_chart(&chart));
    }

    Ok(())
}

/// Settings file, then the demo patient's server, then flags.
fn build_config(args: &Args, demo: Option<&DemoPatient>) -> anyhow::Result<ChartConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read {:?}", path))?;
            serde_json::from_str(&data).with_context(|| format!("Invalid config {:?}", path))?
        }
        None => ChartConfig::default(),
    };

    if let Some(base) = demo.and_then(|d| d.fhir_base.clone()) {
        config.base_url = base;
    }
    if let Some(base) = &args.base_url {
        config.base_url = base.clone();
    }
    if let Some(seconds) = args.timeout {
        config.aggregate_timeout_secs = seconds;
    }

    config.validate()?;
    Ok(config)
}

/// Flag or env var first, then the saved demo patient, then the bundle's
/// own patient.
fn resolve_subject(
    args: &Args,
    demo: Option<&DemoPatient>,
    bundle_patient: Option<String>,
) -> Option<String> {
    args.patient_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| demo.map(|d| d.patient_id.clone()))
        .or(bundle_patient)
}

fn prompt_subject() -> anyhow::Result<String> {
    eprint!("Enter FHIR Patient ID: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let subject = line.trim().to_string();
    if subject.is_empty() {
        bail!("No patient id given");
    }
    Ok(subject)
}
