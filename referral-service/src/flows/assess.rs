use dashmap::DashMap;
use guideline_flow::{FlowError, GuidelineIndex, ModelClient, parse_model_json};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Assessment, AssessmentResult, AssessmentSource};
use crate::patients::{PatientStore, StoreError};

pub const ASSESS_TOP_K: usize = 2;

pub const ASSESS_SYSTEM_PROMPT: &str = r#"You are a clinical decision support assistant.
Analyze the patient's symptoms against the provided NICE guidelines.

Return the output in valid JSON format with the following keys:
- patient_summary: A brief summary of age, symptoms, and risk factors.
- guideline_analysis: How the guidelines apply to this specific patient (cite specific criteria and page numbers).
- recommendation: The clinical recommendation (e.g., Urgent Referral, Routine Referral, Safety Netting, or No Referral).
- next_steps: Specific actions for the GP (e.g., "Order Chest X-Ray", "Refer via 2WW")."#;

#[derive(Error, Debug)]
pub enum AssessError {
    #[error("Patient not found")]
    PatientNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Guideline retrieval failed: {0}")]
    Retrieval(String),
    #[error("Model completion failed: {0}")]
    Completion(String),
}

/// Memoized assessments keyed by patient ID. Each entry carries a fingerprint
/// of the record it was computed from, so editing the record invalidates the
/// entry instead of serving a stale result.
#[derive(Default)]
pub struct AssessmentCache {
    entries: DashMap<String, (String, Assessment)>,
}

impl AssessmentCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn lookup(&self, patient_id: &str, fingerprint: &str) -> Option<Assessment> {
        self.entries
            .get(patient_id)
            .filter(|entry| entry.0 == fingerprint)
            .map(|entry| entry.1.clone())
    }

    fn store(&self, patient_id: &str, fingerprint: String, assessment: Assessment) {
        self.entries
            .insert(patient_id.to_string(), (fingerprint, assessment));
    }
}

/// Assess a patient against the guidelines. Refusals and unparsable model
/// output become a fixed "Unable to assess" payload (tagged with its source);
/// transport failures surface as errors. Successful outcomes, fallback
/// payloads included, are memoized per patient record.
pub async fn assess(
    patients: &PatientStore,
    index: &dyn GuidelineIndex,
    model: &dyn ModelClient,
    cache: &AssessmentCache,
    patient_id: &str,
) -> Result<Assessment, AssessError> {
    let patient = patients
        .get(patient_id)
        .await?
        .ok_or(AssessError::PatientNotFound)?;

    // Canonical record rendering, used both as the prompt payload and as the
    // memo fingerprint.
    let patient_json = serde_json::to_value(&patient)
        .unwrap_or(Value::Null)
        .to_string();

    if let Some(hit) = cache.lookup(patient_id, &patient_json) {
        info!(patient_id, "Returning memoized assessment");
        return Ok(hit);
    }

    let query = patient.symptoms.join(", ");
    let chunks = index
        .search(&query, ASSESS_TOP_K)
        .await
        .map_err(|e| AssessError::Retrieval(e.to_string()))?;

    let context = chunks
        .iter()
        .map(|c| format!("[Page {}]\n{}", c.display_page(), c.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt =
        format!("{ASSESS_SYSTEM_PROMPT}\n\nPatient: {patient_json}\nGuidelines:\n{context}\n");

    info!(patient_id, chunks = chunks.len(), "Generating assessment");

    let assessment = match model.complete(&prompt).await {
        Ok(raw) => match parse_result(&raw) {
            Ok(result) => Assessment {
                result,
                source: AssessmentSource::Model,
            },
            Err(e) => {
                warn!(patient_id, error = %e, "Assessment output unusable, substituting fallback");
                unable_to_assess(AssessmentSource::MalformedOutput)
            }
        },
        Err(FlowError::Refused(reason)) => {
            warn!(patient_id, reason, "Model refused to assess, substituting fallback");
            unable_to_assess(AssessmentSource::Refusal)
        }
        Err(e) => return Err(AssessError::Completion(e.to_string())),
    };

    cache.store(patient_id, patient_json, assessment.clone());
    Ok(assessment)
}

fn parse_result(raw: &str) -> guideline_flow::Result<AssessmentResult> {
    let mut data: Value = parse_model_json(raw)?;

    // Models occasionally emit patient_summary as a nested object; downstream
    // consumers expect a string.
    if let Some(summary) = data.get("patient_summary") {
        if !summary.is_string() {
            let rendered = summary.to_string();
            data["patient_summary"] = Value::String(rendered);
        }
    }

    serde_json::from_value(data).map_err(|e| FlowError::MalformedOutput(e.to_string()))
}

fn unable_to_assess(source: AssessmentSource) -> Assessment {
    Assessment {
        result: AssessmentResult {
            patient_summary: None,
            guideline_analysis: Some(
                "The model refused to generate a response due to safety filters.".to_string(),
            ),
            recommendation: Some("Unable to assess".to_string()),
            next_steps: Some("Please review the patient data manually.".to_string()),
            extra: Map::new(),
        },
        source,
    }
}
