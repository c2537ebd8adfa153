use guideline_flow::Citation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub smoking_history: String,
    pub symptoms: Vec<String>,
    pub symptom_duration_days: u32,
}

/// Clinical assessment payload as emitted by the model. Models sometimes add
/// keys beyond the requested schema, so extras are kept rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guideline_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where an assessment payload came from, so callers can tell genuine model
/// output from a substituted fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Model,
    Refusal,
    MalformedOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub result: AssessmentResult,
    pub source: AssessmentSource,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Set when the fixed fallback answer was substituted for a failed model
    /// call. Not serialized; the wire shape stays `{session_id, answer,
    /// citations}`.
    #[serde(skip)]
    pub degraded: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatientsAdded {
    pub message: String,
    pub added_count: usize,
}
