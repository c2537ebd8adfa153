use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{delete, get, post},
};
use guideline_flow::{
    ChatMessage, GuidelineIndex, InMemoryGuidelineIndex, InMemorySessionStore, ModelClient,
    SessionStore,
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::flows::{self, AssessError, AssessmentCache, RigModelClient};
use crate::models::{AssessmentResult, AssessmentSource, ChatReply, ChatRequest, Patient, PatientsAdded};
use crate::patients::PatientStore;
use crate::retrieval::PgVectorGuidelineIndex;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "patient_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub patients: Arc<PatientStore>,
    pub index: Arc<dyn GuidelineIndex>,
    pub model: Arc<dyn ModelClient>,
    pub sessions: Arc<dyn SessionStore>,
    pub assessments: Arc<AssessmentCache>,
}

pub async fn create_app() -> Router {
    let app_state = create_app_state().await;
    warmup(&app_state).await;
    build_router(app_state)
}

async fn create_app_state() -> AppState {
    let patients_path =
        std::env::var("PATIENTS_PATH").unwrap_or_else(|_| "data/patients.json".to_string());
    let patients = Arc::new(PatientStore::new(patients_path));

    // Check for DATABASE_URL and use pgvector if available, otherwise fall
    // back to an empty in-memory index.
    let index: Arc<dyn GuidelineIndex> = if let Ok(database_url) = std::env::var("DATABASE_URL") {
        info!("Using pgvector guideline index");
        match PgVectorGuidelineIndex::connect(&database_url).await {
            Ok(pg_index) => Arc::new(pg_index),
            Err(e) => {
                error!(
                    "Failed to connect to PostgreSQL: {}. Falling back to an empty in-memory index.",
                    e
                );
                Arc::new(InMemoryGuidelineIndex::new())
            }
        }
    } else {
        warn!("DATABASE_URL not set, using an empty in-memory guideline index");
        Arc::new(InMemoryGuidelineIndex::new())
    };

    let model = RigModelClient::from_env().unwrap_or_else(|e| {
        error!("Failed to initialize LLM client: {}", e);
        std::process::exit(1);
    });

    AppState {
        patients,
        index,
        model: Arc::new(model),
        sessions: Arc::new(InMemorySessionStore::new()),
        assessments: Arc::new(AssessmentCache::new()),
    }
}

/// Throwaway calls so the embedding model download and the first provider
/// round trip happen before traffic arrives.
async fn warmup(state: &AppState) {
    info!("Warming up embedding and completion backends");

    if let Err(e) = state.index.search("warmup", 1).await {
        warn!("Warmup search failed: {}", e);
    }
    if let Err(e) = state.model.complete("warmup").await {
        warn!("Warmup completion failed: {}", e);
    }

    info!("AI services ready");
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/patients", get(list_patients).post(create_patients))
        .route("/patients/{patient_id}", get(get_patient))
        .route("/assess/{patient_id}", get(assess_patient))
        .route("/chat", post(chat))
        .route("/chat/{session_id}/history", get(chat_history))
        .route("/chat/{session_id}", delete(clear_chat))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).unwrap(),
    );

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);

    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "NG12 Cancer Referral Service",
        "version": "1.0.0",
        "description": "Clinical decision support for the NICE NG12 suspected-cancer guidelines",
        "endpoints": {
            "GET /patients": "List patient IDs",
            "GET /patients/{patient_id}": "Get a patient record",
            "POST /patients": "Add new patients",
            "GET /assess/{patient_id}": "Assess a patient against the guidelines",
            "POST /chat": "Chat with the guidelines",
            "GET /chat/{session_id}/history": "Get conversation history",
            "DELETE /chat/{session_id}": "Clear conversation history",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_patients(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    state.patients.list_ids().await.map(Json).map_err(|e| {
        error!("Failed to list patients: {}", e);
        internal_error("Failed to load patient records", &e.to_string())
    })
}

async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Patient> {
    match state.patients.get(&patient_id).await {
        Ok(Some(patient)) => Ok(Json(patient)),
        Ok(None) => Err(not_found_error("Patient not found", &patient_id)),
        Err(e) => {
            error!("Failed to load patient {}: {}", patient_id, e);
            Err(internal_error(
                "Failed to load patient records",
                &e.to_string(),
            ))
        }
    }
}

async fn create_patients(
    State(state): State<AppState>,
    Json(new_patients): Json<Vec<Patient>>,
) -> Result<(StatusCode, Json<PatientsAdded>), ApiError> {
    let added_count = state.patients.add_unique(new_patients).await.map_err(|e| {
        error!("Failed to add patients: {}", e);
        internal_error("Failed to update patient records", &e.to_string())
    })?;

    info!(added_count, "Patients added");

    Ok((
        StatusCode::CREATED,
        Json(PatientsAdded {
            message: format!("Added {} new patients.", added_count),
            added_count,
        }),
    ))
}

async fn assess_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<AssessmentResult> {
    info!("Assessing patient: {}", patient_id);

    match flows::assess(
        &state.patients,
        state.index.as_ref(),
        state.model.as_ref(),
        &state.assessments,
        &patient_id,
    )
    .await
    {
        Ok(assessment) => {
            if assessment.source != AssessmentSource::Model {
                warn!(
                    patient_id = %patient_id,
                    source = ?assessment.source,
                    "Assessment fell back to the fixed payload"
                );
            }
            Ok(Json(assessment.result))
        }
        Err(AssessError::PatientNotFound) => {
            Err(not_found_error("Patient not found", &patient_id))
        }
        Err(e) => {
            error!("Assessment failed for {}: {}", patient_id, e);
            Err(internal_error("Assessment failed", &e.to_string()))
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatReply> {
    if request.top_k == Some(0) {
        return Err(bad_request_error("top_k must be greater than zero"));
    }
    let top_k = request.top_k.unwrap_or(flows::DEFAULT_TOP_K);

    let reply = flows::run_chat_turn(
        state.index.as_ref(),
        state.model.as_ref(),
        state.sessions.as_ref(),
        &request.session_id,
        &request.message,
        top_k,
    )
    .await;

    if let Some(reason) = &reply.degraded {
        warn!(session_id = %reply.session_id, reason = %reason, "Chat reply degraded to fallback");
    }

    Ok(Json(reply))
}

async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<ChatMessage>> {
    state
        .sessions
        .history(&session_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to load history for {}: {}", session_id, e);
            internal_error("Failed to load session history", &e.to_string())
        })
}

async fn clear_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    state.sessions.clear(&session_id).await.map_err(|e| {
        error!("Failed to clear session {}: {}", session_id, e);
        internal_error("Failed to clear session history", &e.to_string())
    })?;

    Ok(Json(json!({ "message": "History cleared" })))
}
