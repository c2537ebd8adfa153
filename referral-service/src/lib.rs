pub mod flows;
pub mod ingest;
pub mod models;
pub mod patients;
pub mod retrieval;
pub mod service;

pub use service::{AppState, create_app};
pub use flows::{AssessError, AssessmentCache, DEFAULT_TOP_K, assess, run_chat_turn};
pub use models::*;
pub use patients::{PatientStore, StoreError};
