use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Guideline retrieval failed: {0}")]
    Retrieval(String),

    #[error("Model completion failed: {0}")]
    Completion(String),

    #[error("Model refused to generate content: {0}")]
    Refused(String),

    #[error("Model output is not valid JSON: {0}")]
    MalformedOutput(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
