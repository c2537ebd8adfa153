use async_trait::async_trait;

use crate::error::Result;

/// A text completion backend. Implementations wrap a concrete provider, map
/// transport failures into `FlowError::Completion`, and signal completions
/// the provider produced no content for (safety blocks) as
/// `FlowError::Refused`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
