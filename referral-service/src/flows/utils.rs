use anyhow::Result;
use async_trait::async_trait;
use guideline_flow::{FlowError, ModelClient};
use rig::completion::Prompt;
use rig::prelude::*;

/// Model served through OpenRouter, used by both flows.
pub const LLM_MODEL: &str = "google/gemini-2.5-flash";

/// Create an LLM agent using OpenRouter
pub fn get_llm_agent() -> Result<rig::agent::Agent<rig::providers::openrouter::CompletionModel>> {
    let api_key = std::env::var("OPENROUTER_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;
    let client = rig::providers::openrouter::Client::new(&api_key);
    Ok(client.agent(LLM_MODEL).build())
}

/// `ModelClient` backed by a rig OpenRouter agent. Transport failures become
/// `Completion` errors; completions with no content become `Refused`.
pub struct RigModelClient {
    agent: rig::agent::Agent<rig::providers::openrouter::CompletionModel>,
}

impl RigModelClient {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            agent: get_llm_agent()?,
        })
    }
}

#[async_trait]
impl ModelClient for RigModelClient {
    async fn complete(&self, prompt: &str) -> guideline_flow::Result<String> {
        let response = self
            .agent
            .prompt(prompt)
            .await
            .map_err(|e| FlowError::Completion(e.to_string()))?;

        if response.trim().is_empty() {
            return Err(FlowError::Refused(
                "completion contained no content".to_string(),
            ));
        }

        Ok(response)
    }
}
