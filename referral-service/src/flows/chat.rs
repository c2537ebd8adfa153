use guideline_flow::{
    GuidelineIndex, ModelClient, ParsedAnswer, SessionStore, compose_chat_prompt, dedup_chunks,
    format_context, format_history, parse_answer,
};
use tracing::{error, info};

use crate::models::ChatReply;

pub const DEFAULT_TOP_K: usize = 5;

pub const FALLBACK_ANSWER: &str =
    "I encountered an error processing your request. Please try again.";

pub const CHAT_SYSTEM_PROMPT: &str = r#"You are an expert assistant for the NICE NG12 guidelines (Suspected Cancer: Recognition and Referral).
Your goal is to answer user questions ACCURATELY based ONLY on the provided context chunks.

RULES:
1. GROUNDING: Answer using ONLY the provided "Context Guidelines". Do not use outside knowledge.
2. REFUSAL: If the provided context does not contain the answer, state clearly: "I couldn't find support in the NG12 text for that."
3. CITATIONS: You must cite the specific page number for every claim you make.
4. FORMAT: Return your response in valid JSON format.

JSON SCHEMA:
{
  "answer": "Your natural language answer here...",
  "citations": [
    {
      "source": "NG12 PDF",
      "page": 12,
      "chunk_id": "chunk_1",
      "excerpt": "Direct quote or summary of the specific rule..."
    }
  ]
}"#;

/// Run one grounded chat turn. Retrieval, model, and parse failures all
/// degrade into a fixed fallback answer rather than an error, and the turn is
/// recorded in the session history either way.
pub async fn run_chat_turn(
    index: &dyn GuidelineIndex,
    model: &dyn ModelClient,
    sessions: &dyn SessionStore,
    session_id: &str,
    message: &str,
    top_k: usize,
) -> ChatReply {
    let generated = generate_answer(index, model, sessions, session_id, message, top_k).await;

    let (answer, citations, degraded) = match generated {
        Ok(parsed) => (parsed.answer, parsed.citations, None),
        Err(e) => {
            error!(session_id, error = %e, "Chat generation failed, returning fallback answer");
            (FALLBACK_ANSWER.to_string(), Vec::new(), Some(e.to_string()))
        }
    };

    if let Err(e) = sessions.append_turn(session_id, message, &answer).await {
        error!(session_id, error = %e, "Failed to record chat turn");
    }

    ChatReply {
        session_id: session_id.to_string(),
        answer,
        citations,
        degraded,
    }
}

async fn generate_answer(
    index: &dyn GuidelineIndex,
    model: &dyn ModelClient,
    sessions: &dyn SessionStore,
    session_id: &str,
    message: &str,
    top_k: usize,
) -> guideline_flow::Result<ParsedAnswer> {
    // History is read before this turn lands in the store, so the prompt
    // carries only completed turns.
    let history = sessions.history(session_id).await?;
    let chunks = dedup_chunks(index.search(message, top_k).await?);

    info!(
        session_id,
        chunks = chunks.len(),
        turns = history.len() / 2,
        "Composing grounded chat prompt"
    );

    let prompt = compose_chat_prompt(
        CHAT_SYSTEM_PROMPT,
        &format_context(&chunks),
        &format_history(&history),
        message,
    );

    let raw = model.complete(&prompt).await?;
    parse_answer(&raw)
}
