use std::collections::HashSet;

use crate::retrieval::GuidelineChunk;
use crate::session::{ChatMessage, ChatRole};

/// Collapse chunks with identical text content to a single entry, first
/// occurrence wins, preserving retrieval order.
pub fn dedup_chunks(chunks: Vec<GuidelineChunk>) -> Vec<GuidelineChunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.content.clone()))
        .collect()
}

/// Render chunks as a context block, each tagged with a synthetic 1-indexed
/// chunk id and its display page.
pub fn format_context(chunks: &[GuidelineChunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!(
            "[ID: chunk_{} | Page {}]\n{}\n\n",
            i + 1,
            chunk.display_page(),
            chunk.content
        ));
    }
    out
}

/// Render prior turns as role-labelled lines separated by blank lines.
pub fn format_history(history: &[ChatMessage]) -> String {
    let mut out = String::new();
    for msg in history {
        let role = match msg.role {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        out.push_str(&format!("{}: {}\n\n", role, msg.content));
    }
    out
}

/// Assemble the full chat prompt: system instruction, context block,
/// conversation so far, and the new user turn awaiting an answer.
pub fn compose_chat_prompt(system: &str, context: &str, history: &str, message: &str) -> String {
    format!(
        "{system}\n\nCONTEXT GUIDELINES:\n{context}\n\nCONVERSATION HISTORY:\n{history}\nUser: {message}\nAssistant:"
    )
}
