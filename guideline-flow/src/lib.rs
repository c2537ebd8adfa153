pub mod completion;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod retrieval;
pub mod session;

// Re-export commonly used types
pub use completion::ModelClient;
pub use error::{FlowError, Result};
pub use parser::{Citation, ParsedAnswer, dedup_citations, parse_answer, parse_model_json};
pub use prompt::{compose_chat_prompt, dedup_chunks, format_context, format_history};
pub use retrieval::{GuidelineChunk, GuidelineIndex, InMemoryGuidelineIndex, PageRef};
pub use session::{ChatMessage, ChatRole, InMemorySessionStore, SessionStore};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct ScriptedModel {
        response: String,
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_grounded_chat_turn() {
        let index = InMemoryGuidelineIndex::with_chunks(vec![
            GuidelineChunk::new(
                "Refer adults with unexplained weight loss for urgent investigation.",
                Some(PageRef::Number(11)),
            ),
            GuidelineChunk::new("Consider routine referral for persistent fatigue.", None),
        ]);
        let sessions = InMemorySessionStore::new();
        let model = ScriptedModel {
            response: r#"{"answer": "Urgent referral is indicated.", "citations": [{"page": 12, "excerpt": "unexplained weight loss"}]}"#
                .to_string(),
        };

        let message = "What about unexplained weight loss?";
        let chunks = dedup_chunks(index.search(message, 5).await.unwrap());
        let history = sessions.history("s1").await.unwrap();
        let prompt = compose_chat_prompt(
            "You are a guideline assistant.",
            &format_context(&chunks),
            &format_history(&history),
            message,
        );
        assert!(prompt.contains("Page 12"));

        let parsed = parse_answer(&model.complete(&prompt).await.unwrap()).unwrap();
        assert_eq!(parsed.answer, "Urgent referral is indicated.");
        assert_eq!(parsed.citations.len(), 1);

        sessions
            .append_turn("s1", message, &parsed.answer)
            .await
            .unwrap();
        let history = sessions.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Urgent referral is indicated.");
    }

    #[tokio::test]
    async fn test_search_then_format_empty_context() {
        let index = InMemoryGuidelineIndex::new();
        let chunks = index.search("anything", 3).await.unwrap();
        assert!(chunks.is_empty());
        assert_eq!(format_context(&chunks), "");
    }
}
