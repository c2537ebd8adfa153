use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Page reference attached to a retrieved chunk. Stores usually carry numeric
/// page indices, but some index display labels instead ("iv", "A-12").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(i64),
    Label(String),
}

/// A chunk of guideline text returned by a similarity search. Relevance is
/// implicit in the ordering of the result list; no score is carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineChunk {
    pub content: String,
    pub page: Option<PageRef>,
}

impl GuidelineChunk {
    pub fn new(content: impl Into<String>, page: Option<PageRef>) -> Self {
        Self {
            content: content.into(),
            page,
        }
    }

    /// Page as shown to readers. Numeric pages are stored 0-indexed and shift
    /// to 1-indexed here; labels pass through unchanged. A chunk without page
    /// metadata counts as page 0.
    pub fn display_page(&self) -> String {
        match &self.page {
            Some(PageRef::Number(n)) => (n + 1).to_string(),
            Some(PageRef::Label(label)) => label.clone(),
            None => "1".to_string(),
        }
    }
}

/// Trait for querying a guideline index by text similarity
#[async_trait]
pub trait GuidelineIndex: Send + Sync {
    /// Return up to `k` chunks ordered by descending similarity to `query`.
    /// Every call re-queries the underlying store; results are not cached.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<GuidelineChunk>>;
}

/// In-memory implementation of GuidelineIndex, scoring chunks by how many
/// query terms their content contains. Chunks sharing no terms with the
/// query are omitted; ties keep insertion order.
pub struct InMemoryGuidelineIndex {
    chunks: Vec<GuidelineChunk>,
}

impl InMemoryGuidelineIndex {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    pub fn with_chunks(chunks: Vec<GuidelineChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl GuidelineIndex for InMemoryGuidelineIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<GuidelineChunk>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut scored: Vec<(usize, &GuidelineChunk)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let content = chunk.content.to_lowercase();
                let score = terms.iter().filter(|t| content.contains(t.as_str())).count();
                (score > 0).then_some((score, chunk))
            })
            .collect();

        // Stable sort: equally scored chunks stay in insertion order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        debug!(query, matches = scored.len(), "in-memory guideline search");

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> InMemoryGuidelineIndex {
        InMemoryGuidelineIndex::with_chunks(vec![
            GuidelineChunk::new("Refer adults with haemoptysis urgently", Some(PageRef::Number(11))),
            GuidelineChunk::new("Offer a chest X-ray for persistent cough", Some(PageRef::Number(12))),
            GuidelineChunk::new("Safety netting advice for low-risk symptoms", Some(PageRef::Number(40))),
        ])
    }

    #[tokio::test]
    async fn search_ranks_by_term_overlap() {
        let results = index()
            .search("urgent chest X-ray for cough", 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].content.contains("chest X-ray"));
    }

    #[tokio::test]
    async fn search_caps_results_at_k() {
        let results = index().search("for", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn search_without_matches_is_empty() {
        let results = index().search("zzzz", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn ties_preserve_insertion_order() {
        let results = index().search("for", 3).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("chest X-ray"));
        assert!(results[1].content.contains("Safety netting"));
    }

    #[test]
    fn display_page_shifts_numeric_pages() {
        let chunk = GuidelineChunk::new("text", Some(PageRef::Number(11)));
        assert_eq!(chunk.display_page(), "12");
    }

    #[test]
    fn display_page_passes_labels_through() {
        let chunk = GuidelineChunk::new("text", Some(PageRef::Label("iv".into())));
        assert_eq!(chunk.display_page(), "iv");
    }

    #[test]
    fn display_page_defaults_missing_metadata() {
        let chunk = GuidelineChunk::new("text", None);
        assert_eq!(chunk.display_page(), "1");
    }
}
