use serde::Serialize;

pub const WINDOW_SIZE: usize = 1000;
pub const WINDOW_OVERLAP: usize = 150;
pub const EMBED_BATCH_SIZE: usize = 10;
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// A window of guideline text with the 0-indexed page it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageWindow {
    pub page: i64,
    pub content: String,
}

/// Split text into overlapping windows for embedding
pub fn split_into_windows(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= window {
        return vec![text.to_string()];
    }

    let step = window.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + window).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            windows.push(chunk);
        }
        if end >= chars.len() {
            break;
        }
        start += step;
    }

    windows
}

/// Windows for a whole document, page by page, tagged with the page index.
pub fn page_windows(pages: &[String], window: usize, overlap: usize) -> Vec<PageWindow> {
    pages
        .iter()
        .enumerate()
        .flat_map(|(i, text)| {
            split_into_windows(text, window, overlap)
                .into_iter()
                .map(move |content| PageWindow {
                    page: i as i64,
                    content,
                })
        })
        .collect()
}
