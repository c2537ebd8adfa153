use std::time::Duration;

use anyhow::{Context, Result};
use referral_service::ingest::{
    EMBED_BATCH_SIZE, EMBEDDING_DIMENSIONS, WINDOW_OVERLAP, WINDOW_SIZE, page_windows,
};
use referral_service::retrieval::embed_texts;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

const DEFAULT_PDF_PATH: &str = "data/ng12.pdf";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let pdf_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PDF_PATH.to_string());
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

    info!(pdf_path, "Loading PDF");
    let bytes = tokio::fs::read(&pdf_path)
        .await
        .with_context(|| format!("Failed to read {}", pdf_path))?;
    let pages =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await?
            .map_err(|e| anyhow::anyhow!("PDF text extraction failed: {}", e))?;

    info!(pages = pages.len(), "Splitting text");
    let windows = page_windows(&pages, WINDOW_SIZE, WINDOW_OVERLAP);
    info!(windows = windows.len(), "Created text windows");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS guideline_chunks (
            id BIGSERIAL PRIMARY KEY,
            content TEXT NOT NULL,
            page BIGINT,
            embedding VECTOR({EMBEDDING_DIMENSIONS})
        )"
    ))
    .execute(&pool)
    .await?;

    let total_batches = windows.len().div_ceil(EMBED_BATCH_SIZE);
    for (batch_index, batch) in windows.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<String> = batch.iter().map(|w| w.content.clone()).collect();
        let embeddings = embed_texts(texts).await?;

        for (window, embedding) in batch.iter().zip(embeddings) {
            let vector_literal = embedding
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(",");
            sqlx::query(&format!(
                "INSERT INTO guideline_chunks (content, page, embedding) VALUES ($1, $2, ARRAY[{}]::vector)",
                vector_literal
            ))
            .bind(&window.content)
            .bind(window.page)
            .execute(&pool)
            .await?;
        }

        info!("Processed batch {} / {}", batch_index + 1, total_batches);
        // The embedding backend is rate limited, pace the batches.
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    info!("Done");
    Ok(())
}
