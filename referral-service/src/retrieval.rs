use anyhow::Result;
use async_trait::async_trait;
use guideline_flow::{FlowError, GuidelineChunk, GuidelineIndex, PageRef};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Guideline index backed by a pgvector table populated by the offline
/// ingestion binary.
pub struct PgVectorGuidelineIndex {
    pool: sqlx::PgPool,
}

impl PgVectorGuidelineIndex {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }
}

fn vector_search_sql(embedding: &[f32], k: usize) -> String {
    // Literal vector representation suitable for pgvector.
    let vector_literal = embedding
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "SELECT content, page                                          \
         FROM guideline_chunks                                         \
         ORDER BY embedding <-> ARRAY[{}]::vector                      \
         LIMIT {}",
        vector_literal, k
    )
}

#[async_trait]
impl GuidelineIndex for PgVectorGuidelineIndex {
    async fn search(&self, query: &str, k: usize) -> guideline_flow::Result<Vec<GuidelineChunk>> {
        let embedding = embed_query(query)
            .await
            .map_err(|e| FlowError::Retrieval(format!("Embedding generation failed: {}", e)))?;

        let sql = vector_search_sql(&embedding, k);
        let rows = sqlx::query_as::<_, (String, Option<i64>)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FlowError::Retrieval(format!("Database query failed: {}", e)))?;

        info!(count = rows.len(), "Retrieved guideline chunks");

        Ok(rows
            .into_iter()
            .map(|(content, page)| GuidelineChunk::new(content, page.map(PageRef::Number)))
            .collect())
    }
}

/// Generate embeddings for a batch of texts using fastembed
pub async fn embed_texts(texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    // Off-load the potentially expensive ONNX inference to a blocking thread so
    // we don't obstruct Tokio's async scheduler.
    tokio::task::spawn_blocking(move || {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let mut model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
        )?;
        let embeddings = model.embed(texts, None)?;
        Ok::<Vec<Vec<f32>>, anyhow::Error>(embeddings)
    })
    .await?
}

/// Generate an embedding for a single query string
pub async fn embed_query(text: &str) -> Result<Vec<f32>> {
    let mut embeddings = embed_texts(vec![text.to_owned()]).await?;
    embeddings
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vectors"))
}
