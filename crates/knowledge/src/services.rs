//! Contracts of the external collaborators the pipeline consumes.

use crate::language::{detect_language, DetectedLanguage};
use crate::types::{Metadata, Modality, WebSource};
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};

/// A nearest-neighbour hit. Smaller distance means more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHit {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub distance: f32,
}

/// A stored unit as returned by `VectorIndex::get_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Nearest-neighbour index over embedded units.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` hits ordered by ascending distance, optionally scoped to one modality.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        modality: Option<Modality>,
    ) -> AppResult<Vec<IndexHit>>;

    /// Every stored unit.
    async fn get_all(&self) -> AppResult<Vec<IndexRecord>>;
}

/// Text-to-vector model. Identical input must yield identical vectors.
#[async_trait::async_trait]
pub trait EmbeddingService: Send + Sync {
    fn provider_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String], hint: Modality) -> AppResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str, hint: Modality) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()], hint).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Retrieval("No embedding returned".to_string()))
    }
}

/// Live web search.
#[async_trait::async_trait]
pub trait WebSearchService: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> AppResult<Vec<WebSource>>;
}

/// Machine translation. Optional: the pipeline degrades without it.
#[async_trait::async_trait]
pub trait TranslationService: Send + Sync {
    /// `Ok(None)` when the pair is unsupported or the service declines.
    async fn translate(&self, text: &str, source: &str, target: &str) -> AppResult<Option<String>>;

    fn detect_language(&self, text: &str) -> DetectedLanguage {
        detect_language(text)
    }
}
