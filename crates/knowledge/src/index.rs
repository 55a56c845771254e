//! In-memory vector index loaded from a JSONL corpus.

use crate::embeddings::l2_distance;
use crate::services::{EmbeddingService, IndexHit, IndexRecord, VectorIndex};
use crate::types::{Metadata, Modality};
use serde::Deserialize;
use sift_core::{AppError, AppResult};
use std::path::Path;
use tokio::sync::RwLock;

/// One line of a corpus file.
#[derive(Debug, Deserialize)]
struct CorpusLine {
    #[serde(default)]
    id: Option<String>,
    content: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
struct StoredUnit {
    record: IndexRecord,
    modality: Modality,
    embedding: Vec<f32>,
}

/// Brute-force L2 index held in memory.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    units: RwLock<Vec<StoredUnit>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit. Modality comes from `metadata.modality`, defaulting to text.
    pub async fn insert(&self, record: IndexRecord, embedding: Vec<f32>) {
        let modality = record
            .metadata
            .get("modality")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Modality>().ok())
            .unwrap_or(Modality::Text);

        self.units.write().await.push(StoredUnit {
            record,
            modality,
            embedding,
        });
    }

    /// Load a JSONL corpus, embedding lines that carry no vector.
    ///
    /// Returns the number of units loaded.
    pub async fn load_jsonl(&self, path: &Path, embedder: &dyn EmbeddingService) -> AppResult<usize> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Knowledge(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;

        let mut loaded = 0;
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let parsed: CorpusLine = serde_json::from_str(line).map_err(|e| {
                AppError::Knowledge(format!(
                    "Invalid corpus line {} in {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                ))
            })?;

            let modality = parsed
                .metadata
                .get("modality")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Modality>().ok())
                .unwrap_or(Modality::Text);

            let embedding = match parsed.embedding {
                Some(vector) => vector,
                None => embedder.embed(&parsed.content, modality).await?,
            };

            let record = IndexRecord {
                id: parsed.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                content: parsed.content,
                metadata: parsed.metadata,
            };
            self.insert(record, embedding).await;
            loaded += 1;
        }

        tracing::info!("Loaded {} units from {}", loaded, path.display());
        Ok(loaded)
    }

    pub async fn len(&self) -> usize {
        self.units.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        modality: Option<Modality>,
    ) -> AppResult<Vec<IndexHit>> {
        let units = self.units.read().await;

        let mut hits: Vec<IndexHit> = units
            .iter()
            .filter(|unit| modality.map_or(true, |m| unit.modality == m))
            .map(|unit| IndexHit {
                id: unit.record.id.clone(),
                content: unit.record.content.clone(),
                metadata: unit.record.metadata.clone(),
                distance: l2_distance(embedding, &unit.embedding),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        tracing::debug!(
            "Index query returned {} hits (k={}, modality={:?})",
            hits.len(),
            k,
            modality
        );

        Ok(hits)
    }

    async fn get_all(&self) -> AppResult<Vec<IndexRecord>> {
        Ok(self
            .units
            .read()
            .await
            .iter()
            .map(|unit| unit.record.clone())
            .collect())
    }
}
