//! Command handlers for the Sift CLI.

pub mod ask;
pub mod chat;

pub use ask::AskCommand;
pub use chat::ChatCommand;

use sift_core::{config::AppConfig, AppResult};
use sift_knowledge::embeddings::DEFAULT_DIMENSIONS;
use sift_knowledge::{InMemoryIndex, Modality, Orchestrator, TrigramEmbedder};
use std::path::Path;
use std::sync::Arc;

/// Load a JSONL corpus and wire the pipeline around it.
pub async fn load_orchestrator(config: &AppConfig, corpus: &Path) -> AppResult<Orchestrator> {
    let embedder = Arc::new(TrigramEmbedder::new(DEFAULT_DIMENSIONS));
    let index = InMemoryIndex::new();
    let loaded = index.load_jsonl(corpus, embedder.as_ref()).await?;
    if loaded == 0 {
        tracing::warn!("Corpus {} is empty; every answer will be refused", corpus.display());
    }

    let generator = Arc::new(sift_llm::build_chain(&config.generation)?);

    Ok(
        Orchestrator::builder(Arc::new(index), embedder, generator)
            .with_settings(config.pipeline.clone())
            .build(),
    )
}

/// Parse `--modality` values, rejecting unknown names.
pub fn parse_modalities(values: &[String]) -> AppResult<Option<Vec<Modality>>> {
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|v| v.parse::<Modality>())
        .collect::<AppResult<Vec<_>>>()
        .map(Some)
}

/// Parse `--persona`, defaulting to the standard style.
pub fn parse_persona(value: Option<&str>) -> AppResult<sift_prompt::Persona> {
    value.map_or(Ok(sift_prompt::Persona::default()), |v| v.parse())
}
