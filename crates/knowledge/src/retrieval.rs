//! Cross-lingual, cross-modal retrieval.
//!
//! Every query variant (original plus pivot translations) is searched in every
//! requested modality concurrently. Results are merged, boosted and reranked
//! with near-duplicate suppression.

use crate::analyzer::QueryAnalyzer;
use crate::language::{detect_language, DetectedLanguage};
use crate::services::{EmbeddingService, IndexHit, TranslationService, VectorIndex};
use crate::types::{EvidenceSource, Modality};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult, PipelineConfig};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const LANGUAGE_MATCH_BOOST: f32 = 1.1;
const CROSS_MODAL_BOOST: f32 = 1.2;
const KEYWORD_BOOST_STEP: f32 = 0.1;
const KEYWORD_BOOST_CAP: f32 = 1.5;
const NEAR_DUPLICATE_JACCARD: f32 = 0.9;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const UNKNOWN_SOURCE: &str = "unknown";

/// Timeouts and pivots for the retriever.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub pivot_languages: Vec<String>,
    pub index_timeout: Duration,
    pub translation_timeout: Duration,
}

impl RetrievalSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            pivot_languages: config.pivot_languages.clone(),
            index_timeout: Duration::from_millis(config.index_timeout_ms),
            translation_timeout: Duration::from_millis(config.translation_timeout_ms),
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// One searchable form of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryVariant {
    pub text: String,
    pub language: String,
}

/// Retrieval result plus what happened on the way.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub sources: Vec<EvidenceSource>,
    pub detected_language: DetectedLanguage,
    pub variants: Vec<QueryVariant>,
    pub modalities: Vec<Modality>,
    pub top_k: usize,
    /// Candidates merged before reranking
    pub candidates: usize,
    /// (variant, modality) searches that failed or timed out
    pub failed_searches: usize,
}

pub struct CrossModalRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingService>,
    translator: Option<Arc<dyn TranslationService>>,
    analyzer: QueryAnalyzer,
    settings: RetrievalSettings,
}

impl CrossModalRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            translator: None,
            analyzer: QueryAnalyzer::default(),
            settings,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn TranslationService>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_analyzer(mut self, analyzer: QueryAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Ranked evidence for `query`. Unset `top_k` or `modalities` come from the analyzer.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        modalities: Option<&[Modality]>,
    ) -> Vec<EvidenceSource> {
        self.retrieve_with_report(query, top_k, modalities)
            .await
            .sources
    }

    pub async fn retrieve_with_report(
        &self,
        query: &str,
        top_k: Option<usize>,
        modalities: Option<&[Modality]>,
    ) -> RetrievalOutcome {
        let (top_k, modalities) = match (top_k, modalities) {
            (Some(k), Some(m)) => (k, unique(m)),
            (k, m) => {
                let plan = self.analyzer.analyze(query);
                (
                    k.unwrap_or(plan.top_k),
                    m.map(unique).unwrap_or(plan.modalities),
                )
            }
        };

        let (detected_language, variants) = self.query_variants(query).await;

        let mut pairs: Vec<(&QueryVariant, Modality)> = Vec::new();
        for variant in &variants {
            for modality in &modalities {
                pairs.push((variant, *modality));
            }
        }

        let results = join_all(
            pairs
                .iter()
                .map(|(variant, modality)| self.search(variant, *modality, top_k)),
        )
        .await;

        let mut failed_searches = 0;
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<EvidenceSource> = Vec::new();

        for ((variant, modality), result) in pairs.iter().zip(results) {
            let (variant, modality) = (*variant, *modality);
            let hits = match result {
                Ok(hits) => hits,
                Err(e) => {
                    failed_searches += 1;
                    tracing::warn!(
                        "Search for {} variant in {} failed: {}",
                        variant.language,
                        modality,
                        e
                    );
                    continue;
                }
            };

            for hit in hits {
                if seen.insert(hit.id.clone()) {
                    merged.push(to_evidence(hit, modality, variant, &detected_language));
                }
            }
        }

        if failed_searches > 0 && failed_searches == variants.len() * modalities.len() {
            tracing::warn!("Every retrieval search failed; continuing with no evidence");
        }

        let candidates = merged.len();

        if modalities.len() > 1 {
            apply_keyword_boost(&mut merged, query);
        }
        apply_cross_modal_boost(&mut merged);

        let sources = rerank(merged, top_k);

        tracing::info!(
            "Retrieved {} sources from {} candidates ({} variants x {} modalities)",
            sources.len(),
            candidates,
            variants.len(),
            modalities.len()
        );

        RetrievalOutcome {
            sources,
            detected_language,
            variants,
            modalities,
            top_k,
            candidates,
            failed_searches,
        }
    }

    /// The original query plus pivot translations that differ from it.
    async fn query_variants(&self, query: &str) -> (DetectedLanguage, Vec<QueryVariant>) {
        let detected = match &self.translator {
            Some(translator) => translator.detect_language(query),
            None => detect_language(query),
        };

        let mut variants = vec![QueryVariant {
            text: query.to_string(),
            language: detected.code.clone(),
        }];

        let Some(translator) = &self.translator else {
            return (detected, variants);
        };

        let pivots: Vec<&String> = self
            .settings
            .pivot_languages
            .iter()
            .filter(|pivot| **pivot != detected.code)
            .collect();

        let translations = join_all(pivots.iter().map(|pivot| {
            timeout(
                self.settings.translation_timeout,
                translator.translate(query, &detected.code, pivot),
            )
        }))
        .await;

        for (pivot, result) in pivots.into_iter().zip(translations) {
            match result {
                Ok(Ok(Some(text)))
                    if !text.trim().is_empty() && text.to_lowercase() != query.to_lowercase() =>
                {
                    tracing::debug!("Added {} query variant", pivot);
                    variants.push(QueryVariant {
                        text,
                        language: pivot.clone(),
                    });
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!("Translation to {} failed: {}", pivot, e),
                Err(_) => tracing::warn!("Translation to {} timed out", pivot),
            }
        }

        (detected, variants)
    }

    async fn search(
        &self,
        variant: &QueryVariant,
        modality: Modality,
        top_k: usize,
    ) -> AppResult<Vec<IndexHit>> {
        let work = async {
            let embedding = self.embedder.embed(&variant.text, modality).await?;
            self.index.query(&embedding, top_k, Some(modality)).await
        };

        timeout(self.settings.index_timeout, work)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "index search exceeded {}ms",
                    self.settings.index_timeout.as_millis()
                ))
            })?
    }
}

fn unique(modalities: &[Modality]) -> Vec<Modality> {
    let mut out: Vec<Modality> = Vec::with_capacity(modalities.len());
    for modality in modalities {
        if !out.contains(modality) {
            out.push(*modality);
        }
    }
    out
}

fn to_evidence(
    hit: IndexHit,
    searched: Modality,
    variant: &QueryVariant,
    detected: &DetectedLanguage,
) -> EvidenceSource {
    let mut metadata = hit.metadata;

    let doc_language = metadata
        .get("language")
        .and_then(|v| v.as_str())
        .unwrap_or("en")
        .to_string();

    let mut relevance = 1.0 / (1.0 + hit.distance.max(0.0));
    if doc_language == variant.language {
        relevance *= LANGUAGE_MATCH_BOOST;
    }

    let source_file = metadata
        .get("source_file")
        .and_then(|v| v.as_str())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string();
    let modality = metadata
        .get("modality")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Modality>().ok())
        .unwrap_or(searched);
    let confidence = metadata
        .get("confidence")
        .and_then(|v| v.as_f64())
        .map(|c| c as f32)
        .unwrap_or(DEFAULT_CONFIDENCE);

    metadata.insert(
        "matched_query_language".to_string(),
        variant.language.clone().into(),
    );
    metadata.insert(
        "cross_lingual_match".to_string(),
        (variant.language != detected.code).into(),
    );

    EvidenceSource {
        source_id: hit.id,
        source_file,
        modality,
        content: hit.content,
        relevance_score: relevance,
        confidence,
        metadata,
    }
}

fn apply_keyword_boost(sources: &mut [EvidenceSource], query: &str) {
    let lowered = query.to_lowercase();
    let terms: Vec<&str> = lowered
        .split_whitespace()
        .filter(|t| t.chars().count() > 3)
        .collect();
    if terms.is_empty() {
        return;
    }

    for source in sources.iter_mut() {
        let content = source.content.to_lowercase();
        let matches = terms.iter().filter(|t| content.contains(**t)).count();
        if matches > 0 {
            let boost = (1.0 + KEYWORD_BOOST_STEP * matches as f32).min(KEYWORD_BOOST_CAP);
            source.relevance_score *= boost;
            source
                .metadata
                .insert("keyword_boost".to_string(), serde_json::json!(boost));
        }
    }
}

/// Boost sources whose file yielded evidence in more than one modality.
fn apply_cross_modal_boost(sources: &mut [EvidenceSource]) {
    let mut by_file: HashMap<&str, BTreeSet<Modality>> = HashMap::new();
    for source in sources.iter() {
        by_file
            .entry(source.source_file.as_str())
            .or_default()
            .insert(source.modality);
    }

    let boosted: HashSet<String> = by_file
        .into_iter()
        .filter(|(file, modalities)| *file != UNKNOWN_SOURCE && modalities.len() > 1)
        .map(|(file, _)| file.to_string())
        .collect();

    for source in sources.iter_mut() {
        if boosted.contains(&source.source_file) {
            source.relevance_score *= CROSS_MODAL_BOOST;
            source
                .metadata
                .insert("cross_modal_boost".to_string(), true.into());
        }
    }
}

/// Sort by relevance x confidence, drop near duplicates, keep `top_k`.
fn rerank(mut sources: Vec<EvidenceSource>, top_k: usize) -> Vec<EvidenceSource> {
    sources.sort_by(|a, b| b.weighted_score().total_cmp(&a.weighted_score()));

    let mut kept: Vec<EvidenceSource> = Vec::with_capacity(top_k.min(sources.len()));
    let mut kept_words: Vec<HashSet<String>> = Vec::new();

    for source in sources {
        if kept.len() >= top_k {
            break;
        }
        let words = word_set(&source.content);
        if kept_words
            .iter()
            .any(|other| jaccard(&words, other) > NEAR_DUPLICATE_JACCARD)
        {
            continue;
        }
        kept_words.push(words);
        kept.push(source);
    }

    kept
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
