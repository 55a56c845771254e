//! The answer pipeline.
//!
//! One `answer` call walks query analysis, retrieval (with web search
//! alongside), confidence scoring, conflict detection, strategy selection,
//! generation, memory update and optional answer translation. Each stage
//! appends a step to the reasoning chain.
//!
//! Only malformed requests are errors. Every collaborator failure degrades to
//! an empty or neutral result and the call still returns a response.

mod strategy;
mod types;

pub use strategy::{select_strategy, ResponseStrategy, StrategyPlan, StrategyThresholds};
pub use types::{AnswerRequest, AnswerResponse, TranslationInfo};

use crate::analyzer::{IntentClassifier, QueryAnalyzer};
use crate::confidence::{build_breakdown, ConfidenceScorer};
use crate::conflict::{ClaimComparator, ConflictDetector};
use crate::language::{detect_language, language_name, DetectedLanguage};
use crate::memory::{
    needs_resolution, resolve_references, ConversationMemory, EntityExtractor,
    InMemorySessionStore, RegexEntityExtractor, Role, SessionStore,
};
use crate::reasoning::{ChainRecorder, StepDraft, StepStatus, StepType};
use crate::retrieval::{CrossModalRetriever, RetrievalSettings};
use crate::services::{EmbeddingService, TranslationService, VectorIndex, WebSearchService};
use crate::suggestions::suggest;
use crate::types::{ConflictInfo, EvidenceSource, Modality, WebSource};
use crate::web::rank_web_sources;
use sift_core::{AppError, AppResult, PipelineConfig};
use sift_llm::TextGenerator;
use sift_prompt::{
    build_answer_prompt, excerpt, render_refusal, AnswerPromptInput, EvidenceItem, PerspectiveItem,
    PromptMode, WebItem,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::Instrument;

const TRANSLATION_CONFIDENCE: f32 = 0.5;
const REASONING_SOURCES: usize = 5;
const ENTITY_SOURCES: usize = 3;
const REPORTED_ENTITIES: usize = 5;
const TOPIC_WORDS: usize = 3;
const TOPIC_MIN_CHARS: usize = 4;
const ASSISTANT_MESSAGE_CHARS: usize = 500;
const FALLBACK_REFUSAL: &str =
    "I cannot answer this query confidently due to insufficient evidence.";

/// Collaborators and settings for an `Orchestrator`.
pub struct OrchestratorBuilder {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingService>,
    generator: Arc<dyn TextGenerator>,
    web: Option<Arc<dyn WebSearchService>>,
    translator: Option<Arc<dyn TranslationService>>,
    sessions: Option<Arc<dyn SessionStore>>,
    entities: Option<Arc<dyn EntityExtractor>>,
    intents: Option<Arc<dyn IntentClassifier>>,
    comparator: Option<Arc<dyn ClaimComparator>>,
    config: PipelineConfig,
}

impl OrchestratorBuilder {
    pub fn with_web_search(mut self, web: Arc<dyn WebSearchService>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn TranslationService>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn with_entity_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.entities = Some(extractor);
        self
    }

    pub fn with_intent_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.intents = Some(classifier);
        self
    }

    pub fn with_claim_comparator(mut self, comparator: Arc<dyn ClaimComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn with_settings(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Orchestrator {
        let config = self.config;

        let analyzer = match self.intents {
            Some(classifier) => QueryAnalyzer::new(classifier),
            None => QueryAnalyzer::default(),
        };

        let mut retriever = CrossModalRetriever::new(
            self.index,
            Arc::clone(&self.embedder),
            RetrievalSettings::from_config(&config),
        )
        .with_analyzer(analyzer.clone());
        if let Some(translator) = &self.translator {
            retriever = retriever.with_translator(Arc::clone(translator));
        }

        let mut conflicts = ConflictDetector::new(self.embedder);
        if let Some(comparator) = self.comparator {
            conflicts = conflicts.with_comparator(comparator);
        }

        let sessions: Arc<dyn SessionStore> = match self.sessions {
            Some(store) => store,
            None => Arc::new(InMemorySessionStore::new(
                config.max_messages,
                config.max_entities,
            )),
        };
        let entities: Arc<dyn EntityExtractor> = match self.entities {
            Some(extractor) => extractor,
            None => Arc::new(RegexEntityExtractor),
        };

        Orchestrator {
            analyzer,
            retriever,
            scorer: ConfidenceScorer::from_config(&config),
            conflicts,
            memory: ConversationMemory::new(sessions, entities),
            generator: self.generator,
            web: self.web,
            translator: self.translator,
            config,
        }
    }
}

/// Runs the full evidence-to-answer pipeline.
pub struct Orchestrator {
    analyzer: QueryAnalyzer,
    retriever: CrossModalRetriever,
    scorer: ConfidenceScorer,
    conflicts: ConflictDetector,
    memory: ConversationMemory,
    generator: Arc<dyn TextGenerator>,
    web: Option<Arc<dyn WebSearchService>>,
    translator: Option<Arc<dyn TranslationService>>,
    config: PipelineConfig,
}

/// Language handling decided before retrieval.
struct LanguagePlan {
    detected: DetectedLanguage,
    needs_translation: bool,
    search_query: String,
    /// Translate the generated answer back to the detected language
    translate_back: bool,
    response_language: Option<String>,
    info: Option<TranslationInfo>,
}

impl Orchestrator {
    pub fn builder(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
        generator: Arc<dyn TextGenerator>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            index,
            embedder,
            generator,
            web: None,
            translator: None,
            sessions: None,
            entities: None,
            intents: None,
            comparator: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer one question.
    ///
    /// Fails only with `AppError::InvalidInput`, before any collaborator is called.
    pub async fn answer(&self, request: AnswerRequest) -> AppResult<AnswerResponse> {
        validate(&request)?;

        let span = tracing::info_span!(
            "answer",
            session = request.session_id.as_deref().unwrap_or("-")
        );
        Ok(self.run(request).instrument(span).await)
    }

    async fn run(&self, request: AnswerRequest) -> AnswerResponse {
        let started = Instant::now();
        let mut chain = ChainRecorder::new();
        let query = request.query.trim().to_string();
        let persona = request.persona;

        tracing::info!("Answering '{}' as {}", excerpt(&query, 80), persona);

        let mut language = self
            .plan_language(&query, request.target_language.as_deref())
            .await;

        // Held until the end of the run so queries on one session are serialized
        let mut session = match &request.session_id {
            Some(id) => Some(self.memory.get_or_create_session(id).await.lock_owned().await),
            None => None,
        };

        let mut search_query = language.search_query.clone();
        let mut context_used = false;
        if let Some(context) = session.as_deref() {
            if needs_resolution(&search_query) {
                let (resolved, modified) = resolve_references(context, &search_query);
                if modified {
                    search_query = resolved;
                    context_used = true;
                }
            }
        }

        // Query analysis
        let step = Instant::now();
        let plan = self.analyzer.analyze(&search_query);
        let top_k = request.top_k.unwrap_or(plan.top_k);
        let modalities: Vec<Modality> = request
            .modalities
            .clone()
            .unwrap_or_else(|| plan.modalities.clone());
        chain.record(
            StepDraft::new(StepType::QueryAnalysis, "Query Analysis", plan.reasoning.clone())
                .detail("original_query", query.clone())
                .detail("search_query", search_query.clone())
                .detail("reference_resolved", context_used)
                .detail(
                    "intents",
                    plan.intents.iter().map(|i| i.as_str()).collect::<Vec<_>>(),
                )
                .detail("modalities", modality_names(&modalities))
                .detail("top_k", top_k)
                .detail("is_complex", plan.is_complex)
                .detail("detected_language", language.detected.code.clone())
                .detail("needs_translation", language.needs_translation),
            step,
        );

        // Retrieval with web search alongside
        let step = Instant::now();
        let (outcome, web) = tokio::join!(
            self.retriever
                .retrieve_with_report(&search_query, Some(top_k), Some(modalities.as_slice())),
            self.search_web(&search_query, request.enable_web_search),
        );
        let sources = outcome.sources;

        let retrieval_status = if outcome.failed_searches > 0 {
            StepStatus::Warning
        } else {
            StepStatus::Completed
        };
        chain.record(
            StepDraft::new(
                StepType::Retrieval,
                "Cross-Modal Retrieval",
                format!(
                    "Retrieved {} sources from {} candidates",
                    sources.len(),
                    outcome.candidates
                ),
            )
            .detail(
                "query_variants",
                outcome
                    .variants
                    .iter()
                    .map(|v| format!("[{}] {}", v.language, v.text))
                    .collect::<Vec<_>>(),
            )
            .detail("modalities", modality_names(&outcome.modalities))
            .detail("top_k", outcome.top_k)
            .detail("candidates", outcome.candidates)
            .detail("failed_searches", outcome.failed_searches)
            .sources(sources.iter().take(REASONING_SOURCES))
            .status(retrieval_status),
            step,
        );

        let web_sources = match web {
            Some(result) => {
                let (web_sources, status, description) = match result {
                    Ok(hits) => {
                        let description = format!("Found {} web results", hits.len());
                        (hits, StepStatus::Completed, description)
                    }
                    Err(e) => (Vec::new(), StepStatus::Warning, e),
                };
                chain.record(
                    StepDraft::new(StepType::WebSearch, "Web Search", description)
                        .detail("results", web_sources.len())
                        .detail(
                            "sources",
                            web_sources
                                .iter()
                                .map(|w| w.source_name.clone())
                                .collect::<Vec<_>>(),
                        )
                        .status(status),
                    step,
                );
                web_sources
            }
            None => Vec::new(),
        };

        // Confidence
        let step = Instant::now();
        let assessment = self.scorer.score(&sources);
        let confidence_status = if assessment.score < self.config.refuse_threshold {
            StepStatus::Error
        } else if assessment.score < self.config.confidence_threshold {
            StepStatus::Warning
        } else {
            StepStatus::Completed
        };
        chain.record(
            StepDraft::new(
                StepType::ConfidenceAssessment,
                "Confidence Assessment",
                assessment.reasoning.clone(),
            )
            .detail("score", assessment.score)
            .detail("label", assessment.label.as_str())
            .detail("threshold", self.config.confidence_threshold)
            .sources(sources.iter().take(REASONING_SOURCES))
            .status(confidence_status),
            step,
        );
        chain.insight(format!(
            "Confidence is {} ({:.2}) from {} sources",
            assessment.label,
            assessment.score,
            sources.len()
        ));

        // Conflicts
        let step = Instant::now();
        let conflict = self.conflicts.detect(&sources).await;
        let conflict_draft = match &conflict {
            Some(info) => {
                chain.insight(format!(
                    "{} involving {} sources",
                    info.description,
                    info.conflicting_source_ids.len()
                ));
                StepDraft::new(
                    StepType::ConflictDetection,
                    "Conflict Detection",
                    info.description.clone(),
                )
                .detail("conflicting_source_ids", info.conflicting_source_ids.clone())
                .detail("pairs", info.pairs.len())
                .sources(
                    sources
                        .iter()
                        .filter(|s| info.conflicting_source_ids.contains(&s.source_id)),
                )
                .status(StepStatus::Warning)
            }
            None => StepDraft::new(
                StepType::ConflictDetection,
                "Conflict Detection",
                "No contradictions detected between sources",
            )
            .detail("pairs", 0),
        };
        chain.record(conflict_draft, step);

        // Strategy
        let step = Instant::now();
        let strategy = select_strategy(
            assessment.score,
            conflict.is_some(),
            persona,
            StrategyThresholds {
                refuse: self.config.refuse_threshold,
                cautious: self.config.confidence_threshold,
            },
        );
        chain.record(
            StepDraft::new(
                StepType::ResponseStrategy,
                "Response Strategy",
                strategy.reason.clone(),
            )
            .detail("strategy", strategy.strategy.as_str())
            .detail("persona", persona.as_str())
            .detail("max_tokens", strategy.max_tokens)
            .detail("temperature", strategy.temperature),
            step,
        );
        chain.insight(format!("Selected {} strategy", strategy.strategy));

        // Generation
        let step = Instant::now();
        let mut refusal_reason = None;
        let (mut answer, generation_draft) = match strategy.strategy.prompt_mode() {
            None => {
                let gaps = self.scorer.identify_gaps(&sources, &search_query);
                let text = render_refusal(&gaps).unwrap_or_else(|e| {
                    tracing::warn!("Refusal template failed: {}", e);
                    FALLBACK_REFUSAL.to_string()
                });
                refusal_reason = Some(strategy.reason.clone());
                let draft = StepDraft::new(
                    StepType::Generation,
                    "Refusal",
                    "Evidence too weak to answer; listed the gaps instead",
                )
                .detail("gaps", gaps);
                (text, draft)
            }
            Some(mode) => {
                let input = AnswerPromptInput {
                    query: search_query.clone(),
                    persona,
                    mode,
                    evidence: evidence_items(&sources),
                    perspectives: perspective_items(conflict.as_ref()),
                    web: web_items(&web_sources),
                    response_language: language.response_language.clone(),
                };
                match self.generate(&input, &strategy).await {
                    Ok(text) => {
                        let draft = StepDraft::new(
                            StepType::Generation,
                            "Answer Generation",
                            format!("Generated a {} answer", prompt_mode_name(mode)),
                        )
                        .detail("answer_chars", text.chars().count())
                        .detail("max_tokens", strategy.max_tokens)
                        .sources(sources.iter().take(REASONING_SOURCES));
                        (text, draft)
                    }
                    Err(e) => {
                        tracing::warn!("Generation failed: {}", e);
                        let draft = StepDraft::new(
                            StepType::Generation,
                            "Answer Generation",
                            "Every generation back-end failed",
                        )
                        .detail("error", e.to_string())
                        .status(StepStatus::Error);
                        (format!("Error: Unable to generate response. {}", e), draft)
                    }
                }
            }
        };
        chain.record(generation_draft, step);

        // Memory
        let mut entities_found = Vec::new();
        if let Some(context) = session.as_deref_mut() {
            let step = Instant::now();
            let mut text = answer.clone();
            for source in sources.iter().take(ENTITY_SOURCES) {
                text.push('\n');
                text.push_str(&source.content);
            }
            let entities = self.memory.extract_entities(&text, &query);
            let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
            entities_found = names.iter().take(REPORTED_ENTITIES).cloned().collect();

            context.update_entities(entities, &query);
            let topic = topic_of(&query);
            if let Some(topic) = &topic {
                context.set_current_topic(topic.as_str());
            }
            context.add_message(Role::User, query.as_str(), Vec::new());
            context.add_message(
                Role::Assistant,
                excerpt(&answer, ASSISTANT_MESSAGE_CHARS),
                names,
            );

            chain.record(
                StepDraft::new(
                    StepType::MemoryUpdate,
                    "Memory Update",
                    format!("Tracked {} entities", context.entities.len()),
                )
                .detail("session_id", context.session_id.clone())
                .detail("entities_found", entities_found.clone())
                .detail("messages", context.messages.len())
                .detail("topic", topic.unwrap_or_default()),
                step,
            );
        }

        // Answer translation
        if language.translate_back {
            let step = Instant::now();
            let target = language.detected.code.clone();
            let draft = match self.translate_answer(&answer, &target).await {
                Ok(translated) => {
                    answer = translated;
                    if let Some(info) = language.info.as_mut() {
                        info.response_translated = true;
                    }
                    StepDraft::new(
                        StepType::Translation,
                        "Answer Translation",
                        format!("Translated the answer to {}", language_name(&target)),
                    )
                }
                Err(e) => {
                    tracing::warn!("Answer translation failed: {}", e);
                    if let Some(info) = language.info.as_mut() {
                        info.translation_error = Some(e.clone());
                    }
                    StepDraft::new(
                        StepType::Translation,
                        "Answer Translation",
                        "Answer left in English",
                    )
                    .detail("error", e)
                    .status(StepStatus::Warning)
                }
            };
            chain.record(draft.detail("target_language", target), step);
        }

        let include_chain = request
            .include_reasoning_chain
            .unwrap_or(self.config.include_reasoning_chain);
        let reasoning_chain = chain.finish(&query, strategy.strategy.final_decision());

        let suggestions = suggest(&search_query, &sources, conflict.as_ref(), assessment.score);
        let confidence_breakdown = build_breakdown(&sources, conflict.as_ref(), &assessment);

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            "Answered with {} in {:.0}ms ({} confidence)",
            strategy.strategy,
            processing_time_ms,
            assessment.label
        );

        AnswerResponse {
            query,
            answer,
            strategy: strategy.strategy,
            confidence_label: assessment.label,
            confidence_score: assessment.score,
            confidence_reasoning: assessment.reasoning,
            evidence: sources,
            conflict_info: conflict,
            reasoning_chain: include_chain.then_some(reasoning_chain),
            confidence_breakdown,
            suggestions,
            translation_info: language.info,
            web_sources,
            session_id: request.session_id,
            resolved_query: context_used.then_some(search_query),
            context_used,
            entities_found,
            refusal_reason,
            persona,
            processing_time_ms,
        }
    }

    /// Detect the query language and produce the English search query.
    async fn plan_language(&self, query: &str, target: Option<&str>) -> LanguagePlan {
        let detected = match &self.translator {
            Some(translator) => translator.detect_language(query),
            None => detect_language(query),
        };
        let needs_translation =
            !detected.is_english() && detected.confidence > TRANSLATION_CONFIDENCE;
        let forced = target.is_some();

        let mut search_query = query.to_string();
        let mut translated_query = None;
        let mut translation_error = None;

        if needs_translation {
            match &self.translator {
                Some(translator) => {
                    match timeout(
                        self.translation_timeout(),
                        translator.translate(query, &detected.code, "en"),
                    )
                    .await
                    {
                        Ok(Ok(Some(text))) if !text.trim().is_empty() => {
                            search_query = text.clone();
                            translated_query = Some(text);
                        }
                        Ok(Ok(_)) => {
                            translation_error = Some("No translation available".to_string())
                        }
                        Ok(Err(e)) => translation_error = Some(e.to_string()),
                        Err(_) => translation_error = Some("Query translation timed out".to_string()),
                    }
                }
                None => translation_error = Some("No translation service configured".to_string()),
            }
            if let Some(e) = &translation_error {
                tracing::warn!("Searching with the untranslated query: {}", e);
            }
        }

        let translate_back = needs_translation && !forced && translated_query.is_some();
        let response_language = match target {
            Some(code) => Some(language_name(code)),
            None if needs_translation && !translate_back => Some(language_name(&detected.code)),
            None => None,
        };

        let info = (needs_translation || forced).then(|| TranslationInfo {
            detected_language: detected.code.clone(),
            detected_language_name: language_name(&detected.code),
            confidence: detected.confidence,
            needs_translation,
            original_query: query.to_string(),
            translated_query,
            forced_language: forced,
            target_language: target
                .map(str::to_string)
                .unwrap_or_else(|| detected.code.clone()),
            response_translated: false,
            translation_error,
        });

        LanguagePlan {
            detected,
            needs_translation,
            search_query,
            translate_back,
            response_language,
            info,
        }
    }

    /// `None` when web search was not requested. Failures come back as `Err`
    /// messages and mean no web sources.
    async fn search_web(&self, query: &str, enabled: bool) -> Option<Result<Vec<WebSource>, String>> {
        if !enabled {
            return None;
        }
        let Some(web) = &self.web else {
            return Some(Err("No web search service configured".to_string()));
        };

        let limit = self.config.web_results_count;
        let wait = Duration::from_millis(self.config.web_search_timeout_ms);
        let result = match timeout(wait, web.search(query, limit)).await {
            Ok(Ok(hits)) => Ok(rank_web_sources(hits, limit)),
            Ok(Err(e)) => Err(format!("Web search failed: {}", e)),
            Err(_) => Err(format!(
                "Web search timed out after {}ms",
                self.config.web_search_timeout_ms
            )),
        };

        if let Err(e) = &result {
            tracing::warn!("{}; continuing without web sources", e);
        }
        Some(result)
    }

    async fn generate(&self, input: &AnswerPromptInput, plan: &StrategyPlan) -> AppResult<String> {
        let prompt = build_answer_prompt(input)?;
        // Deadlines are per back-end inside the generator's fallback chain
        self.generator
            .generate(&prompt.user, plan.temperature, plan.max_tokens)
            .await
    }

    async fn translate_answer(&self, answer: &str, target: &str) -> Result<String, String> {
        let Some(translator) = &self.translator else {
            return Err("No translation service configured".to_string());
        };
        match timeout(
            self.translation_timeout(),
            translator.translate(answer, "en", target),
        )
        .await
        {
            Ok(Ok(Some(text))) if !text.trim().is_empty() => Ok(text),
            Ok(Ok(_)) => Err("No translation available".to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("Answer translation timed out".to_string()),
        }
    }

    fn translation_timeout(&self) -> Duration {
        Duration::from_millis(self.config.translation_timeout_ms)
    }
}

fn validate(request: &AnswerRequest) -> AppResult<()> {
    if request.query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query must not be empty".to_string()));
    }
    if request.modalities.as_ref().is_some_and(|m| m.is_empty()) {
        return Err(AppError::InvalidInput(
            "Modality filter must name at least one modality".to_string(),
        ));
    }
    if request.top_k == Some(0) {
        return Err(AppError::InvalidInput(
            "top_k must be at least 1".to_string(),
        ));
    }
    if request
        .session_id
        .as_deref()
        .is_some_and(|id| id.trim().is_empty())
    {
        return Err(AppError::InvalidInput(
            "Session id must not be empty".to_string(),
        ));
    }
    if request
        .target_language
        .as_deref()
        .is_some_and(|code| code.trim().is_empty())
    {
        return Err(AppError::InvalidInput(
            "Target language must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// First few long words of the query.
fn topic_of(query: &str) -> Option<String> {
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|w| w.chars().count() > TOPIC_MIN_CHARS)
        .take(TOPIC_WORDS)
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn modality_names(modalities: &[Modality]) -> Vec<&'static str> {
    modalities.iter().map(Modality::as_str).collect()
}

fn prompt_mode_name(mode: PromptMode) -> &'static str {
    match mode {
        PromptMode::Confident => "confident",
        PromptMode::Cautious => "cautious",
        PromptMode::Conflict => "balanced",
    }
}

fn evidence_items(sources: &[EvidenceSource]) -> Vec<EvidenceItem> {
    sources
        .iter()
        .map(|s| EvidenceItem {
            source: s.source_file.clone(),
            text: s.content.clone(),
        })
        .collect()
}

fn perspective_items(conflict: Option<&ConflictInfo>) -> Vec<PerspectiveItem> {
    conflict
        .map(|info| {
            info.perspectives
                .iter()
                .map(|p| PerspectiveItem {
                    source: p.source.clone(),
                    claim: p.claim.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn web_items(web: &[WebSource]) -> Vec<WebItem> {
    web.iter()
        .map(|w| WebItem {
            name: w.source_name.clone(),
            title: w.title.clone(),
            snippet: w.snippet.clone(),
        })
        .collect()
}
