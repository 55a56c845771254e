use super::strategy::ResponseStrategy;
use crate::confidence::ConfidenceBreakdown;
use crate::reasoning::ReasoningChain;
use crate::suggestions::SmartSuggestions;
use crate::types::{ConfidenceLabel, ConflictInfo, EvidenceSource, Modality, WebSource};
use serde::{Deserialize, Serialize};
use sift_prompt::Persona;

/// One question for the pipeline. Unset options fall back to the query
/// analysis or the pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub query: String,
    pub session_id: Option<String>,
    pub top_k: Option<usize>,
    pub modalities: Option<Vec<Modality>>,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub enable_web_search: bool,
    /// Language code the answer must be written in
    pub target_language: Option<String>,
    pub include_reasoning_chain: Option<bool>,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.modalities = Some(modalities);
        self
    }

    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = enabled;
        self
    }

    pub fn target_language(mut self, code: impl Into<String>) -> Self {
        self.target_language = Some(code.into());
        self
    }

    pub fn reasoning_chain(mut self, include: bool) -> Self {
        self.include_reasoning_chain = Some(include);
        self
    }
}

/// What happened to the query and answer language-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationInfo {
    pub detected_language: String,
    pub detected_language_name: String,
    pub confidence: f32,
    pub needs_translation: bool,
    pub original_query: String,
    /// English form used for retrieval, when one was produced
    pub translated_query: Option<String>,
    pub forced_language: bool,
    pub target_language: String,
    pub response_translated: bool,
    pub translation_error: Option<String>,
}

/// Full result of one `answer` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub query: String,
    pub answer: String,
    pub strategy: ResponseStrategy,
    pub confidence_label: ConfidenceLabel,
    pub confidence_score: f32,
    pub confidence_reasoning: String,
    pub evidence: Vec<EvidenceSource>,
    pub conflict_info: Option<ConflictInfo>,
    pub reasoning_chain: Option<ReasoningChain>,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub suggestions: SmartSuggestions,
    pub translation_info: Option<TranslationInfo>,
    pub web_sources: Vec<WebSource>,
    pub session_id: Option<String>,
    /// Search query after follow-up resolution, if it was rewritten
    pub resolved_query: Option<String>,
    pub context_used: bool,
    pub entities_found: Vec<String>,
    pub refusal_reason: Option<String>,
    pub persona: Persona,
    pub processing_time_ms: f64,
}

impl AnswerResponse {
    pub fn is_refusal(&self) -> bool {
        self.strategy == ResponseStrategy::Refuse
    }
}
