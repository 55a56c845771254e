//! Evidence-grounded question answering.
//!
//! Retrieves text, image and audio evidence across languages, scores how far
//! it can be trusted, looks for contradictions, and picks a response strategy
//! before asking a generator for the answer. Every run leaves a reasoning
//! chain behind.
//!
//! Collaborators (vector index, embeddings, web search, translation) are
//! traits in [`services`]; the crate ships an in-memory index and a trigram
//! embedder for local use.

pub mod analyzer;
pub mod confidence;
pub mod conflict;
pub mod embeddings;
pub mod index;
pub mod language;
pub mod memory;
pub mod orchestrator;
pub mod reasoning;
pub mod retrieval;
pub mod services;
pub mod suggestions;
pub mod types;
pub mod web;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use analyzer::{IntentClassifier, KeywordIntentClassifier, QueryAnalyzer, QueryIntent, QueryPlan};
pub use confidence::{ConfidenceAssessment, ConfidenceBreakdown, ConfidenceFactor, ConfidenceScorer};
pub use conflict::{ClaimComparator, ConflictDetector, HeuristicClaimComparator};
pub use embeddings::TrigramEmbedder;
pub use index::InMemoryIndex;
pub use language::DetectedLanguage;
pub use memory::{
    ConversationContext, ConversationMemory, EntityExtractor, InMemorySessionStore,
    RegexEntityExtractor, SessionStore, TrackedEntity,
};
pub use orchestrator::{
    AnswerRequest, AnswerResponse, Orchestrator, OrchestratorBuilder, ResponseStrategy,
    TranslationInfo,
};
pub use reasoning::{ReasoningChain, ReasoningStep, ReportOutline};
pub use retrieval::{CrossModalRetriever, RetrievalSettings};
pub use services::{EmbeddingService, TranslationService, VectorIndex, WebSearchService};
pub use suggestions::SmartSuggestions;
pub use types::{ConfidenceLabel, ConflictInfo, EvidenceSource, Modality, WebSource};
