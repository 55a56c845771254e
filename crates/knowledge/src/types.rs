//! Per-query data model shared by the pipeline stages.

use serde::{Deserialize, Serialize};
use sift_core::AppError;
use std::fmt;
use std::str::FromStr;

/// Free-form metadata attached to indexed units.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Content class of an indexed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Image, Modality::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            other => Err(AppError::InvalidInput(format!(
                "Unknown modality '{}'. Expected text, image or audio",
                other
            ))),
        }
    }
}

/// One retrieved unit of evidence.
///
/// Built fresh for every query by the retriever and handed out by value;
/// later stages only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub source_id: String,
    pub source_file: String,
    pub modality: Modality,
    pub content: String,
    /// Similarity after boosts; may exceed 1.0 once boosted
    pub relevance_score: f32,
    /// Ingestion-time quality estimate in [0, 1]
    pub confidence: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl EvidenceSource {
    /// Ranking key used by the retriever.
    pub fn weighted_score(&self) -> f32 {
        self.relevance_score * self.confidence
    }

    /// Short citation for reasoning steps.
    pub fn reference(&self) -> SourceReference {
        SourceReference {
            source_id: self.source_id.clone(),
            source_file: self.source_file.clone(),
            modality: self.modality,
            relevance_score: self.relevance_score,
            snippet: sift_prompt::excerpt(&self.content, SNIPPET_CHARS),
        }
    }
}

const SNIPPET_CHARS: usize = 200;

/// Citation of an evidence item inside a reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub source_id: String,
    pub source_file: String,
    pub modality: Modality,
    pub relevance_score: f32,
    pub snippet: String,
}

/// Qualitative confidence grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    None,
    Low,
    Medium,
    High,
}

impl ConfidenceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLabel::None => "None",
            ConfidenceLabel::Low => "Low",
            ConfidenceLabel::Medium => "Medium",
            ConfidenceLabel::High => "High",
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a detected contradiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    /// Source file the claim came from
    pub source: String,
    pub source_id: String,
    pub claim: String,
}

/// A pair of sources whose closest claims contradict each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPair {
    pub source_a: String,
    pub source_b: String,
    pub claim_a: String,
    pub claim_b: String,
    pub similarity: f32,
}

impl ConflictPair {
    /// Order-independent identity of the pair.
    pub fn key(&self) -> (String, String) {
        if self.source_a <= self.source_b {
            (self.source_a.clone(), self.source_b.clone())
        } else {
            (self.source_b.clone(), self.source_a.clone())
        }
    }
}

/// Every contradiction found for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// Sorted union of the source ids involved in any pair
    pub conflicting_source_ids: Vec<String>,
    pub description: String,
    pub perspectives: Vec<Perspective>,
    pub pairs: Vec<ConflictPair>,
}

/// A web search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSource {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Publisher label, e.g. "Wikipedia"
    pub source_name: String,
    pub credibility: f32,
    pub relevance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_parsing() {
        assert_eq!("Image".parse::<Modality>().unwrap(), Modality::Image);
        assert!(matches!(
            "video".parse::<Modality>(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reference_snippet_is_bounded() {
        let source = EvidenceSource {
            source_id: "a".to_string(),
            source_file: "a.txt".to_string(),
            modality: Modality::Text,
            content: "é".repeat(300),
            relevance_score: 0.8,
            confidence: 0.5,
            metadata: Metadata::new(),
        };
        assert_eq!(source.reference().snippet.chars().count(), 200);
        assert!((source.weighted_score() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_conflict_pair_key_is_symmetric() {
        let pair = ConflictPair {
            source_a: "z".to_string(),
            source_b: "a".to_string(),
            claim_a: String::new(),
            claim_b: String::new(),
            similarity: 0.9,
        };
        assert_eq!(pair.key(), ("a".to_string(), "z".to_string()));
    }

    #[test]
    fn test_label_ordering() {
        assert!(ConfidenceLabel::None < ConfidenceLabel::Low);
        assert!(ConfidenceLabel::Medium < ConfidenceLabel::High);
    }
}
