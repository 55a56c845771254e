//! Evidence grading.
//!
//! `ConfidenceScorer` produces the score that drives strategy selection;
//! `breakdown` explains it to the user with a separate weighted-factor view.

mod breakdown;

pub use breakdown::{build_breakdown, ConfidenceBreakdown, ConfidenceFactor};

use crate::types::{ConfidenceLabel, EvidenceSource, Modality};
use serde::{Deserialize, Serialize};
use sift_core::PipelineConfig;
use std::collections::HashSet;

const CROSS_MODAL_STEP: f32 = 0.1;
const CROSS_MODAL_CAP: f32 = 0.2;
const DIVERSITY_STEP: f32 = 0.05;
const DIVERSITY_CAP: f32 = 0.15;
const LOW_RELEVANCE: f32 = 0.5;
const MIN_COVERAGE: usize = 3;

const IMAGE_HINTS: &[&str] = &["image", "diagram", "picture", "photo"];
const AUDIO_HINTS: &[&str] = &["audio", "recording", "meeting", "said"];

/// Score, label and a one-line explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub score: f32,
    pub label: ConfidenceLabel,
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    threshold: f32,
    high: f32,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl ConfidenceScorer {
    pub fn new(threshold: f32, high: f32) -> Self {
        Self { threshold, high }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.confidence_threshold, config.high_confidence)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn score(&self, sources: &[EvidenceSource]) -> ConfidenceAssessment {
        if sources.is_empty() {
            return ConfidenceAssessment {
                score: 0.0,
                label: ConfidenceLabel::None,
                reasoning: "no evidence".to_string(),
            };
        }

        let n = sources.len() as f32;
        let avg_relevance = sources.iter().map(|s| s.relevance_score).sum::<f32>() / n;
        let avg_confidence = sources.iter().map(|s| s.confidence).sum::<f32>() / n;

        let modalities: HashSet<Modality> = sources.iter().map(|s| s.modality).collect();
        let files: HashSet<&str> = sources.iter().map(|s| s.source_file.as_str()).collect();

        let cross_modal_bonus =
            (CROSS_MODAL_STEP * (modalities.len() as f32 - 1.0)).min(CROSS_MODAL_CAP);
        let diversity_bonus = (DIVERSITY_STEP * files.len() as f32).min(DIVERSITY_CAP);

        let base = 0.5 * avg_relevance + 0.5 * avg_confidence;
        let score = (base + cross_modal_bonus + diversity_bonus).clamp(0.0, 1.0);

        let mut parts = vec![
            format!("Avg relevance: {:.2}", avg_relevance),
            format!("Avg source quality: {:.2}", avg_confidence),
            format!("Unique sources: {}", files.len()),
            format!("Modalities: {}", modalities.len()),
        ];
        if cross_modal_bonus > 0.0 {
            parts.push(format!("Cross-modal bonus: +{:.2}", cross_modal_bonus));
        }

        let assessment = ConfidenceAssessment {
            score,
            label: self.label_for(score),
            reasoning: parts.join("; "),
        };

        tracing::info!(
            "Confidence {:.3} ({}) from {} sources",
            assessment.score,
            assessment.label,
            sources.len()
        );

        assessment
    }

    /// Label for a score of non-empty evidence.
    pub fn label_for(&self, score: f32) -> ConfidenceLabel {
        if score >= self.high {
            ConfidenceLabel::High
        } else if score >= self.threshold {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }

    /// Human-readable reasons the evidence falls short.
    pub fn identify_gaps(&self, sources: &[EvidenceSource], query: &str) -> Vec<String> {
        if sources.is_empty() {
            return vec!["No relevant sources found".to_string()];
        }

        let mut gaps = Vec::new();

        if sources.iter().all(|s| s.relevance_score < LOW_RELEVANCE) {
            gaps.push("Retrieved sources have low relevance to query".to_string());
        }

        let query = query.to_lowercase();
        let has = |modality: Modality| sources.iter().any(|s| s.modality == modality);

        if IMAGE_HINTS.iter().any(|kw| query.contains(kw)) && !has(Modality::Image) {
            gaps.push("No image sources found despite query suggestion".to_string());
        }
        if AUDIO_HINTS.iter().any(|kw| query.contains(kw)) && !has(Modality::Audio) {
            gaps.push("No audio sources found despite query suggestion".to_string());
        }

        if sources.len() < MIN_COVERAGE {
            gaps.push(format!(
                "Only {} source(s) found, insufficient coverage",
                sources.len()
            ));
        }

        gaps
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Metadata;

    pub(crate) fn source(
        id: &str,
        file: &str,
        modality: Modality,
        relevance: f32,
        confidence: f32,
    ) -> EvidenceSource {
        EvidenceSource {
            source_id: id.to_string(),
            source_file: file.to_string(),
            modality,
            content: format!("content of {}", id),
            relevance_score: relevance,
            confidence,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_empty_evidence() {
        let assessment = ConfidenceScorer::default().score(&[]);
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.label, ConfidenceLabel::None);
        assert_eq!(assessment.reasoning, "no evidence");
    }

    #[test]
    fn test_score_formula() {
        let sources = vec![
            source("a", "manual.pdf", Modality::Text, 0.6, 0.8),
            source("b", "label.jpg", Modality::Image, 0.4, 0.6),
        ];
        let scorer = ConfidenceScorer::default();
        let assessment = scorer.score(&sources);

        // base 0.5*0.5 + 0.5*0.7 = 0.6, cross-modal 0.1, diversity 0.1
        assert!((assessment.score - 0.8).abs() < 1e-5);
        assert_eq!(assessment.label, scorer.label_for(assessment.score));
        assert!(assessment.reasoning.contains("Unique sources: 2"));
        assert!(assessment.reasoning.contains("Cross-modal bonus: +0.10"));
    }

    #[test]
    fn test_score_is_capped() {
        let sources: Vec<EvidenceSource> = (0..5)
            .map(|i| {
                source(
                    &i.to_string(),
                    &format!("f{}", i),
                    Modality::ALL[i % 3],
                    2.0,
                    1.0,
                )
            })
            .collect();
        assert_eq!(ConfidenceScorer::default().score(&sources).score, 1.0);
    }

    #[test]
    fn test_labels_follow_threshold() {
        let scorer = ConfidenceScorer::new(0.35, 0.8);
        assert_eq!(scorer.label_for(0.34), ConfidenceLabel::Low);
        assert_eq!(scorer.label_for(0.35), ConfidenceLabel::Medium);
        assert_eq!(scorer.label_for(0.8), ConfidenceLabel::High);
    }

    #[test]
    fn test_monotonic_in_relevance() {
        let scorer = ConfidenceScorer::default();
        let mut last = 0.0;
        for step in 0..10 {
            let relevance = step as f32 * 0.1;
            let sources = vec![
                source("a", "a.txt", Modality::Text, relevance, 0.5),
                source("b", "b.txt", Modality::Text, relevance, 0.5),
            ];
            let score = scorer.score(&sources).score;
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn test_gaps() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(
            scorer.identify_gaps(&[], "anything"),
            vec!["No relevant sources found"]
        );

        let weak = vec![source("a", "a.txt", Modality::Text, 0.2, 0.9)];
        let gaps = scorer.identify_gaps(&weak, "Show the wiring diagram from the meeting");
        assert_eq!(
            gaps,
            vec![
                "Retrieved sources have low relevance to query",
                "No image sources found despite query suggestion",
                "No audio sources found despite query suggestion",
                "Only 1 source(s) found, insufficient coverage",
            ]
        );

        let strong: Vec<EvidenceSource> = (0..3)
            .map(|i| source(&i.to_string(), "a.txt", Modality::Text, 0.9, 0.9))
            .collect();
        assert!(scorer.identify_gaps(&strong, "voltage").is_empty());
    }
}
