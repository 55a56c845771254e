use super::ConfidenceAssessment;
use crate::types::{ConfidenceLabel, ConflictInfo, EvidenceSource, Modality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MAX_TIPS: usize = 4;

/// One weighted factor of the breakdown. Scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub name: String,
    pub score: f32,
    pub weight: f32,
    pub description: String,
}

impl ConfidenceFactor {
    fn new(name: &str, score: f32, weight: f32, description: String) -> Self {
        Self {
            name: name.to_string(),
            score: round2(score),
            weight,
            description,
        }
    }

    pub fn contribution(&self) -> f32 {
        self.score * self.weight
    }
}

/// User-facing explanation of the confidence grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub overall_score: f32,
    pub overall_label: ConfidenceLabel,
    pub factors: Vec<ConfidenceFactor>,
    pub strongest_factor: Option<String>,
    pub weakest_factor: Option<String>,
    pub actionable_tips: Vec<String>,
}

impl ConfidenceBreakdown {
    /// Sum of weighted factor scores, in [0, 1].
    pub fn weighted_total(&self) -> f32 {
        self.factors.iter().map(ConfidenceFactor::contribution).sum()
    }
}

/// Build the five-factor breakdown. The headline score and label are the
/// scorer's, so the two views never disagree on the grade.
pub fn build_breakdown(
    sources: &[EvidenceSource],
    conflict: Option<&ConflictInfo>,
    assessment: &ConfidenceAssessment,
) -> ConfidenceBreakdown {
    let mut factors = Vec::with_capacity(5);
    let mut tips: Vec<String> = Vec::new();

    let avg_relevance = if sources.is_empty() {
        0.0
    } else {
        sources.iter().map(|s| s.relevance_score).sum::<f32>() / sources.len() as f32
    };
    let quality = (avg_relevance * 1.2).min(1.0);
    factors.push(ConfidenceFactor::new(
        "Source Quality",
        quality,
        0.3,
        format!(
            "Average relevance of {} sources: {:.0}%",
            sources.len(),
            avg_relevance * 100.0
        ),
    ));
    if quality < 0.5 {
        tips.push("Upload more relevant documents to improve source quality".to_string());
    }

    let modalities: BTreeSet<Modality> = sources.iter().map(|s| s.modality).collect();
    let modality_names: Vec<&str> = modalities.iter().map(Modality::as_str).collect();
    factors.push(ConfidenceFactor::new(
        "Multimodal Support",
        (modalities.len() as f32 / 3.0).min(1.0),
        0.2,
        format!(
            "Evidence from {} modalities: {}",
            modalities.len(),
            if modality_names.is_empty() {
                "none".to_string()
            } else {
                modality_names.join(", ")
            }
        ),
    ));
    if !modalities.contains(&Modality::Image) {
        tips.push("Upload images for visual evidence support".to_string());
    }
    if !modalities.contains(&Modality::Audio) {
        tips.push("Add audio recordings for spoken context".to_string());
    }

    let (consistency, consistency_text) = match conflict {
        None => (1.0, "No conflicts detected".to_string()),
        Some(info) => (
            (1.0 - 0.2 * info.perspectives.len() as f32).max(0.2),
            format!("Found {} conflicting perspectives", info.perspectives.len()),
        ),
    };
    factors.push(ConfidenceFactor::new(
        "Source Consistency",
        consistency,
        0.25,
        consistency_text,
    ));
    if consistency < 0.6 {
        tips.push("Conflicting information detected, review sources for accuracy".to_string());
    }

    let quantity = (sources.len() as f32 / 5.0).min(1.0);
    factors.push(ConfidenceFactor::new(
        "Evidence Quantity",
        quantity,
        0.15,
        format!("{} evidence chunks found", sources.len()),
    ));
    if quantity < 0.6 {
        tips.push("Upload more documents to increase evidence coverage".to_string());
    }

    let total_chars: usize = sources.iter().map(|s| s.content.chars().count()).sum();
    let depth = (total_chars as f32 / 2000.0).min(1.0);
    factors.push(ConfidenceFactor::new(
        "Content Depth",
        depth,
        0.1,
        format!("Total evidence content: {} characters", total_chars),
    ));
    if depth < 0.5 {
        tips.push("Documents may be too brief, consider adding detailed documentation".to_string());
    }

    tips.truncate(MAX_TIPS);

    // Stable sort keeps declaration order among equal contributions
    let mut ranked: Vec<&ConfidenceFactor> = factors.iter().collect();
    ranked.sort_by(|a, b| b.contribution().total_cmp(&a.contribution()));
    let strongest_factor = ranked.first().map(|f| f.name.clone());
    let weakest_factor = ranked.last().map(|f| f.name.clone());

    ConfidenceBreakdown {
        overall_score: round2(assessment.score),
        overall_label: assessment.label,
        factors,
        strongest_factor,
        weakest_factor,
        actionable_tips: tips,
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
