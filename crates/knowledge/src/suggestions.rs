//! Follow-up suggestions derived from the query, the evidence and any conflict.

use crate::types::{ConflictInfo, EvidenceSource, Modality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const STOP_WORDS: &[&str] = &[
    "what", "is", "the", "a", "an", "how", "does", "can", "you", "tell", "me", "about", "explain",
];
const TOPIC_WORDS: usize = 3;
const SOURCE_NAME_CHARS: usize = 30;
const LOW_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    RelatedQuestion,
    KnowledgeGap,
    DeepDive,
    CrossModal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpSuggestion {
    pub kind: SuggestionKind,
    pub text: String,
    /// Query to run if the suggestion is picked; gaps have none
    pub query: Option<String>,
    /// 1 is most important
    pub priority: u8,
}

impl FollowUpSuggestion {
    fn question(kind: SuggestionKind, text: String, query: String, priority: u8) -> Self {
        Self {
            kind,
            text,
            query: Some(query),
            priority,
        }
    }

    fn gap(text: &str) -> Self {
        Self {
            kind: SuggestionKind::KnowledgeGap,
            text: text.to_string(),
            query: None,
            priority: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartSuggestions {
    pub related_questions: Vec<FollowUpSuggestion>,
    pub knowledge_gaps: Vec<FollowUpSuggestion>,
    pub deep_dives: Vec<FollowUpSuggestion>,
    pub cross_modal: Vec<FollowUpSuggestion>,
}

impl SmartSuggestions {
    /// Every suggestion, highest priority first.
    pub fn all(&self) -> Vec<&FollowUpSuggestion> {
        let mut all: Vec<&FollowUpSuggestion> = self
            .knowledge_gaps
            .iter()
            .chain(&self.deep_dives)
            .chain(&self.cross_modal)
            .chain(&self.related_questions)
            .collect();
        all.sort_by_key(|s| s.priority);
        all
    }

    pub fn is_empty(&self) -> bool {
        self.related_questions.is_empty()
            && self.knowledge_gaps.is_empty()
            && self.deep_dives.is_empty()
            && self.cross_modal.is_empty()
    }
}

/// Up to three content words of the query.
pub fn query_topic(query: &str) -> String {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .take(TOPIC_WORDS)
        .collect();

    if words.is_empty() {
        query.trim().to_string()
    } else {
        words.join(" ")
    }
}

pub fn suggest(
    query: &str,
    sources: &[EvidenceSource],
    conflict: Option<&ConflictInfo>,
    confidence_score: f32,
) -> SmartSuggestions {
    let mut out = SmartSuggestions::default();
    let topic = query_topic(query);
    let lowered = query.to_lowercase();
    let modalities: BTreeSet<Modality> = sources.iter().map(|s| s.modality).collect();

    for question in [
        format!("How does {} work in more detail?", topic),
        format!("What are the benefits of {}?", topic),
        format!("What are the limitations of {}?", topic),
    ] {
        out.related_questions.push(FollowUpSuggestion::question(
            SuggestionKind::RelatedQuestion,
            question.clone(),
            question,
            2,
        ));
    }

    if sources.len() < 3 {
        out.knowledge_gaps
            .push(FollowUpSuggestion::gap("Upload more documents for a complete picture"));
    }
    if !modalities.contains(&Modality::Image)
        && mentions(&lowered, &["show", "diagram", "visual", "picture", "see"])
    {
        out.knowledge_gaps
            .push(FollowUpSuggestion::gap("Upload images or diagrams for visual context"));
    }
    if !modalities.contains(&Modality::Audio)
        && mentions(&lowered, &["said", "mentioned", "discussed", "meeting", "call"])
    {
        out.knowledge_gaps
            .push(FollowUpSuggestion::gap("Upload audio recordings for spoken content"));
    }
    if confidence_score < LOW_CONFIDENCE {
        out.knowledge_gaps.push(FollowUpSuggestion::gap(
            "Add more relevant documents to improve confidence",
        ));
    }

    if let Some(info) = conflict.filter(|c| !c.perspectives.is_empty()) {
        let names: Vec<String> = info
            .perspectives
            .iter()
            .take(2)
            .map(|p| short_name(&p.source))
            .collect();
        if names.len() == 2 {
            out.deep_dives.push(FollowUpSuggestion::question(
                SuggestionKind::DeepDive,
                format!("Explain the conflict between {} and {}", names[0], names[1]),
                format!(
                    "Explain the contradiction between the sources regarding {}",
                    topic
                ),
                1,
            ));
        }
        out.deep_dives.push(FollowUpSuggestion::question(
            SuggestionKind::DeepDive,
            "Which source is more reliable for this topic?".to_string(),
            format!("Which source is more reliable regarding {}?", topic),
            2,
        ));
    }
    if !sources.is_empty() {
        out.deep_dives.push(FollowUpSuggestion::question(
            SuggestionKind::DeepDive,
            format!("Tell me more details about {}", topic),
            format!("Give me more detailed information about {}", topic),
            2,
        ));
    }

    if modalities.contains(&Modality::Image) {
        out.cross_modal.push(FollowUpSuggestion::question(
            SuggestionKind::CrossModal,
            "Related images are available, explore the visual content".to_string(),
            format!("Show me images related to {}", topic),
            1,
        ));
    }
    if modalities.contains(&Modality::Audio) {
        out.cross_modal.push(FollowUpSuggestion::question(
            SuggestionKind::CrossModal,
            "Audio content is available, explore what was said".to_string(),
            format!("What was said about {} in audio recordings?", topic),
            1,
        ));
    }
    if modalities.len() > 1 {
        let names: Vec<&str> = modalities.iter().map(Modality::as_str).collect();
        out.cross_modal.push(FollowUpSuggestion::question(
            SuggestionKind::CrossModal,
            format!("Compare information across {}", names.join(", ")),
            format!("Compare what different sources say about {}", topic),
            2,
        ));
    }

    out
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// File name without directories, bounded in length.
fn short_name(path: &str) -> String {
    let name = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
    sift_prompt::excerpt(name, SOURCE_NAME_CHARS)
}
