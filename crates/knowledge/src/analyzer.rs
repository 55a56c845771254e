//! Keyword-based query planning: which modalities to search, how deep, and why.

use crate::types::Modality;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const IMAGE_KEYWORDS: &[&str] = &[
    "image",
    "picture",
    "photo",
    "diagram",
    "chart",
    "graph",
    "illustration",
    "figure",
    "visual",
    "show me",
    "look like",
];

const AUDIO_KEYWORDS: &[&str] = &[
    "audio",
    "recording",
    "said",
    "spoken",
    "transcript",
    "conversation",
    "interview",
    "speech",
    "voice",
    "meeting",
    "discuss",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "compare",
    "contrast",
    "analyze",
    "explain",
    "relationship",
    "difference",
    "similarity",
    "comprehensive",
    "detailed",
];

const COMPLEX_TOP_K: usize = 20;
const SIMPLE_TOP_K: usize = 10;
const COMPLEX_WORD_COUNT: usize = 10;

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Explanation,
    Procedural,
    Comparison,
    Causal,
    Visual,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Explanation => "explanation",
            QueryIntent::Procedural => "procedural",
            QueryIntent::Comparison => "comparison",
            QueryIntent::Causal => "causal",
            QueryIntent::Visual => "visual",
            QueryIntent::General => "general",
        }
    }
}

/// Classifies query intents. Swap in a model-backed classifier if needed.
pub trait IntentClassifier: Send + Sync {
    /// Never empty: falls back to `General`.
    fn classify(&self, query: &str) -> Vec<QueryIntent>;
}

/// Intent detection by trigger words.
#[derive(Debug, Default, Clone)]
pub struct KeywordIntentClassifier;

impl IntentClassifier for KeywordIntentClassifier {
    fn classify(&self, query: &str) -> Vec<QueryIntent> {
        let terms = Terms::new(query);
        let rules: [(QueryIntent, &[&str]); 5] = [
            (QueryIntent::Explanation, &["what", "explain", "describe"]),
            (QueryIntent::Procedural, &["how", "steps", "process"]),
            (
                QueryIntent::Comparison,
                &["compare", "difference", "versus", "vs"],
            ),
            (QueryIntent::Causal, &["why", "reason", "cause"]),
            (QueryIntent::Visual, &["image", "diagram", "picture", "show"]),
        ];

        let mut intents: Vec<QueryIntent> = rules
            .iter()
            .filter(|(_, words)| terms.any(words))
            .map(|(intent, _)| *intent)
            .collect();

        if intents.is_empty() {
            intents.push(QueryIntent::General);
        }
        intents
    }
}

/// Search plan for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Ordered, duplicate-free, never empty
    pub modalities: Vec<Modality>,
    pub top_k: usize,
    pub is_complex: bool,
    pub reasoning: String,
    pub intents: Vec<QueryIntent>,
}

/// Builds a `QueryPlan` from keyword heuristics.
#[derive(Clone)]
pub struct QueryAnalyzer {
    intents: Arc<dyn IntentClassifier>,
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(KeywordIntentClassifier))
    }
}

impl QueryAnalyzer {
    pub fn new(intents: Arc<dyn IntentClassifier>) -> Self {
        Self { intents }
    }

    pub fn analyze(&self, query: &str) -> QueryPlan {
        let terms = Terms::new(query);
        let mut modalities: Vec<Modality> = Vec::new();
        let mut reasons: Vec<&str> = Vec::new();

        let wants_image = terms.any(IMAGE_KEYWORDS);
        let wants_audio = terms.any(AUDIO_KEYWORDS);
        let wants_depth = terms.any(COMPLEX_KEYWORDS);

        if wants_image {
            modalities.push(Modality::Image);
            reasons.push("Image keywords detected");
        }
        if wants_audio {
            modalities.push(Modality::Audio);
            reasons.push("Audio keywords detected");
        }

        if !wants_image && !wants_audio && !wants_depth {
            modalities = Modality::ALL.to_vec();
            reasons.push("No specific modality detected, searching all");
        } else {
            if (modalities.is_empty() || wants_depth) && !modalities.contains(&Modality::Text) {
                modalities.insert(0, Modality::Text);
                reasons.push("Text modality included for comprehensive coverage");
            }
            if modalities.contains(&Modality::Text) && !modalities.contains(&Modality::Audio) {
                modalities.push(Modality::Audio);
                reasons.push("Audio included for transcript search");
            }
        }

        let is_complex =
            wants_depth || terms.word_count() > COMPLEX_WORD_COUNT || query.contains('?');
        let top_k = if is_complex {
            reasons.push("Complex query detected, using k=20");
            COMPLEX_TOP_K
        } else {
            reasons.push("Simple query, using k=10");
            SIMPLE_TOP_K
        };

        let plan = QueryPlan {
            modalities,
            top_k,
            is_complex,
            reasoning: reasons.join("; "),
            intents: self.intents.classify(query),
        };

        tracing::debug!(
            "Query plan: modalities={:?} top_k={} complex={}",
            plan.modalities,
            plan.top_k,
            plan.is_complex
        );

        plan
    }
}

/// Lowercased word view of a query for keyword tests.
struct Terms {
    words: Vec<String>,
    padded: String,
}

impl Terms {
    fn new(query: &str) -> Self {
        let normalized: String = query
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let words: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();
        let padded = format!(" {} ", words.join(" "));
        Self { words, padded }
    }

    fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Whole-word match, tolerating a plural suffix; phrases match as a run of words.
    fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            return self.padded.contains(&format!(" {} ", keyword));
        }
        self.words.iter().any(|word| {
            word == keyword
                || word
                    .strip_prefix(keyword)
                    .is_some_and(|rest| rest == "s" || rest == "es")
        })
    }

    fn any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.contains(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(query: &str) -> QueryPlan {
        QueryAnalyzer::default().analyze(query)
    }

    #[test]
    fn test_plain_query_searches_everything() {
        let plan = analyze("voltage rating");
        assert_eq!(plan.modalities, Modality::ALL.to_vec());
        assert_eq!(plan.top_k, 10);
        assert!(!plan.is_complex);
        assert!(plan.reasoning.contains("searching all"));
    }

    #[test]
    fn test_image_only_query() {
        let plan = analyze("wiring diagrams");
        assert_eq!(plan.modalities, vec![Modality::Image]);
        assert!(plan.reasoning.starts_with("Image keywords detected"));
    }

    #[test]
    fn test_audio_only_query() {
        let plan = analyze("meeting recording");
        assert_eq!(plan.modalities, vec![Modality::Audio]);
    }

    #[test]
    fn test_complex_query_adds_text_and_audio() {
        let plan = analyze("Compare the diagram with the manual?");
        assert_eq!(
            plan.modalities,
            vec![Modality::Text, Modality::Image, Modality::Audio]
        );
        assert!(plan.is_complex);
        assert_eq!(plan.top_k, 20);
        assert!(plan.intents.contains(&QueryIntent::Comparison));
        assert!(plan.intents.contains(&QueryIntent::Visual));
    }

    #[test]
    fn test_long_query_is_complex() {
        let plan = analyze("tell me everything you know about the voltage of this old machine today");
        assert!(plan.is_complex);
        assert_eq!(plan.top_k, 20);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "graphics" must not trigger "graph", "aid" must not trigger "said"
        let plan = analyze("graphics aid");
        assert_eq!(plan.modalities, Modality::ALL.to_vec());

        let plan = analyze("show me photos");
        assert_eq!(plan.modalities, vec![Modality::Image]);
    }

    #[test]
    fn test_modalities_are_unique_and_non_empty() {
        for query in ["", "explain", "image audio", "explain the image and audio", "?"] {
            let plan = analyze(query);
            assert!(!plan.modalities.is_empty());
            let mut unique = plan.modalities.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), plan.modalities.len(), "query {:?}", query);
        }
    }

    #[test]
    fn test_intents_fall_back_to_general() {
        assert_eq!(
            KeywordIntentClassifier.classify("voltage rating"),
            vec![QueryIntent::General]
        );
        assert_eq!(
            KeywordIntentClassifier.classify("Why does it overheat?"),
            vec![QueryIntent::Causal]
        );
        assert_eq!(
            KeywordIntentClassifier.classify("How to reset, step by step"),
            vec![QueryIntent::Procedural]
        );
    }
}
