//! Contradiction detection between retrieved sources.
//!
//! Each source contributes a few sentence-level claims. For every pair of
//! sources the closest pair of claims is compared; a comparator decides
//! whether two topically close claims contradict.

use crate::embeddings::cosine_similarity;
use crate::services::EmbeddingService;
use crate::types::{ConflictInfo, ConflictPair, EvidenceSource, Modality, Perspective};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

const MAX_CLAIMS_PER_SOURCE: usize = 3;
const MIN_CLAIM_WORDS: usize = 3;
const TOPICAL_SIMILARITY: f32 = 0.5;
const NEAR_IDENTICAL_SIMILARITY: f32 = 0.95;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence regex is valid"));
static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(not|no|never|neither|contradicts?|disproves?|refutes?|instead|however|but)\b",
    )
    .expect("negation regex is valid")
});
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex is valid"));

/// Splits text into claims and judges whether two claims contradict.
pub trait ClaimComparator: Send + Sync {
    fn extract_claims(&self, text: &str) -> Vec<String>;

    /// Called only for claim pairs already judged on-topic.
    fn contradicts(&self, claim_a: &str, claim_b: &str, similarity: f32) -> bool;
}

/// Negation-asymmetry and differing-number heuristics.
///
/// Flags topically similar sentences that differ only in tone ("is not
/// recommended" vs "is recommended for experts"); callers treat the result
/// as a hint.
#[derive(Debug, Default, Clone)]
pub struct HeuristicClaimComparator;

impl ClaimComparator for HeuristicClaimComparator {
    fn extract_claims(&self, text: &str) -> Vec<String> {
        SENTENCE_END
            .split(text)
            .map(str::trim)
            .filter(|s| s.split_whitespace().count() >= MIN_CLAIM_WORDS)
            .take(MAX_CLAIMS_PER_SOURCE)
            .map(str::to_string)
            .collect()
    }

    fn contradicts(&self, claim_a: &str, claim_b: &str, similarity: f32) -> bool {
        let negation_mismatch = NEGATION.is_match(claim_a) != NEGATION.is_match(claim_b);
        if negation_mismatch && similarity < NEAR_IDENTICAL_SIMILARITY {
            return true;
        }

        let numbers_a = numbers(claim_a);
        let numbers_b = numbers(claim_b);
        !numbers_a.is_empty() && !numbers_b.is_empty() && numbers_a != numbers_b
    }
}

fn numbers(text: &str) -> BTreeSet<&str> {
    NUMBER.find_iter(text).map(|m| m.as_str()).collect()
}

pub struct ConflictDetector {
    embedder: Arc<dyn EmbeddingService>,
    comparator: Arc<dyn ClaimComparator>,
}

struct SourceClaims<'a> {
    source: &'a EvidenceSource,
    /// Index range into the flat claim/embedding list
    start: usize,
    end: usize,
}

impl ConflictDetector {
    pub fn new(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self {
            embedder,
            comparator: Arc::new(HeuristicClaimComparator),
        }
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn ClaimComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// All contradictions among `sources`, or `None` when there are none.
    ///
    /// Embedding failures are logged and reported as no conflict.
    pub async fn detect(&self, sources: &[EvidenceSource]) -> Option<ConflictInfo> {
        let mut claims: Vec<String> = Vec::new();
        let mut grouped: Vec<SourceClaims> = Vec::new();

        for source in sources {
            let extracted = self.comparator.extract_claims(&source.content);
            if extracted.is_empty() {
                continue;
            }
            let start = claims.len();
            claims.extend(extracted);
            grouped.push(SourceClaims {
                source,
                start,
                end: claims.len(),
            });
        }

        if grouped.len() < 2 {
            return None;
        }

        let embeddings = match self.embedder.embed_batch(&claims, Modality::Text).await {
            Ok(e) if e.len() == claims.len() => e,
            Ok(e) => {
                tracing::warn!(
                    "Claim embedding returned {} vectors for {} claims",
                    e.len(),
                    claims.len()
                );
                return None;
            }
            Err(e) => {
                tracing::warn!("Claim embedding failed, skipping conflict detection: {}", e);
                return None;
            }
        };

        let mut pairs: Vec<ConflictPair> = Vec::new();

        for (i, a) in grouped.iter().enumerate() {
            for b in &grouped[i + 1..] {
                let Some((ia, ib, similarity)) = closest_claims(a, b, &claims, &embeddings) else {
                    continue;
                };
                if similarity <= TOPICAL_SIMILARITY {
                    continue;
                }
                if self
                    .comparator
                    .contradicts(&claims[ia], &claims[ib], similarity)
                {
                    pairs.push(ConflictPair {
                        source_a: a.source.source_id.clone(),
                        source_b: b.source.source_id.clone(),
                        claim_a: claims[ia].clone(),
                        claim_b: claims[ib].clone(),
                        similarity,
                    });
                }
            }
        }

        if pairs.is_empty() {
            return None;
        }

        tracing::info!("Detected {} conflicting source pair(s)", pairs.len());
        Some(aggregate(sources, pairs))
    }
}

/// Highest-similarity claim pair between two sources.
///
/// Ties go to the lexicographically smaller unordered claim pair so the
/// choice does not depend on source order.
fn closest_claims(
    a: &SourceClaims,
    b: &SourceClaims,
    claims: &[String],
    embeddings: &[Vec<f32>],
) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;

    for ia in a.start..a.end {
        for ib in b.start..b.end {
            let similarity = cosine_similarity(&embeddings[ia], &embeddings[ib]);
            let better = match best {
                None => true,
                Some((ba, bb, bs)) => {
                    similarity > bs
                        || (similarity == bs
                            && canonical(&claims[ia], &claims[ib]) < canonical(&claims[ba], &claims[bb]))
                }
            };
            if better {
                best = Some((ia, ib, similarity));
            }
        }
    }

    best
}

fn canonical<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

fn aggregate(sources: &[EvidenceSource], pairs: Vec<ConflictPair>) -> ConflictInfo {
    let ids: BTreeSet<String> = pairs
        .iter()
        .flat_map(|p| [p.source_a.clone(), p.source_b.clone()])
        .collect();

    let file_of = |id: &str| {
        sources
            .iter()
            .find(|s| s.source_id == id)
            .map(|s| s.source_file.clone())
            .unwrap_or_default()
    };

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut perspectives = Vec::new();
    let sides = pairs
        .iter()
        .map(|p| (&p.source_a, &p.claim_a))
        .chain(pairs.iter().map(|p| (&p.source_b, &p.claim_b)));

    for (source_id, claim) in sides {
        let source = file_of(source_id.as_str());
        if seen.insert((source.clone(), claim.clone())) {
            perspectives.push(Perspective {
                source,
                source_id: source_id.clone(),
                claim: claim.clone(),
            });
        }
    }

    ConflictInfo {
        conflicting_source_ids: ids.into_iter().collect(),
        description: format!("{} contradiction(s) detected between sources", pairs.len()),
        perspectives,
        pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::tests::source;
    use crate::embeddings::TrigramEmbedder;
    use crate::tests::fakes::{BrokenEmbedder, VocabularyEmbedder};

    fn with_content(id: &str, file: &str, content: &str) -> EvidenceSource {
        let mut s = source(id, file, Modality::Text, 0.8, 0.9);
        s.content = content.to_string();
        s
    }

    fn detector() -> ConflictDetector {
        ConflictDetector::new(Arc::new(VocabularyEmbedder::default()))
    }

    #[test]
    fn test_claim_extraction() {
        let claims = HeuristicClaimComparator.extract_claims(
            "Too short. The operating voltage is 220.5V here! Reset the machine daily? Keep the label clean. Fourth claim is dropped.",
        );
        assert_eq!(
            claims,
            vec![
                "The operating voltage is 220.5V here",
                "Reset the machine daily",
                "Keep the label clean",
            ]
        );
    }

    #[test]
    fn test_heuristics() {
        let cmp = HeuristicClaimComparator;
        assert!(cmp.contradicts("Voltage is 220V", "Voltage is 110V", 0.9));
        assert!(!cmp.contradicts("Voltage is 220V", "Voltage is 220V", 0.9));
        assert!(cmp.contradicts("Do not reset it", "Reset it weekly", 0.8));
        assert!(!cmp.contradicts("Do not reset it", "Reset it weekly", 0.96));
        assert!(!cmp.contradicts("Voltage is stable", "Voltage is high", 0.9));
    }

    #[tokio::test]
    async fn test_numeric_conflict_between_manual_and_label() {
        let sources = vec![
            with_content("m", "manual.pdf", "Operating Voltage: 220V for the machine."),
            with_content("l", "label.jpg", "Label: Voltage 110V on this machine."),
        ];

        let info = detector().detect(&sources).await.unwrap();
        assert_eq!(info.conflicting_source_ids, vec!["l", "m"]);
        assert_eq!(info.description, "1 contradiction(s) detected between sources");
        assert_eq!(info.perspectives.len(), 2);
        assert_eq!(info.perspectives[0].source, "manual.pdf");
        assert_eq!(info.perspectives[1].source, "label.jpg");
    }

    #[tokio::test]
    async fn test_voltage_conflict_with_offline_embedder() {
        let mut label = source("img", "image.jpg", Modality::Image, 0.8, 0.9);
        label.content = "Label: Voltage 110V".to_string();
        let sources = vec![with_content("txt", "text.txt", "Operating Voltage: 220V"), label];

        let detector = ConflictDetector::new(Arc::new(TrigramEmbedder::default()));
        let info = detector.detect(&sources).await.unwrap();

        assert_eq!(info.pairs.len(), 1);
        let pair = &info.pairs[0];
        assert_eq!((pair.source_a.as_str(), pair.source_b.as_str()), ("txt", "img"));
        assert!(pair.claim_a.contains("220V"));
        assert!(pair.claim_b.contains("110V"));
        let files: Vec<&str> = info.perspectives.iter().map(|p| p.source.as_str()).collect();
        assert_eq!(files, vec!["text.txt", "image.jpg"]);
    }

    #[tokio::test]
    async fn test_detection_is_symmetric() {
        let a = with_content(
            "a",
            "a.txt",
            "The machine voltage is 220V. The warranty covers two years.",
        );
        let b = with_content(
            "b",
            "b.txt",
            "The machine voltage is 110V. The warranty covers three years.",
        );

        let forward = detector().detect(&[a.clone(), b.clone()]).await.unwrap();
        let backward = detector().detect(&[b, a]).await.unwrap();

        let keys = |info: &ConflictInfo| -> BTreeSet<(String, String)> {
            info.pairs.iter().map(ConflictPair::key).collect()
        };
        assert_eq!(keys(&forward), keys(&backward));
        assert_eq!(
            forward.conflicting_source_ids,
            backward.conflicting_source_ids
        );

        let claims = |info: &ConflictInfo| -> BTreeSet<String> {
            info.pairs
                .iter()
                .flat_map(|p| [p.claim_a.clone(), p.claim_b.clone()])
                .collect()
        };
        assert_eq!(claims(&forward), claims(&backward));
    }

    #[tokio::test]
    async fn test_off_topic_claims_do_not_conflict() {
        let sources = vec![
            with_content("a", "a.txt", "The voltage rating is 220V."),
            with_content("b", "b.txt", "The warranty lasts 2 years."),
        ];
        assert!(detector().detect(&sources).await.is_none());
    }

    #[tokio::test]
    async fn test_single_source_has_no_conflict() {
        let sources = vec![
            with_content("a", "a.txt", "The voltage rating is 220V."),
            with_content("b", "b.txt", "ok"),
        ];
        assert!(detector().detect(&sources).await.is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades() {
        let sources = vec![
            with_content("m", "manual.pdf", "Operating Voltage: 220V for the machine."),
            with_content("l", "label.jpg", "Label: Voltage 110V on this machine."),
        ];
        let detector = ConflictDetector::new(Arc::new(BrokenEmbedder));
        assert!(detector.detect(&sources).await.is_none());
    }

    #[test]
    fn test_vocabulary_embedder_sees_topic() {
        let embedder = VocabularyEmbedder::default();
        assert!(
            embedder.similarity(
                "Operating Voltage: 220V for the machine",
                "Label: Voltage 110V on this machine"
            ) > 0.5
        );
    }
}
