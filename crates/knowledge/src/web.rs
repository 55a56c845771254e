//! Web result ranking.

use crate::types::WebSource;

const CREDIBILITY_WEIGHT: f32 = 0.6;
const RELEVANCE_WEIGHT: f32 = 0.4;

/// Combined ranking key of a web hit.
pub fn web_score(source: &WebSource) -> f32 {
    CREDIBILITY_WEIGHT * source.credibility.clamp(0.0, 1.0)
        + RELEVANCE_WEIGHT * source.relevance.clamp(0.0, 1.0)
}

/// Best `limit` hits by credibility and relevance, duplicate URLs removed.
pub fn rank_web_sources(mut sources: Vec<WebSource>, limit: usize) -> Vec<WebSource> {
    sources.sort_by(|a, b| web_score(b).total_cmp(&web_score(a)));

    let mut seen = std::collections::HashSet::new();
    sources.retain(|s| seen.insert(s.url.clone()));
    sources.truncate(limit);
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::web_source;

    #[test]
    fn test_credibility_outweighs_relevance() {
        let ranked = rank_web_sources(
            vec![
                web_source("Forum", 0.3, 1.0),
                web_source("Encyclopedia", 0.9, 0.6),
                web_source("Blog", 0.5, 0.5),
            ],
            2,
        );
        let titles: Vec<&str> = ranked.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Encyclopedia", "Forum"]);
    }

    #[test]
    fn test_duplicate_urls_are_dropped() {
        let ranked = rank_web_sources(
            vec![web_source("Same", 0.9, 0.9), web_source("Same", 0.1, 0.1)],
            5,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].credibility, 0.9);
    }
}
