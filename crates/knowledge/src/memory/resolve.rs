//! Follow-up query rewriting against tracked entities.
//!
//! Rewrites only the search query; the stored transcript keeps the user's words.

use super::context::ConversationContext;
use regex::Regex;
use sift_prompt::excerpt;
use std::sync::LazyLock;

const CONTINUATION_CHARS: usize = 100;

static REFERENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(it|this|that)\b",
        r"(?i)\bthe\s+(machine|device|system|document|file|image|audio)\b",
        r"(?i)\b(other\s+one|another|previous|same|above|mentioned)\b",
        r"(?i)\bwhat\s+about\b",
        r"(?i)\b(also|too|as\s+well)\b",
        r"(?i)\bmore\s+(about|on|regarding|details?)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("reference pattern is valid"))
    .collect()
});
static WHAT_ABOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhat\s+about\b").expect("what-about regex is valid"));
static MORE_DETAILS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmore\s+(details?|info|information|about)\b")
        .expect("more-details regex is valid")
});

/// Whether `query` looks like it leans on earlier turns.
pub fn needs_resolution(query: &str) -> bool {
    REFERENCE_PATTERNS.iter().any(|p| p.is_match(query))
}

/// Rewrite `query` using the session's entities and history.
///
/// Each tracked entity, most recently mentioned first, replaces the first
/// whole-word occurrence of one of its aliases. "What about" and "more
/// details" follow-ups get the topic or previous question appended instead.
pub fn resolve_references(context: &ConversationContext, query: &str) -> (String, bool) {
    if context.messages.is_empty() || context.entities.is_empty() {
        return (query.to_string(), false);
    }

    let mut resolved = query.to_string();
    let mut modified = false;

    for entity in context.entities_by_recency() {
        for alias in &entity.aliases {
            if alias.eq_ignore_ascii_case(&entity.name) {
                continue;
            }
            if let Some(range) = find_alias(&resolved, alias) {
                resolved.replace_range(range, &entity.name);
                modified = true;
                break;
            }
        }
    }

    if WHAT_ABOUT.is_match(query) {
        let subject = context.current_topic.as_deref().or_else(|| {
            context
                .entities_by_recency()
                .next()
                .map(|e| e.name.as_str())
        });
        if let Some(subject) = subject {
            resolved = format!("{} (regarding {})", resolved, subject);
            modified = true;
        }
    }

    if MORE_DETAILS.is_match(query) {
        let previous = context
            .last_user_query()
            .filter(|previous| previous.to_lowercase() != query.to_lowercase());
        if let Some(previous) = previous {
            resolved = format!(
                "{} (continuing from: {})",
                resolved,
                excerpt(previous, CONTINUATION_CHARS)
            );
            modified = true;
        }
    }

    if modified {
        tracing::debug!("Resolved '{}' to '{}'", query, resolved);
    }

    (resolved, modified)
}

/// Byte range of the first case-insensitive, whole-word occurrence of `alias`.
fn find_alias(text: &str, alias: &str) -> Option<std::ops::Range<usize>> {
    let pattern = format!(r"(?i)(?:^|[^\w])({})(?:[^\w]|$)", regex::escape(alias));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::context::{EntityType, Role, TrackedEntity};

    fn context_with(entities: Vec<TrackedEntity>) -> ConversationContext {
        let mut ctx = ConversationContext::new("s", 20, 15);
        ctx.add_message(Role::User, "What is the voltage of the XR-500?", Vec::new());
        for entity in entities {
            ctx.update_entities(vec![entity], "earlier");
        }
        ctx
    }

    fn machine() -> TrackedEntity {
        TrackedEntity::new("XR-500", EntityType::Machine, "")
            .with_aliases(["the machine", "this device", "it", "xr-500"])
    }

    fn document() -> TrackedEntity {
        TrackedEntity::new("report.pdf", EntityType::Document, "")
            .with_aliases(["the document", "the file", "it"])
    }

    #[test]
    fn test_needs_resolution() {
        assert!(needs_resolution("Is it safe?"));
        assert!(needs_resolution("What about the label?"));
        assert!(needs_resolution("Tell me more details"));
        assert!(needs_resolution("Check the device"));
        assert!(!needs_resolution("What is the XR-500 voltage?"));
        // whole words only
        assert!(!needs_resolution("Iterate the items"));
    }

    #[test]
    fn test_no_history_means_no_rewrite() {
        let ctx = ConversationContext::new("s", 20, 15);
        assert_eq!(
            resolve_references(&ctx, "Is it safe?"),
            ("Is it safe?".to_string(), false)
        );
    }

    #[test]
    fn test_what_about_that_on_fresh_session() {
        let ctx = ConversationContext::new("s", 20, 15);
        assert!(needs_resolution("what about that"));
        assert_eq!(
            resolve_references(&ctx, "what about that"),
            ("what about that".to_string(), false)
        );
    }

    #[test]
    fn test_alias_substitution() {
        let ctx = context_with(vec![machine()]);
        let (resolved, modified) = resolve_references(&ctx, "How do I reset it?");
        assert!(modified);
        assert_eq!(resolved, "How do I reset XR-500?");
    }

    #[test]
    fn test_most_recent_entity_wins() {
        // document mentioned after the machine
        let ctx = context_with(vec![machine(), document()]);
        let (resolved, _) = resolve_references(&ctx, "Is it compatible with the machine?");
        assert_eq!(resolved, "Is report.pdf compatible with XR-500?");
    }

    #[test]
    fn test_alias_inside_word_is_ignored() {
        let ctx = context_with(vec![machine()]);
        let (resolved, modified) = resolve_references(&ctx, "Iterate quickly");
        assert!(!modified);
        assert_eq!(resolved, "Iterate quickly");
    }

    #[test]
    fn test_what_about_appends_topic() {
        let mut ctx = context_with(vec![machine()]);
        ctx.set_current_topic("voltage XR-500");
        let (resolved, modified) = resolve_references(&ctx, "What about warranty?");
        assert!(modified);
        assert_eq!(resolved, "What about warranty? (regarding voltage XR-500)");
    }

    #[test]
    fn test_more_details_appends_previous_question() {
        let ctx = context_with(vec![machine()]);
        let (resolved, _) = resolve_references(&ctx, "Give me more details");
        assert_eq!(
            resolved,
            "Give me more details (continuing from: What is the voltage of the XR-500?)"
        );
    }

    #[test]
    fn test_repeated_question_is_not_appended_to_itself() {
        let mut ctx = ConversationContext::new("s", 20, 15);
        ctx.add_message(Role::User, "Give me more details", Vec::new());
        ctx.update_entities(
            vec![TrackedEntity::new("XR-500", EntityType::Machine, "")],
            "earlier",
        );

        let (resolved, modified) = resolve_references(&ctx, "give me MORE details");
        assert!(!modified);
        assert_eq!(resolved, "give me MORE details");
    }
}
