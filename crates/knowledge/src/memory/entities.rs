use super::context::{EntityType, TrackedEntity};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static UNIT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(volts?|watts?|amps?|hz|kg|lbs?|mm|cm|v|w|a|m)\b")
        .expect("unit regex is valid")
});
static SYMBOL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(%|°[cf])").expect("symbol regex is valid")
});
static MACHINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Z0-9]+-\d+[A-Z]?)\b").expect("machine regex is valid")
});
static DOCUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([\w-]+\.(?:pdf|docx?|txt|png|jpe?g|mp3|wav))\b")
        .expect("document regex is valid")
});

/// Finds entities worth tracking in a piece of text.
pub trait EntityExtractor: Send + Sync {
    /// `query` is the user question the text belongs to.
    fn extract(&self, text: &str, query: &str) -> Vec<TrackedEntity>;
}

/// Pattern-based extraction of values with units, model identifiers and file names.
#[derive(Debug, Default, Clone)]
pub struct RegexEntityExtractor;

impl EntityExtractor for RegexEntityExtractor {
    fn extract(&self, text: &str, query: &str) -> Vec<TrackedEntity> {
        let mut found: Vec<TrackedEntity> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut push = |entity: TrackedEntity| {
            if seen.insert(entity.name.to_lowercase()) {
                found.push(entity);
            }
        };

        for caps in UNIT_VALUE.captures_iter(text).chain(SYMBOL_VALUE.captures_iter(text)) {
            let (number, unit) = (&caps[1], &caps[2]);
            let name = format!("{}{}", number, unit);
            push(
                TrackedEntity::new(name.clone(), EntityType::Value, query)
                    .with_aliases([name.to_lowercase()])
                    .with_attribute("value", number)
                    .with_attribute("unit", unit),
            );
        }

        for caps in MACHINE.captures_iter(text) {
            let name = caps[1].to_string();
            push(
                TrackedEntity::new(name.clone(), EntityType::Machine, query).with_aliases([
                    "the machine".to_string(),
                    "this device".to_string(),
                    "it".to_string(),
                    name.to_lowercase(),
                ]),
            );
        }

        for caps in DOCUMENT.captures_iter(text) {
            let name = caps[1].to_string();
            push(
                TrackedEntity::new(name, EntityType::Document, query)
                    .with_aliases(["the document", "the file", "it"]),
            );
        }

        found
    }
}
