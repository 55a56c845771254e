use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Entity names mentioned in this message
    #[serde(default)]
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Measured quantity, e.g. "220V"
    Value,
    /// Model identifier, e.g. "XR-500"
    Machine,
    /// File name, e.g. "manual.pdf"
    Document,
    Other,
}

/// Something the conversation refers back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntity {
    /// Canonical name substituted for aliases
    pub name: String,
    pub aliases: Vec<String>,
    pub entity_type: EntityType,
    pub first_mentioned: String,
    pub last_mentioned: String,
    /// Turn counter value when last mentioned; higher is more recent
    pub last_seen: u64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TrackedEntity {
    pub fn new(name: impl Into<String>, entity_type: EntityType, query: &str) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            entity_type,
            first_mentioned: query.to_string(),
            last_mentioned: query.to_string(),
            last_seen: 0,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for alias in aliases {
            self.add_alias(alias.into());
        }
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    fn add_alias(&mut self, alias: String) {
        if !self.aliases.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
            self.aliases.push(alias);
        }
    }
}

/// Per-session conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    pub messages: Vec<Message>,
    /// Ordered oldest to most recently mentioned
    pub entities: Vec<TrackedEntity>,
    pub current_topic: Option<String>,
    pub created_at: DateTime<Utc>,
    turn: u64,
    max_messages: usize,
    max_entities: usize,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>, max_messages: usize, max_entities: usize) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            entities: Vec::new(),
            current_topic: None,
            created_at: Utc::now(),
            turn: 0,
            max_messages: max_messages.max(1),
            max_entities: max_entities.max(1),
        }
    }

    /// Append a message, dropping the oldest beyond the cap.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>, entities: Vec<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            entities,
        });
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Merge newly seen entities, evicting the least recently mentioned beyond the cap.
    pub fn update_entities(&mut self, found: Vec<TrackedEntity>, query: &str) {
        if found.is_empty() {
            return;
        }
        self.turn += 1;

        for entity in found {
            match self
                .entities
                .iter_mut()
                .find(|e| e.name.eq_ignore_ascii_case(&entity.name))
            {
                Some(existing) => {
                    existing.last_mentioned = query.to_string();
                    existing.last_seen = self.turn;
                    for alias in entity.aliases {
                        existing.add_alias(alias);
                    }
                    existing.attributes.extend(entity.attributes);
                }
                None => {
                    let mut entity = entity;
                    entity.first_mentioned = query.to_string();
                    entity.last_mentioned = query.to_string();
                    entity.last_seen = self.turn;
                    self.entities.push(entity);
                }
            }
        }

        self.entities.sort_by_key(|e| e.last_seen);
        if self.entities.len() > self.max_entities {
            let excess = self.entities.len() - self.max_entities;
            self.entities.drain(..excess);
        }
    }

    /// Entity by canonical name or alias, case-insensitive.
    pub fn find_entity(&self, name: &str) -> Option<&TrackedEntity> {
        self.entities.iter().find(|e| {
            e.name.eq_ignore_ascii_case(name) || e.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
    }

    /// Most recently mentioned first.
    pub fn entities_by_recency(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.iter().rev()
    }

    pub fn last_user_query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn set_current_topic(&mut self, topic: impl Into<String>) {
        self.current_topic = Some(topic.into());
    }

    /// Short plain-text summary of the session state.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(topic) = &self.current_topic {
            lines.push(format!("Current topic: {}", topic));
        }
        if !self.entities.is_empty() {
            let names: Vec<&str> = self
                .entities_by_recency()
                .take(5)
                .map(|e| e.name.as_str())
                .collect();
            lines.push(format!("Discussed: {}", names.join(", ")));
        }
        let recent: Vec<&str> = self
            .messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::User)
            .take(3)
            .map(|m| m.content.as_str())
            .collect();
        if !recent.is_empty() {
            lines.push(format!("Recent questions: {}", recent.join(" | ")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_cap_is_fifo() {
        let mut ctx = ConversationContext::new("s", 3, 5);
        for i in 0..5 {
            ctx.add_message(Role::User, format!("q{}", i), Vec::new());
        }
        let contents: Vec<&str> = ctx.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "q3", "q4"]);
        assert_eq!(ctx.last_user_query(), Some("q4"));
    }

    #[test]
    fn test_entity_merge_and_eviction() {
        let mut ctx = ConversationContext::new("s", 10, 2);
        ctx.update_entities(
            vec![TrackedEntity::new("XR-500", EntityType::Machine, "").with_aliases(["it"])],
            "first",
        );
        ctx.update_entities(
            vec![TrackedEntity::new("manual.pdf", EntityType::Document, "")],
            "second",
        );
        ctx.update_entities(
            vec![TrackedEntity::new("xr-500", EntityType::Machine, "").with_aliases(["the machine"])],
            "third",
        );

        let machine = ctx.find_entity("the machine").unwrap();
        assert_eq!(machine.name, "XR-500");
        assert_eq!(machine.first_mentioned, "first");
        assert_eq!(machine.last_mentioned, "third");
        assert_eq!(machine.aliases, vec!["it", "the machine"]);
        assert_eq!(ctx.entities_by_recency().next().unwrap().name, "XR-500");

        ctx.update_entities(
            vec![TrackedEntity::new("220V", EntityType::Value, "")],
            "fourth",
        );
        assert_eq!(ctx.entities.len(), 2);
        assert!(ctx.find_entity("manual.pdf").is_none());
    }

    #[test]
    fn test_summary() {
        let mut ctx = ConversationContext::new("s", 10, 10);
        assert_eq!(ctx.summary(), "");
        ctx.set_current_topic("operating voltage");
        ctx.add_message(Role::User, "What voltage?", Vec::new());
        let summary = ctx.summary();
        assert!(summary.contains("Current topic: operating voltage"));
        assert!(summary.contains("Recent questions: What voltage?"));
    }
}
