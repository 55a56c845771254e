//! Audit trail of one pipeline run.
//!
//! Steps are appended by the orchestrator as each stage finishes. The trail is
//! informational: no stage reads an earlier step's status to make a decision.

use crate::types::{EvidenceSource, SourceReference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Instant;

const REPORT_SNIPPET_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    QueryAnalysis,
    Retrieval,
    WebSearch,
    ConfidenceAssessment,
    ConflictDetection,
    ResponseStrategy,
    Generation,
    MemoryUpdate,
    Translation,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::QueryAnalysis => "query_analysis",
            StepType::Retrieval => "retrieval",
            StepType::WebSearch => "web_search",
            StepType::ConfidenceAssessment => "confidence_assessment",
            StepType::ConflictDetection => "conflict_detection",
            StepType::ResponseStrategy => "response_strategy",
            StepType::Generation => "generation",
            StepType::MemoryUpdate => "memory_update",
            StepType::Translation => "translation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Warning,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Completed => "completed",
            StepStatus::Warning => "warning",
            StepStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalDecision {
    Answered,
    Refused,
    ConflictPresented,
}

impl FinalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalDecision::Answered => "answered",
            FinalDecision::Refused => "refused",
            FinalDecision::ConflictPresented => "conflict_presented",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based, contiguous within a chain
    pub step_number: u32,
    pub step_type: StepType,
    pub title: String,
    pub description: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub sources_used: Vec<SourceReference>,
    pub duration_ms: f64,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub chain_id: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub total_duration_ms: f64,
    pub steps: Vec<ReasoningStep>,
    pub final_decision: FinalDecision,
    pub key_insights: Vec<String>,
}

/// A step before it is numbered and timed.
#[derive(Debug, Clone)]
pub struct StepDraft {
    step_type: StepType,
    title: String,
    description: String,
    details: serde_json::Map<String, serde_json::Value>,
    sources_used: Vec<SourceReference>,
    status: StepStatus,
}

impl StepDraft {
    pub fn new(step_type: StepType, title: &str, description: impl Into<String>) -> Self {
        Self {
            step_type,
            title: title.to_string(),
            description: description.into(),
            details: serde_json::Map::new(),
            sources_used: Vec::new(),
            status: StepStatus::Completed,
        }
    }

    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn sources<'a>(mut self, sources: impl IntoIterator<Item = &'a EvidenceSource>) -> Self {
        self.sources_used = sources.into_iter().map(EvidenceSource::reference).collect();
        self
    }

    pub fn status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }
}

/// Collects steps and insights for one query, numbering steps in order.
#[derive(Debug)]
pub struct ChainRecorder {
    started: Instant,
    timestamp: DateTime<Utc>,
    steps: Vec<ReasoningStep>,
    insights: Vec<String>,
}

impl Default for ChainRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            timestamp: Utc::now(),
            steps: Vec::new(),
            insights: Vec::new(),
        }
    }

    /// Append a step that began at `step_started`; returns its number.
    pub fn record(&mut self, draft: StepDraft, step_started: Instant) -> u32 {
        let step_number = self.steps.len() as u32 + 1;
        tracing::debug!(
            "Step {} {} [{}]",
            step_number,
            draft.step_type.as_str(),
            draft.status.as_str()
        );
        self.steps.push(ReasoningStep {
            step_number,
            step_type: draft.step_type,
            title: draft.title,
            description: draft.description,
            details: draft.details,
            sources_used: draft.sources_used,
            duration_ms: step_started.elapsed().as_secs_f64() * 1000.0,
            status: draft.status,
        });
        step_number
    }

    pub fn insight(&mut self, text: impl Into<String>) {
        self.insights.push(text.into());
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn finish(self, query: &str, final_decision: FinalDecision) -> ReasoningChain {
        ReasoningChain {
            chain_id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            timestamp: self.timestamp,
            total_duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            steps: self.steps,
            final_decision,
            key_insights: self.insights,
        }
    }
}

impl ReasoningChain {
    /// Render the chain as a Markdown report.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Reasoning Chain Report\n");
        let _ = writeln!(md, "**Query:** {}", single_line(&self.query));
        let _ = writeln!(md, "**Timestamp:** {}", self.timestamp.to_rfc3339());
        let _ = writeln!(
            md,
            "**Total Processing Time:** {:.2}ms",
            self.total_duration_ms
        );
        let _ = writeln!(md, "**Final Decision:** {}\n", self.final_decision.as_str());
        md.push_str("---\n\n## Pipeline Steps\n\n");

        for step in &self.steps {
            let _ = writeln!(
                md,
                "### Step {}: {} [{}]\n",
                step.step_number,
                single_line(&step.title),
                step.status.as_str()
            );
            let _ = writeln!(md, "**Type:** {}", step.step_type.as_str());
            let _ = writeln!(md, "**Duration:** {:.2}ms\n", step.duration_ms);
            let _ = writeln!(md, "{}\n", single_line(&step.description));

            if !step.details.is_empty() {
                md.push_str("**Details:**\n");
                for (key, value) in &step.details {
                    let rendered = match value {
                        serde_json::Value::String(s) => single_line(s),
                        other => other.to_string(),
                    };
                    let _ = writeln!(md, "- {}: {}", single_line(key), rendered);
                }
                md.push('\n');
            }

            if !step.sources_used.is_empty() {
                md.push_str("**Sources Referenced:**\n");
                for source in &step.sources_used {
                    let _ = writeln!(
                        md,
                        "- [{}] (relevance: {:.2}): \"{}...\"",
                        single_line(&source.source_file),
                        source.relevance_score,
                        sift_prompt::excerpt(&single_line(&source.snippet), REPORT_SNIPPET_CHARS)
                    );
                }
                md.push('\n');
            }

            md.push_str("---\n\n");
        }

        if !self.key_insights.is_empty() {
            md.push_str("## Key Insights\n\n");
            for insight in &self.key_insights {
                let _ = writeln!(md, "- {}", single_line(insight));
            }
        }

        md
    }
}

/// Collapse whitespace runs (newlines included) so free text cannot start a
/// report line of its own.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Step headings recovered from a rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineStep {
    pub number: u32,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutline {
    pub steps: Vec<OutlineStep>,
    pub insights: Vec<String>,
}

impl ReportOutline {
    /// Read the step headings and key insights back out of `to_markdown` output.
    pub fn parse(markdown: &str) -> Self {
        let mut outline = ReportOutline::default();
        let mut in_insights = false;

        for line in markdown.lines() {
            if let Some(rest) = line.strip_prefix("### Step ") {
                in_insights = false;
                let Some((number, heading)) = rest.split_once(": ") else {
                    continue;
                };
                let Ok(number) = number.trim().parse::<u32>() else {
                    continue;
                };
                let (title, status) = match heading.rfind(" [") {
                    Some(idx) if heading.ends_with(']') => (
                        &heading[..idx],
                        &heading[idx + 2..heading.len() - 1],
                    ),
                    _ => (heading, ""),
                };
                outline.steps.push(OutlineStep {
                    number,
                    title: title.to_string(),
                    status: status.to_string(),
                });
            } else if line.starts_with("## ") {
                in_insights = line == "## Key Insights";
            } else if in_insights {
                if let Some(insight) = line.strip_prefix("- ") {
                    outline.insights.push(insight.to_string());
                }
            }
        }

        outline
    }
}
