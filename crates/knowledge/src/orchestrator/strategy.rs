//! Response strategy selection.

use crate::reasoning::FinalDecision;
use serde::{Deserialize, Serialize};
use sift_prompt::{Persona, PromptMode};

const CONFLICT_MAX_TOKENS: u32 = 400;
const CAUTIOUS_MAX_TOKENS: u32 = 300;
const CAUTIOUS_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStrategy {
    Refuse,
    ConflictPresentation,
    CautiousAnswer,
    ConfidentAnswer,
}

impl ResponseStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStrategy::Refuse => "REFUSE",
            ResponseStrategy::ConflictPresentation => "CONFLICT_PRESENTATION",
            ResponseStrategy::CautiousAnswer => "CAUTIOUS_ANSWER",
            ResponseStrategy::ConfidentAnswer => "CONFIDENT_ANSWER",
        }
    }

    /// Prompt framing; refusals are never sent to the generator.
    pub fn prompt_mode(&self) -> Option<PromptMode> {
        match self {
            ResponseStrategy::Refuse => None,
            ResponseStrategy::ConflictPresentation => Some(PromptMode::Conflict),
            ResponseStrategy::CautiousAnswer => Some(PromptMode::Cautious),
            ResponseStrategy::ConfidentAnswer => Some(PromptMode::Confident),
        }
    }

    pub fn final_decision(&self) -> FinalDecision {
        match self {
            ResponseStrategy::Refuse => FinalDecision::Refused,
            ResponseStrategy::ConflictPresentation => FinalDecision::ConflictPresented,
            ResponseStrategy::CautiousAnswer | ResponseStrategy::ConfidentAnswer => {
                FinalDecision::Answered
            }
        }
    }
}

impl std::fmt::Display for ResponseStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyThresholds {
    pub refuse: f32,
    pub cautious: f32,
}

/// Chosen strategy and the generation budget that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPlan {
    pub strategy: ResponseStrategy,
    pub reason: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Pick the strategy. Rules are checked in priority order, so a score under
/// the refuse threshold refuses whatever the conflicts or persona.
pub fn select_strategy(
    score: f32,
    has_conflict: bool,
    persona: Persona,
    thresholds: StrategyThresholds,
) -> StrategyPlan {
    let settings = persona.settings();

    let plan = if score < thresholds.refuse {
        StrategyPlan {
            strategy: ResponseStrategy::Refuse,
            reason: format!(
                "Confidence {:.2} is below the refusal threshold {:.2}",
                score, thresholds.refuse
            ),
            max_tokens: 0,
            temperature: 0.0,
        }
    } else if has_conflict || persona == Persona::Debate {
        let reason = if has_conflict {
            "Conflicting evidence detected between sources".to_string()
        } else {
            "Debate persona requested".to_string()
        };
        StrategyPlan {
            strategy: ResponseStrategy::ConflictPresentation,
            reason,
            max_tokens: settings.max_tokens.min(CONFLICT_MAX_TOKENS),
            temperature: settings.temperature,
        }
    } else if score < thresholds.cautious {
        StrategyPlan {
            strategy: ResponseStrategy::CautiousAnswer,
            reason: format!(
                "Confidence {:.2} is below the threshold {:.2}",
                score, thresholds.cautious
            ),
            max_tokens: settings.max_tokens.min(CAUTIOUS_MAX_TOKENS),
            temperature: CAUTIOUS_TEMPERATURE,
        }
    } else {
        StrategyPlan {
            strategy: ResponseStrategy::ConfidentAnswer,
            reason: format!("Confidence {:.2} supports a direct answer", score),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    };

    tracing::debug!("Strategy {} ({})", plan.strategy, plan.reason);
    plan
}
