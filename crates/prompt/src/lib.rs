//! Prompt construction for sift.
//!
//! - `Persona`: closed set of response styles with token budgets and instructions
//! - Handlebars rendering of the answer prompt and the refusal text

pub mod builder;
pub mod types;

// Re-export main types
pub use builder::{build_answer_prompt, excerpt, render_refusal, render_template};
pub use types::{
    AnswerPromptInput, BuiltPrompt, BuiltPromptMetadata, EvidenceItem, Persona, PersonaSettings,
    PerspectiveItem, PromptMode, WebItem,
};
