//! Renders the answer prompt and refusal text with Handlebars.

use crate::types::{AnswerPromptInput, BuiltPrompt, BuiltPromptMetadata, PromptMode};
use handlebars::Handlebars;
use serde::Serialize;
use sift_core::{AppError, AppResult};

/// Evidence excerpts, perspectives and web results shown to the generator.
const MAX_EVIDENCE_ITEMS: usize = 3;
const MAX_EVIDENCE_CHARS: usize = 1500;
const MAX_PERSPECTIVES: usize = 3;
const MAX_CLAIM_CHARS: usize = 100;
const MAX_WEB_ITEMS: usize = 3;
const MAX_SNIPPET_CHARS: usize = 400;

const ANSWER_TEMPLATE: &str = "Answer the question using the evidence below.

Document Evidence:
{{#each evidence}}
[{{index}}] {{source}}: {{text}}
{{/each}}
{{#if perspectives}}

Conflicting perspectives found:
{{#each perspectives}}
• {{source}}: {{claim}}
{{/each}}
{{/if}}
{{#if web}}

Live Web Results:
{{#each web}}
[Web {{index}}] {{name}} - {{title}}: {{snippet}}
{{/each}}
{{/if}}

Question: {{query}}

{{#if cautious}}(Note: Limited evidence available - express appropriate uncertainty)
{{/if}}{{instructions}}
{{#if balanced}}Present every perspective side by side without favoring any source; let the reader weigh them.
{{/if}}{{#if web}}Use [1],[2] for docs, [Web 1],[Web 2] for web. Docs are primary; note if sources agree.
{{/if}}
Be concise and cite sources.
{{#if language}}
IMPORTANT: Your entire response must be in {{language}}.
{{/if}}";

const REFUSAL_TEMPLATE: &str = "I cannot answer this query confidently due to insufficient evidence.

**Issues identified:**
{{#each gaps}}
- {{this}}
{{/each}}

**Suggestion:** Please upload more relevant documents or rephrase your query.";

#[derive(Serialize)]
struct Numbered<'a> {
    index: usize,
    source: &'a str,
    text: String,
}

#[derive(Serialize)]
struct Claim<'a> {
    source: &'a str,
    claim: String,
}

#[derive(Serialize)]
struct WebLine<'a> {
    index: usize,
    name: &'a str,
    title: &'a str,
    snippet: String,
}

#[derive(Serialize)]
struct AnswerContext<'a> {
    query: &'a str,
    evidence: Vec<Numbered<'a>>,
    perspectives: Vec<Claim<'a>>,
    web: Vec<WebLine<'a>>,
    cautious: bool,
    balanced: bool,
    instructions: &'static str,
    language: Option<&'a str>,
}

/// Build the generation prompt for a non-refusal strategy.
pub fn build_answer_prompt(input: &AnswerPromptInput) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building {:?} prompt for persona {}",
        input.mode,
        input.persona
    );

    let evidence: Vec<Numbered> = input
        .evidence
        .iter()
        .take(MAX_EVIDENCE_ITEMS)
        .enumerate()
        .map(|(i, item)| Numbered {
            index: i + 1,
            source: &item.source,
            text: excerpt(&item.text, MAX_EVIDENCE_CHARS),
        })
        .collect();

    let perspectives: Vec<Claim> = input
        .perspectives
        .iter()
        .take(MAX_PERSPECTIVES)
        .map(|p| Claim {
            source: &p.source,
            claim: excerpt(&p.claim, MAX_CLAIM_CHARS),
        })
        .collect();

    let web: Vec<WebLine> = input
        .web
        .iter()
        .take(MAX_WEB_ITEMS)
        .enumerate()
        .map(|(i, item)| WebLine {
            index: i + 1,
            name: &item.name,
            title: &item.title,
            snippet: excerpt(&item.snippet, MAX_SNIPPET_CHARS),
        })
        .collect();

    let language = input
        .response_language
        .as_deref()
        .filter(|lang| !lang.eq_ignore_ascii_case("english"));

    let metadata = BuiltPromptMetadata {
        persona: input.persona,
        mode: input.mode,
        evidence_items: evidence.len(),
        perspective_items: perspectives.len(),
        web_items: web.len(),
    };

    let context = AnswerContext {
        query: &input.query,
        evidence,
        perspectives,
        web,
        cautious: input.mode == PromptMode::Cautious,
        balanced: input.mode == PromptMode::Conflict,
        instructions: input.persona.instructions(),
        language,
    };

    let user = render_template(ANSWER_TEMPLATE, &context)?;

    Ok(BuiltPrompt { user, metadata })
}

/// Render the refusal answer listing the evidence gaps.
pub fn render_refusal(gaps: &[String]) -> AppResult<String> {
    render_template(REFUSAL_TEMPLATE, &serde_json::json!({ "gaps": gaps }))
}

/// Render a Handlebars template with any serializable context.
pub fn render_template<T: Serialize>(template: &str, context: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", context)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
