//! Ask command handler.

use super::{load_orchestrator, parse_modalities, parse_persona};
use clap::Args;
use sift_core::{config::AppConfig, AppResult};
use sift_knowledge::{AnswerRequest, AnswerResponse};
use std::path::PathBuf;

/// Answer one question from a corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// JSONL corpus of pre-chunked units
    #[arg(long)]
    pub corpus: PathBuf,

    /// Session id, to resolve follow-ups against earlier turns
    #[arg(short, long)]
    pub session: Option<String>,

    /// Response style (academic, executive, eli5, technical, debate, legal, medical, creative, standard)
    #[arg(short, long)]
    pub persona: Option<String>,

    /// Evidence items to keep
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Restrict retrieval to these modalities (text, image, audio)
    #[arg(short, long = "modality")]
    pub modalities: Vec<String>,

    /// Language code the answer must be written in
    #[arg(short, long)]
    pub target_language: Option<String>,

    /// Output the full response as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the reasoning chain report after the answer
    #[arg(long)]
    pub report: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut request = AnswerRequest::new(self.query.clone())
            .persona(parse_persona(self.persona.as_deref())?)
            .reasoning_chain(self.report || self.json || config.pipeline.include_reasoning_chain);
        if let Some(session) = &self.session {
            request = request.session(session.clone());
        }
        if let Some(top_k) = self.top_k {
            request = request.top_k(top_k);
        }
        if let Some(modalities) = parse_modalities(&self.modalities)? {
            request = request.modalities(modalities);
        }
        if let Some(language) = &self.target_language {
            request = request.target_language(language.clone());
        }

        let orchestrator = load_orchestrator(config, &self.corpus).await?;
        let response = orchestrator.answer(request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_response(&response, self.report);
        }

        Ok(())
    }
}

/// Plain-text rendering shared by `ask` and `chat`.
pub fn print_response(response: &AnswerResponse, report: bool) {
    println!("{}", response.answer);
    println!();
    println!(
        "Confidence: {} ({:.2}) | Strategy: {}",
        response.confidence_label, response.confidence_score, response.strategy
    );

    for (i, source) in response.evidence.iter().take(5).enumerate() {
        println!(
            "  [{}] {} ({}, relevance {:.2})",
            i + 1,
            source.source_file,
            source.modality,
            source.relevance_score
        );
    }

    if let Some(conflict) = &response.conflict_info {
        println!("Conflict: {}", conflict.description);
        for perspective in &conflict.perspectives {
            println!("  - {}: {}", perspective.source, perspective.claim);
        }
    }

    if let Some(resolved) = &response.resolved_query {
        tracing::debug!("Searched as: {}", resolved);
    }

    let suggestions = response.suggestions.all();
    if !suggestions.is_empty() {
        println!("Try next:");
        for suggestion in suggestions.iter().take(3) {
            println!("  - {}", suggestion.text);
        }
    }

    if report {
        if let Some(chain) = &response.reasoning_chain {
            println!();
            println!("{}", chain.to_markdown());
        }
    }
}
