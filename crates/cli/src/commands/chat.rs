//! Chat command handler: one session, many questions.

use super::ask::print_response;
use super::{load_orchestrator, parse_persona};
use clap::Args;
use sift_core::{config::AppConfig, AppError, AppResult};
use sift_knowledge::AnswerRequest;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Interactive session over a corpus
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// JSONL corpus of pre-chunked units
    #[arg(long)]
    pub corpus: PathBuf,

    /// Session id (a fresh one is generated when omitted)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Response style for every turn
    #[arg(short, long)]
    pub persona: Option<String>,

    /// Print the reasoning chain report after each answer
    #[arg(long)]
    pub report: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let persona = parse_persona(self.persona.as_deref())?;
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| format!("chat-{}", std::process::id()));

        let orchestrator = load_orchestrator(config, &self.corpus).await?;
        tracing::info!("Chat session {} started", session);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();
            match query {
                "" => continue,
                "/quit" | "/exit" => break,
                "/context" => {
                    match orchestrator.memory().context_summary(&session).await {
                        Some(summary) => println!("{}", summary),
                        None => println!("(no conversation yet)"),
                    }
                    continue;
                }
                "/clear" => {
                    orchestrator.memory().clear_session(&session).await;
                    println!("(session cleared)");
                    continue;
                }
                _ => {}
            }

            let request = AnswerRequest::new(query)
                .session(session.clone())
                .persona(persona)
                .reasoning_chain(self.report);

            match orchestrator.answer(request).await {
                Ok(response) => print_response(&response, self.report),
                Err(AppError::InvalidInput(msg)) => eprintln!("{}", msg),
                Err(e) => return Err(e),
            }
            println!();
        }

        tracing::info!("Chat session {} ended", session);
        Ok(())
    }
}
