//! `index`, `ask`, and `chat` commands.
//!
//! All three load documents from the given paths, build (or reuse) their
//! collection, and then differ only in how questions arrive:
//!
//! - `index` stops after building.
//! - `ask` answers one question from the command line.
//! - `chat` reads questions from stdin until an empty line or EOF.
//!
//! In `chat`, `/history` prints the conversation and `/clear` deletes the
//! knowledge base and ends the session.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use pdfchat_core::{IndexSummary, RagSession};

use crate::config::Config;
use crate::files::load_documents;
use crate::pipeline::Pipeline;

/// A line typed at the `chat` prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Quit,
    History,
    Clear,
    Question(&'a str),
}

/// Classify one input line.
pub fn parse_chat_input(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "" | "/quit" | "/exit" => ChatInput::Quit,
        "/history" => ChatInput::History,
        "/clear" => ChatInput::Clear,
        question => ChatInput::Question(question),
    }
}

async fn open_session(config: &Config, paths: &[PathBuf]) -> Result<RagSession> {
    if paths.is_empty() {
        bail!("No files given. Pass at least one PDF or directory.");
    }
    let documents = load_documents(paths, &config.files)?;
    let pipeline = Pipeline::open(config).await?;
    let mut session = pipeline.new_session()?;

    match session.build_index(&documents).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(session)
        }
        Err(e) => bail!("{} ({})", e.user_message(), e),
    }
}

fn print_summary(summary: &IndexSummary) {
    let verb = if summary.reused { "Reused" } else { "Indexed" };
    println!(
        "{} {}: {} document(s), {} chunk(s)",
        verb, summary.collection, summary.documents, summary.chunks
    );
}

/// `pdfchat index <paths...>`
pub async fn run_index(config: &Config, paths: &[PathBuf]) -> Result<()> {
    open_session(config, paths).await?;
    Ok(())
}

/// `pdfchat ask <question> --files <paths...>`
pub async fn run_ask(config: &Config, question: &str, paths: &[PathBuf]) -> Result<()> {
    let mut session = open_session(config, paths).await?;
    println!();
    match session.ask(question).await {
        Ok(answer) => {
            println!("{}", answer);
            Ok(())
        }
        Err(e) => bail!("{} ({})", e.user_message(), e),
    }
}

/// `pdfchat chat <paths...>`
pub async fn run_chat(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let mut session = open_session(config, paths).await?;
    println!("Ask a question. /history shows the conversation, /clear deletes the index, empty line quits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_chat_input(&line) {
            ChatInput::Quit => break,
            ChatInput::History => {
                for message in session.messages() {
                    println!("[{}] {}", message.role, message.content);
                }
            }
            ChatInput::Clear => {
                session.clear().await?;
                println!("Knowledge base cleared.");
                break;
            }
            ChatInput::Question(question) => match session.ask(question).await {
                Ok(answer) => println!("{}", answer),
                // The session already recorded the user message; keep chatting.
                Err(e) => {
                    tracing::warn!(error = %e, "question failed");
                    println!("{}", e.user_message());
                }
            },
        }
    }

    Ok(())
}
