//! `docqa`: ingest documents and ask questions about them.

mod commands;

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// Document question answering over a local vector index.
#[derive(Parser, Debug)]
#[command(name = "docqa", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a file, or every supported file under a directory.
    Ingest {
        path: PathBuf,
        /// MIME type to use instead of the file extension.
        #[arg(long)]
        mime: Option<String>,
        /// Extra metadata attached to every chunk, as key=value. Repeatable.
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, Value)>,
    },
    /// Answer a question from the indexed documents.
    Query {
        question: String,
        /// Number of chunks to retrieve.
        #[arg(short)]
        k: Option<usize>,
        /// Fail instead of answering with an apology.
        #[arg(long)]
        strict: bool,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create the configured index if needed and print its details.
    IndexInfo,
    /// Check that the embedder, the index and the generation endpoint respond.
    Check,
}

/// `key=value`; the value is read as JSON when it parses, else as a string.
fn parse_meta(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = docqa_core::config::Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;

    match cli.command {
        Command::Ingest { path, mime, meta } => commands::ingest(settings, &path, mime, meta).await,
        Command::Query { question, k, strict, json } => commands::query(settings, &question, k, strict, json).await,
        Command::IndexInfo => commands::index_info(settings).await,
        Command::Check => commands::check(settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn meta_values_are_typed_when_possible() {
        assert_eq!(parse_meta("owner=alice").unwrap(), ("owner".to_string(), Value::String("alice".into())));
        assert_eq!(parse_meta("year=2021").unwrap().1, serde_json::json!(2021));
        assert_eq!(parse_meta("note=a=b").unwrap().1, Value::String("a=b".into()));
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from(["docqa", "query", "what now?", "-k", "5", "--strict"]).unwrap();
        match cli.command {
            Command::Query { question, k, strict, json } => {
                assert_eq!(question, "what now?");
                assert_eq!(k, Some(5));
                assert!(strict && !json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
