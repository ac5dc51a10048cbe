//! `lexlead`: ask legal questions, build the corpus index, inspect question
//! classification.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lexlead_rag::processing::{CorpusIndexer, TextChunker};
use lexlead_rag::search::CorpusIndex;
use lexlead_rag::{Advisor, AdvisorConfig, AdvisorResponse, AnswerOutcome, StrategyMode};

#[derive(Parser, Debug)]
#[command(name = "lexlead", version, about = "Adaptive RAG advisor for Illinois legal questions")]
struct Cli {
    /// JSON configuration file (falls back to LEXLEAD_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question
    Ask {
        question: String,

        /// workflow or selector
        #[arg(long)]
        strategy: Option<StrategyMode>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build or refresh the corpus index from a directory of .txt/.md files
    Index {
        /// Defaults to retrieval.corpus_dir from the config
        dir: Option<PathBuf>,

        /// Drop every passage before indexing
        #[arg(long)]
        rebuild: bool,
    },
    /// Classify a question without answering it
    Evaluate {
        question: String,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AdvisorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Ask {
            question,
            strategy,
            json,
        } => ask(&config, &question, strategy, json).await,
        Commands::Index { dir, rebuild } => index(&config, dir, rebuild),
        Commands::Evaluate { question, json } => evaluate(&config, &question, json).await,
    }
}

async fn ask(config: &AdvisorConfig, question: &str, strategy: Option<StrategyMode>, json: bool) -> Result<()> {
    let mut advisor = Advisor::from_config(config).await?;
    if let Some(mode) = strategy {
        advisor = advisor.with_mode(mode);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let response = advisor
        .answer_with_cancel(question, cancel)
        .await
        .context("Advisor run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &AdvisorResponse) {
    let result = &response.result;
    match &result.outcome {
        AnswerOutcome::Verified { answer } | AnswerOutcome::Direct { answer } => {
            println!("{}", answer);
        }
        AnswerOutcome::Unverified { answer, reason } => {
            println!("{}", answer);
            println!();
            println!("[unverified: {}]", reason);
        }
        AnswerOutcome::NoAnswer { reason } => {
            println!("Could not find relevant information to answer this question.");
            println!("[{}]", reason);
        }
    }

    println!();
    println!("Strategy: {} ({})", response.strategy, result.outcome.label());
    if let Some(evaluation) = &response.evaluation {
        println!(
            "Evaluation: {:?}, difficulty {:?}, rag useful: {}, Illinois law: {}",
            evaluation.category,
            evaluation.difficulty,
            evaluation.is_rag_useful,
            evaluation.is_illinois_law
        );
        if !evaluation.reasoning.is_empty() {
            println!("Reasoning: {}", evaluation.reasoning);
        }
    }
    if result.final_question != result.question {
        println!("Rewritten question: {}", result.final_question);
    }

    if !result.documents.is_empty() {
        println!("Sources:");
        for (i, doc) in result.documents.iter().enumerate() {
            println!("  [{}] {}", i + 1, doc);
        }
    }

    let path: Vec<&str> = result.trace.visited.iter().map(|n| n.as_str()).collect();
    println!(
        "Trace: {} ({} rewrites, {} regenerations, {} ms)",
        path.join(" -> "),
        result.trace.rewrites,
        result.trace.regenerations,
        result.trace.elapsed_ms
    );
}

fn index(config: &AdvisorConfig, dir: Option<PathBuf>, rebuild: bool) -> Result<()> {
    let dir = dir
        .or_else(|| config.retrieval.corpus_dir.clone())
        .context("No corpus directory given and retrieval.corpus_dir is not set")?;
    let index_dir = config.index_dir();

    let index = CorpusIndex::open(&index_dir)?;
    if rebuild {
        index.clear()?;
    }
    let indexer = CorpusIndexer::new(&index, TextChunker::from_config(&config.retrieval.chunking));
    let report = indexer.index_dir(&dir)?;

    println!(
        "Indexed {} files ({} passages, {} skipped) into {}",
        report.files_indexed,
        report.passages_indexed,
        report.files_skipped,
        index_dir.display()
    );
    println!("Index now holds {} passages", index.num_passages());
    Ok(())
}

async fn evaluate(config: &AdvisorConfig, question: &str, json: bool) -> Result<()> {
    let advisor = Advisor::from_config(config).await?;
    let evaluation = advisor.evaluate(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        println!("Category:      {:?}", evaluation.category);
        println!("Difficulty:    {:?}", evaluation.difficulty);
        println!("RAG useful:    {}", evaluation.is_rag_useful);
        println!("Illinois law:  {}", evaluation.is_illinois_law);
        println!("Reasoning:     {}", evaluation.reasoning);
        println!("Strategy:      {}", lexlead_rag::select_strategy(&evaluation));
    }
    Ok(())
}
