//! kioskrag - campus kiosk question answering CLI

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kioskrag::cli::{metadata_filters, Args, ChatInput, Commands, ConfigCommand, InputHandler};
use kioskrag::config::{Config, VectorBackend};
use kioskrag::generation::{AnswerSource, GenerationClient};
use kioskrag::logging;
use kioskrag::rag::{PipelineAnswer, RagPipeline};
use kioskrag::session::ConversationHistory;
use kioskrag::store::{InMemoryVectorStore, QdrantVectorStore, VectorSearch};
use kioskrag::types::Document;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Commands::Config { action } = &args.command {
        return run_config(&args, *action);
    }

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    logging::init(&config.logging, args.verbose, args.json_logs)
        .context("Failed to initialize logging")?;

    match &args.command {
        Commands::Ask {
            question,
            show_context,
            category,
            language,
            json,
        } => {
            let filters = metadata_filters(category.as_deref(), language.as_deref());
            run_ask(&config, question, &filters, *show_context, *json).await?;
        }
        Commands::Chat { show_context } => run_chat(&config, *show_context).await?,
        Commands::Health => run_health(&config).await?,
        Commands::Stats => run_stats(&config).await?,
        // Runs before logging so `config init` works without a valid file
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn build_pipeline(config: &Config) -> Result<Arc<RagPipeline>> {
    let pb = spinner("Loading models...");
    let pipeline = RagPipeline::from_config(config).await;
    pb.finish_and_clear();
    Ok(Arc::new(pipeline.context("Failed to start the answer pipeline")?))
}

async fn run_ask(
    config: &Config,
    question: &str,
    filters: &BTreeMap<String, String>,
    show_context: bool,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config).await?;

    let pb = spinner("Thinking...");
    let answer = pipeline.answer_with_filters(question, &[], filters).await;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer, show_context);
    }
    Ok(())
}

async fn run_chat(config: &Config, show_context: bool) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let mut history = ConversationHistory::from_config(&config.session);
    let mut input = InputHandler::new("you> ")?;

    println!("{}", "Campus information kiosk".bold());
    println!(
        "{}",
        "Ask a question. /clear forgets the conversation, /exit leaves.".dimmed()
    );

    loop {
        match input.read()? {
            ChatInput::Question(question) => {
                let pb = spinner("Thinking...");
                let answer = pipeline.answer(&question, history.turns()).await;
                pb.finish_and_clear();

                print_answer(&answer, show_context);
                history.record_answer(question, answer.text, answer.source);
            }
            ChatInput::Clear => {
                history.clear();
                println!("{}", "Conversation cleared.".dimmed());
            }
            ChatInput::Unknown(cmd) => {
                println!("{} {}", "Unknown command:".yellow(), cmd);
            }
            ChatInput::Empty => {}
            ChatInput::Exit => break,
        }
    }

    tracing::info!(
        session = %history.session_id(),
        exchanges = history.exchange_count(),
        duration_secs = (chrono::Utc::now() - history.started_at()).num_seconds(),
        "Chat session ended"
    );
    Ok(())
}

fn print_answer(answer: &PipelineAnswer, show_context: bool) {
    match answer.source {
        AnswerSource::Generated => println!("{}", answer.text),
        AnswerSource::Extractive => {
            println!("{}", answer.text);
            let note = "(answer service unavailable; quoted from the knowledge base)";
            println!("{}", note.dimmed());
        }
        AnswerSource::Apology => println!("{}", answer.text.yellow()),
    }

    if show_context {
        let blocks = answer.context.blocks();
        if blocks.is_empty() {
            println!("{}", "No sources used.".dimmed());
        } else {
            let ordering = if answer.reranked { "reranked" } else { "similarity" };
            println!("\n{} ({})", "Sources".bold(), ordering);
            for (idx, block) in blocks.iter().enumerate() {
                println!(
                    "  {}. {} {}",
                    idx + 1,
                    block.title.cyan(),
                    format!("(score: {:.3})", block.score).dimmed()
                );
            }
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn VectorSearch>> {
    match config.vector_store.backend {
        VectorBackend::Qdrant => Ok(Arc::new(
            QdrantVectorStore::connect(&config.vector_store)
                .await
                .context("Failed to connect to Qdrant")?,
        )),
        VectorBackend::Memory => {
            // Stats only need metadata, so documents are not embedded here
            let path = config.snapshot_path();
            let contents = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            let documents: Vec<Document> =
                serde_json::from_str(&contents).context("Failed to parse knowledge base snapshot")?;
            Ok(Arc::new(InMemoryVectorStore::from_documents(documents)))
        }
    }
}

async fn run_health(config: &Config) -> Result<()> {
    let generator = GenerationClient::new(&config.generation)?;
    let generation_ok = generator.health_check().await;
    print_check(
        "Generation backend",
        generation_ok,
        generator.base_url(),
    );

    let (store_ok, detail) = match open_store(config).await {
        Ok(store) => match store.stats().await {
            Ok(stats) => (true, format!("{} documents ({})", stats.total_documents, store.name())),
            Err(e) => (false, e.to_string()),
        },
        Err(e) => (false, format!("{:#}", e)),
    };
    print_check("Vector store", store_ok, &detail);

    if !generation_ok {
        println!(
            "{}",
            "Answers will fall back to quoting the knowledge base.".dimmed()
        );
    }
    Ok(())
}

fn print_check(name: &str, ok: bool, detail: &str) {
    let status = if ok { "ok".green() } else { "unavailable".red() };
    println!("{:<20} {:<12} {}", name, status, detail.dimmed());
}

async fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.stats().await.context("Failed to read store statistics")?;

    println!("{}", "Knowledge base".bold());
    println!("  Backend:        {}", store.name());
    println!("  Documents:      {}", stats.total_documents);
    if !stats.categories.is_empty() {
        println!("  Categories:     {}", stats.categories.join(", "));
    }
    if stats.unique_sources > 0 {
        println!("  Unique sources: {}", stats.unique_sources);
    }
    Ok(())
}

fn run_config(args: &Args, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommand::Init { force } => {
            let path = match &args.config {
                Some(path) => path.clone(),
                None => Config::default_path().context("Could not determine home directory")?,
            };
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            println!("{} {}", "Wrote".green(), path.display());
        }
    }
    Ok(())
}
