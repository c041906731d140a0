//! Figura: figure captions and biomedical entities from PMC papers.
//! Entry point for the `figura` binary.

mod watcher;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use figura_common::models::Paper;
use figura_common::Config;
use figura_db::{Database, PaperStore};
use figura_ingestion::{BatchReport, FiguraClients, PaperProcessor, RetryPolicy};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::watcher::FolderWatcher;

#[derive(Parser, Debug)]
#[command(name = "figura", version, about = "Ingest figure captions and entities from PubMed Central")]
struct Cli {
    /// Config file (defaults to $FIGURA_CONFIG, then ./figura.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one or more PMC IDs or PMIDs
    Ingest {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Ingest every identifier listed in a file, one per line
    Batch { file: PathBuf },
    /// Poll a folder for identifier files
    Watch {
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List stored papers
    List,
    /// Print a stored paper with its figures and entities
    Show { id: String },
    /// Drop and recreate every table
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.general.log_level))
                .unwrap_or_else(|_| EnvFilter::new("figura=debug,info")),
        )
        .init();

    info!("Figura {}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config).await?;

    match cli.command {
        Command::Ingest { ids } => {
            let processor = build_processor(&config, store)?;
            let report = processor.process_batch(&ids).await;
            Ok(finish(&report))
        }
        Command::Batch { file } => {
            let processor = build_processor(&config, store)?;
            let report = processor.process_file(&file).await?;
            if report.outcomes.is_empty() {
                warn!("No identifiers found in {}", file.display());
            }
            Ok(finish(&report))
        }
        Command::Watch { folder, interval } => {
            let mut watcher = FolderWatcher::from_config(&config.ingestion);
            if folder.is_some() || interval.is_some() {
                watcher = FolderWatcher::new(
                    folder.unwrap_or_else(|| watcher.folder().to_path_buf()),
                    Duration::from_secs(interval.unwrap_or(config.ingestion.watch_interval_secs).max(1)),
                );
            }
            let processor = build_processor(&config, store)?;
            watcher.run(&processor).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            let ids = store.list_ids().await?;
            for id in &ids {
                println!("{id}");
            }
            let stats = store.database().stats().await?;
            println!(
                "{} papers, {} figures, {} entities, {} figure-entity links",
                stats.papers, stats.figures, stats.entities, stats.figure_entities
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => match store.get(&id).await? {
            Some(paper) => {
                print_paper(&paper);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("No stored paper {id}");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Reset { yes } => {
            if !yes {
                eprintln!("This deletes every stored paper. Re-run with --yes to confirm.");
                return Ok(ExitCode::FAILURE);
            }
            store.database().reset().await?;
            info!("Database reset");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)
                .with_context(|| format!("Could not load {}", path.display()))?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => Config::load().context("Could not load figura.toml"),
    }
}

async fn open_store(config: &Config) -> anyhow::Result<PaperStore> {
    let db = Database::connect(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    db.initialize().await.context("Failed to initialize schema")?;
    Ok(PaperStore::new(Arc::new(db), config.database.figure_policy))
}

fn build_processor(config: &Config, store: PaperStore) -> anyhow::Result<PaperProcessor> {
    let clients = FiguraClients::from_config(config)?;
    Ok(PaperProcessor::new(&clients, store, RetryPolicy::from_config(&config.ingestion)))
}

/// Print the per-identifier results; failure only when nothing succeeded.
fn finish(report: &BatchReport) -> ExitCode {
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!(
                "ok    {:<16} {} figures, {} entity links",
                outcome.input_id, outcome.figures, outcome.entities
            ),
            Some(err) => println!("error {:<16} {}", outcome.input_id, err),
        }
    }
    println!(
        "{} succeeded, {} failed ({} ms)",
        report.succeeded, report.failed, report.duration_ms
    );

    if report.all_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_paper(paper: &Paper) {
    println!("{}  {}", paper.paper_id, paper.title);
    if !paper.abstract_text.is_empty() {
        println!("\n{}", paper.abstract_text);
    }
    for figure in &paper.figures {
        println!("\n[{}] {}", figure.label, figure.caption);
        if let Some(url) = &figure.url {
            println!("  url: {url}");
        }
        for entity in &figure.entities {
            let span = match (entity.start, entity.end) {
                (Some(s), Some(e)) => format!("{s}..{e}"),
                _ => "-".to_string(),
            };
            println!("  {:<24} {:<12} {}", entity.text, entity.type_or_empty(), span);
        }
    }
}
