use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use grounding::config::{init_logging, Settings};
use grounding::{embedder_from_settings, format_context, Embedder, RetrievalService};

#[derive(Parser)]
#[command(name = "grounding")]
#[command(version = "0.1")]
#[command(about = "Chunk documents and retrieve grounding passages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents into the index if it is empty
    Ingest {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Clear the index and load documents again
    Reload {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the closest passages as JSON
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the context block a generator would receive
    Context {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    Stats,
    Config,
}

type Service = RetrievalService<Box<dyn Embedder>>;

/// Opens the index as it is on disk. Only `ingest` and `reload` read the
/// data directory.
fn open_service(settings: &Settings, data_dir: Option<PathBuf>) -> Result<Service> {
    let mut settings = settings.clone();
    if let Some(dir) = data_dir {
        settings.data_dir = dir.to_string_lossy().to_string();
    }
    let embedder = embedder_from_settings(&settings)
        .with_context(|| format!("Failed to load embedding model '{}'", settings.embedding_model))?;
    let mut service = RetrievalService::new(&settings, embedder)?;
    service
        .open()
        .with_context(|| format!("Failed to open index at '{}'", settings.path))?;
    Ok(service)
}

fn ingest_command(settings: &Settings, dir: Option<PathBuf>) -> Result<()> {
    let mut service = open_service(settings, dir)?;
    service
        .initialize()
        .with_context(|| format!("Failed to load documents from '{}'", service.data_dir().display()))?;
    let stats = service.stats()?;
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

fn reload_command(settings: &Settings, dir: Option<PathBuf>) -> Result<()> {
    let mut service = open_service(settings, dir)?;
    let data_dir = service.data_dir().to_path_buf();
    let added = service
        .reload_documents(&data_dir)
        .with_context(|| format!("Failed to reload documents from '{}'", data_dir.display()))?;
    println!("{}", serde_json::json!({ "chunks_added": added }));
    Ok(())
}

fn search_command(settings: &Settings, query: &str, top_k: Option<usize>) -> Result<()> {
    let service = open_service(settings, None)?;
    let top_k = top_k.unwrap_or(settings.top_k);
    let index = service.vector_index()?;
    let results = index.search_scored(query, top_k)?;

    let output = serde_json::json!({
        "query": query,
        "database_record_count": index.count()?,
        "results": results,
        "actual_results_count": results.len(),
        "requested_results_count": top_k,
    });

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn context_command(settings: &Settings, query: &str, top_k: Option<usize>) -> Result<()> {
    let service = open_service(settings, None)?;
    let passages = service.retrieve_top(query, top_k.unwrap_or(settings.top_k))?;
    println!("{}", format_context(&passages));
    Ok(())
}

fn stats_command(settings: &Settings) -> Result<()> {
    let service = open_service(settings, None)?;
    println!("{}", serde_json::to_string(&service.stats()?)?);
    Ok(())
}

fn config_command(settings: &Settings) -> Result<()> {
    settings.print_config();
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = Settings::new()?;
    init_logging(settings.verbose);

    match args.command {
        Commands::Ingest { dir } => ingest_command(&settings, dir)?,
        Commands::Reload { dir } => reload_command(&settings, dir)?,
        Commands::Search { query, top_k } => search_command(&settings, &query, top_k)?,
        Commands::Context { query, top_k } => context_command(&settings, &query, top_k)?,
        Commands::Stats => stats_command(&settings)?,
        Commands::Config => config_command(&settings)?,
    }
    Ok(())
}
