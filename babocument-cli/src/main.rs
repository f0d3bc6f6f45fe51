use anyhow::{Context, Result};
use babocument_core::config::{Config, EmbeddingBackend};
use babocument_core::store::{DocumentRecord, DocumentStore, SearchFilters, SearchResult};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "babocument")]
#[command(about = "Semantic search over a local collection of research papers", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Logging verbosity level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Ingest papers from a JSON array of records")]
    Ingest {
        #[arg(help = "Path to a JSON file holding an array of papers")]
        file: PathBuf,
    },

    #[command(about = "Import every paper text file in a directory")]
    Import {
        dir: PathBuf,

        /// Clear the collection before importing
        #[arg(long)]
        reset: bool,
    },

    #[command(about = "Search papers by meaning")]
    Search {
        query: String,

        /// Number of results to return (defaults to storage.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only papers from this year onwards (inclusive)
        #[arg(long, value_name = "YEAR")]
        year_min: Option<i32>,

        /// Only papers up to this year (inclusive)
        #[arg(long, value_name = "YEAR")]
        year_max: Option<i32>,

        /// Only papers with this source tag
        #[arg(long)]
        source: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(about = "List papers similar to a stored paper")]
    Similar {
        id: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "Show one paper")]
    Get { id: String },

    #[command(about = "Delete one paper")]
    Delete { id: String },

    #[command(about = "Remove every paper from the collection")]
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    #[command(about = "Show collection statistics")]
    Stats,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Show => {
            show_config(&config);
            Ok(())
        }
        Commands::Ingest { file } => ingest(&config, &file).await,
        Commands::Import { dir, reset } => import(&config, &dir, reset).await,
        Commands::Search { query, limit, year_min, year_max, source, json } => {
            if let (Some(min), Some(max)) = (year_min, year_max) {
                if min > max {
                    anyhow::bail!(
                        "Invalid year range: --year-min ({}) is greater than --year-max ({})",
                        min,
                        max
                    );
                }
            }
            let filters = SearchFilters { year_min, year_max, source };
            search(&config, &query, limit, &filters, json).await
        }
        Commands::Similar { id, limit, json } => similar(&config, &id, limit, json).await,
        Commands::Get { id } => get(&config, &id).await,
        Commands::Delete { id } => delete(&config, &id).await,
        Commands::Reset { yes } => reset(&config, yes).await,
        Commands::Stats => stats(&config).await,
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
    }
    Config::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

async fn open_store(config: &Config) -> Result<DocumentStore> {
    DocumentStore::new(config)
        .await
        .context("Failed to open document store")
}

fn show_config(config: &Config) {
    let provider = match config.embedding.provider {
        EmbeddingBackend::FastEmbed => "fastembed",
        EmbeddingBackend::Ollama => "ollama",
    };

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Provider:       {}", provider.cyan());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Dimension:      {}", config.embedding.dimension);
    match config.embedding.provider {
        EmbeddingBackend::FastEmbed => {
            let cache_dir = config.embedding.cache_dir.as_deref().unwrap_or("(fastembed default)");
            println!("  Model Cache:    {}", cache_dir);
        }
        EmbeddingBackend::Ollama => println!("  Base URL:       {}", config.embedding.base_url),
    }
    println!();
    println!("{}", "Storage:".bold());
    println!("  Location:       {}", config.storage.storage_mode.location());
    println!("  Collection:     {}", config.storage.collection_name);
    println!("  Distance:       {}", config.storage.distance);
    println!("  Default Limit:  {}", config.storage.default_limit);
    println!();
    println!("{}", "Import:".bold());
    println!("  Extensions:     {}", config.import.extensions.join(", "));
}

async fn ingest(config: &Config, file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<DocumentRecord> = serde_json::from_str(&content)
        .context("Failed to parse papers; expected a JSON array of records")?;

    let store = open_store(config).await?;
    let count = store.ingest(&records).await?;

    println!("{} Ingested {} papers", "✓".green().bold(), count);
    Ok(())
}

async fn import(config: &Config, dir: &Path, reset: bool) -> Result<()> {
    let store = open_store(config).await?;
    if reset {
        store.reset().await?;
        println!("{} Collection cleared", "✓".green().bold());
    }

    println!("{} Importing papers from {}...", "→".blue(), dir.display());
    let count = store.import_directory(dir, &config.import).await?;
    let total = store.stats().await?.total_documents;

    println!("{} Imported {} papers ({} in collection)", "✓".green().bold(), count, total);
    Ok(())
}

async fn search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    filters: &SearchFilters,
    json: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let limit = limit.unwrap_or_else(|| store.default_limit());
    let results = store.search(query, limit, filters).await?;
    print_results(&results, json)
}

async fn similar(config: &Config, id: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    if store.get_document(id).await?.is_none() {
        println!("{}", format!("No paper with id '{}'", id).yellow());
        return Ok(());
    }

    let limit = limit.unwrap_or_else(|| store.default_limit());
    let results = store.find_similar(id, limit).await?;
    print_results(&results, json)
}

async fn get(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let Some(document) = store.get_document(id).await? else {
        println!("{}", format!("No paper with id '{}'", id).yellow());
        return Ok(());
    };

    let metadata = &document.metadata;
    println!("{}", metadata.title.bold().green());
    println!("  ID:       {}", document.id.cyan());
    if let Some(authors) = &metadata.authors {
        println!("  Authors:  {}", authors);
    }
    if let Some(year) = metadata.year {
        println!("  Year:     {}", year);
    }
    println!("  Source:   {}", metadata.source);
    if let Some(doi) = &metadata.doi {
        println!("  DOI:      {}", doi);
    }
    if let Some(arxiv_id) = &metadata.arxiv_id {
        println!("  arXiv:    {}", arxiv_id);
    }
    if let Some(file_path) = &metadata.file_path {
        println!("  File:     {}", file_path);
    }
    println!();
    println!("{}", truncate(&document.text, 500));
    Ok(())
}

async fn delete(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    if store.delete_document(id).await? {
        println!("{} Deleted {}", "✓".green().bold(), id.cyan());
    } else {
        println!("{}", format!("No paper with id '{}'", id).yellow());
    }
    Ok(())
}

async fn reset(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete every paper without --yes");
    }

    let store = open_store(config).await?;
    store.reset().await?;
    println!(
        "{} Collection '{}' cleared",
        "✓".green().bold(),
        config.storage.collection_name
    );
    Ok(())
}

async fn stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.stats().await?;

    println!("{}", "Collection Statistics:".bold().green());
    println!();
    println!("  Documents:      {}", stats.total_documents.to_string().cyan());
    println!("  Model:          {}", stats.embedding_model);
    println!("  Dimension:      {}", stats.embedding_dimension);
    println!("  Distance:       {}", stats.distance);
    println!("  Location:       {}", stats.storage_path);
    println!("  Collection:     {}", stats.collection_name);
    Ok(())
}

fn print_results(results: &[SearchResult], json: bool) -> Result<()> {
    if json {
        let output = serde_json::to_string_pretty(results)
            .context("Failed to serialize results to JSON")?;
        println!("{}", output);
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No results found.".yellow());
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        let score = format!("{:.3}", result.similarity);
        let score = if result.similarity >= 0.5 {
            score.green()
        } else if result.similarity >= 0.35 {
            score.yellow()
        } else {
            score.normal()
        };

        println!(
            "{:>3}. [{}] {} {}",
            rank + 1,
            score,
            truncate(&result.metadata.title, 70).bold(),
            format!("({})", result.id).dimmed()
        );

        let mut details = Vec::new();
        if let Some(authors) = &result.metadata.authors {
            details.push(truncate(authors, 40));
        }
        if let Some(year) = result.metadata.year {
            details.push(year.to_string());
        }
        details.push(result.metadata.source.clone());
        println!("     {}", details.join(" | "));
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
