use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, ProviderKind};
use crate::database::lancedb::{ConnectionPool, QueryResult, vector_store::Collection};
use crate::embeddings::{EmbeddingProvider, create_embedding_provider};
use crate::indexer::{Indexer, IngestReport};
use crate::llm::LlmClient;
use crate::query::Retriever;

/// Ingest every markdown file under `directory` into the configured collection
#[inline]
pub async fn ingest_directory(
    config: &Config,
    pool: &mut ConnectionPool,
    directory: &Path,
) -> Result<IngestReport> {
    if !directory.is_dir() {
        bail!("Directory '{}' not found", directory.display());
    }

    let provider = build_provider(config)?;
    println!(
        "{} Embedding provider: {} ({:?} mode)",
        style("→").cyan(),
        provider.name(),
        config.ingest.mode
    );

    let connection = pool
        .connect(&config.store.path, &config.store.database)
        .await
        .context("Failed to open vector database")?;

    let indexer = Indexer::new(provider, &config.store, &config.ingest);
    let report = indexer
        .ingest(&connection, directory)
        .await
        .with_context(|| format!("Failed to ingest {}", directory.display()))?;

    println!("{}", style("Ingestion complete").green().bold());
    println!("  Markdown files found: {}", report.files_found);
    println!("  Files loaded: {}", report.files_loaded);
    if report.files_skipped > 0 {
        println!(
            "  Files skipped: {}",
            style(report.files_skipped).yellow()
        );
    }
    println!("  Chunks: {}", report.chunks_total);
    println!("  Records inserted: {}", report.chunks_inserted);
    if report.chunks_skipped > 0 {
        println!(
            "  Chunks skipped (embedding failed): {}",
            style(report.chunks_skipped).yellow()
        );
    }
    println!("  Insert batches: {}", report.batches_inserted);
    println!(
        "  Collection: {} in {}",
        config.store.collection,
        config.vector_database_path().display()
    );

    Ok(report)
}

/// Answer a question from the stored chunks
#[inline]
pub async fn ask_question(
    config: &Config,
    pool: &mut ConnectionPool,
    question: &str,
    limit: Option<usize>,
) -> Result<()> {
    let llm = LlmClient::new(&config.llm)?;
    let retriever = open_retriever(config, pool).await?;
    let limit = limit.unwrap_or(config.store.search_limit);

    info!("Answering question with {} context chunks", limit);
    let answer = retriever.ask(&llm, question, limit).await?;

    if answer.sources.is_empty() {
        println!(
            "{}",
            style("No relevant documents found; answering without context").yellow()
        );
    }
    println!("{}", style("Answer:").green().bold());
    println!("{}", answer.text);

    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for result in &answer.sources {
            println!(
                "  - {} (chunk {}, similarity {:.4})",
                result.source_file, result.chunk_index, result.similarity
            );
        }
    }

    Ok(())
}

/// Print the chunks nearest to `query` without generating an answer
#[inline]
pub async fn search_documents(
    config: &Config,
    pool: &mut ConnectionPool,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<QueryResult>> {
    let retriever = open_retriever(config, pool).await?;
    let limit = limit.unwrap_or(config.store.search_limit);
    let results = retriever.search(query, limit).await?;

    if results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(results);
    }

    println!(
        "{} result(s) for: {}",
        results.len(),
        style(query).cyan()
    );
    for (idx, result) in results.iter().enumerate() {
        println!();
        println!(
            "{} {} (chunk {})",
            style(format!("[{}]", idx + 1)).bold(),
            style(&result.source_file).green(),
            result.chunk_index
        );
        println!(
            "    similarity: {:.4}  distance: {:.4}",
            result.similarity, result.distance
        );
        for line in result.document.lines() {
            println!("    {}", line);
        }
    }

    Ok(results)
}

/// Print total embeddings and distinct source files in the collection
#[inline]
pub async fn show_stats(config: &Config, pool: &mut ConnectionPool) -> Result<()> {
    let connection = pool
        .connect(&config.store.path, &config.store.database)
        .await
        .context("Failed to open vector database")?;

    println!(
        "{} {}",
        style("Collection:").bold(),
        config.store.collection
    );

    if !Collection::exists(&connection, &config.store.collection).await? {
        println!("  Collection does not exist yet; run `rag-search ingest <directory>`");
        println!("  Total embeddings: 0");
        println!("  Unique source files: 0");
        return Ok(());
    }

    let collection = Collection::open(&connection, &config.store.collection).await?;
    let stats = collection.stats().await;

    println!("  Dimension: {}", collection.dimension());
    println!("  Distance metric: {}", collection.metric());
    println!("  Total embeddings: {}", stats.total_embeddings);
    println!("  Unique source files: {}", stats.unique_source_files);

    Ok(())
}

/// Summarize the contents of one file
#[inline]
pub async fn summarize_file(config: &Config, path: &Path) -> Result<()> {
    let llm = LlmClient::new(&config.llm)?;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    info!("Summarizing {} ({} characters)", path.display(), text.chars().count());
    let summary = llm.summarize(&text);

    println!("{}", style("Summary:").green().bold());
    println!("{}", summary);

    Ok(())
}

/// Print the effective configuration with secrets masked
#[inline]
pub fn show_config(config: &Config, config_file: Option<&Path>) -> Result<()> {
    match config_file
        .map(Path::to_path_buf)
        .or_else(Config::default_config_file)
        .filter(|path| path.exists())
    {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults and environment)"),
    }
    println!();

    let mut masked = config.clone();
    masked.embedding.api_key = masked.embedding.api_key.as_deref().map(mask_secret);
    masked.llm.api_key = masked.llm.api_key.as_deref().map(mask_secret);

    let rendered = toml::to_string_pretty(&masked).context("Failed to render configuration")?;
    println!("{}", rendered);

    if config.embedding.provider == ProviderKind::Api && config.embedding.api_key.is_none() {
        println!(
            "{}",
            style("Warning: EMBEDDING_API_KEY is not set but the api provider is selected").yellow()
        );
    }
    if config.llm.api_key.is_none() {
        println!(
            "{}",
            style("Note: OPENAI_API_KEY is not set; ask and summarize are unavailable").dim()
        );
    }

    Ok(())
}

fn build_provider(config: &Config) -> Result<Arc<EmbeddingProvider>> {
    let provider = create_embedding_provider(&config.embedding, config.ingest.max_text_length)
        .context("Failed to initialize embedding provider")?;
    Ok(Arc::new(provider))
}

async fn open_retriever(config: &Config, pool: &mut ConnectionPool) -> Result<Retriever> {
    let connection = pool
        .connect(&config.store.path, &config.store.database)
        .await
        .context("Failed to open vector database")?;

    if !Collection::exists(&connection, &config.store.collection).await? {
        bail!(
            "Collection '{}' not found in {}; run `rag-search ingest <directory>` first",
            config.store.collection,
            config.vector_database_path().display()
        );
    }

    let collection = Collection::open(&connection, &config.store.collection).await?;
    let provider = build_provider(config)?;
    Ok(Retriever::new(collection, provider))
}

/// Keep the first four characters of a secret
fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "********".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}********", visible)
}
