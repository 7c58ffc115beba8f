//! Command-line interface.
//!
//! Admin surface for the catalog plus the pipeline worker:
//! - `audiostore add` / `add-unit` / `delete` — manage catalog entries
//! - `audiostore enqueue` / `summarize` — trigger pipeline tasks
//! - `audiostore worker` — run the pipeline worker
//! - `audiostore status` / `show` / `list` — inspect state

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::ai::{SummarizationClient, TranscriptionClient};
use crate::config::Config;
use crate::domain::NewCatalogItem;
use crate::store::{ArtifactStore, CatalogStore};
use crate::tasks::{TaskQueue, Worker};

/// Audiobook catalog backend
#[derive(Parser, Debug)]
#[command(name = "audiostore", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a catalog item
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        price: Option<f64>,

        /// Cover image locator
        #[arg(long)]
        cover: String,
    },

    /// Register an audio unit under an item and queue its transcription
    AddUnit {
        item_id: Uuid,

        /// Remote audio locator
        #[arg(long)]
        url: String,

        /// Position in the playback sequence
        #[arg(long, default_value_t = 0)]
        ordinal: u32,
    },

    /// Re-queue transcription for a unit
    Enqueue { unit_id: Uuid },

    /// Queue summarization for an item
    Summarize { item_id: Uuid },

    /// Show an item with its units
    Show { item_id: Uuid },

    /// List all catalog items
    List,

    /// Delete an item, its units, and their local transcript artifacts
    Delete { item_id: Uuid },

    /// Show task queue status
    Status,

    /// Run the pipeline worker
    Worker {
        /// Drain currently-due jobs and exit
        #[arg(long)]
        once: bool,

        /// Poll interval when idle
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;
        tokio::fs::create_dir_all(&config.home)
            .await
            .with_context(|| format!("failed to create state dir: {}", config.home.display()))?;

        match self.command {
            Commands::Add {
                title,
                author,
                price,
                cover,
            } => execute_add(&config, title, author, price, cover),
            Commands::AddUnit {
                item_id,
                url,
                ordinal,
            } => execute_add_unit(&config, item_id, &url, ordinal).await,
            Commands::Enqueue { unit_id } => execute_enqueue(&config, unit_id).await,
            Commands::Summarize { item_id } => execute_summarize(&config, item_id).await,
            Commands::Show { item_id } => execute_show(&config, item_id),
            Commands::List => execute_list(&config),
            Commands::Delete { item_id } => execute_delete(&config, item_id).await,
            Commands::Status => execute_status(&config).await,
            Commands::Worker { once, poll_secs } => {
                execute_worker(&config, once, poll_secs).await
            }
        }
    }
}

fn open_store(config: &Config) -> Result<CatalogStore> {
    CatalogStore::open(&config.db_path())
        .with_context(|| format!("failed to open catalog: {}", config.db_path().display()))
}

fn execute_add(
    config: &Config,
    title: String,
    author: String,
    price: Option<f64>,
    cover: String,
) -> Result<()> {
    let store = open_store(config)?;
    let item = store.insert_item(NewCatalogItem {
        title,
        author,
        price,
        cover_url: cover,
    })?;

    println!("✅ Created catalog item {} ({})", item.id, item.title);
    Ok(())
}

async fn execute_add_unit(
    config: &Config,
    item_id: Uuid,
    url: &str,
    ordinal: u32,
) -> Result<()> {
    let store = open_store(config)?;
    let unit = store.insert_unit(item_id, ordinal, url)?;

    // Transcription is triggered immediately on upload, fire-and-forget
    let queue = TaskQueue::open(config.queue_path()).await?;
    let job_id = queue.enqueue_transcription(unit.id).await?;

    println!("✅ Registered unit {} (ordinal {})", unit.id, unit.ordinal);
    println!("   Transcription queued (job {})", job_id);
    Ok(())
}

async fn execute_enqueue(config: &Config, unit_id: Uuid) -> Result<()> {
    let store = open_store(config)?;
    // Fail fast on unknown ids instead of queueing a doomed job
    store.get_unit(unit_id)?;

    let queue = TaskQueue::open(config.queue_path()).await?;
    let job_id = queue.enqueue_transcription(unit_id).await?;

    println!("✅ Transcription queued (job {})", job_id);
    Ok(())
}

async fn execute_summarize(config: &Config, item_id: Uuid) -> Result<()> {
    let store = open_store(config)?;
    store.get_item(item_id)?;

    let queue = TaskQueue::open(config.queue_path()).await?;
    let job_id = queue.enqueue_summarization(item_id).await?;

    println!("✅ Summarization queued (job {})", job_id);
    Ok(())
}

fn execute_show(config: &Config, item_id: Uuid) -> Result<()> {
    let store = open_store(config)?;
    let item = store.get_item(item_id)?;
    let units = store.list_units(item_id)?;

    println!();
    println!("{} — {}", item.title, item.author);
    println!("  id:          {}", item.id);
    println!("  price:       {:.2}", item.price);
    println!("  tags:        {}", if item.tags.is_empty() { "-" } else { item.tags.as_str() });
    println!("  description: {}", if item.description.is_empty() { "-" } else { item.description.as_str() });
    println!();

    if units.is_empty() {
        println!("No audio units");
        return Ok(());
    }

    println!("{:<38} {:<8} {:<11} TRANSCRIPT", "UNIT", "ORDINAL", "STATUS");
    println!("{}", "-".repeat(75));
    for unit in units {
        println!(
            "{:<38} {:<8} {:<11} {}",
            unit.id,
            unit.ordinal,
            unit.status.to_string(),
            if unit.has_transcript() { "yes" } else { "-" }
        );
    }

    Ok(())
}

fn execute_list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let items = store.list_items()?;

    if items.is_empty() {
        println!("Catalog is empty");
        return Ok(());
    }

    println!("{:<38} {:<30} {:<20} PRICE", "ID", "TITLE", "AUTHOR");
    println!("{}", "-".repeat(100));
    for item in items {
        println!(
            "{:<38} {:<30} {:<20} {:.2}",
            item.id, item.title, item.author, item.price
        );
    }

    Ok(())
}

async fn execute_delete(config: &Config, item_id: Uuid) -> Result<()> {
    let store = open_store(config)?;
    let artifacts = ArtifactStore::new(config.artifacts_dir());

    let units = store.delete_item(item_id)?;
    for unit in &units {
        artifacts.remove(unit.id).await?;
    }

    println!("✅ Deleted item {} and {} unit(s)", item_id, units.len());
    Ok(())
}

async fn execute_status(config: &Config) -> Result<()> {
    let queue = TaskQueue::open(config.queue_path()).await?;
    let status = queue.status().await?;

    println!();
    println!("Task Queue Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Queue file: {}", config.queue_path().display());
    println!();
    println!("  Queued:  {}", status.queued);
    println!("  Running: {}", status.running);
    println!("  Done:    {}", status.done);
    println!("  Failed:  {}", status.failed);
    println!("  Total:   {}", status.total());
    println!();

    if !status.recent.is_empty() {
        println!("Recent:");
        for job in &status.recent {
            println!(
                "  [{:?}] {} {} (attempt {})",
                job.status, job.kind, job.target, job.attempt
            );
        }
    }

    Ok(())
}

async fn execute_worker(config: &Config, once: bool, poll_secs: u64) -> Result<()> {
    let api_key = config.ai.require_api_key()?.to_string();

    let store = Arc::new(open_store(config)?);
    let artifacts = Arc::new(ArtifactStore::new(config.artifacts_dir()));
    let queue = Arc::new(TaskQueue::open(config.queue_path()).await?);

    let transcriber = Arc::new(TranscriptionClient::new(
        config.ai.transcription_url.clone(),
        api_key.clone(),
        config.ai.transcription_model.clone(),
    ));
    let summarizer = Arc::new(SummarizationClient::new(
        config.ai.completion_url.clone(),
        api_key,
        config.ai.completion_model.clone(),
        config.ai.max_tokens,
    ));

    let worker = Worker::new(store, artifacts, queue, transcriber, summarizer, config.retry);

    if once {
        let executed = worker.run_once().await?;
        println!("✅ Executed {} job(s)", executed);
        return Ok(());
    }

    worker.run(Duration::from_secs(poll_secs)).await?;
    Ok(())
}
