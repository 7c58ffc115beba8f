//! audiostore - Audiobook catalog backend
//!
//! A catalog of audiobooks whose uploaded audio is transcribed and
//! summarized asynchronously through external AI services.
//!
//! # Architecture
//!
//! The core is the media-processing pipeline:
//! - Audio units are registered with a remote locator and transcription is
//!   triggered fire-and-forget through a task queue
//! - A worker fetches the audio, normalizes it to the canonical waveform,
//!   calls the transcription service, and persists the transcript artifact
//! - A second pipeline derives an item's description and tags from its
//!   first transcribed unit via a completion service
//! - Failed invocations are re-enqueued with a fixed delay, up to a
//!   bounded number of retries
//!
//! # Modules
//!
//! - `domain`: Data structures (CatalogItem, AudioUnit, ProcessingStatus)
//! - `store`: Persistence gateway (SQLite catalog, transcript artifacts)
//! - `media`: Fetching and normalizing audio
//! - `ai`: External service adapters (transcription, summarization)
//! - `tasks`: Orchestration (task queue, pipelines, worker, retry policy)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create an item and upload a unit
//! audiostore add --title "Dune" --author "Frank Herbert" --price 9.99 --cover https://blobs/covers/dune.jpg
//! audiostore add-unit <item-id> --url https://blobs/audio/dune-01.mp3 --ordinal 1
//!
//! # Run the pipeline worker
//! audiostore worker
//!
//! # Derive description and tags once a transcript exists
//! audiostore summarize <item-id>
//! ```

pub mod ai;
pub mod cli;
pub mod config;
pub mod domain;
pub mod media;
pub mod store;
pub mod tasks;

// Re-export main types at crate root for convenience
pub use ai::{ItemSummary, SummarizationClient, Summarizer, Transcriber, TranscriptionClient};
pub use domain::{AudioUnit, CatalogItem, NewCatalogItem, ProcessingStatus};
pub use store::{ArtifactStore, CatalogStore, StoreError};
pub use tasks::{
    run_summarization, run_transcription, RetryPolicy, SummarizeOutcome, TaskError, TaskQueue,
    TranscribeOutcome, Worker,
};
