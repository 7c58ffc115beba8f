//! Media handling: fetching remote audio and normalizing it for the
//! transcription backend.

pub mod fetcher;
pub mod normalizer;

pub use fetcher::{fetch_to_file, FetchedAudio};
pub use normalizer::{normalize_to_wav, NormalizeError, TARGET_SAMPLE_RATE};
