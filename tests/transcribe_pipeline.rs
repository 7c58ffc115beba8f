//! Transcription Pipeline Integration Tests
//!
//! End-to-end tests against mocked HTTP collaborators: the blob endpoint
//! serving source audio and the transcription service.

use std::sync::Arc;

use mockito::{Server, ServerGuard};
use tempfile::TempDir;
use uuid::Uuid;

use audiostore::ai::{ItemSummary, Summarizer, TranscriptionClient};
use audiostore::domain::{NewCatalogItem, ProcessingStatus};
use audiostore::store::{ArtifactStore, CatalogStore};
use audiostore::tasks::{
    run_transcription, JobStatus, RetryPolicy, TaskError, TaskQueue, TranscribeOutcome, Worker,
};

/// A short valid WAV file for the fetch endpoint to serve
fn wav_fixture(temp: &TempDir) -> Vec<u8> {
    let path = temp.path().join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..8_000u32 {
        let t = i as f32 / 16_000.0;
        let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 16_000.0) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    std::fs::read(&path).unwrap()
}

struct TestEnv {
    server: ServerGuard,
    store: Arc<CatalogStore>,
    artifacts: Arc<ArtifactStore>,
    transcriber: TranscriptionClient,
    http: reqwest::Client,
    _temp: TempDir,
}

async fn setup() -> TestEnv {
    let server = Server::new_async().await;
    let temp = TempDir::new().unwrap();

    let transcriber = TranscriptionClient::new(
        format!("{}/v1/audio/transcriptions", server.url()),
        "test-key",
        "whisper-1",
    );

    TestEnv {
        server,
        store: Arc::new(CatalogStore::open_in_memory().unwrap()),
        artifacts: Arc::new(ArtifactStore::new(temp.path().join("transcripts"))),
        transcriber,
        http: reqwest::Client::new(),
        _temp: temp,
    }
}

impl TestEnv {
    fn create_unit(&self, audio_path: &str) -> Uuid {
        let item = self
            .store
            .insert_item(NewCatalogItem {
                title: "Test Audiobook".to_string(),
                author: "Test Author".to_string(),
                price: Some(10.0),
                cover_url: "https://blobs/covers/test.jpg".to_string(),
            })
            .unwrap();
        self.store
            .insert_unit(item.id, 1, &format!("{}{}", self.server.url(), audio_path))
            .unwrap()
            .id
    }

    async fn run(&self, unit_id: Uuid, attempt: u32) -> Result<TranscribeOutcome, TaskError> {
        run_transcription(
            &self.store,
            &self.artifacts,
            &self.http,
            &self.transcriber,
            unit_id,
            attempt,
        )
        .await
    }
}

#[tokio::test]
async fn test_successful_transcription() {
    let mut env = setup().await;
    let audio = wav_fixture(&env._temp);

    let _audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(200)
        .with_header("content-type", "audio/wav")
        .with_body(audio)
        .create_async()
        .await;

    let response_body = r#"{"text":"hello world"}"#;
    let transcribe_mock = env
        .server
        .mock("POST", "/v1/audio/transcriptions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(response_body)
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");
    let outcome = env.run(unit_id, 0).await.unwrap();
    assert_eq!(outcome, TranscribeOutcome::Transcribed);

    // Terminal state: success, with a stored artifact that round-trips to
    // exactly the service's response body
    let unit = env.store.get_unit(unit_id).unwrap();
    assert_eq!(unit.status, ProcessingStatus::Success);
    assert!(unit.has_transcript());

    let stored = env.artifacts.load(unit_id).await.unwrap().unwrap();
    let stored_json: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    let original_json: serde_json::Value = serde_json::from_str(response_body).unwrap();
    assert_eq!(stored_json, original_json);

    transcribe_mock.assert_async().await;
}

#[tokio::test]
async fn test_idempotent_rerun_overwrites_artifact() {
    let mut env = setup().await;
    let audio = wav_fixture(&env._temp);

    let _audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(200)
        .with_body(audio)
        .expect(2)
        .create_async()
        .await;

    let _first = env
        .server
        .mock("POST", "/v1/audio/transcriptions")
        .with_status(200)
        .with_body(r#"{"text":"first pass"}"#)
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");
    env.run(unit_id, 0).await.unwrap();

    // Later-created mocks take priority, so the re-run sees a new result
    let _second = env
        .server
        .mock("POST", "/v1/audio/transcriptions")
        .with_status(200)
        .with_body(r#"{"text":"second pass"}"#)
        .create_async()
        .await;

    let outcome = env.run(unit_id, 0).await.unwrap();
    assert_eq!(outcome, TranscribeOutcome::Transcribed);

    // Still success, and the artifact is the new result — no accumulation
    let unit = env.store.get_unit(unit_id).unwrap();
    assert_eq!(unit.status, ProcessingStatus::Success);

    let stored = env.artifacts.load(unit_id).await.unwrap().unwrap();
    let stored_json: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(stored_json, serde_json::json!({"text": "second pass"}));
}

#[tokio::test]
async fn test_service_error_marks_unit_failed() {
    let mut env = setup().await;
    let audio = wav_fixture(&env._temp);

    let _audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(200)
        .with_body(audio)
        .create_async()
        .await;

    let _transcribe_mock = env
        .server
        .mock("POST", "/v1/audio/transcriptions")
        .with_status(400)
        .with_body(r#"{"error":"bad request"}"#)
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");
    let result = env.run(unit_id, 0).await;

    assert!(matches!(result, Err(TaskError::Transient(_))));

    let unit = env.store.get_unit(unit_id).unwrap();
    assert_eq!(unit.status, ProcessingStatus::Failed);
    assert!(!unit.has_transcript());
    assert!(env.artifacts.load(unit_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_failure_is_transient() {
    let mut env = setup().await;

    let _audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(404)
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");
    let result = env.run(unit_id, 0).await;

    assert!(matches!(result, Err(TaskError::Transient(_))));
    assert_eq!(
        env.store.get_unit(unit_id).unwrap().status,
        ProcessingStatus::Failed
    );
}

#[tokio::test]
async fn test_undecodable_audio_is_permanent() {
    let mut env = setup().await;

    let _audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(200)
        .with_body("definitely not audio bytes")
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");
    let result = env.run(unit_id, 0).await;

    // Corrupt input is not worth retrying: same bytes, same failure
    let err = result.unwrap_err();
    assert!(matches!(err, TaskError::Unprocessable(_)));
    assert!(!err.is_retryable());

    assert_eq!(
        env.store.get_unit(unit_id).unwrap().status,
        ProcessingStatus::Failed
    );
}

#[tokio::test]
async fn test_missing_unit_is_not_found() {
    let env = setup().await;

    let result = env.run(Uuid::new_v4(), 0).await;

    let err = result.unwrap_err();
    assert!(matches!(err, TaskError::NotFound { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_in_flight_unit_is_skipped() {
    let env = setup().await;
    let unit_id = env.create_unit("/audio/u1.mp3");

    // Simulate a concurrent invocation holding the unit
    assert!(env.store.begin_processing(unit_id).unwrap());

    let outcome = env.run(unit_id, 0).await.unwrap();
    assert_eq!(outcome, TranscribeOutcome::AlreadyProcessing);

    // The holder's state is untouched
    assert_eq!(
        env.store.get_unit(unit_id).unwrap().status,
        ProcessingStatus::Processing
    );
}

/// Summarizer stub for worker tests that never expect a summarization job
struct UnusedSummarizer;

#[async_trait::async_trait]
impl Summarizer for UnusedSummarizer {
    async fn summarize(&self, _transcript: &str) -> anyhow::Result<ItemSummary> {
        anyhow::bail!("no summarization expected in this test")
    }
}

#[tokio::test]
async fn test_worker_exhausts_retries_then_fails() {
    let mut env = setup().await;
    let audio = wav_fixture(&env._temp);

    let _audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(200)
        .with_body(audio)
        .expect(6)
        .create_async()
        .await;

    // The service rejects every attempt: first execution + 5 retries
    let transcribe_mock = env
        .server
        .mock("POST", "/v1/audio/transcriptions")
        .with_status(400)
        .with_body(r#"{"error":"bad request"}"#)
        .expect(6)
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");

    let queue_dir = TempDir::new().unwrap();
    let queue = Arc::new(TaskQueue::new(queue_dir.path().join("queue.jsonl")));
    let job_id = queue.enqueue_transcription(unit_id).await.unwrap();

    let worker = Worker::new(
        env.store.clone(),
        env.artifacts.clone(),
        queue.clone(),
        Arc::new(TranscriptionClient::new(
            format!("{}/v1/audio/transcriptions", env.server.url()),
            "test-key",
            "whisper-1",
        )),
        Arc::new(UnusedSummarizer),
        RetryPolicy {
            max_retries: 5,
            delay_secs: 0,
        },
    );

    // With a zero delay each pass executes one attempt; 6 passes exhaust
    // the policy
    for _ in 0..6 {
        worker.run_once().await.unwrap();
    }

    let job = queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 5, "five retries recorded after the first run");
    assert!(job.error.is_some());

    let unit = env.store.get_unit(unit_id).unwrap();
    assert_eq!(unit.status, ProcessingStatus::Failed);
    assert!(env.artifacts.load(unit_id).await.unwrap().is_none());

    transcribe_mock.assert_async().await;

    // Nothing left to do
    assert_eq!(worker.run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_worker_does_not_retry_permanent_failures() {
    let mut env = setup().await;

    let audio_mock = env
        .server
        .mock("GET", "/audio/u1.mp3")
        .with_status(200)
        .with_body("definitely not audio bytes")
        .expect(1)
        .create_async()
        .await;

    let unit_id = env.create_unit("/audio/u1.mp3");

    let queue_dir = TempDir::new().unwrap();
    let queue = Arc::new(TaskQueue::new(queue_dir.path().join("queue.jsonl")));
    let job_id = queue.enqueue_transcription(unit_id).await.unwrap();

    let worker = Worker::new(
        env.store.clone(),
        env.artifacts.clone(),
        queue.clone(),
        Arc::new(TranscriptionClient::new(
            format!("{}/v1/audio/transcriptions", env.server.url()),
            "test-key",
            "whisper-1",
        )),
        Arc::new(UnusedSummarizer),
        RetryPolicy {
            max_retries: 5,
            delay_secs: 0,
        },
    );

    for _ in 0..3 {
        worker.run_once().await.unwrap();
    }

    // One execution, no retries: the input is unprocessable
    let job = queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 0);

    audio_mock.assert_async().await;
}
