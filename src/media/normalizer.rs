//! Format normalizer: decode arbitrary audio and re-encode it as the
//! canonical waveform the transcription backend accepts (16 kHz mono
//! 16-bit PCM WAV).

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

/// Sample rate of the canonical waveform format
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Errors from normalization.
///
/// `Decode` identifies unprocessable input (corrupt bytes, unsupported
/// codec): retrying cannot fix it, so the orchestrator treats it as
/// permanent, unlike transport failures.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unreadable input: {0}")]
    Io(#[from] std::io::Error),

    #[error("undecodable audio: {0}")]
    Decode(String),

    #[error("wav encode failed: {0}")]
    Encode(#[from] hound::Error),
}

/// Decode `input` and write the canonical WAV next to it in `out_dir`.
///
/// Conversion blocks the calling worker for its duration; one pipeline
/// invocation has no internal concurrency.
pub fn normalize_to_wav(input: &Path, out_dir: &Path) -> Result<PathBuf, NormalizeError> {
    let (samples, source_rate) = decode_to_mono(input)?;

    let samples = if source_rate == TARGET_SAMPLE_RATE {
        samples
    } else {
        resample(&samples, source_rate, TARGET_SAMPLE_RATE)?
    };

    let out_path = out_dir.join("normalized.wav");
    write_wav(&samples, &out_path)?;

    debug!(
        samples = samples.len(),
        duration_secs = samples.len() as f32 / TARGET_SAMPLE_RATE as f32,
        "audio normalized to canonical waveform"
    );

    Ok(out_path)
}

/// Decode any supported container/codec into mono f32 samples
fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32), NormalizeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let hint = Hint::new();
    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| NormalizeError::Decode(format!("probe: {e}")))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| NormalizeError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| NormalizeError::Decode("unknown sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &decoder_opts)
        .map_err(|e| NormalizeError::Decode(format!("codec: {e}")))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(NormalizeError::Decode(format!("packet: {e}")));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                warn!(error = %e, "skipping corrupt audio frame");
                continue;
            }
            Err(e) => {
                return Err(NormalizeError::Decode(format!("decode: {e}")));
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        // Downmix to mono if multi-channel
        if channels > 1 {
            for frame in samples.chunks(channels) {
                let mono: f32 = frame.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        } else {
            all_samples.extend_from_slice(samples);
        }
    }

    if all_samples.is_empty() {
        return Err(NormalizeError::Decode("no audio samples decoded".to_string()));
    }

    Ok((all_samples, source_rate))
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, NormalizeError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| NormalizeError::Decode(format!("resampler init: {e}")))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let result = resampler
            .process(&[input], None)
            .map_err(|e| NormalizeError::Decode(format!("resample: {e}")))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    // Trim the tail introduced by chunk padding
    let expected_len = (samples.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

fn write_wav(samples: &[f32], path: &Path) -> Result<(), NormalizeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(scaled)?;
    }
    writer.finalize()?;

    Ok(())
}
