//! Audio artifact encoding
//!
//! Renders a captured clip as a RIFF/WAVE file using the hound crate, and
//! derives deterministic artifact paths from the recording start timestamp.

use crate::error::{AppError, Result};
use crate::ports::audio::AudioFormat;
use chrono::{DateTime, Local};
use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Quantize one normalized sample to signed 16-bit.
///
/// Samples are clamped to [-1.0, 1.0] and scaled by 32767.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

fn wav_spec(format: &AudioFormat) -> WavSpec {
    WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode samples to in-memory WAV bytes.
pub fn encode_wav(samples: &[f32], format: &AudioFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, wav_spec(format))
            .map_err(|e| AppError::AudioCapture(format!("Failed to create WAV writer: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(quantize(sample))
                .map_err(|e| AppError::AudioCapture(format!("Failed to write sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| AppError::AudioCapture(format!("Failed to finalize WAV: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

/// Artifact file name derived from the recording start timestamp.
pub fn artifact_file_name(started: DateTime<Local>) -> String {
    format!("rec-{}.wav", started.format("%Y%m%d-%H%M%S"))
}

/// Full artifact path under `<data_dir>/recordings/`.
pub fn artifact_path(data_dir: &Path, started: DateTime<Local>) -> PathBuf {
    data_dir.join("recordings").join(artifact_file_name(started))
}

/// Duration of a clip in milliseconds, from its sample count.
pub fn duration_ms(sample_count: usize, format: &AudioFormat) -> i64 {
    let frames = sample_count / format.channels.max(1) as usize;
    (frames as f64 / format.sample_rate as f64 * 1000.0) as i64
}
