//! WAV decoding and preprocessing for the transcription pipeline.
//!
//! ## Processing steps:
//! 1. Parse the WAV container and raw samples
//! 2. Scale integer samples into [-1.0, 1.0] floats
//! 3. Mix multi-channel audio down to mono
//! 4. Resample to the model rate (16 kHz) if necessary

use crate::audio::MODEL_SAMPLE_RATE;
use anyhow::{anyhow, Result};
use std::io::Cursor;

/// Decode WAV bytes into 16 kHz mono f32 samples.
///
/// Returns an error for non-WAV data, unsupported sample formats, and files
/// that contain no audio samples at all.
pub fn decode_wav_bytes(data: &[u8]) -> Result<Vec<f32>> {
    let mut cursor = Cursor::new(data);
    let (header, track) =
        wav::read(&mut cursor).map_err(|e| anyhow!("Failed to parse WAV data: {}", e))?;

    let samples = to_f32_samples(track)?;

    if samples.is_empty() {
        return Err(anyhow!("WAV file contains no audio samples"));
    }

    let channels = header.channel_count.max(1) as usize;
    let mono = mix_to_mono(&samples, channels);

    let resampled = if header.sampling_rate == MODEL_SAMPLE_RATE {
        mono
    } else {
        tracing::debug!(
            "Resampling audio from {}Hz to {}Hz",
            header.sampling_rate,
            MODEL_SAMPLE_RATE
        );
        resample_linear(&mono, header.sampling_rate, MODEL_SAMPLE_RATE)
    };

    Ok(resampled)
}

/// Convert raw WAV track data to normalized f32 samples.
fn to_f32_samples(track: wav::BitDepth) -> Result<Vec<f32>> {
    let samples = match track {
        // 8-bit WAV is unsigned with a 128 midpoint
        wav::BitDepth::Eight(s) => s
            .into_iter()
            .map(|v| (v as f32 - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(s) => s
            .into_iter()
            .map(|v| v as f32 / i16::MAX as f32)
            .collect(),
        wav::BitDepth::TwentyFour(s) => s
            .into_iter()
            .map(|v| v as f32 / 8_388_607.0)
            .collect(),
        wav::BitDepth::ThirtyTwoFloat(s) => s,
        wav::BitDepth::Empty => return Err(anyhow!("WAV file contains no track data")),
    };

    Ok(clamp_samples(samples))
}

/// Average interleaved channel frames into a single mono channel.
fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler.
///
/// Whisper input is 30-second windows of speech, so a simple linear
/// interpolation is accurate enough; no windowed-sinc filtering here.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }

    out
}

/// Replace non-finite values and clamp everything into [-1.0, 1.0].
fn clamp_samples(mut samples: Vec<f32>) -> Vec<f32> {
    for sample in &mut samples {
        if !sample.is_finite() {
            *sample = 0.0;
        } else {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an in-memory 16-bit PCM WAV file for decoding tests.
    fn wav_fixture(channels: u16, sample_rate: u32, samples: Vec<i16>) -> Vec<u8> {
        let header = wav::Header::new(wav::header::WAV_FORMAT_PCM, channels, sample_rate, 16);
        let track = wav::BitDepth::Sixteen(samples);
        let mut cursor = Cursor::new(Vec::new());
        wav::write(header, &track, &mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_16k() {
        let bytes = wav_fixture(1, 16_000, vec![0, i16::MAX, i16::MIN + 1, 0]);
        let samples = decode_wav_bytes(&bytes).unwrap();

        assert_eq!(samples.len(), 4);
        assert!((samples[0]).abs() < 1e-6);
        assert!((samples[1] - 1.0).abs() < 1e-4);
        assert!((samples[2] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_stereo_mixdown() {
        // Left channel at full scale, right channel silent: mono should be
        // half scale.
        let bytes = wav_fixture(2, 16_000, vec![i16::MAX, 0, i16::MAX, 0]);
        let samples = decode_wav_bytes(&bytes).unwrap();

        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_resample_halves_sample_count() {
        let bytes = wav_fixture(1, 32_000, vec![0i16; 3200]);
        let samples = decode_wav_bytes(&bytes).unwrap();

        // 3200 samples at 32kHz is 100ms, which is 1600 samples at 16kHz.
        assert_eq!(samples.len(), 1600);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_wav_bytes(b"definitely not a wav file").is_err());
        assert!(decode_wav_bytes(&[]).is_err());
    }

    #[test]
    fn test_rejects_empty_track() {
        let bytes = wav_fixture(1, 16_000, vec![]);
        assert!(decode_wav_bytes(&bytes).is_err());
    }
}
