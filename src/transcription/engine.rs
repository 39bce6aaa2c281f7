//! # Transcription Engine
//!
//! Owns the one process-wide Whisper model and exposes the audio-to-text
//! entry point used by the `/transcribe` handler.
//!
//! ## Thread Safety:
//! The model lives behind `Arc<RwLock<Option<WhisperModel>>>`. Candle's
//! decoder needs `&mut self`, so inference takes the write lock for the
//! duration of a request; concurrent transcriptions queue on the lock
//! instead of each loading their own copy of the model.

use crate::transcription::model::{ModelSize, WhisperModel};
use anyhow::{anyhow, Result};
use candle_core::Device;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Configuration for transcription behavior.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Target language hint (ISO 639-1 code like "en", "es", "fr")
    pub language: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: Some("en".to_string()),
        }
    }
}

/// The transcription engine shared across all requests.
pub struct TranscriptionEngine {
    /// Currently loaded Whisper model, if any
    model: Arc<RwLock<Option<WhisperModel>>>,

    /// Transcription behavior configuration
    config: TranscriptionConfig,

    /// Device used for model inference
    device: Device,
}

impl TranscriptionEngine {
    pub fn new(config: TranscriptionConfig, device: Device) -> Self {
        Self {
            model: Arc::new(RwLock::new(None)),
            config,
            device,
        }
    }

    /// Load a Whisper model, replacing any previously loaded one.
    ///
    /// Called once at startup; the loaded model then serves every request.
    pub async fn load_model(&self, model_size: ModelSize) -> Result<()> {
        tracing::info!("Loading {} model into transcription engine", model_size);
        let start_time = Instant::now();

        let new_model = WhisperModel::load(model_size, self.device.clone()).await?;

        {
            let mut model_guard = self.model.write().await;
            *model_guard = Some(new_model);
        }

        tracing::info!(
            "Model loaded and validated in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(())
    }

    /// Whether a model is loaded and ready to transcribe.
    pub async fn is_model_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }

    /// Name of the loaded model variant, if any.
    pub async fn loaded_model_name(&self) -> Option<String> {
        self.model
            .read()
            .await
            .as_ref()
            .map(|model| model.size().to_string())
    }

    /// Transcribe 16 kHz mono audio samples to text.
    ///
    /// Any non-empty clip is accepted: the model pads or truncates the
    /// input to its 30-second window, so length is not validated here.
    /// Fails if no model is loaded, keeping "model unavailable" a
    /// per-request error rather than a startup crash.
    pub async fn transcribe(&self, audio_data: &[f32]) -> Result<String> {
        if audio_data.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let audio_duration = audio_data.len() as f64 / 16000.0;

        tracing::debug!("Starting transcription of {:.2}s audio", audio_duration);
        let start_time = Instant::now();

        let text = {
            let mut model_guard = self.model.write().await;
            match model_guard.as_mut() {
                Some(model) => {
                    model
                        .transcribe(audio_data, self.config.language.as_deref())
                        .await?
                }
                None => {
                    return Err(anyhow!("Transcription model is not loaded"));
                }
            }
        };

        tracing::info!(
            "Transcription completed: {:.2}s audio -> {} chars in {}ms",
            audio_duration,
            text.len(),
            start_time.elapsed().as_millis()
        );

        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine() -> TranscriptionEngine {
        TranscriptionEngine::new(TranscriptionConfig::default(), Device::Cpu)
    }

    #[test]
    fn test_transcription_config_default() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.language, Some("en".to_string()));
    }

    #[tokio::test]
    async fn test_engine_starts_unloaded() {
        let engine = test_engine();
        assert!(!engine.is_model_loaded().await);
        assert_eq!(engine.loaded_model_name().await, None);
    }

    #[tokio::test]
    async fn test_transcribe_rejects_empty_audio() {
        let engine = test_engine();
        let err = engine.transcribe(&[]).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_transcribe_has_no_duration_gate() {
        let engine = test_engine();

        // A 0.4s clip and a 31s clip both reach the model stage; with no
        // model loaded they fail there, never on length.
        let short_clip = vec![0.0f32; 6400];
        let err = engine.transcribe(&short_clip).await.unwrap_err();
        assert!(err.to_string().contains("not loaded"));

        let long_clip = vec![0.0f32; 31 * 16000];
        let err = engine.transcribe(&long_clip).await.unwrap_err();
        assert!(err.to_string().contains("not loaded"));
    }

    #[tokio::test]
    async fn test_transcribe_without_model_is_an_error() {
        let engine = test_engine();
        let audio = vec![0.0f32; 16000];
        let err = engine.transcribe(&audio).await.unwrap_err();
        assert!(err.to_string().contains("not loaded"));
    }
}
