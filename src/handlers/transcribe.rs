//! # Transcription Handler
//!
//! `POST /transcribe`: accepts a multipart audio file, spools it to a
//! scoped temporary file, decodes it to model-ready samples, and runs it
//! through the shared transcription engine.
//!
//! The temporary file is owned by a drop guard, so it is deleted on every
//! exit path: success, decode failure, or model error.

use crate::audio;
use crate::error::{AppError, AppResult};
use crate::handlers::multipart::collect_file_field;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A temporary audio file that is removed when dropped.
struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    /// Write the uploaded bytes to a uniquely named file in the system
    /// temp directory.
    async fn create(bytes: &[u8]) -> AppResult<Self> {
        let path = std::env::temp_dir().join(format!("transcribe-{}.wav", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        debug!("Spooled {} bytes to {}", bytes.len(), path.display());
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove temp audio file {}: {}", self.path.display(), e);
        }
    }
}

/// `POST /transcribe` handler.
pub async fn transcribe_audio(
    state: web::Data<AppState>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let config = state.get_config();

    let file = collect_file_field(payload, "file").await?;

    if file.bytes.len() > config.limits.max_transcribe_bytes {
        return Err(AppError::ValidationError(format!(
            "Audio file too large: {} bytes (max: {} bytes)",
            file.bytes.len(),
            config.limits.max_transcribe_bytes
        )));
    }

    let temp_file = TempAudioFile::create(&file.bytes).await?;

    let wav_bytes = tokio::fs::read(temp_file.path()).await?;
    let samples = audio::decode_wav_bytes(&wav_bytes)
        .map_err(|e| AppError::Transcription(e.to_string()))?;

    let text = state
        .engine
        .transcribe(&samples)
        .await
        .map_err(|e| AppError::Transcription(e.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "transcription": text })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers::multipart::test_support::{content_type, multipart_body};
    use crate::transcription::{TranscriptionConfig, TranscriptionEngine};
    use actix_web::{test, App};
    use candle_core::Device;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let engine = Arc::new(TranscriptionEngine::new(
            TranscriptionConfig::default(),
            Device::Cpu,
        ));
        AppState::new(AppConfig::default(), engine)
    }

    #[tokio::test]
    async fn test_temp_file_removed_on_drop() {
        let temp = TempAudioFile::create(b"some audio bytes").await.unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.exists());
        drop(temp);
        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn test_transcribe_rejects_missing_file_field() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .route("/transcribe", web::post().to(transcribe_audio)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("audio", "clip.wav", b"RIFF"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_client_error());
    }

    #[actix_web::test]
    async fn test_transcribe_corrupt_audio_is_a_server_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .route("/transcribe", web::post().to(transcribe_audio)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("file", "clip.wav", b"not a wav file at all"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_server_error());
    }

    #[actix_web::test]
    async fn test_transcribe_empty_file_is_a_server_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .route("/transcribe", web::post().to(transcribe_audio)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("file", "empty.wav", b""))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_server_error());
    }

    #[actix_web::test]
    async fn test_transcribe_oversized_file_is_rejected() {
        let mut config = AppConfig::default();
        config.limits.max_transcribe_bytes = 16;

        let engine = Arc::new(TranscriptionEngine::new(
            TranscriptionConfig::default(),
            Device::Cpu,
        ));
        let state = AppState::new(config, engine);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe_audio)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("file", "big.wav", &[0u8; 64]))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_client_error());
    }
}
