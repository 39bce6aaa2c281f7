//! # Transcription Module
//!
//! Speech-to-text using Whisper models via the Candle-rs framework: a pure
//! Rust implementation without FFI bindings to whisper.cpp.
//!
//! ## Key Components:
//! - **Model Management**: Downloading and loading Whisper model weights
//! - **Transcription Engine**: The process-wide loaded model plus the
//!   audio-to-text entry point used by the HTTP handler
//!
//! The engine is created once at startup and shared across requests, so the
//! model is never re-loaded per call.

pub mod engine;
pub mod model;

pub use engine::{TranscriptionConfig, TranscriptionEngine};
pub use model::ModelSize;
