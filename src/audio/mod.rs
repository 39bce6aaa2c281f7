//! # Audio Decoding Module
//!
//! Converts uploaded audio files into the sample format the transcription
//! model expects: 16 kHz, mono, 32-bit float in the range [-1.0, 1.0].
//!
//! Only WAV containers are accepted. Anything the decoder cannot parse is
//! reported as an error and never reaches the model.

pub mod decoder;

pub use decoder::decode_wav_bytes;

/// Sample rate required by the Whisper model.
pub const MODEL_SAMPLE_RATE: u32 = 16_000;
