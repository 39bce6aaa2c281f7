//! # Whisper Model Management
//!
//! Loading and running Whisper models with Candle-rs.
//!
//! ## Model Loading Process:
//! 1. Download model files from HuggingFace if not cached locally
//! 2. Load model weights and tokenizer
//! 3. Initialize the model on the selected device (CPU/GPU)
//! 4. Validate the model with a short test input

use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;

/// Available Whisper model sizes.
///
/// Larger models are more accurate but slower and heavier; `Base` is a good
/// default for a development machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace model repository name.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate model size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// A loaded Whisper model ready for transcription.
pub struct WhisperModel {
    /// The actual Candle model
    model: m::model::Whisper,

    /// Model configuration
    config: Config,

    /// Device where the model is loaded (CPU/GPU)
    device: Device,

    /// Which size variant this is
    size: ModelSize,

    /// Tokenizer for decoding output tokens
    tokenizer: Tokenizer,
}

impl WhisperModel {
    /// Load a Whisper model from HuggingFace.
    ///
    /// Files are cached locally by hf-hub, so only the first load of a given
    /// size hits the network. `HF_TOKEN` and `HF_HUB_CACHE`/`HF_HOME` are
    /// honored when set.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        tracing::info!("Loading Whisper {} model (~{}MB)...", size, size.size_mb());
        let start_time = std::time::Instant::now();

        let api = {
            use hf_hub::api::tokio::ApiBuilder;

            let mut builder = ApiBuilder::new().with_progress(false);

            builder = builder.with_token(std::env::var("HF_TOKEN").ok());

            if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
                builder = builder.with_cache_dir(cache_dir.into());
            } else if let Ok(hf_home) = std::env::var("HF_HOME") {
                builder = builder.with_cache_dir(std::path::PathBuf::from(hf_home).join("hub"));
            }

            builder
                .build()
                .map_err(|e| anyhow!("Failed to create HuggingFace API client: {}", e))?
        };

        let repo = api.model(size.repo_name().to_string());

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", size.repo_name(), e))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", size.repo_name(), e))?;
        let model_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model weights from {}: {}", size.repo_name(), e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[model_filename], m::DTYPE, &device)? };

        let model = m::model::Whisper::load(&vb, config.clone())?;

        let load_time = start_time.elapsed();
        tracing::info!("Whisper {} model loaded in {:.2}s", size, load_time.as_secs_f64());

        let mut whisper_model = Self {
            model,
            config,
            device,
            size,
            tokenizer,
        };

        whisper_model.validate().await?;

        Ok(whisper_model)
    }

    /// Convert PCM audio data to a mel spectrogram tensor.
    ///
    /// Simplified log-energy features over fixed frames; the input is padded
    /// or truncated to Whisper's 30-second window.
    fn pcm_to_mel(&self, pcm_data: &[f32]) -> Result<Tensor> {
        // 30 seconds at 16kHz
        let target_len = 30 * 16000;
        let mut padded_audio = vec![0.0f32; target_len];
        let copy_len = pcm_data.len().min(target_len);
        padded_audio[..copy_len].copy_from_slice(&pcm_data[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let n_frames = 3000; // Standard Whisper frame count for 30s

        let mut mel_data = vec![0.0f32; n_mels * n_frames];

        let frame_size = padded_audio.len() / n_frames;
        for frame in 0..n_frames {
            let start = frame * frame_size;
            let end = (start + frame_size).min(padded_audio.len());

            for mel_bin in 0..n_mels {
                let mut energy = 0.0f32;
                for sample in &padded_audio[start..end] {
                    energy += sample.abs();
                }

                // Log-mel scaling with a -80 dB floor
                mel_data[mel_bin * n_frames + frame] =
                    (energy / frame_size as f32).ln().max(-11.5129);
            }
        }

        Ok(Tensor::from_vec(mel_data, (n_mels, n_frames), &self.device)?)
    }

    /// Transcribe audio data to text.
    ///
    /// ## Audio Requirements:
    /// - Sample rate: 16kHz
    /// - Format: 32-bit float in [-1.0, 1.0]
    /// - Channels: mono
    pub async fn transcribe(&mut self, audio_data: &[f32], language: Option<&str>) -> Result<String> {
        let start_time = std::time::Instant::now();

        if audio_data.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        if audio_data.len() < 16000 {
            tracing::warn!("Audio is shorter than 1 second, transcription may be inaccurate");
        }

        let mel = self.pcm_to_mel(audio_data)?;
        let mel = mel.unsqueeze(0)?; // Add batch dimension

        let encoder_output = self.model.encoder.forward(&mel, false)?;

        // Prompt: start-of-transcript, optional language, transcribe task
        let mut tokens = vec![self.sot_token()];
        if let Some(lang) = language {
            if let Some(lang_token) = self.language_token(lang) {
                tokens.push(lang_token);
            }
        }
        tokens.push(self.transcribe_token());
        let prompt_len = tokens.len();

        let mut output_tokens = Vec::new();

        // Greedy decode with temperature fallback on degenerate output
        const MAX_TOKENS: usize = 200;
        const TEMPERATURES: &[f32] = &[0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

        for &temperature in TEMPERATURES {
            tokens.truncate(prompt_len);
            output_tokens.clear();

            let mut decode_success = true;

            for _ in 0..MAX_TOKENS {
                let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;

                let logits = self
                    .model
                    .decoder
                    .forward(&token_tensor, &encoder_output, false)?;

                let last_logits = logits.i((.., tokens.len() - 1, ..))?;

                let next_token = if temperature > 0.0 {
                    self.sample_token(&last_logits, temperature)?
                } else {
                    last_logits.argmax_keepdim(1)?.to_scalar::<u32>()?
                };

                if next_token == self.eot_token() {
                    break;
                }

                if is_repetitive(&output_tokens, next_token) {
                    decode_success = false;
                    break;
                }

                tokens.push(next_token);
                output_tokens.push(next_token);
            }

            if decode_success && !output_tokens.is_empty() {
                break;
            }
        }

        let text = self.decode_tokens(&output_tokens)?;

        tracing::debug!(
            "Transcribed {:.2}s of audio in {:.2}s: '{}'",
            audio_data.len() as f64 / 16000.0,
            start_time.elapsed().as_secs_f64(),
            text
        );

        Ok(text)
    }

    /// Which size variant is loaded.
    pub fn size(&self) -> ModelSize {
        self.size
    }

    /// Run a short silent clip through the model to confirm it works.
    async fn validate(&mut self) -> Result<()> {
        tracing::debug!("Validating Whisper model with 1s of silence...");

        let test_audio = vec![0.0f32; 16000];
        let result = self.transcribe(&test_audio, Some("en")).await?;

        tracing::debug!("Model validation successful, test result: '{}'", result);
        Ok(())
    }

    // Standard Whisper special token IDs
    fn sot_token(&self) -> u32 {
        50258
    }

    fn eot_token(&self) -> u32 {
        50257
    }

    fn transcribe_token(&self) -> u32 {
        50359
    }

    /// Language token for a language hint, if the language is known.
    fn language_token(&self, language: &str) -> Option<u32> {
        match language.to_lowercase().as_str() {
            "en" | "english" => Some(50259),
            "es" | "spanish" => Some(50262),
            "fr" | "french" => Some(50265),
            "de" | "german" => Some(50261),
            "it" | "italian" => Some(50274),
            "pt" | "portuguese" => Some(50267),
            "ru" | "russian" => Some(50263),
            "ja" | "japanese" => Some(50266),
            "ko" | "korean" => Some(50264),
            "zh" | "chinese" => Some(50260),
            _ => None,
        }
    }

    /// Sample a token from temperature-scaled logits.
    ///
    /// A cumulative-probability draw, not argmax: at higher temperatures
    /// the fallback retries must be able to produce a different decode
    /// than the greedy pass, otherwise retrying is pointless.
    fn sample_token(&self, logits: &Tensor, temperature: f32) -> Result<u32> {
        let temp_tensor = Tensor::from_vec(vec![temperature], (1,), &self.device)?;
        let logits = logits.broadcast_div(&temp_tensor)?;
        let probs = candle_nn::ops::softmax_last_dim(&logits)?;
        let probs: Vec<f32> = probs.flatten_all()?.to_vec1()?;

        Ok(sample_from_probs(&probs, rand::random::<f32>()))
    }

    /// Decode output tokens to text and strip Whisper markup artifacts.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");

        Ok(cleaned.trim().to_string())
    }
}

/// Pick the token whose cumulative probability first exceeds `draw`.
///
/// `draw` is uniform in [0, 1); rounding can leave the total slightly
/// under 1.0, in which case the last token is returned.
fn sample_from_probs(probs: &[f32], draw: f32) -> u32 {
    let mut cumulative = 0.0f32;
    for (idx, p) in probs.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return idx as u32;
        }
    }
    probs.len().saturating_sub(1) as u32
}

/// Detect degenerate decoder output: immediate token repeats or a repeated
/// trailing 3-token pattern.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    if tokens.len() < 3 {
        return false;
    }

    if tokens[tokens.len() - 3..] == [new_token, new_token, new_token] {
        return true;
    }

    if tokens.len() >= 6 {
        let last_3 = &tokens[tokens.len() - 3..];
        let prev_3 = &tokens[tokens.len() - 6..tokens.len() - 3];
        if last_3 == prev_3 {
            return true;
        }
    }

    false
}
