//! # Conversation Model Management
//!
//! Loads a small causal language model through candle and generates
//! conversation text from the consultation prompt.
//!
//! ## Model Loading Process:
//! 1. Download tokenizer, config, and weight files from the Hugging Face
//!    Hub (cached locally under the hub's standard cache directory)
//! 2. Load the weights into the selected compute device
//! 3. Build the tokenizer
//!
//! Loading a multi-gigabyte model takes noticeable time; the application
//! keeps one instance alive in shared state rather than reloading per run.

use crate::config::GenerationConfig;
use crate::device;
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::phi3::{Config as Phi3Config, Model as Phi3};
use hf_hub::api::tokio::{Api, ApiBuilder, ApiRepo};
use std::collections::HashSet;
use std::path::PathBuf;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// A loaded conversation model ready for generation.
pub struct ConversationModel {
    model: Phi3,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
}

impl ConversationModel {
    /// Download (or reuse from cache) and load the configured model.
    pub async fn load(config: &GenerationConfig) -> Result<Self> {
        info!("Loading conversation model {}...", config.model_id);
        let start_time = std::time::Instant::now();

        let api = build_hub_api()?;
        let repo = api.model(config.model_id.clone());

        let tokenizer_filename = repo.get("tokenizer.json").await.map_err(|e| {
            anyhow!(
                "Failed to download tokenizer.json from {}: {}",
                config.model_id,
                e
            )
        })?;
        let config_filename = repo.get("config.json").await.map_err(|e| {
            anyhow!(
                "Failed to download config.json from {}: {}",
                config.model_id,
                e
            )
        })?;

        let model_config: Phi3Config =
            serde_json::from_reader(std::fs::File::open(config_filename)?)?;

        let weight_files = hub_safetensor_files(&repo).await?;

        let device = device::resolve(&config.device);
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&weight_files, DType::F32, &device)?
        };
        let model = Phi3::new(&model_config, vb)?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        info!(
            "Conversation model {} loaded in {:.2}s",
            config.model_id,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: config.model_id.clone(),
        })
    }

    /// Continue the prompt and return the full conversation text
    /// (prompt plus continuation).
    ///
    /// Sampling is nucleus sampling with the configured temperature, top-p,
    /// and seed; generation stops at the end-of-text token or after
    /// `max_new_tokens`, whichever comes first.
    pub fn generate(&mut self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let start_time = std::time::Instant::now();

        // A fresh run must not see the previous run's attention state.
        self.model.clear_kv_cache();

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow!("Tokenizer encode error: {}", e))?;
        let mut tokens = encoding.get_ids().to_vec();
        if tokens.is_empty() {
            return Err(anyhow!("Prompt produced no tokens"));
        }

        let prompt_tokens = tokens.len();
        let eos_token = self.eos_token_id()?;
        let mut logits_processor = LogitsProcessor::new(
            config.seed,
            Some(config.temperature),
            Some(config.top_p),
        );

        for index in 0..config.max_new_tokens {
            // Full prompt on the first pass, then one token at a time
            // against the key-value cache.
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let input = Tensor::new(&tokens[start_pos..], &self.device)?.unsqueeze(0)?;

            let logits = self.model.forward(&input, start_pos)?;
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;

            let logits = if config.repeat_penalty == 1.0 {
                logits
            } else {
                let start_at = tokens.len().saturating_sub(config.repeat_last_n);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    config.repeat_penalty,
                    &tokens[start_at..],
                )?
            };

            let next_token = logits_processor.sample(&logits)?;
            if next_token == eos_token {
                break;
            }
            tokens.push(next_token);
        }

        let completion = self
            .tokenizer
            .decode(&tokens[prompt_tokens..], true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        debug!(
            "{} generated {} tokens in {:.2}s",
            self.model_id,
            tokens.len() - prompt_tokens,
            start_time.elapsed().as_secs_f64()
        );

        Ok(format!("{}{}", prompt, completion))
    }

    /// Find the end-of-text token id across the vocab conventions the
    /// supported models use.
    fn eos_token_id(&self) -> Result<u32> {
        ["<|endoftext|>", "<|end|>", "</s>"]
            .iter()
            .find_map(|token| self.tokenizer.token_to_id(token))
            .ok_or_else(|| anyhow!("Tokenizer defines no end-of-text token"))
    }
}

/// Hub client honoring `HF_TOKEN` for gated repositories.
fn build_hub_api() -> Result<Api> {
    let mut builder = ApiBuilder::new().with_progress(false);
    if let Ok(token) = std::env::var("HF_TOKEN") {
        builder = builder.with_token(Some(token));
    }
    builder
        .build()
        .map_err(|e| anyhow!("Failed to initialize Hugging Face Hub client: {}", e))
}

/// Resolve the weight files for a repository: a single `model.safetensors`
/// when present, otherwise every shard named by the safetensors index.
async fn hub_safetensor_files(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(single) = repo.get("model.safetensors").await {
        return Ok(vec![single]);
    }

    let index_file = repo
        .get("model.safetensors.index.json")
        .await
        .map_err(|e| anyhow!("Failed to download safetensors index: {}", e))?;
    let index: serde_json::Value = serde_json::from_reader(std::fs::File::open(index_file)?)?;

    let weight_map = match index.get("weight_map") {
        Some(serde_json::Value::Object(map)) => map,
        _ => anyhow::bail!("weight map missing from safetensors index"),
    };

    let mut shard_names = HashSet::new();
    for value in weight_map.values() {
        if let Some(file) = value.as_str() {
            shard_names.insert(file.to_string());
        }
    }

    let mut files = Vec::new();
    for name in shard_names {
        let path = repo
            .get(&name)
            .await
            .map_err(|e| anyhow!("Failed to download {}: {}", name, e))?;
        files.push(path);
    }

    Ok(files)
}
