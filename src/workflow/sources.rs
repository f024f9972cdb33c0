//! # Production Transcript Sources
//!
//! The real implementations behind the workflow traits: microphone capture
//! plus the speech service for the live path, the cached candle model for
//! the synthetic path.

use super::{ConversationSynthesizer, MicrophoneTranscriber};
use crate::audio::MicrophoneRecorder;
use crate::config::{AudioConfig, GenerationConfig, RecognitionConfig};
use crate::generation::{prompts, ConversationModel};
use crate::recognition::{RecognitionError, SpeechApiClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// Live path: a microphone take, recognized remotely.
///
/// The take is either fixed-duration or, with `audio.streaming` enabled,
/// runs until the shared stop flag is raised by the stop endpoint.
pub struct LiveTranscriptSource {
    audio: AudioConfig,
    recognition: RecognitionConfig,
    stop: Arc<AtomicBool>,
}

impl LiveTranscriptSource {
    pub fn new(audio: AudioConfig, recognition: RecognitionConfig, stop: Arc<AtomicBool>) -> Self {
        Self {
            audio,
            recognition,
            stop,
        }
    }
}

#[async_trait]
impl MicrophoneTranscriber for LiveTranscriptSource {
    async fn transcribe_live(&self) -> Result<String> {
        let audio_config = self.audio.clone();
        let stop = self.stop.clone();

        // cpal capture blocks for the whole take; keep it off the runtime
        // worker threads.
        let recording = tokio::task::spawn_blocking(move || {
            let recorder = MicrophoneRecorder::from_config(&audio_config);
            if audio_config.streaming {
                recorder.record_until(stop, Duration::from_secs(audio_config.max_stream_seconds))
            } else {
                recorder.record_for(Duration::from_secs(audio_config.record_seconds))
            }
        })
        .await
        .context("capture task panicked")??;

        if recording.is_empty() {
            return Ok(String::new());
        }

        // The fixed-duration variant retains its take on disk for
        // inspection; a failed write does not fail the run.
        if !self.audio.streaming {
            match recording.write_temp_wav() {
                Ok(path) => info!("Capture retained at {:?}", path),
                Err(e) => warn!("Could not retain capture: {}", e),
            }
        }

        let client = SpeechApiClient::from_config(&self.recognition)?;
        match client.recognize(&recording).await {
            Ok(transcript) => Ok(transcript),
            // The service heard nothing; the orchestrator treats an empty
            // transcript as the no-capture signal.
            Err(RecognitionError::NoSpeech) => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Synthetic path: the process-wide conversation model, loaded on first use.
pub struct ModelConversationSource {
    model: Arc<AsyncMutex<Option<ConversationModel>>>,
    config: GenerationConfig,
}

impl ModelConversationSource {
    pub fn new(model: Arc<AsyncMutex<Option<ConversationModel>>>, config: GenerationConfig) -> Self {
        Self { model, config }
    }
}

#[async_trait]
impl ConversationSynthesizer for ModelConversationSource {
    async fn synthesize(&self) -> Result<String> {
        // Owned guard so the lock can travel into the blocking task; runs
        // serialize on the model, which is what a single shared instance
        // requires anyway.
        let mut guard = self.model.clone().lock_owned().await;

        if guard.is_none() {
            *guard = Some(ConversationModel::load(&self.config).await?);
        }

        let config = self.config.clone();
        let conversation = tokio::task::spawn_blocking(move || {
            let model = guard.as_mut().expect("model initialized above");
            model.generate(prompts::CONSULTATION_PROMPT, &config)
        })
        .await
        .context("generation task panicked")??;

        Ok(conversation)
    }
}
