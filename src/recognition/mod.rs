//! # Speech Recognition Client
//!
//! Client for a remote cloud speech-to-text service speaking the Google
//! speech API v2 shape: raw 16-bit PCM posted with an `audio/l16` content
//! type, transcript alternatives returned as JSON lines.
//!
//! The two failure modes the rest of the system cares about are explicit:
//! the service answered but heard nothing recognizable ([`RecognitionError::NoSpeech`]),
//! and the service could not be reached at all ([`RecognitionError::Unreachable`]).

use crate::audio::RecordedAudio;
use crate::config::RecognitionConfig;
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

/// Errors from one recognition attempt.
#[derive(Debug)]
pub enum RecognitionError {
    /// The service processed the audio but produced no transcript
    NoSpeech,

    /// Transport failure or non-success HTTP status
    Unreachable(String),

    /// The response body did not match the expected shape
    InvalidResponse(String),
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionError::NoSpeech => {
                write!(f, "speech service produced no transcript for the audio")
            }
            RecognitionError::Unreachable(msg) => {
                write!(f, "speech service unreachable: {}", msg)
            }
            RecognitionError::InvalidResponse(msg) => {
                write!(f, "unexpected speech service response: {}", msg)
            }
        }
    }
}

impl std::error::Error for RecognitionError {}

/// HTTP client for the speech recognition service.
pub struct SpeechApiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl SpeechApiClient {
    pub fn from_config(config: &RecognitionConfig) -> Result<Self> {
        let api_key = config.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!(
                "Speech API key is missing. Set recognition.api_key in config or SPEECH_API_KEY."
            );
        }

        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();

        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .context("Failed to build speech API HTTP client")?,
            endpoint,
            api_key,
            language: config.language.clone(),
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}?client=chromium&lang={}&key={}",
            self.endpoint, self.language, self.api_key
        )
    }

    /// Send a recording and return its transcript.
    pub async fn recognize(&self, audio: &RecordedAudio) -> Result<String, RecognitionError> {
        debug!(
            "Submitting {:.1}s of audio at {} Hz for recognition",
            audio.duration_seconds(),
            audio.sample_rate()
        );

        let response = self
            .http
            .post(self.request_url())
            .header(
                CONTENT_TYPE,
                format!("audio/l16; rate={}", audio.sample_rate()),
            )
            .body(audio.pcm_bytes())
            .send()
            .await
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        let payload = response
            .text()
            .await
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        let transcript = parse_transcript(&payload)?;
        info!("Recognition returned {} characters", transcript.len());
        Ok(transcript)
    }
}

/// The service streams one JSON document per line; early lines are often
/// empty `{"result":[]}` placeholders.
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    result: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternative: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    transcript: Option<String>,
    #[allow(dead_code)]
    confidence: Option<f32>,
}

/// Extract the first non-empty transcript from a JSON-lines payload.
fn parse_transcript(payload: &str) -> Result<String, RecognitionError> {
    let mut parsed_any = false;

    for line in payload.lines().filter(|l| !l.trim().is_empty()) {
        let response: RecognizeResponse = match serde_json::from_str(line) {
            Ok(response) => response,
            Err(_) => continue,
        };
        parsed_any = true;

        let transcript = response
            .result
            .iter()
            .flat_map(|r| r.alternative.iter())
            .filter_map(|a| a.transcript.as_deref())
            .map(str::trim)
            .find(|t| !t.is_empty());

        if let Some(transcript) = transcript {
            return Ok(transcript.to_string());
        }
    }

    if parsed_any {
        Err(RecognitionError::NoSpeech)
    } else {
        Err(RecognitionError::InvalidResponse(
            "no parseable JSON lines in response body".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_parse_typical_response() {
        let payload = concat!(
            "{\"result\":[]}\n",
            "{\"result\":[{\"alternative\":[{\"transcript\":\"I have been experiencing back pain\",",
            "\"confidence\":0.92}],\"final\":true}],\"result_index\":0}\n",
        );

        let transcript = parse_transcript(payload).unwrap();
        assert_eq!(transcript, "I have been experiencing back pain");
    }

    #[test]
    fn test_parse_empty_result_is_no_speech() {
        let payload = "{\"result\":[]}\n";
        match parse_transcript(payload) {
            Err(RecognitionError::NoSpeech) => {}
            other => panic!("expected NoSpeech, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_blank_transcript_is_no_speech() {
        let payload = "{\"result\":[{\"alternative\":[{\"transcript\":\"  \"}]}]}\n";
        match parse_transcript(payload) {
            Err(RecognitionError::NoSpeech) => {}
            other => panic!("expected NoSpeech, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        match parse_transcript("<html>service error</html>") {
            Err(RecognitionError::InvalidResponse(_)) => {}
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = AppConfig::default();

        let err = match SpeechApiClient::from_config(&config.recognition) {
            Ok(_) => panic!("expected client construction to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Speech API key is missing"));
    }

    #[test]
    fn test_request_url_shape() {
        let mut config = AppConfig::default().recognition;
        config.api_key = "test-key".to_string();

        let client = SpeechApiClient::from_config(&config).unwrap();
        let url = client.request_url();
        assert!(url.starts_with("http://www.google.com/speech-api/v2/recognize?"));
        assert!(url.contains("lang=en-US"));
        assert!(url.contains("key=test-key"));
    }
}
