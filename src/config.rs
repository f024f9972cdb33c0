//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values built into the code
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, SPEECH_API_KEY, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
///
/// Broken into logical groups so each subsystem owns its own section:
/// the HTTP server, microphone capture, the remote speech service, and the
/// local generation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub recognition: RecognitionConfig,
    pub generation: GenerationConfig,
}

/// HTTP server settings.
///
/// `host = "127.0.0.1"` accepts localhost connections only; use `0.0.0.0`
/// to accept connections from any address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Microphone capture settings.
///
/// ## Fields:
/// - `sample_rate`: requested capture rate in Hz; the device may substitute
///   its own native rate, which is then carried with the recording
/// - `channels`: requested channel count before the mono downmix
/// - `streaming`: record until the stop endpoint is called instead of for a
///   fixed duration
/// - `record_seconds`: length of a fixed-duration take
/// - `max_stream_seconds`: upper bound on a stop-terminated take
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub streaming: bool,
    pub record_seconds: u64,
    pub max_stream_seconds: u64,
}

/// Remote speech recognition service settings.
///
/// The endpoint is expected to speak the Google speech API v2 shape: raw
/// PCM in, JSON lines out. The API key can also come from the
/// `SPEECH_API_KEY` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub endpoint: String,
    pub api_key: String,
    pub language: String,
    pub timeout_secs: u64,
}

/// Conversation synthesis settings.
///
/// ## Sampling trade-offs:
/// - Lower temperature: more deterministic, more repetitive dialogue
/// - Higher top-p: wider nucleus, more varied but less focused output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Hugging Face Hub model id for the causal language model.
    pub model_id: String,
    /// Compute device preference: "auto", "cpu", "cuda", or "metal".
    pub device: String,
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    /// Fixed sampling seed so repeated runs produce comparable dialogue.
    pub seed: u64,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            audio: AudioConfig {
                sample_rate: 16000, // what the speech service expects
                channels: 1,
                streaming: false,
                record_seconds: 30,
                max_stream_seconds: 120,
            },
            recognition: RecognitionConfig {
                endpoint: "http://www.google.com/speech-api/v2/recognize".to_string(),
                api_key: String::new(),
                language: "en-US".to_string(),
                timeout_secs: 30,
            },
            generation: GenerationConfig {
                model_id: "microsoft/Phi-3-mini-4k-instruct".to_string(),
                device: "auto".to_string(),
                max_new_tokens: 300,
                temperature: 0.7,
                top_p: 0.9,
                seed: 299792458,
                repeat_penalty: 1.1,
                repeat_last_n: 64,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: override server host
    /// - `APP_SERVER_PORT=3000`: override server port
    /// - `HOST` / `PORT`: deployment-platform overrides without the prefix
    /// - `SPEECH_API_KEY`: API key for the speech recognition service
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        // Credentials are usually delivered through the environment rather
        // than a file on disk.
        if let Ok(key) = env::var("SPEECH_API_KEY") {
            settings = settings.set_override("recognition.api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching bad values here produces one clear startup error instead of
    /// a confusing failure deep inside a workflow run.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.sample_rate == 0 {
            return Err(anyhow::anyhow!("Audio sample rate cannot be 0"));
        }

        if self.audio.channels == 0 {
            return Err(anyhow::anyhow!("Audio channel count cannot be 0"));
        }

        if self.audio.record_seconds == 0 || self.audio.max_stream_seconds == 0 {
            return Err(anyhow::anyhow!("Recording duration must be greater than 0"));
        }

        if self.recognition.endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!("Speech recognition endpoint cannot be empty"));
        }

        if self.generation.max_new_tokens == 0 {
            return Err(anyhow::anyhow!("Max new tokens must be greater than 0"));
        }

        if self.generation.temperature <= 0.0 {
            return Err(anyhow::anyhow!("Sampling temperature must be positive"));
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(anyhow::anyhow!("Top-p must be within (0, 1]"));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON document.
    ///
    /// Only the fields present in the JSON are changed; everything else keeps
    /// its current value. The updated configuration is validated before this
    /// returns, so a bad update leaves no lasting effect on the caller's copy
    /// only if the caller discards it on error.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("sample_rate").and_then(|v| v.as_u64()) {
                self.audio.sample_rate = rate as u32;
            }
            if let Some(channels) = audio.get("channels").and_then(|v| v.as_u64()) {
                self.audio.channels = channels as u16;
            }
            if let Some(streaming) = audio.get("streaming").and_then(|v| v.as_bool()) {
                self.audio.streaming = streaming;
            }
            if let Some(seconds) = audio.get("record_seconds").and_then(|v| v.as_u64()) {
                self.audio.record_seconds = seconds;
            }
            if let Some(seconds) = audio.get("max_stream_seconds").and_then(|v| v.as_u64()) {
                self.audio.max_stream_seconds = seconds;
            }
        }

        if let Some(recognition) = partial_config.get("recognition") {
            if let Some(endpoint) = recognition.get("endpoint").and_then(|v| v.as_str()) {
                self.recognition.endpoint = endpoint.to_string();
            }
            if let Some(language) = recognition.get("language").and_then(|v| v.as_str()) {
                self.recognition.language = language.to_string();
            }
            if let Some(timeout) = recognition.get("timeout_secs").and_then(|v| v.as_u64()) {
                self.recognition.timeout_secs = timeout;
            }
        }

        if let Some(generation) = partial_config.get("generation") {
            if let Some(model_id) = generation.get("model_id").and_then(|v| v.as_str()) {
                self.generation.model_id = model_id.to_string();
            }
            if let Some(device) = generation.get("device").and_then(|v| v.as_str()) {
                self.generation.device = device.to_string();
            }
            if let Some(tokens) = generation.get("max_new_tokens").and_then(|v| v.as_u64()) {
                self.generation.max_new_tokens = tokens as usize;
            }
            if let Some(temperature) = generation.get("temperature").and_then(|v| v.as_f64()) {
                self.generation.temperature = temperature;
            }
            if let Some(top_p) = generation.get("top_p").and_then(|v| v.as_f64()) {
                self.generation.top_p = top_p;
            }
            if let Some(seed) = generation.get("seed").and_then(|v| v.as_u64()) {
                self.generation.seed = seed;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.generation.max_new_tokens, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.generation.top_p = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.generation.temperature = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "generation": {"temperature": 0.5}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.generation.temperature, 0.5);
        // Fields not mentioned in the update keep their values.
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.generation.top_p, 0.9);
    }

    #[test]
    fn test_config_update_rejects_invalid_values() {
        let mut config = AppConfig::default();
        let json = r#"{"generation": {"top_p": 2.0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
