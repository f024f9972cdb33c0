//! # Audio Capture Module
//!
//! Microphone capture for the live evaluation path.
//!
//! ## Key Components:
//! - **MicrophoneRecorder**: blocking capture from the default input device,
//!   either for a fixed duration or until a stop flag is raised
//! - **RecordedAudio**: a finished mono take with its sample rate, able to
//!   render itself as raw PCM, an in-memory WAV, or a transient WAV file
//!
//! Capture is blocking by design; callers on the async runtime run it through
//! `tokio::task::spawn_blocking`.

pub mod capture;

pub use capture::{CaptureError, MicrophoneRecorder, RecordedAudio};
