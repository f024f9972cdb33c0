//! # Conversation Synthesis Module
//!
//! Generates a synthetic doctor-patient conversation with a small causal
//! language model running locally through candle.
//!
//! ## Key Components:
//! - **Model Management**: weights and tokenizer fetched from the Hugging
//!   Face Hub, loaded once per process and cached in shared state
//! - **Generation**: nucleus sampling with fixed temperature, top-p, and
//!   seed so repeated runs stay comparable
//! - **Prompt**: the scripted consultation the model continues
//!
//! Model inference is CPU/GPU-bound and blocking; callers on the async
//! runtime run `generate` through `tokio::task::spawn_blocking`.

pub mod model;
pub mod prompts;

pub use model::ConversationModel;
