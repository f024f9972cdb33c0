//! Configuration endpoints: read the active configuration and apply
//! validated partial updates at runtime.

use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// The configuration as JSON, with the speech API key reduced to a
/// presence flag so credentials never leave the process.
fn describe_config(config: &crate::config::AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "audio": {
            "sample_rate": config.audio.sample_rate,
            "channels": config.audio.channels,
            "record_seconds": config.audio.record_seconds,
            "max_stream_seconds": config.audio.max_stream_seconds
        },
        "recognition": {
            "endpoint": config.recognition.endpoint,
            "language": config.recognition.language,
            "timeout_secs": config.recognition.timeout_secs,
            "api_key_configured": !config.recognition.api_key.trim().is_empty()
        },
        "generation": {
            "model_id": config.generation.model_id,
            "device": config.generation.device,
            "max_new_tokens": config.generation.max_new_tokens,
            "temperature": config.generation.temperature,
            "top_p": config.generation.top_p,
            "seed": config.generation.seed
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": describe_config(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config.update_from_json(&json_str)?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": describe_config(&current_config)
    })))
}
