//! # Application State Management
//!
//! Shared state accessed by every HTTP request handler:
//! - the runtime-updatable configuration behind `Arc<RwLock<...>>`
//! - request/error/workflow counters for the metrics endpoints
//! - the cached conversation model, loaded lazily on the first synthetic
//!   workflow run and reused by every run after it
//!
//! Config and metrics use std `RwLock` because holders never await while
//! locked. The model uses a tokio `Mutex` because a workflow run holds it
//! across inference on the blocking pool.

use crate::config::AppConfig;
use crate::generation::ConversationModel;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;

/// The shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Counters updated by the telemetry middleware and workflow handler
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Lazily initialized conversation model, shared across workflow runs.
    /// `None` until the first synthetic run loads the weights.
    pub synthesizer: Arc<AsyncMutex<Option<ConversationModel>>>,

    /// Raised by the stop endpoint to end an in-flight streaming capture.
    pub capture_stop: Arc<AtomicBool>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests and workflow runs.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of request errors since server start
    pub error_count: u64,

    /// Number of evaluation workflow runs started
    pub workflow_runs: u64,

    /// Number of workflow runs that ended in an error record
    pub workflow_failures: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a single API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            synthesizer: Arc::new(AsyncMutex::new(None)),
            capture_stop: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
        }
    }

    /// Lower the capture stop flag at the start of a live run.
    pub fn begin_capture(&self) {
        self.capture_stop.store(false, Ordering::SeqCst);
    }

    /// Ask an in-flight streaming capture to wrap up.
    pub fn request_capture_stop(&self) {
        self.capture_stop.store(true, Ordering::SeqCst);
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the read lock immediately so other requests are not
    /// blocked while the caller works with the snapshot.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating the new values.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Record the outcome of one evaluation workflow run.
    pub fn record_workflow_run(&self, succeeded: bool) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.workflow_runs += 1;
        if !succeeded {
            metrics.workflow_failures += 1;
        }
    }

    /// Describe the conversation model cache without blocking on it.
    ///
    /// `in_use` means a workflow run currently holds the model for loading
    /// or inference.
    pub fn synthesizer_status(&self) -> &'static str {
        match self.synthesizer.try_lock() {
            Ok(guard) => {
                if guard.is_some() {
                    "loaded"
                } else {
                    "not_loaded"
                }
            }
            Err(_) => "in_use",
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Clones the data so the lock is not held while the HTTP response is
    /// serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            workflow_runs: metrics.workflow_runs,
            workflow_failures: metrics.workflow_failures,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint as a fraction in [0.0, 1.0].
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_counters() {
        let state = AppState::new(AppConfig::default());
        state.record_workflow_run(true);
        state.record_workflow_run(false);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.workflow_runs, 2);
        assert_eq!(snapshot.workflow_failures, 1);
    }

    #[test]
    fn test_synthesizer_starts_unloaded() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(state.synthesizer_status(), "not_loaded");
    }

    #[test]
    fn test_capture_stop_flag() {
        let state = AppState::new(AppConfig::default());
        assert!(!state.capture_stop.load(Ordering::SeqCst));

        state.request_capture_stop();
        assert!(state.capture_stop.load(Ordering::SeqCst));

        state.begin_capture();
        assert!(!state.capture_stop.load(Ordering::SeqCst));
    }

    #[test]
    fn test_endpoint_metric_rates() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("POST /api/v1/workflow", 120, false);
        state.record_endpoint_request("POST /api/v1/workflow", 80, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /api/v1/workflow"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 100.0);
        assert_eq!(metric.error_rate(), 0.5);
    }
}
