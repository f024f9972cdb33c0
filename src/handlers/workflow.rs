//! Workflow endpoints: the evaluation page itself and the API route its
//! run button calls.

use crate::error::AppResult;
use crate::state::AppState;
use crate::workflow::{
    self,
    sources::{LiveTranscriptSource, ModelConversationSource},
    WorkflowMode,
};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// The single-page UI: a microphone/synthetic choice, a run button, and
/// panels for transcripts, accuracy, summaries, and ROUGE scores.
const WORKFLOW_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Speech-to-Text Accuracy and ROUGE Evaluation</title>
<style>
  body { font-family: sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; }
  h1 { font-size: 1.4rem; }
  fieldset { border: 1px solid #ccc; margin-bottom: 1rem; }
  button { padding: 0.4rem 1.2rem; }
  pre { background: #f5f5f5; padding: 0.6rem; white-space: pre-wrap; }
  table { border-collapse: collapse; }
  td, th { border: 1px solid #ccc; padding: 0.3rem 0.8rem; text-align: right; }
  th:first-child, td:first-child { text-align: left; }
  .error { color: #b00020; font-weight: bold; }
  .hidden { display: none; }
</style>
</head>
<body>
<h1>Speech-to-Text Accuracy and ROUGE Evaluation</h1>

<fieldset>
  <legend>Use real-time microphone input?</legend>
  <label><input type="radio" name="mic" value="yes"> Yes</label>
  <label><input type="radio" name="mic" value="no" checked> No</label>
</fieldset>

<button id="run">Run Workflow</button>
<button id="stop" class="hidden">Stop Recording</button>
<p id="status"></p>

<div id="results" class="hidden">
  <h2>Transcripts</h2>
  <p><strong>Reference Transcript:</strong></p>
  <pre id="reference-transcript"></pre>
  <p><strong>System Transcript:</strong></p>
  <pre id="system-transcript"></pre>

  <h2>Transcription Accuracy</h2>
  <p id="accuracy"></p>

  <h2>Summaries</h2>
  <p><strong>Reference Summary:</strong> <span id="reference-summary"></span></p>
  <p><strong>Generated Summary:</strong> <span id="generated-summary"></span></p>

  <h2>ROUGE Scores</h2>
  <table>
    <thead><tr><th>Metric</th><th>Precision</th><th>Recall</th><th>F1</th></tr></thead>
    <tbody id="rouge-rows"></tbody>
  </table>
</div>

<script>
const pct = v => (v * 100).toFixed(2) + "%";

document.getElementById("stop").addEventListener("click", () => {
  fetch("/api/v1/workflow/stop", { method: "POST" });
});

document.getElementById("run").addEventListener("click", async () => {
  const useMic = document.querySelector('input[name="mic"]:checked').value === "yes";
  const status = document.getElementById("status");
  const results = document.getElementById("results");
  const stop = document.getElementById("stop");

  status.textContent = useMic
    ? "Recording... speak into the microphone."
    : "Generating conversation...";
  status.className = "";
  results.className = "hidden";
  stop.className = useMic ? "" : "hidden";

  let body;
  try {
    const response = await fetch("/api/v1/workflow", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ use_microphone: useMic }),
    });
    body = await response.json();
  } catch (e) {
    status.textContent = "Request failed: " + e;
    status.className = "error";
    return;
  } finally {
    stop.className = "hidden";
  }

  if (body.error) {
    status.textContent = body.error;
    status.className = "error";
    return;
  }

  status.textContent = "";
  document.getElementById("reference-transcript").textContent = body.reference_transcript;
  document.getElementById("system-transcript").textContent = body.system_transcript;
  document.getElementById("accuracy").textContent =
    "Accuracy: " + body.transcription_accuracy.toFixed(2) + "%";
  document.getElementById("reference-summary").textContent = body.reference_summary;
  document.getElementById("generated-summary").textContent = body.generated_summary;

  const rows = document.getElementById("rouge-rows");
  rows.innerHTML = "";
  for (const [name, score] of Object.entries(body.summary_scores)) {
    const row = document.createElement("tr");
    [name, pct(score.precision), pct(score.recall), pct(score.f1)].forEach((cell, i) => {
      const el = document.createElement(i === 0 ? "th" : "td");
      el.textContent = cell;
      row.appendChild(el);
    });
    rows.appendChild(row);
  }
  results.className = "";
});
</script>
</body>
</html>
"#;

pub async fn workflow_page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(WORKFLOW_PAGE)
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    /// `true` records from the microphone; `false` synthesizes the
    /// conversation. Defaults to the synthetic path.
    #[serde(default)]
    pub use_microphone: bool,
}

/// Run one evaluation workflow and return the report or error record.
///
/// The error record intentionally comes back with status 200: it is a
/// domain outcome the page renders, not a protocol failure.
pub async fn run_workflow(
    state: web::Data<AppState>,
    body: web::Json<WorkflowRequest>,
) -> AppResult<HttpResponse> {
    let run_id = Uuid::new_v4();
    let config = state.get_config();
    let mode = WorkflowMode::from_use_microphone(body.use_microphone);

    info!("Workflow run {} started in {:?} mode", run_id, mode);

    if mode == WorkflowMode::Microphone {
        state.begin_capture();
    }

    let microphone = LiveTranscriptSource::new(
        config.audio.clone(),
        config.recognition.clone(),
        state.capture_stop.clone(),
    );
    let synthesizer =
        ModelConversationSource::new(state.synthesizer.clone(), config.generation.clone());

    let outcome = workflow::run(mode, &microphone, &synthesizer).await;

    let succeeded = outcome.is_report();
    state.record_workflow_run(succeeded);
    info!(
        "Workflow run {} finished with {}",
        run_id,
        if succeeded { "a report" } else { "an error record" }
    );

    Ok(HttpResponse::Ok().json(outcome))
}

/// End an in-flight streaming capture, the page's analog of interrupting a
/// live recording at the terminal.
pub async fn stop_capture(state: web::Data<AppState>) -> HttpResponse {
    state.request_capture_stop();
    HttpResponse::Ok().json(serde_json::json!({ "status": "stop_requested" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body::to_bytes, http::StatusCode};

    #[actix_web::test]
    async fn test_workflow_page_serves_html() {
        let response = workflow_page().await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body()).await.unwrap();
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("Run Workflow"));
        assert!(html.contains("Use real-time microphone input?"));
    }

    #[test]
    fn test_request_defaults_to_synthetic() {
        let request: WorkflowRequest = serde_json::from_str("{}").unwrap();
        assert!(!request.use_microphone);

        let request: WorkflowRequest =
            serde_json::from_str(r#"{"use_microphone": true}"#).unwrap();
        assert!(request.use_microphone);
    }
}
