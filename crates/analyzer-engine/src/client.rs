use std::time::Duration;

use analyzer_contracts::config::AnalyzerConfig;
use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const MISSING_RESPONSE_FIELD: &str = "Error: 'response' field not found in API reply.";

/// Why a single inference call produced no answer.
///
/// The `Display` text is what ends up in the conversation, so it is written
/// for the user rather than the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("Communication error with the model server. Is it running? Details: {0}")]
    Transport(String),
    #[error(
        "Communication error with the model server. Is it running? Details: HTTP status {code}: {body}"
    )]
    Status { code: u16, body: String },
    #[error("Error: received an invalid JSON response from the API.")]
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub ok: bool,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// A vision-language model the orchestrator can ask about an image.
pub trait VisionModel: Send + Sync {
    fn model(&self) -> &str;

    /// Always returns displayable text; failures come back as diagnostics.
    fn infer(&self, encoded_image: &str, question: &str) -> String;

    fn health_check(&self) -> HealthStatus;
}

/// Client for an Ollama-style `/api/generate` endpoint.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    probe_timeout: Duration,
    inference_timeout: Duration,
    http: HttpClient,
}

impl OllamaClient {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            probe_timeout: config.probe_timeout,
            inference_timeout: config.inference_timeout,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Single non-streaming request; no retries.
    pub fn try_infer(&self, encoded_image: &str, question: &str) -> Result<String, InferenceError> {
        let payload = generate_payload(&self.model, question, &[encoded_image]);
        debug!(endpoint = %self.endpoint, model = %self.model, "sending inference request");
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.inference_timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text() {
                Ok(body) => body,
                Err(err) => {
                    debug!(status = status.as_u16(), error = %err, "failed to read error response body");
                    String::new()
                }
            };
            return Err(InferenceError::Status {
                code: status.as_u16(),
                body: truncate_text(body.trim(), 512),
            });
        }
        let body = response
            .text()
            .map_err(transport_error)?;
        let parsed: Value = serde_json::from_str(&body).map_err(|_| InferenceError::Protocol)?;
        Ok(extract_answer(&parsed))
    }
}

impl VisionModel for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn infer(&self, encoded_image: &str, question: &str) -> String {
        match self.try_infer(encoded_image, question) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "inference request failed");
                err.to_string()
            }
        }
    }

    fn health_check(&self) -> HealthStatus {
        let payload = generate_payload(&self.model, "ping", &[]);
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.probe_timeout)
            .json(&payload)
            .send();
        match response {
            Ok(response) if response.status() == StatusCode::OK => HealthStatus::healthy(),
            Ok(response) => HealthStatus::failed(format!(
                "Model service responded incorrectly (status {})",
                response.status().as_u16()
            )),
            Err(err) => HealthStatus::failed(format!(
                "Model service unreachable: {}",
                error_chain_text(&anyhow::Error::new(err), 512)
            )),
        }
    }
}

fn transport_error(err: reqwest::Error) -> InferenceError {
    InferenceError::Transport(error_chain_text(&anyhow::Error::new(err), 512))
}

fn generate_payload(model: &str, prompt: &str, images: &[&str]) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "images": images,
        "stream": false,
    })
}

fn extract_answer(payload: &Value) -> String {
    payload
        .get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| MISSING_RESPONSE_FIELD.to_string())
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
