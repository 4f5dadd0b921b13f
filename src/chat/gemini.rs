use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{chat::dto::Content, config::GeminiConfig};

lazy_static! {
    static ref MODEL_UNAVAILABLE_RE: Regex = Regex::new(r"(?i)not found|404|not supported").unwrap();
}

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The model id is unknown or cannot serve this request; the next candidate may.
    #[error("model {model} unavailable: {message}")]
    ModelUnavailable { model: String, message: String },
    #[error("Server missing GEMINI_API_KEY")]
    MissingApiKey,
    #[error("{0}")]
    Failed(String),
}

impl GenerateError {
    /// Sorts a provider failure into "try the next model" or "give up".
    pub fn classify(model: &str, status: Option<StatusCode>, message: String) -> Self {
        if status == Some(StatusCode::NOT_FOUND) || MODEL_UNAVAILABLE_RE.is_match(&message) {
            GenerateError::ModelUnavailable {
                model: model.to_string(),
                message,
            }
        } else {
            GenerateError::Failed(message)
        }
    }
}

#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, model: &str, contents: &[Content]) -> Result<String, GenerateError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, model: &str, contents: &[Content]) -> Result<String, GenerateError> {
        let api_key = self.api_key.as_deref().ok_or(GenerateError::MissingApiKey)?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&GenerateRequest { contents })
            .send()
            .await
            .map_err(|e| GenerateError::classify(model, e.status(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| format!("{status}: {body}"));
            return Err(GenerateError::classify(model, Some(status), message));
        }

        let parsed = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GenerateError::Failed(format!("Failed to parse Gemini response: {e}")))?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        debug!(model, chars = text.len(), "gemini answered");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::dto::Part;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer, api_key: Option<&str>) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            api_key: api_key.map(String::from),
            base_url: server.uri(),
            models: vec![],
        })
        .unwrap()
    }

    fn hello() -> Vec<Content> {
        vec![Content {
            role: "user".into(),
            parts: vec![Part::text("hello")],
        }]
    }

    #[tokio::test]
    async fn joins_text_parts_of_first_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [{ "text": "Drink " }, { "text": "water." }] } }
                ]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server, Some("k"))
            .generate("gemini-test", &hello())
            .await
            .unwrap();
        assert_eq!(text, "Drink water.");
    }

    #[tokio::test]
    async fn not_found_status_is_model_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "models/gemini-old is gone" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("k"))
            .generate("gemini-old", &hello())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn other_errors_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "API key not valid" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("k"))
            .generate("gemini-test", &hello())
            .await
            .unwrap_err();
        match err {
            GenerateError::Failed(msg) => assert_eq!(msg, "API key not valid"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_before_calling_out() {
        let server = MockServer::start().await;
        let err = client_for(&server, None)
            .generate("gemini-test", &hello())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::MissingApiKey));
    }

    #[test]
    fn classify_matches_unsupported_messages() {
        let err = GenerateError::classify(
            "m",
            Some(StatusCode::BAD_REQUEST),
            "Model is NOT SUPPORTED for generateContent".into(),
        );
        assert!(matches!(err, GenerateError::ModelUnavailable { .. }));
    }
}
