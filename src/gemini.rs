use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::generate::{GenerationError, Generator};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish reasons the SDK treats as "no usable text"
const BLOCKED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.map(|k| k.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Build a client from resolved configuration, applying its timeout and
    /// endpoint overrides.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .build()?;

        Ok(Self {
            client,
            api_key: config.resolved_api_key(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
        })
    }

    pub async fn query(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenerationError::MissingApiKey)?;

        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "sending generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        reply_text(parsed)
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-1.5-flash".to_string(),
            "gemini-1.5-flash-8b".to_string(),
            "gemini-1.5-pro".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.query(prompt).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn reply_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::Blocked(reason));
        }
        return Ok(String::new());
    };

    if let Some(reason) = candidate.finish_reason {
        if BLOCKED_FINISH_REASONS.contains(&reason.as_str()) {
            return Err(GenerationError::Blocked(reason));
        }
    }

    Ok(candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn parse(json: &str) -> Result<String, GenerationError> {
        reply_text(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let text = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(text, "Hello");
    }

    #[test]
    fn test_reply_text_empty_candidates() {
        assert_eq!(parse(r#"{"candidates":[]}"#).unwrap(), "");
        assert_eq!(parse("{}").unwrap(), "");
    }

    #[test]
    fn test_reply_text_blocked_prompt() {
        let err = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Blocked(r) if r == "SAFETY"));
    }

    #[test]
    fn test_reply_text_safety_finish_reason() {
        let err = parse(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Blocked(_)));
    }

    #[test]
    fn test_reply_text_max_tokens_keeps_text() {
        let text = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"partial"}]},"finishReason":"MAX_TOKENS"}]}"#,
        )
        .unwrap();
        assert_eq!(text, "partial");
    }

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn generate_content(
        State(seen): State<Seen>,
        Path(action): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        seen.lock().unwrap().push((action.clone(), key, body));

        if action.starts_with("broken") {
            return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
        }
        Json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello"}]},
                "finishReason": "STOP"
            }]
        }))
        .into_response()
    }

    /// Local stand-in for the Gemini endpoint. Returns its base URL.
    async fn serve(seen: Seen) -> String {
        let app = Router::new()
            .route("/models/{action}", post(generate_content))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn local_client(model: &str, base_url: &str) -> GeminiClient {
        GeminiClient {
            client: Client::builder().no_proxy().build().unwrap(),
            ..GeminiClient::new(Some("test-key"), model)
        }
        .with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_query_sends_key_and_prompt() {
        let seen = Seen::default();
        let base_url = serve(seen.clone()).await;

        let client = local_client(DEFAULT_MODEL, &base_url);
        let reply = client.generate("Hi").await.unwrap();
        assert_eq!(reply, "Hello");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (action, key, body) = &seen[0];
        assert_eq!(action, "gemini-1.5-flash:generateContent");
        assert_eq!(key.as_deref(), Some("test-key"));
        assert_eq!(
            body,
            &json!({"contents": [{"role": "user", "parts": [{"text": "Hi"}]}]})
        );
    }

    #[tokio::test]
    async fn test_query_maps_error_status() {
        let seen = Seen::default();
        let base_url = serve(seen.clone()).await;

        let client = local_client("broken-model", &base_url);
        let err = client.generate("Hi").await.unwrap_err();
        assert!(
            matches!(&err, GenerationError::Api { status: 500, body } if body == "boom"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let client = GeminiClient::new(None, DEFAULT_MODEL);
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingApiKey));

        let client = GeminiClient::new(Some(""), DEFAULT_MODEL);
        assert!(matches!(
            client.generate("hi").await,
            Err(GenerationError::MissingApiKey)
        ));
    }
}
