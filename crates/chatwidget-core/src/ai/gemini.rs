use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GenerateRequest, GenerateResponse, GenerationService, ServiceConnector};
use crate::error::ChatError;
use crate::state::Message;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: &'a [Message],
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

impl GeminiResponse {
    /// Text of the first candidate, all text parts concatenated
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

/// Pull the provider's own message out of an error body, falling back to the
/// raw status and body text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GeminiErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ if body.trim().is_empty() => format!("Gemini API error {}", status),
        _ => format!("Gemini API error {}: {}", status, body.trim()),
    }
}

fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self, ChatError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, None)
    }

    pub fn with_options(
        api_key: &str,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ChatError> {
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingCredential);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            model_path(model)
        )
    }

    pub async fn query(&self, model: &str, contents: &[Message]) -> Result<Option<String>, ChatError> {
        let url = self.endpoint(model);
        debug!(model, turns = contents.len(), "gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&GeminiRequest { contents })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            warn!(status = status.as_u16(), %message, "gemini request failed");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        Ok(gemini_response.text())
    }

    /// Models offered as suggestions in the model field
    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
            "gemini-2.5-flash-lite".to_string(),
        ]
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ChatError> {
        let text = self.query(&request.model, &request.contents).await?;
        Ok(GenerateResponse { text })
    }
}

/// Connects `GeminiClient`s against a configurable endpoint.
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    base_url: String,
    timeout: Option<Duration>,
}

impl GeminiConnector {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl Default for GeminiConnector {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

impl ServiceConnector for GeminiConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn GenerationService>, ChatError> {
        let client = GeminiClient::with_options(credential, &self.base_url, self.timeout)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers a single request with a canned response and returns the raw
    /// request text it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (base_url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&raw[..end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= end + 4 + length
    }

    #[test]
    fn request_body_is_contents_array() {
        let contents = vec![Message::model("hi"), Message::user("Hello")];
        let body = serde_json::to_value(GeminiRequest { contents: &contents }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [
                    { "role": "model", "parts": [{ "text": "hi" }] },
                    { "role": "user", "parts": [{ "text": "Hello" }] }
                ]
            })
        );
    }

    #[test]
    fn response_text_concatenates_first_candidate_parts() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[
                {"content":{"role":"model","parts":[{"text":"Hi "},{"text":"there"}]}},
                {"content":{"role":"model","parts":[{"text":"ignored"}]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("Hi there"));
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(resp.text(), None);

        let resp: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(resp.text(), None);
    }

    #[test]
    fn error_message_prefers_provider_message() {
        let body = r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            error_message(StatusCode::TOO_MANY_REQUESTS, body),
            "quota exceeded"
        );
    }

    #[test]
    fn error_message_falls_back_to_status_and_body() {
        let msg = error_message(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(msg.contains("502"));
        assert!(msg.contains("upstream down"));

        let msg = error_message(StatusCode::BAD_GATEWAY, "");
        assert!(msg.contains("502"));
    }

    #[test]
    fn empty_key_cannot_build_a_client() {
        assert!(matches!(
            GeminiClient::new("   "),
            Err(ChatError::MissingCredential)
        ));
    }

    #[test]
    fn endpoint_strips_models_prefix_and_trailing_slash() {
        let client =
            GeminiClient::with_options("abc", "http://localhost:8080/", None).unwrap();
        assert_eq!(
            client.endpoint("models/gemini-2.5-pro"),
            "http://localhost:8080/v1beta/models/gemini-2.5-pro:generateContent"
        );
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn query_posts_history_with_key_header() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi "},{"text":"there"}]}}]}"#,
        )
        .await;
        let client = GeminiClient::with_options("secret-key", &base_url, None).unwrap();

        let reply = client
            .query("models/gemini-2.5-flash", &[Message::user("Hello")])
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Hi there"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: secret-key"));
        assert!(request.ends_with(r#"{"contents":[{"role":"user","parts":[{"text":"Hello"}]}]}"#));
    }

    #[tokio::test]
    async fn rejected_status_carries_provider_message() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        )
        .await;
        let client = GeminiClient::with_options("bad-key", &base_url, None).unwrap();

        let err = client
            .query("gemini-2.5-flash", &[Message::user("Hello")])
            .await
            .unwrap_err();
        server.await.unwrap();

        match &err {
            ChatError::Api { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "API key not valid. Please pass a valid API key.");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "API key not valid. Please pass a valid API key.");
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let (base_url, server) = serve_once("200 OK", "not json").await;
        let client = GeminiClient::with_options("abc", &base_url, None).unwrap();

        let err = client
            .query("gemini-2.5-flash", &[Message::user("Hello")])
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, ChatError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn candidate_without_text_generates_no_text() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).await;
        let client = GeminiClient::with_options("abc", &base_url, None).unwrap();

        let request = GenerateRequest {
            model: "gemini-2.5-flash".to_string(),
            contents: vec![Message::user("Hello")],
        };
        let response = client.generate(&request).await.unwrap();
        server.await.unwrap();

        assert_eq!(response, GenerateResponse { text: None });
    }
}
