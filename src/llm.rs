//! Gemini `generateContent` client
//!
//! One user utterance in, exactly one [`Message`] out.
//! [`CompletionClient::try_complete`] yields the model text or a typed
//! [`CompletionError`], logged in full, and [`reply_message`] turns either into
//! the assistant message. Failures become messages starting with `"Error:"`.
//!
//! The HTTP call sits behind [`CompletionTransport`] so the client logic can be
//! exercised without a network.

use crate::config::Config;
use crate::conversation::Message;
use crate::error::{CompletionError, GENERIC_TRANSPORT_MESSAGE};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Request body: `{ "contents": [ { "parts": [ { "text": ... } ] } ] }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// Single-turn request carrying only the given text
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Successful response. Everything except the first candidate's first text
/// part is ignored, and every level is optional so odd payloads still parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present and non-empty
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }
}

/// Error body: `{ "error": { "message": ... } }`
#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Status and raw body of an HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request body to the completion endpoint
///
/// `Err` means no response was received at all (DNS, connect, TLS, timeout).
/// Any HTTP status, including errors, is an `Ok`.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<TransportResponse>;
}

/// reqwest-backed transport. The key travels as the `key` query parameter.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    #[cfg(test)]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            // the URL carries the key
            .map_err(reqwest::Error::without_url)?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

/// Turns one user utterance into one assistant [`Message`]
#[derive(Clone)]
pub struct CompletionClient {
    config: Config,
    transport: Arc<dyn CompletionTransport>,
}

impl CompletionClient {
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn CompletionTransport>) -> Self {
        Self { config, transport }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Ask the model about `user_text`. Never panics and never retries; the
    /// outcome always maps to exactly one assistant message.
    ///
    /// Callers must not pass blank text; the session rejects it earlier.
    pub async fn try_complete(&self, user_text: &str) -> Result<String, CompletionError> {
        let outcome = self.request(user_text).await;
        match &outcome {
            Err(CompletionError::Transport { status, message }) => {
                error!(?status, %message, "completion request failed")
            }
            Err(err) => error!(error = %err, "completion failed"),
            Ok(_) => {}
        }
        outcome
    }

    async fn request(&self, user_text: &str) -> Result<String, CompletionError> {
        let api_key = self.config.api_key().ok_or_else(|| {
            warn!(env_var = %self.config.api_key_env, "no API key configured, skipping request");
            CompletionError::Configuration {
                env_var: self.config.api_key_env.clone(),
                config_hint: self.config.config_path().display().to_string(),
            }
        })?;

        let url = self.config.generate_url();
        let request = GenerateContentRequest::from_prompt(user_text);
        info!(model = %self.config.model, prompt_len = user_text.len(), "sending completion request");

        let response = self
            .transport
            .post(&url, &api_key, &request)
            .await
            .map_err(|err| CompletionError::transport(None, format!("{err:#}")))?;

        debug!(status = response.status, body_len = response.body.len(), "completion response");
        parse_response(&response)
    }
}

/// The assistant message standing for a completion outcome
pub fn reply_message(outcome: &Result<String, CompletionError>) -> Message {
    match outcome {
        Ok(text) => Message::assistant(text.as_str()),
        Err(err) => Message::assistant(err.to_message_content()),
    }
}

/// Map a raw HTTP exchange to the model text or a typed failure
pub fn parse_response(response: &TransportResponse) -> Result<String, CompletionError> {
    if !response.is_success() {
        let message = serde_json::from_str::<ApiErrorEnvelope>(&response.body)
            .ok()
            .and_then(|envelope| envelope.error)
            .and_then(|body| body.message)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| GENERIC_TRANSPORT_MESSAGE.to_string());
        return Err(CompletionError::transport(Some(response.status), message));
    }

    let parsed: GenerateContentResponse = serde_json::from_str(&response.body).map_err(|err| {
        warn!(error = %err, "completion response is not valid JSON");
        CompletionError::MalformedResponse
    })?;

    parsed
        .first_text()
        .map(str::to_string)
        .ok_or(CompletionError::MalformedResponse)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// What the mock backend should do for every request
    #[derive(Clone, Debug)]
    pub enum MockReply {
        Respond { status: u16, body: String },
        Fail(String),
        /// Error with a cause underneath, like reqwest's connect failures
        FailWithCause { context: String, cause: String },
    }

    /// Records requests and replays a canned reply
    pub struct MockTransport {
        reply: MockReply,
        calls: AtomicUsize,
        last_request: Mutex<Option<(String, String, GenerateContentRequest)>>,
    }

    impl MockTransport {
        pub fn new(reply: MockReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        pub fn ok(text: &str) -> Arc<Self> {
            let body = serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
            });
            Self::new(MockReply::Respond {
                status: 200,
                body: body.to_string(),
            })
        }

        pub fn status(status: u16, body: &str) -> Arc<Self> {
            Self::new(MockReply::Respond {
                status,
                body: body.to_string(),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<(String, String, GenerateContentRequest)> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionTransport for MockTransport {
        async fn post(
            &self,
            url: &str,
            api_key: &str,
            body: &GenerateContentRequest,
        ) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() =
                Some((url.to_string(), api_key.to_string(), body.clone()));
            match &self.reply {
                MockReply::Respond { status, body } => Ok(TransportResponse {
                    status: *status,
                    body: body.clone(),
                }),
                MockReply::Fail(message) => Err(anyhow::anyhow!("{message}")),
                MockReply::FailWithCause { context, cause } => {
                    Err(anyhow::anyhow!("{cause}").context(context.clone()))
                }
            }
        }
    }

    /// The assistant message a submission of `text` would append
    async fn complete(client: &CompletionClient, text: &str) -> Message {
        reply_message(&client.try_complete(text).await)
    }

    pub fn keyed_config() -> Config {
        Config {
            api_key: Some("test-key".to_string()),
            api_key_env: "NOVAGEM_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Config::default()
        }
    }

    pub fn keyless_config() -> Config {
        Config {
            api_key: None,
            ..keyed_config()
        }
    }

    #[test]
    fn request_body_has_expected_shape() {
        let body = serde_json::to_string(&GenerateContentRequest::from_prompt("hi")).unwrap();
        assert_eq!(body, r#"{"contents":[{"parts":[{"text":"hi"}]}]}"#);
    }

    #[tokio::test]
    async fn success_returns_first_candidate_text() {
        let transport = MockTransport::ok("Hello!");
        let client = CompletionClient::with_transport(keyed_config(), transport.clone());

        let message = complete(&client, "hi").await;

        assert_eq!(message, Message::assistant("Hello!"));
        assert_eq!(transport.calls(), 1);
        let (url, key, body) = transport.last_request().unwrap();
        assert!(url.ends_with("/models/gemini-1.5-flash:generateContent"));
        assert_eq!(key, "test-key");
        assert_eq!(body, GenerateContentRequest::from_prompt("hi"));
    }

    #[tokio::test]
    async fn extra_fields_and_candidates_are_ignored() {
        let body = serde_json::json!({
            "candidates": [
                {
                    "content": { "parts": [{ "text": "first" }, { "text": "second" }], "role": "model" },
                    "finishReason": "STOP"
                },
                { "content": { "parts": [{ "text": "other candidate" }] } }
            ],
            "usageMetadata": { "totalTokenCount": 12 }
        });
        let transport = MockTransport::status(200, &body.to_string());
        let client = CompletionClient::with_transport(keyed_config(), transport);

        assert_eq!(client.try_complete("hi").await, Ok("first".to_string()));
    }

    #[tokio::test]
    async fn missing_key_skips_network() {
        let transport = MockTransport::ok("never");
        let client = CompletionClient::with_transport(keyless_config(), transport.clone());

        let message = complete(&client, "hi").await;

        assert_eq!(transport.calls(), 0);
        assert!(message.content().starts_with("Error:"));
        assert!(message.content().contains("API key"));
    }

    #[tokio::test]
    async fn placeholder_key_skips_network() {
        let transport = MockTransport::ok("never");
        let config = Config {
            api_key: Some(crate::config::PLACEHOLDER_API_KEY.to_string()),
            ..keyed_config()
        };
        let client = CompletionClient::with_transport(config, transport.clone());

        assert!(matches!(
            client.try_complete("hi").await,
            Err(CompletionError::Configuration { .. })
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn error_status_uses_provider_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let transport = MockTransport::status(400, body);
        let client = CompletionClient::with_transport(keyed_config(), transport);

        let message = complete(&client, "hi").await;

        assert!(message.content().starts_with("Error:"));
        assert!(message.content().contains("API key not valid. Please pass a valid API key."));
        assert_eq!(
            client.try_complete("hi").await,
            Err(CompletionError::transport(
                Some(400),
                "API key not valid. Please pass a valid API key."
            ))
        );
    }

    #[tokio::test]
    async fn error_status_without_body_uses_generic_message() {
        for body in ["", "<html>bad gateway</html>", r#"{"error":{}}"#, r#"{"error":{"message":""}}"#] {
            let transport = MockTransport::status(502, body);
            let client = CompletionClient::with_transport(keyed_config(), transport);

            let message = complete(&client, "hi").await;

            assert!(message.content().starts_with("Error:"), "body {body:?}");
            assert!(message.content().contains(GENERIC_TRANSPORT_MESSAGE), "body {body:?}");
        }
    }

    #[tokio::test]
    async fn network_failure_is_transport_error() {
        let transport = MockTransport::new(MockReply::Fail("connection refused".to_string()));
        let client = CompletionClient::with_transport(keyed_config(), transport.clone());

        assert_eq!(
            client.try_complete("hi").await,
            Err(CompletionError::transport(None, "connection refused"))
        );
        let message = complete(&client, "hi").await;
        assert!(message.content().starts_with("Error: connection refused"));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_cause_chain() {
        let transport = MockTransport::new(MockReply::FailWithCause {
            context: "error sending request".to_string(),
            cause: "tcp connect error: Connection refused".to_string(),
        });
        let client = CompletionClient::with_transport(keyed_config(), transport);

        assert_eq!(
            client.try_complete("hi").await,
            Err(CompletionError::transport(
                None,
                "error sending request: tcp connect error: Connection refused"
            ))
        );
    }

    #[test]
    fn reply_message_follows_the_outcome() {
        assert_eq!(
            reply_message(&Ok("Error: is a prefix many loggers use.".to_string())),
            Message::assistant("Error: is a prefix many loggers use.")
        );
        assert_eq!(
            reply_message(&Err(CompletionError::MalformedResponse)),
            Message::assistant(CompletionError::MalformedResponse.to_message_content())
        );
    }

    #[tokio::test]
    async fn success_without_text_is_malformed() {
        let bodies = [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":null}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{}}]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
            "not json",
        ];
        for body in bodies {
            let transport = MockTransport::status(200, body);
            let client = CompletionClient::with_transport(keyed_config(), transport);

            let message = complete(&client, "hi").await;

            assert!(message.content().starts_with("Error:"), "body {body:?}");
            assert!(
                message.content().contains("Invalid response format"),
                "body {body:?}"
            );
        }
    }

    /// Serves one canned HTTP response and hands back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(header_end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
                    let content_length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}/v1beta"), handle)
    }

    #[tokio::test]
    async fn http_transport_sends_key_as_query_parameter() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello!"}]}}]}"#,
        )
        .await;
        let config = Config {
            base_url,
            ..keyed_config()
        };
        let transport = HttpTransport::with_client(reqwest::Client::builder().no_proxy().build().unwrap());
        let client = CompletionClient::with_transport(config, Arc::new(transport));

        let message = complete(&client, "hi").await;
        let request = server.await.unwrap();

        assert_eq!(message, Message::assistant("Hello!"));
        assert!(request.starts_with("POST /v1beta/models/gemini-1.5-flash:generateContent?key=test-key HTTP/1.1"));
        assert!(request.ends_with(r#"{"contents":[{"parts":[{"text":"hi"}]}]}"#));
    }

    #[tokio::test]
    async fn http_transport_reports_error_status() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 429 Too Many Requests",
            r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#,
        )
        .await;
        let config = Config {
            base_url,
            ..keyed_config()
        };
        let transport = HttpTransport::with_client(reqwest::Client::builder().no_proxy().build().unwrap());
        let client = CompletionClient::with_transport(config, Arc::new(transport));

        let result = client.try_complete("hi").await;
        server.await.unwrap();

        assert_eq!(
            result,
            Err(CompletionError::transport(Some(429), "Resource has been exhausted"))
        );
    }
}
