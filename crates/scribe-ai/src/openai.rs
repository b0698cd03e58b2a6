//! OpenAI-compatible chat-completions streaming client
//!
//! Works against any endpoint speaking the chat-completions SSE protocol
//! (OpenAI, DashScope compatible-mode, Ollama, ...).

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    source::{FragmentStream, GenerationSource},
    types::{Fragment, GenerationParams, Turn},
};

/// Retry configuration for connection establishment
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Streaming client for OpenAI-compatible chat-completions endpoints
pub struct ChatCompletionsSource {
    client: reqwest::Client,
    api_key: String,
    retry_config: RetryConfig,
}

impl ChatCompletionsSource {
    /// Create a new client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            retry_config: RetryConfig::default(),
        }
    }

    /// Create from an environment variable holding the API key
    pub fn from_env(var: &str) -> Result<Self> {
        let api_key = std::env::var(var).map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn build_request(&self, turns: &[Turn], params: &GenerationParams) -> ChatRequest {
        let mut messages = Vec::with_capacity(turns.len() + 1);

        if let Some(ref system_prompt) = params.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.clone(),
            });
        }

        for turn in turns {
            messages.push(ChatMessage {
                role: turn.role.as_str().to_string(),
                content: turn.content.clone(),
            });
        }

        ChatRequest {
            model: params.model.clone(),
            messages,
            stream: true,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }

    fn open_event_source(
        &self,
        request: &ChatRequest,
        base_url: &str,
    ) -> Result<EventSource> {
        let url = format!("{}/chat/completions", base_url);
        let builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(request);

        EventSource::new(builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))
    }
}

#[async_trait]
impl GenerationSource for ChatCompletionsSource {
    async fn generate(
        &self,
        turns: Vec<Turn>,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        let request = self.build_request(&turns, params);

        // Retry connection establishment; once the first byte streams, errors
        // are surfaced in-band instead.
        let mut attempt = 0u32;
        let event_source = loop {
            if cancel.is_cancelled() {
                return Err(Error::Aborted);
            }

            match self.open_event_source(&request, &params.base_url) {
                Ok(es) => break es,
                Err(e) if e.is_retryable() && attempt < self.retry_config.max_retries => {
                    let delay = self.retry_config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "chat-completions connect failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt + 1,
                        self.retry_config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        Ok(Box::pin(create_stream(event_source, cancel)))
    }
}

fn create_stream(
    mut event_source: EventSource,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = Result<Fragment>> {
    stream! {
        while let Some(event) = event_source.next().await {
            if cancel.is_cancelled() {
                event_source.close();
                return;
            }

            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        yield Ok(Fragment::Completion);
                        return;
                    }

                    match serde_json::from_str::<StreamChunk>(&msg.data) {
                        Ok(chunk) => {
                            for choice in &chunk.choices {
                                if let Some(ref content) = choice.delta.content {
                                    if !content.is_empty() {
                                        yield Ok(Fragment::token(content.clone()));
                                    }
                                }
                                // Some compatible endpoints omit [DONE]
                                if choice.finish_reason.is_some() {
                                    yield Ok(Fragment::Completion);
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(Error::UnexpectedResponse(format!(
                                "Failed to parse chunk: {}",
                                e
                            )));
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    break;
                }
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    return;
                }
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn params() -> GenerationParams {
        GenerationParams {
            model: "qwen-plus".into(),
            base_url: "http://localhost:1".into(),
            system_prompt: Some("You are a report-writing assistant".into()),
            max_tokens: Some(1024),
            temperature: Some(0.7),
        }
    }

    #[test]
    fn test_build_request_prepends_system_prompt() {
        let source = ChatCompletionsSource::new("key");
        let turns = vec![Turn::user("write about ferrets")];
        let request = source.build_request(&turns, &params());

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[1].content, "write about ferrets");
        assert!(request.stream);
    }

    #[test]
    fn test_build_request_preserves_turn_order() {
        let source = ChatCompletionsSource::new("key");
        let turns = vec![
            Turn::user("first"),
            Turn::assistant("reply"),
            Turn::user("second"),
        ];
        let mut p = params();
        p.system_prompt = None;
        let request = source.build_request(&turns, &p);

        let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_parse_stream_chunk() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hello"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_parse_stream_chunk_finish() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(10), config.max_delay);
    }
}
