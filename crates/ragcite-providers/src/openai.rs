//! OpenAI-compatible embedding and chat completion clients.
//!
//! Both clients talk to any endpoint that implements the OpenAI
//! `/embeddings` and `/chat/completions` routes. Neither retries; failures
//! surface to the caller as provider errors.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use ragcite_core::{
    CompletionError, CompletionProvider, CompletionRequest, CompletionStream, EmbedError,
    Embedder, EmbeddingConfig, EmbeddingOutput, Role, StreamEvent,
};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use crate::sse::SseDecoder;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings shared by both clients.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiSettings {
    fn client(&self) -> Result<Client, String> {
        if self.api_key.trim().is_empty() {
            return Err("missing API key".to_string());
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| format!("invalid API key: {e}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url.trim_end_matches('/'))
    }
}

// ============================================================================
// Embeddings
// ============================================================================

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Build a client for `settings.model` producing `dimension`-sized vectors.
    pub fn new(settings: &OpenAiSettings, dimension: usize) -> Result<Self, EmbedError> {
        let client = settings.client().map_err(EmbedError::Request)?;
        Ok(Self {
            client,
            endpoint: settings.endpoint("embeddings"),
            model: settings.model.clone(),
            dimension,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input = texts
            .iter()
            .map(|text| match &config.instruction {
                Some(instruction) => format!("{instruction}{text}"),
                None => (*text).to_string(),
            })
            .collect();
        let request = EmbeddingRequest {
            model: &self.model,
            input,
            dimensions: self.dimension,
        };

        debug!("Requesting {} embeddings from {}", texts.len(), self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedError::Request(format!("{status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Inference(format!("invalid embedding response: {e}")))?;
        parse_embeddings(&mut parsed, texts.len(), config.normalize)
    }
}

fn parse_embeddings(
    parsed: &mut EmbeddingResponse,
    expected: usize,
    normalize: bool,
) -> Result<Vec<EmbeddingOutput>, EmbedError> {
    if parsed.data.len() != expected {
        return Err(EmbedError::Inference(format!(
            "provider returned {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        )));
    }
    parsed.data.sort_by_key(|entry| entry.index);

    let tokens = parsed.usage.as_ref().map_or(0, |u| u.prompt_tokens);
    let per_input = tokens / expected.max(1);

    Ok(parsed
        .data
        .drain(..)
        .map(|entry| {
            let mut embedding = entry.embedding;
            if normalize {
                normalize_in_place(&mut embedding);
            }
            EmbeddingOutput {
                embedding,
                token_count: per_input,
            }
        })
        .collect())
}

fn normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ============================================================================
// Chat completion
// ============================================================================

/// Completion provider backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompletion {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, CompletionError> {
        let client = settings.client().map_err(CompletionError::Request)?;
        Ok(Self {
            client,
            endpoint: settings.endpoint("chat/completions"),
            model: settings.model.clone(),
        })
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatRequestMessage {
            role: Role::System,
            content: &request.system_prompt,
        });
        messages.extend(request.history.iter().map(|m| ChatRequestMessage {
            role: m.role,
            content: &m.content,
        }));
        messages.push(ChatRequestMessage {
            role: Role::User,
            content: &request.user_message,
        });

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CompletionError::Request(format!("{status}: {text}")));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Interpret one SSE payload of a streamed chat completion.
fn parse_stream_payload(payload: &str) -> Result<Option<StreamEvent>, CompletionError> {
    if payload == "[DONE]" {
        return Ok(Some(StreamEvent::Done));
    }
    let chunk: ChatChunk = serde_json::from_str(payload)
        .map_err(|e| CompletionError::Stream(format!("invalid stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .find_map(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(StreamEvent::Fragment))
}

struct StreamState {
    bytes: BoxStream<'static, Result<Vec<u8>, CompletionError>>,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl StreamState {
    fn accept(&mut self, payloads: Vec<String>) -> Result<(), CompletionError> {
        for payload in payloads {
            if let Some(event) = parse_stream_payload(&payload)? {
                self.pending.push_back(event);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let response = self.send(&self.body(request, false)).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Response(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::Response("no choices in response".to_string()))
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let response = self.send(&self.body(request, true)).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| CompletionError::Stream(e.to_string()))
            })
            .boxed();

        let state = StreamState {
            bytes,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        let events = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    if event == StreamEvent::Done {
                        state.finished = true;
                        state.pending.clear();
                    }
                    return Some((Ok(event), state));
                }
                if state.finished {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let payloads = state.decoder.push(&chunk);
                        if let Err(e) = state.accept(payloads) {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                    None => {
                        let tail = state.decoder.finish().into_iter().collect();
                        if let Err(e) = state.accept(tail) {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        // A stream that closes without [DONE] still terminates.
                        state.pending.push_back(StreamEvent::Done);
                    }
                }
            }
        });

        Ok(events.boxed())
    }
}
