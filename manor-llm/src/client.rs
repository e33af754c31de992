//! LLM Client: unified interface for OpenAI-compatible and Ollama backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::backend::CompletionBackend;
use crate::error::LlmError;
use crate::types::{CompletionRequest, LlmResponse, ModelTier, ResponseFormat};

/// Provider backend for completions.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama { base_url: String },
    /// OpenAI-compatible API (also works with Together, vLLM, LM Studio, etc.).
    OpenAiCompatible { base_url: String, api_key: String },
    /// No provider: every call fails with [`LlmError::Unavailable`].
    None,
}

/// The main LLM client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    light_model: String,
    full_model: String,
    max_retries: u32,
    timeout_ms: Option<u64>,
    temperature: Option<f32>,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(
        provider: LlmProvider,
        light_model: impl Into<String>,
        full_model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            http: Client::new(),
            light_model: light_model.into(),
            full_model: full_model.into(),
            max_retries,
            timeout_ms: None,
            temperature: None,
        }
    }

    /// Override every request's timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Override every request's sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// `request` with the client-wide overrides applied.
    fn effective(&self, request: &CompletionRequest) -> CompletionRequest {
        let mut request = request.clone();
        if let Some(timeout_ms) = self.timeout_ms {
            request.timeout_ms = timeout_ms;
        }
        if let Some(temperature) = self.temperature {
            request.temperature = temperature;
        }
        request
    }

    /// Create a client with no backend (all calls fail, callers degrade).
    #[must_use]
    pub fn none() -> Self {
        Self {
            provider: LlmProvider::None,
            http: Client::new(),
            light_model: String::new(),
            full_model: String::new(),
            max_retries: 0,
            timeout_ms: None,
            temperature: None,
        }
    }

    /// The model name a tier maps to.
    #[must_use]
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Light => &self.light_model,
            ModelTier::Full => &self.full_model,
        }
    }

    /// Build the Ollama `/api/generate` body.
    fn ollama_body(model: &str, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": model,
            "system": request.system,
            "prompt": request.user,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        match &request.format {
            ResponseFormat::Text => {}
            ResponseFormat::JsonObject => body["format"] = json!("json"),
            ResponseFormat::JsonSchema { schema, .. } => body["format"] = schema.clone(),
        }
        body
    }

    /// Build the OpenAI `/v1/chat/completions` body.
    fn openai_body(model: &str, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        match &request.format {
            ResponseFormat::Text => {}
            ResponseFormat::JsonObject => {
                body["response_format"] = json!({ "type": "json_object" });
            }
            ResponseFormat::JsonSchema { name, schema } => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "schema": schema, "strict": true },
                });
            }
        }
        body
    }

    /// POST `body` to `url`, retrying transport and HTTP failures up to `max_retries`.
    ///
    /// `extract` pulls `(text, tokens)` out of a successful JSON reply.
    async fn post_with_retries(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
        request: &CompletionRequest,
        model: &str,
        extract: fn(&Value) -> (String, u32),
    ) -> Result<LlmResponse, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    purpose = %request.purpose,
                    "Retrying LLM call (attempt {}/{})",
                    attempt + 1,
                    self.max_retries + 1
                );
            }

            let start = Instant::now();
            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(request.timeout_ms));
            if let Some(key) = bearer {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }
            let result = builder.send().await;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::Unparseable(e.to_string()))?;
                    let (text, tokens_generated) = extract(&json);
                    debug!(
                        purpose = %request.purpose,
                        model,
                        latency_ms,
                        tokens_generated,
                        "LLM call completed"
                    );
                    return Ok(LlmResponse {
                        text,
                        tokens_generated,
                        latency_ms,
                        model: model.to_string(),
                    });
                }
                Ok(resp) => {
                    last_error = format!(
                        "HTTP {}: {}",
                        resp.status(),
                        resp.text().await.unwrap_or_default()
                    );
                    warn!(purpose = %request.purpose, "LLM provider returned error: {}", last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!(
                            purpose = %request.purpose,
                            "LLM request timed out after {}ms", request.timeout_ms
                        );
                    } else {
                        warn!(purpose = %request.purpose, "LLM request failed: {}", last_error);
                    }
                }
            }
        }

        Err(LlmError::Provider {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

fn token_count(value: &Value) -> u32 {
    value
        .as_u64()
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn extract_ollama(json: &Value) -> (String, u32) {
    let text = json["response"].as_str().unwrap_or_default().to_string();
    (text, token_count(&json["eval_count"]))
}

fn extract_openai(json: &Value) -> (String, u32) {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    (text, token_count(&json["usage"]["completion_tokens"]))
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let model = self.model_for(request.tier).to_string();
        let request = &self.effective(request);
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
                let body = Self::ollama_body(&model, request);
                self.post_with_retries(&url, None, &body, request, &model, extract_ollama)
                    .await
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
                let body = Self::openai_body(&model, request);
                self.post_with_retries(&url, Some(api_key), &body, request, &model, extract_openai)
                    .await
            }
        }
    }

    fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptId;

    #[tokio::test]
    async fn none_provider_is_unavailable() {
        let client = LlmClient::none();
        assert!(!client.is_available());
        let req = CompletionRequest::light(PromptId::Perception, "s", "u");
        let err = client.complete(&req).await.expect_err("no provider");
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[test]
    fn openai_body_carries_schema() {
        let req = CompletionRequest::light(PromptId::Perception, "s", "u")
            .with_schema("perceived_events", json!({"type": "object"}));
        let body = LlmClient::openai_body("gpt-test", &req);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "perceived_events");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn ollama_body_uses_format_field() {
        let req = CompletionRequest::full(PromptId::Director, "s", "u").json_object();
        let body = LlmClient::ollama_body("llama3", &req);
        assert_eq!(body["format"], "json");
        assert_eq!(body["system"], "s");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn extractors_read_provider_shapes() {
        let openai = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"completion_tokens": 7}
        });
        assert_eq!(extract_openai(&openai), ("hello".to_string(), 7));

        let ollama = json!({"response": "hi", "eval_count": 3});
        assert_eq!(extract_ollama(&ollama), ("hi".to_string(), 3));
    }

    #[test]
    fn overrides_apply_to_every_request() {
        let client = LlmClient::new(LlmProvider::None, "mini", "big", 0)
            .with_request_timeout(1_500)
            .with_temperature(0.2);
        let req = client.effective(&CompletionRequest::full(PromptId::Narration, "s", "u"));
        assert_eq!(req.timeout_ms, 1_500);
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn tiers_map_to_models() {
        let client = LlmClient::new(LlmProvider::None, "mini", "big", 1);
        assert_eq!(client.model_for(ModelTier::Light), "mini");
        assert_eq!(client.model_for(ModelTier::Full), "big");
    }
}
