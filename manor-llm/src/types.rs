//! Core types for completion requests and responses.

use serde::Deserialize;
use serde_json::Value;

use crate::prompt::PromptId;

/// Which configured model a request should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Small, fast model: perception, summaries, sensory events, facts.
    Light,
    /// Main reasoning model: mutation planning, NPC actions, narration.
    Full,
}

/// Output constraint passed to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    /// Free text.
    Text,
    /// Any JSON object.
    JsonObject,
    /// JSON constrained by a named schema.
    JsonSchema {
        /// Schema name (OpenAI requires one).
        name: String,
        /// The JSON schema document.
        schema: Value,
    },
}

impl ResponseFormat {
    /// Whether the caller expects JSON back.
    #[must_use]
    pub fn is_json(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A request to the completion service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Which pipeline stage issued this request. Used for logging and routing in fakes.
    pub purpose: PromptId,
    /// System instructions.
    pub system: String,
    /// User content.
    pub user: String,
    /// Model tier.
    pub tier: ModelTier,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Output constraint.
    pub format: ResponseFormat,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl CompletionRequest {
    /// Create a request for the light model.
    #[must_use]
    pub fn light(purpose: PromptId, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose,
            system: system.into(),
            user: user.into(),
            tier: ModelTier::Light,
            max_tokens: 400,
            temperature: 0.3,
            format: ResponseFormat::Text,
            timeout_ms: 20_000,
        }
    }

    /// Create a request for the full planning model.
    #[must_use]
    pub fn full(purpose: PromptId, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose,
            system: system.into(),
            user: user.into(),
            tier: ModelTier::Full,
            max_tokens: 1000,
            temperature: 0.7,
            format: ResponseFormat::Text,
            timeout_ms: 30_000,
        }
    }

    /// Ask for a JSON object response.
    #[must_use]
    pub fn json_object(mut self) -> Self {
        self.format = ResponseFormat::JsonObject;
        self
    }

    /// Ask for a response constrained by a JSON schema.
    #[must_use]
    pub fn with_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.format = ResponseFormat::JsonSchema {
            name: name.into(),
            schema,
        };
        self
    }

    /// Set the token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the completion service.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

impl LlmResponse {
    /// A response carrying only text, for backends that do not report usage.
    #[must_use]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_generated: 0,
            latency_ms: 0,
            model: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_format_and_budget() {
        let req = CompletionRequest::light(PromptId::Perception, "sys", "user")
            .with_schema("perceived_events", serde_json::json!({"type": "object"}))
            .with_max_tokens(2000);
        assert_eq!(req.tier, ModelTier::Light);
        assert_eq!(req.max_tokens, 2000);
        assert!(req.format.is_json());

        let plain = CompletionRequest::full(PromptId::Narration, "sys", "user");
        assert_eq!(plain.format, ResponseFormat::Text);
        assert!(!plain.format.is_json());
    }
}
