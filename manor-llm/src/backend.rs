//! The completion-service seam.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{CompletionRequest, LlmResponse};

/// Anything that can answer a [`CompletionRequest`].
///
/// [`crate::LlmClient`] is the HTTP implementation. Callers that need
/// cancellation race the returned future against their own token.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the provider is unreachable, times out, or
    /// answers with something unusable.
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError>;

    /// Whether a real provider is configured.
    fn is_available(&self) -> bool {
        true
    }
}
