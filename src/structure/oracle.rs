//! The structuring oracle: an external capability that annotates text.
//!
//! The pipeline only ever sees the [`StructuringOracle`] trait, so the LLM
//! backend can be replaced by a scripted oracle in tests or by any other
//! service. [`LlmOracle`] is the production implementation, backed by an
//! `edgequake-llm` provider.
//!
//! ## Retry Strategy
//!
//! Retries belong to the caller and follow a [`RetryPolicy`]: exponential
//! backoff (`initial_backoff * 2^(retry-1)`), capped at `max_backoff`. With
//! the defaults the waits are 500 ms → 1 s → 2 s. Timeouts and transient
//! failures are retried; a rejected model hint is not.

use crate::config::StructuringConfig;
use crate::prompts::{analysis_user_message, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why the oracle produced no annotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Transient or unknown failure; worth retrying.
    #[error("structuring oracle unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time; worth retrying.
    #[error("structuring oracle timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The model hint was rejected; retrying cannot help.
    #[error("model hint rejected: {0}")]
    InvalidHint(String),
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OracleError::InvalidHint(_))
    }
}

/// A capability that returns `text` with structure annotated as markup.
///
/// Implementations must be safe to call concurrently from several chunks.
pub trait StructuringOracle: Send + Sync {
    fn annotate<'a>(
        &'a self,
        text: &'a str,
        model_hint: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, OracleError>>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "oracle"
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// How often and how patiently to call the oracle for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls, first attempt included. At least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        StructuringConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Whether another call is allowed after `attempts` calls that failed with `err`.
    pub fn should_retry(&self, attempts: u32, err: &OracleError) -> bool {
        err.is_retryable() && attempts < self.max_attempts.max(1)
    }
}

// ── LLM-backed oracle ────────────────────────────────────────────────────

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Oracle backed by an `edgequake-llm` chat provider.
pub struct LlmOracle {
    provider: Arc<dyn LLMProvider>,
    provider_name: Option<String>,
    model: String,
    system_prompt: String,
    options: CompletionOptions,
}

impl LlmOracle {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &StructuringConfig) -> Self {
        Self {
            provider,
            provider_name: config.provider_name.clone(),
            model: config.model_hint().to_string(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
        }
    }

    /// Resolve a provider from the config, then the environment.
    ///
    /// 1. **Pre-built provider** (`config.provider`), used as-is.
    /// 2. **Named provider + model** (`config.provider_name`).
    /// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
    /// 4. **OpenAI** when `OPENAI_API_KEY` is set.
    /// 5. **Full auto-detection** (`ProviderFactory::from_env`).
    pub fn from_config(config: &StructuringConfig) -> Result<Self, OracleError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    /// Provider for `hint`, when it names a different model on a named provider.
    fn provider_for(&self, hint: &str) -> Result<Arc<dyn LLMProvider>, OracleError> {
        match self.provider_name.as_deref() {
            Some(name) if !hint.is_empty() && hint != self.model => {
                ProviderFactory::create_llm_provider(name, hint)
                    .map_err(|e| OracleError::InvalidHint(format!("{hint}: {e}")))
            }
            _ => Ok(Arc::clone(&self.provider)),
        }
    }
}

impl StructuringOracle for LlmOracle {
    fn annotate<'a>(
        &'a self,
        text: &'a str,
        model_hint: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, OracleError>> {
        Box::pin(async move {
            let provider = self.provider_for(model_hint)?;
            let messages = vec![
                ChatMessage::system(self.system_prompt.as_str()),
                ChatMessage::user(analysis_user_message(text)),
            ];
            let response = tokio::time::timeout(timeout, provider.chat(&messages, Some(&self.options)))
                .await
                .map_err(|_| OracleError::Timeout(timeout))?
                .map_err(|e| classify_provider_error(&e.to_string(), model_hint))?;
            debug!(
                "Oracle call: {} input tokens, {} output tokens",
                response.prompt_tokens, response.completion_tokens
            );
            if response.content.trim().is_empty() {
                return Err(OracleError::Unavailable("empty response".into()));
            }
            Ok(response.content)
        })
    }

    fn name(&self) -> &str {
        "llm"
    }
}

fn build_options(config: &StructuringConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error message onto the oracle error taxonomy.
///
/// Providers report an unknown model in free text (`model_not_found`,
/// "The model `x` does not exist", HTTP 404 on the model route), so this is
/// a message match.
pub fn classify_provider_error(message: &str, model_hint: &str) -> OracleError {
    let lower = message.to_lowercase();
    let mentions_model = lower.contains("model");
    let rejected = [
        "not found",
        "not_found",
        "does not exist",
        "unknown model",
        "invalid model",
        "unsupported model",
        "not supported",
    ]
    .iter()
    .any(|p| lower.contains(p));
    if mentions_model && rejected {
        let hint = if model_hint.is_empty() { "<default>" } else { model_hint };
        OracleError::InvalidHint(format!("{hint}: {message}"))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        OracleError::Unavailable(format!("provider timeout: {message}"))
    } else {
        OracleError::Unavailable(message.to_string())
    }
}

fn resolve_provider(config: &StructuringConfig) -> Result<Arc<dyn LLMProvider>, OracleError> {
    let create = |name: &str, model: &str| {
        ProviderFactory::create_llm_provider(name, model)
            .map_err(|e| OracleError::Unavailable(format!("provider '{name}' not configured: {e}")))
    };

    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            classify_provider_error(&format!("provider '{name}' with model {model}: {e}"), model)
        });
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create(&prov, config.model.as_deref().unwrap_or(&model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create("openai", config.model.as_deref().unwrap_or(DEFAULT_MODEL));
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        OracleError::Unavailable(format!(
            "no LLM provider could be auto-detected from environment \
             (set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider): {e}"
        ))
    })?;
    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(3000),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(2000));
        assert_eq!(p.backoff(4), Duration::from_millis(3000));
        assert_eq!(p.backoff(40), Duration::from_millis(3000));
    }

    #[test]
    fn invalid_hint_is_never_retried() {
        let p = RetryPolicy::default();
        assert!(!p.should_retry(1, &OracleError::InvalidHint("x".into())));
        assert!(p.should_retry(1, &OracleError::Timeout(Duration::from_secs(1))));
        assert!(!p.should_retry(4, &OracleError::Unavailable("x".into())));
    }

    #[test]
    fn provider_errors_are_classified() {
        assert!(matches!(
            classify_provider_error("The model `gpt-9` does not exist", "gpt-9"),
            OracleError::InvalidHint(_)
        ));
        assert!(matches!(
            classify_provider_error("HTTP 503 Service Unavailable", ""),
            OracleError::Unavailable(_)
        ));
        assert!(matches!(
            classify_provider_error("rate limit exceeded", ""),
            OracleError::Unavailable(_)
        ));
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&StructuringConfig::default());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(16_384));
    }
}
