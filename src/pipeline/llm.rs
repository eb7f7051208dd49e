//! Extraction client: one model request per document.
//!
//! The request contains (in order):
//! 1. **System message**: extraction rules plus the JSON schema (or the
//!    user-supplied override)
//! 2. **User message**: a short instruction with the document attached as
//!    base64 data and its media type
//!
//! The answer text goes through [`crate::pipeline::decode`]. There is exactly
//! one attempt per call; retrying is the caller's decision.

use crate::config::ExtractionConfig;
use crate::error::{DocuTableError, ExtractionError};
use crate::pipeline::decode::decode_tables;
use crate::pipeline::encode::strip_transport_prefix;
use crate::prompts::{system_message, DEFAULT_SYSTEM_PROMPT, USER_INSTRUCTION};
use crate::table::ExtractedTable;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{error::Elapsed, timeout, Duration};
use tracing::{debug, info, warn};

/// Default Gemini model: reads PDFs natively and is cheap per page.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Structured-output mode requested from the provider.
const JSON_RESPONSE_FORMAT: &str = "json_object";

/// Anything that can turn an encoded document into tables.
///
/// [`ExtractionClient`] is the production implementation; session operations
/// are generic over this trait so they can run against a fake in tests.
pub trait TableExtractor: Send + Sync {
    /// Extract every table from `payload` (a data URI or bare base64).
    fn extract(
        &self,
        payload: &str,
        media_type: &str,
    ) -> impl Future<Output = Result<Vec<ExtractedTable>, ExtractionError>> + Send;
}

/// Sends documents to a vision-capable LLM provider.
pub struct ExtractionClient {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    api_timeout_secs: u64,
}

impl ExtractionClient {
    /// Build a client around an already-resolved provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        let instructions = config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        Self {
            provider,
            system_prompt: system_message(instructions),
            options: build_options(config),
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, DocuTableError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    /// Run one extraction request.
    pub async fn extract(
        &self,
        payload: &str,
        media_type: &str,
    ) -> Result<Vec<ExtractedTable>, ExtractionError> {
        let start = Instant::now();
        let data = strip_transport_prefix(payload);

        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(
                USER_INSTRUCTION,
                vec![ImageData::new(data.to_string(), media_type).with_detail("high")],
            ),
        ];

        let call = self.provider.chat(&messages, Some(&self.options));
        let outcome = timeout(Duration::from_secs(self.api_timeout_secs), call).await;
        let response = settle(outcome, self.api_timeout_secs)?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let tables = decode_tables(&response.content)?;
        info!(
            "Extracted {} table(s) from {} document in {}ms",
            tables.len(),
            media_type,
            start.elapsed().as_millis()
        );
        Ok(tables)
    }
}

impl TableExtractor for ExtractionClient {
    async fn extract(
        &self,
        payload: &str,
        media_type: &str,
    ) -> Result<Vec<ExtractedTable>, ExtractionError> {
        ExtractionClient::extract(self, payload, media_type).await
    }
}

/// Map a timed provider call onto the extraction error taxonomy.
fn settle<T, E: std::fmt::Display>(
    outcome: Result<Result<T, E>, Elapsed>,
    timeout_secs: u64,
) -> Result<T, ExtractionError> {
    match outcome {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => {
            warn!("Extraction request failed: {}", e);
            Err(ExtractionError::Service {
                message: e.to_string(),
            })
        }
        Err(_) => {
            warn!("Extraction request timed out after {}s", timeout_secs);
            Err(ExtractionError::Timeout { secs: timeout_secs })
        }
    }
}

/// Build `CompletionOptions` from the extraction config. The answer is
/// requested as a JSON object (Gemini: `response_mime_type: application/json`).
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        response_format: Some(JSON_RESPONSE_FORMAT.to_string()),
        ..Default::default()
    }
}

/// Vision-capable default model for a named provider.
fn default_model(provider_name: &str) -> &'static str {
    match provider_name.to_ascii_lowercase().as_str() {
        "openai" | "azure" => "gpt-4.1-mini",
        "anthropic" => "claude-sonnet-4-20250514",
        "ollama" => "llama3.2-vision",
        _ => DEFAULT_GEMINI_MODEL,
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocuTableError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocuTableError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`). The factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`DOCUTABLE_PROVIDER` + `DOCUTABLE_MODEL`), both
///    non-empty.
/// 4. **Gemini** when `GEMINI_API_KEY` is set. Gemini takes PDFs as inline
///    attachments, which most image-only chat APIs do not.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, DocuTableError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model(name));
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("DOCUTABLE_PROVIDER"),
        std::env::var("DOCUTABLE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocuTableError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
