//! VLM interaction: provider resolution and the per-page vision call.
//!
//! Intentionally thin. Prompt text lives in [`crate::prompts`], reply
//! parsing in [`crate::pipeline::extract`] and schema handling in
//! [`crate::ingest`].
//!
//! ## No retries
//!
//! A failed or slow call is not repeated. The page simply carries zero
//! detected components plus the reason, and the client may resubmit. The
//! only cancellation mechanism is the configured timeout.

use crate::config::WeldMapConfig;
use crate::error::{AnalysisError, WeldMapError};
use crate::pipeline::encode::vision_image;
use crate::prompts::{analysis_prompt, DEFAULT_SYSTEM_PROMPT, PING_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, WeldMapError> {
    let created = ProviderFactory::create_llm_provider(provider_name, model);
    created.map_err(|e| WeldMapError::ProviderNotConfigured {
        provider: provider_name.to_string(),
        hint: format!("{e}"),
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI key** present → OpenAI with the configured or default model.
/// 5. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &WeldMapConfig) -> Result<Arc<dyn LLMProvider>, WeldMapError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let detected = ProviderFactory::from_env();
    let (llm_provider, _embedding) = detected.map_err(|e| WeldMapError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No vision provider could be auto-detected from environment.\n\
            Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
            Error: {e}"
        ),
    })?;

    Ok(llm_provider)
}

/// Completion options shared by every call.
fn build_options(config: &WeldMapConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// The raw text reply for one page, with token accounting.
#[derive(Debug, Clone)]
pub struct VisionReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Ask the model to analyse one page (1-based `page_num`).
///
/// ## Message Layout
///
/// 1. **System message**: the drawing-analysis role (or the configured override)
/// 2. **User message**: [`analysis_prompt`] stating the pixel size, plus the PNG
pub async fn analyze_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    png: &[u8],
    width: u32,
    height: u32,
    config: &WeldMapConfig,
) -> Result<VisionReply, AnalysisError> {
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(&analysis_prompt(width, height), vec![vision_image(png)]),
    ];
    let options = build_options(config);

    let secs = config.api_timeout_secs;
    let call = provider.chat(&messages, Some(&options));
    match timeout(Duration::from_secs(secs), call).await {
        Err(_) => {
            warn!("Page {}: vision call timed out after {}s", page_num, secs);
            Err(AnalysisError::Timeout {
                page: page_num,
                secs,
            })
        }
        Ok(Err(e)) => {
            warn!("Page {}: vision call failed: {}", page_num, e);
            Err(AnalysisError::LlmFailed {
                page: page_num,
                detail: e.to_string(),
            })
        }
        Ok(Ok(response)) => {
            let duration = start.elapsed();
            debug!(
                "Page {}: {} input tokens, {} output tokens, {:?}",
                page_num, response.prompt_tokens, response.completion_tokens, duration
            );
            Ok(VisionReply {
                content: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
                duration_ms: duration.as_millis() as u64,
            })
        }
    }
}

/// Minimal round-trip to check provider connectivity.
pub async fn ping(
    provider: &Arc<dyn LLMProvider>,
    config: &WeldMapConfig,
) -> Result<String, AnalysisError> {
    let messages = vec![ChatMessage::user_with_images(PING_PROMPT, Vec::new())];
    let options = CompletionOptions {
        temperature: Some(0.0),
        max_tokens: Some(16),
        ..Default::default()
    };
    let secs = config.api_timeout_secs;
    let call = provider.chat(&messages, Some(&options));
    match timeout(Duration::from_secs(secs), call).await {
        Err(_) => Err(AnalysisError::Timeout { page: 0, secs }),
        Ok(Err(e)) => Err(AnalysisError::LlmFailed {
            page: 0,
            detail: e.to_string(),
        }),
        Ok(Ok(response)) => Ok(response.content),
    }
}
