//! Vision OCR: one page image in, cleaned Markdown out.
//!
//! The request is a system message with [`TRANSCRIBE_SYSTEM_PROMPT`] followed
//! by a user turn that carries only the image. Prompt wording lives in
//! [`crate::prompts`]; this module owns the call timeout and cleanup.
//!
//! Each page gets exactly one call bounded by `ocr_timeout_secs`. A failure
//! is reported once and the page is dropped by the caller.

use crate::config::IngestConfig;
use crate::error::PageError;
use crate::pipeline::postprocess::clean_ocr_page;
use crate::prompts::TRANSCRIBE_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Transcribe one page image.
///
/// Returns the cleaned page text, possibly empty when the page is blank.
/// A provider error or timeout comes back as a [`PageError`] so the caller
/// can drop the page without failing the scan.
pub async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: ImageData,
    config: &IngestConfig,
) -> Result<String, PageError> {
    let start = Instant::now();
    let messages = vec![
        ChatMessage::system(TRANSCRIBE_SYSTEM_PROMPT),
        ChatMessage::user_with_images("", vec![image]),
    ];
    let options = ocr_options();
    let per_call = Duration::from_secs(config.ocr_timeout_secs);

    match timeout(per_call, provider.chat(&messages, Some(&options))).await {
        Ok(Ok(response)) => {
            debug!(
                "Page {}: {} input tokens, {} output tokens, {:?}",
                page_num,
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );
            Ok(clean_ocr_page(&response.content))
        }
        Ok(Err(e)) => {
            warn!("Page {}: vision call failed: {}", page_num, e);
            Err(PageError::OcrFailed {
                page: page_num,
                detail: e.to_string(),
            })
        }
        Err(_) => {
            warn!(
                "Page {}: vision call timed out after {}s",
                page_num, config.ocr_timeout_secs
            );
            Err(PageError::Timeout {
                page: page_num,
                secs: config.ocr_timeout_secs,
            })
        }
    }
}

/// Low temperature and a full-page token budget.
fn ocr_options() -> CompletionOptions {
    CompletionOptions {
        temperature: Some(0.1),
        max_tokens: Some(4096),
        ..Default::default()
    }
}
