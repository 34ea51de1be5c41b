//! Speech synthesis providers
//!
//! A provider turns a prompt and a voice name into a base64 PCM payload.
//! `Ok(None)` means the service answered without audio; callers treat that
//! and any error the same way: nothing to narrate.

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;
pub use prompts::{NarrationPhase, RequestKey};

use futures_util::future::BoxFuture;

/// Error types for narration requests
#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),
}

/// Source of synthesized speech
pub trait NarrationProvider: Send + Sync {
    /// Synthesize `prompt` with the named prebuilt voice
    fn synthesize<'a>(
        &'a self,
        prompt: &'a str,
        voice: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, NarrationError>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Provider that never returns audio
///
/// Used when narration is disabled or no API key is configured, so autoplay
/// still walks the content (each phase completes immediately).
#[derive(Debug, Default, Clone)]
pub struct SilentProvider;

impl NarrationProvider for SilentProvider {
    fn synthesize<'a>(
        &'a self,
        _prompt: &'a str,
        _voice: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, NarrationError>> {
        Box::pin(async { Ok(None) })
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}
