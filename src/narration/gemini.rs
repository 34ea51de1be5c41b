//! Gemini HTTP client for speech synthesis
//!
//! Calls the `generateContent` endpoint with an audio response modality and
//! a prebuilt voice. Supports retry with exponential backoff and a
//! configurable timeout.

use super::{NarrationError, NarrationProvider};
use crate::config::NarrationConfig;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Base delay for exponential backoff in milliseconds
const BASE_RETRY_DELAY_MS: u64 = 100;

/// Request body for the generateContent endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

impl GenerateRequest {
    fn speech(prompt: &str, voice: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                },
            },
        }
    }
}

/// Response from generateContent; every level is optional
#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].inlineData.data`, if non-empty
    fn into_audio(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .inline_data?
            .data
            .filter(|data| !data.is_empty())
    }
}

/// Gemini text-to-speech client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
}

impl GeminiClient {
    /// Create a client from the narration settings and an API key
    pub fn with_config(config: &NarrationConfig, api_key: String) -> Result<Self, NarrationError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NarrationError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
            timeout,
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// Create a client reading the API key from the configured environment variable
    pub fn from_env(config: &NarrationConfig) -> Result<Self, NarrationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| NarrationError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_config(config, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Send a single generate request (internal helper)
    async fn send_generate_request(
        &self,
        request: &GenerateRequest,
    ) -> Result<Option<String>, NarrationError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NarrationError::Timeout(self.timeout.as_secs())
                } else {
                    NarrationError::ConnectionFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(NarrationError::ServerError { status, message });
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NarrationError::ParseError(e.to_string()))?;

        Ok(generate_response.into_audio())
    }

    /// Synthesize speech with retry logic
    ///
    /// Connection failures, timeouts and 5xx/429 responses are retried with
    /// exponential backoff (100ms, 200ms, ...).
    pub async fn generate_speech(
        &self,
        prompt: &str,
        voice: &str,
    ) -> Result<Option<String>, NarrationError> {
        let request = GenerateRequest::speech(prompt, voice);

        tracing::debug!(
            "Sending speech request with model: {} (voice: {})",
            self.model,
            voice
        );

        let mut last_error: Option<NarrationError> = None;

        for attempt in 0..self.max_attempts {
            match self.send_generate_request(&request).await {
                Ok(audio) => {
                    if attempt > 0 {
                        tracing::debug!("Request succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(audio);
                }
                Err(e) => {
                    let is_retryable = match &e {
                        NarrationError::ConnectionFailed(_) | NarrationError::Timeout(_) => true,
                        NarrationError::ServerError { status, .. } => {
                            *status >= 500 || *status == 429
                        }
                        _ => false,
                    };

                    if !is_retryable {
                        return Err(e);
                    }

                    if attempt == self.max_attempts - 1 {
                        tracing::error!("Speech request failed (attempt {}): {}", attempt + 1, e);
                        last_error = Some(e);
                        break;
                    }

                    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
                    tracing::warn!(
                        "Speech request failed (attempt {}), retrying in {}ms: {}",
                        attempt + 1,
                        delay_ms,
                        e
                    );
                    last_error = Some(e);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(NarrationError::RetriesExhausted {
            attempts: self.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

impl NarrationProvider for GeminiClient {
    fn synthesize<'a>(
        &'a self,
        prompt: &'a str,
        voice: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, NarrationError>> {
        Box::pin(self.generate_speech(prompt, voice))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::with_config(&NarrationConfig::default(), "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_client_with_config() {
        let config = NarrationConfig {
            base_url: "http://localhost:9000/v1beta/".to_string(),
            timeout_secs: 45,
            max_attempts: 0,
            ..Default::default()
        };
        let client = GeminiClient::with_config(&config, "k".to_string()).unwrap();

        assert_eq!(client.timeout.as_secs(), 45);
        assert_eq!(client.max_attempts, 1);
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"
        );
    }

    #[test]
    fn test_from_env_requires_key() {
        let config = NarrationConfig {
            api_key_env: "DARSHAN_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = GeminiClient::from_env(&config).unwrap_err();
        assert!(matches!(err, NarrationError::MissingApiKey(_)));
    }

    #[test]
    fn test_request_serialisation() {
        let request = GenerateRequest::speech("Recite this", "Kore");
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "Recite this");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn test_response_audio_extraction() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "audio/L16;rate=24000", "data": "AAAA"}}]}
            }]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_audio().as_deref(), Some("AAAA"));
    }

    #[test]
    fn test_response_without_audio() {
        for json in [
            r#"{}"#,
            r#"{"candidates": []}"#,
            r#"{"candidates": [{"finishReason": "SAFETY"}]}"#,
            r#"{"candidates": [{"content": {"parts": [{"text": "no audio"}]}}]}"#,
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"data": ""}}]}}]}"#,
        ] {
            let response: GenerateResponse = serde_json::from_str(json).unwrap();
            assert!(response.into_audio().is_none(), "expected no audio for {}", json);
        }
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(client().name(), "gemini");
    }
}
