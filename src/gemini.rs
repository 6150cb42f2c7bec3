//! Gemini API adapter.
//!
//! A single call-and-response seam: [`TextGenerator`] turns a prompt into text,
//! either in one piece or as an ordered sequence of chunks. [`GeminiClient`]
//! talks to the Gemini REST API; [`MockGenerator`] answers locally and is
//! selected with `CLICOD_USE_MOCK` for deterministic runs.

use crate::error::{ClicodError, Result};
use crate::http_client::{HttpClient, HttpResponse, ReqwestHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Set to any value to answer with [`MockGenerator`].
pub const MOCK_ENV: &str = "CLICOD_USE_MOCK";

const TEMPERATURE: f32 = 0.1;
const TOP_P: f32 = 0.8;
const TOP_K: u32 = 20;
const MAX_OUTPUT_TOKENS: u32 = 6000;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub api_key: String,
}

/// Receives streamed text chunks in arrival order.
pub type ChunkSink<'a> = dyn FnMut(&str) -> std::io::Result<()> + Send + 'a;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One-shot generation.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Streams chunks to `on_chunk` and returns the assembled text.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<String>;

    fn requires_api_key(&self) -> bool {
        true
    }
}

/// Picks the mock generator when `CLICOD_USE_MOCK` is set.
pub fn generator_from_env() -> Box<dyn TextGenerator> {
    if std::env::var(MOCK_ENV).is_ok() {
        info!("Using mock generator ({}=1)", MOCK_ENV);
        Box::new(MockGenerator::new())
    } else {
        Box::new(GeminiClient::new())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiError {
    code: Option<i64>,
    message: String,
    status: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn blocked_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Some(format!("prompt blocked ({})", reason));
        }
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| *reason != "STOP" && *reason != "MAX_TOKENS")
            .map(|reason| format!("generation stopped ({})", reason))
    }
}

impl ApiError {
    fn describe(&self) -> String {
        match (self.code, self.status.as_deref()) {
            (Some(code), Some(status)) => format!("{} {}: {}", code, status, self.message),
            (Some(code), None) => format!("{}: {}", code, self.message),
            _ => self.message.clone(),
        }
    }
}

/// Vendor message from an error body, which may be an object or a one-element array.
fn vendor_error_message(response: &HttpResponse) -> String {
    let error = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| {
            let mut container = match body {
                serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
                other => other,
            };
            container.get_mut("error").map(serde_json::Value::take)
        })
        .and_then(|error| serde_json::from_value::<ApiError>(error).ok())
        .filter(|error| !error.message.is_empty());

    match error {
        Some(error) => error.describe(),
        None => format!("HTTP {}: {}", response.status, response.body.trim()),
    }
}

// =============================================================================
// Gemini client
// =============================================================================

pub struct GeminiClient<H: HttpClient = ReqwestHttpClient> {
    http: H,
    base_url: String,
}

impl GeminiClient<ReqwestHttpClient> {
    pub fn new() -> Self {
        Self::with_http(ReqwestHttpClient::new())
    }
}

impl Default for GeminiClient<ReqwestHttpClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HttpClient> GeminiClient<H> {
    pub fn with_http(http: H) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, model)
        }
    }

    fn request_body(prompt: &str) -> serde_json::Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }
            ],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "topP": TOP_P,
                "topK": TOP_K,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        })
    }
}

#[async_trait]
impl<H: HttpClient> TextGenerator for GeminiClient<H> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = self.endpoint(&request.model, false);
        let headers = [
            ("x-goog-api-key", request.api_key.as_str()),
            ("content-type", "application/json"),
        ];
        info!("Calling Gemini model {}", request.model);

        let response = self
            .http
            .post_json(&url, &headers, &Self::request_body(&request.prompt))
            .await
            .map_err(|e| ClicodError::RemoteCall(format!("{:#}", e)))?;

        if !response.is_success() {
            warn!("Gemini returned HTTP {}", response.status);
            return Err(ClicodError::RemoteCall(vendor_error_message(&response)));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&response.body).map_err(|e| {
                ClicodError::RemoteCall(format!("unexpected response from Gemini: {}", e))
            })?;
        if let Some(error) = parsed.error.as_ref() {
            return Err(ClicodError::RemoteCall(error.describe()));
        }

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(match parsed.blocked_reason() {
                Some(reason) => ClicodError::RemoteCall(reason),
                None => ClicodError::EmptyResponse,
            });
        }
        debug!("Gemini returned {} characters", text.len());
        Ok(text)
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<String> {
        let url = self.endpoint(&request.model, true);
        let headers = [
            ("x-goog-api-key", request.api_key.as_str()),
            ("content-type", "application/json"),
        ];
        info!("Streaming from Gemini model {}", request.model);

        let mut full_text = String::new();
        let mut blocked = None;
        let mut handle_line = |line: &str| -> anyhow::Result<()> {
            let Some(data) = line.strip_prefix("data:") else {
                return Ok(());
            };
            let data = data.trim();
            if data.is_empty() || data == "[DONE]" {
                return Ok(());
            }

            let event: GenerateContentResponse = serde_json::from_str(data).map_err(|e| {
                ClicodError::RemoteCall(format!("unexpected stream event from Gemini: {}", e))
            })?;
            if let Some(error) = event.error.as_ref() {
                return Err(ClicodError::RemoteCall(error.describe()).into());
            }

            let text = event.text();
            if text.is_empty() {
                if blocked.is_none() {
                    blocked = event.blocked_reason();
                }
                return Ok(());
            }
            on_chunk(&text).map_err(ClicodError::Io)?;
            full_text.push_str(&text);
            Ok(())
        };

        let response = self
            .http
            .post_json_lines(
                &url,
                &headers,
                &Self::request_body(&request.prompt),
                &mut handle_line,
            )
            .await
            .map_err(|e| match e.downcast::<ClicodError>() {
                Ok(err) => err,
                Err(e) => ClicodError::RemoteCall(format!("{:#}", e)),
            })?;

        if !response.is_success() {
            warn!("Gemini stream returned HTTP {}", response.status);
            return Err(ClicodError::RemoteCall(vendor_error_message(&response)));
        }

        if full_text.trim().is_empty() {
            return Err(match blocked {
                Some(reason) => ClicodError::RemoteCall(reason),
                None => ClicodError::EmptyResponse,
            });
        }
        debug!("Gemini stream assembled {} characters", full_text.len());
        Ok(full_text)
    }
}

// =============================================================================
// Mock generator
// =============================================================================

/// Answers without network access. Structured prompts get a JSON document,
/// plain prompts a fenced script.
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn mock_reply(&self, prompt: &str) -> String {
        let request = prompt
            .lines()
            .find_map(|line| line.strip_prefix("User Request: "))
            .unwrap_or("hello world")
            .trim();
        let script = format!(
            "#!/usr/bin/env perl\nuse strict;\nuse warnings;\n\n# {}\nprint \"Hello from clicod!\\n\";\n",
            request
        );

        if prompt.contains("\"perl_code\"") {
            json!({
                "status": "success",
                "response_type": "perl_code_generation",
                "metadata": {
                    "model_used": "mock",
                    "complexity_level": "beginner",
                    "estimated_lines": 6
                },
                "perl_code": { "main_script": script, "additional_files": [] },
                "dependencies": {
                    "core_modules": ["strict", "warnings"],
                    "cpan_modules": [],
                    "system_requirements": ["perl 5.10+"]
                },
                "documentation": {
                    "description": format!("Mock script for: {}", request),
                    "usage_examples": ["perl clicod_generated.pl"]
                },
                "best_practices": ["use strict", "use warnings"]
            })
            .to_string()
        } else {
            format!("```perl\n{}```\n", script)
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        Ok(self.mock_reply(&request.prompt))
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<String> {
        let reply = self.mock_reply(&request.prompt);
        let chars: Vec<char> = reply.chars().collect();
        for piece in chars.chunks(64) {
            let piece: String = piece.iter().collect();
            on_chunk(&piece)?;
        }
        Ok(reply)
    }

    fn requires_api_key(&self) -> bool {
        false
    }
}
