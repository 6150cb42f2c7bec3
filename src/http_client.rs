//! HTTP client abstraction for the Gemini REST API.
//!
//! This module provides a trait-based abstraction over HTTP clients, enabling
//! dependency injection and easy mocking in tests.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Status and body of a finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Receives one line of a streamed response body.
pub type LineSink<'a> = dyn FnMut(&str) -> Result<()> + Send + 'a;

/// Trait for HTTP communication with external APIs.
///
/// This abstraction allows injecting mock HTTP clients for testing without
/// making real network requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with JSON body and returns the full response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be read.
    /// A non-2xx status is not an error at this level.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;

    /// Sends a POST request and hands the body to `on_line` line by line as it arrives.
    ///
    /// On a non-2xx status the callback is never invoked and the error body is
    /// returned in [`HttpResponse::body`]. On success the returned body is empty.
    async fn post_json_lines(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
        on_line: &mut LineSink<'_>,
    ) -> Result<HttpResponse>;
}

/// HTTP client implementation using reqwest.
///
/// This is the default production implementation that makes real HTTP requests.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Creates a new HTTP client with default configuration.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn request(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        request.json(body)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let response = self.request(url, headers, body).send().await?;
        let status = response.status().as_u16();
        debug!("POST {} -> {}", url, status);
        Ok(HttpResponse {
            status,
            body: response.text().await?,
        })
    }

    async fn post_json_lines(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
        on_line: &mut LineSink<'_>,
    ) -> Result<HttpResponse> {
        let mut response = self.request(url, headers, body).send().await?;
        let status = response.status().as_u16();
        debug!("POST (streaming) {} -> {}", url, status);

        if !response.status().is_success() {
            return Ok(HttpResponse {
                status,
                body: response.text().await?,
            });
        }

        let mut buffer = LineBuffer::default();
        while let Some(chunk) = response.chunk().await? {
            for line in buffer.push(&chunk) {
                on_line(&line)?;
            }
        }
        if let Some(line) = buffer.finish() {
            on_line(&line)?;
        }

        Ok(HttpResponse {
            status,
            body: String::new(),
        })
    }
}

/// Splits a byte stream into lines, holding back partial lines and split UTF-8.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_holds_partial_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.push(b": 1}\r\n\r\ndata: x"), vec!["data: {\"a\": 1}", ""]);
        assert_eq!(buffer.finish(), Some("data: x".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_characters_intact() {
        let mut buffer = LineBuffer::default();
        let text = "café\n".as_bytes();
        assert!(buffer.push(&text[..4]).is_empty());
        assert_eq!(buffer.push(&text[4..]), vec!["café"]);
    }

    #[test]
    fn test_http_response_success_range() {
        let ok = HttpResponse { status: 200, body: String::new() };
        let bad = HttpResponse { status: 403, body: String::new() };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
