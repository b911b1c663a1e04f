//! Shared HTTP client, SSE parsing, and auth headers.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::ThreadError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Map an HTTP error status into the retry taxonomy.
pub fn status_to_error(status: u16, body: &str) -> ThreadError {
    match status {
        429 => ThreadError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ThreadError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Send a JSON request, returning the response only for 2xx statuses.
pub async fn post_json(
    url: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
) -> Result<reqwest::Response, ThreadError> {
    let resp = shared_client()
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if !(200..300).contains(&status) {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }
    Ok(resp)
}

/// Extract the payload of an SSE `data:` line. `[DONE]` yields `None`.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?;
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Accumulates raw SSE bytes and hands back complete `data:` payloads.
/// Lines are decoded only once complete, so multi-byte characters split
/// across chunks survive.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete data line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = parse_sse_data(line) {
                payloads.push(data.to_string());
            }
        }
        payloads
    }
}
