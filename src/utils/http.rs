// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::CrawlConfig;
use crate::secrets::Credential;

/// Longest response excerpt kept in an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Bearer-style authorization headers for the GitHub API.
pub fn auth_headers(credential: &Credential) -> Result<HeaderMap> {
    let mut value = HeaderValue::from_str(&format!("token {}", credential.expose()))
        .map_err(|_| AppError::secret("credential contains characters not allowed in a header"))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// GET `url` and return its body, or `None` on 404.
///
/// Any other non-success status is an [`AppError::Api`].
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    headers: &HeaderMap,
) -> Result<Option<String>> {
    let response = client.get(url).headers(headers.clone()).send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(AppError::api(status.as_u16(), url, error_message(&body)));
    }
    Ok(Some(body))
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    if message.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &message[..end])
    } else {
        message
    }
}
