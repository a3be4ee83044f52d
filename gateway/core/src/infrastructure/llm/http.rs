// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared transport plumbing for the HTTP adapters
//
// Every reqwest failure and non-success status is funnelled through the two
// classifiers below so each one lands in exactly one LLMError kind.

use crate::domain::llm::LLMError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Upper bound on how much of an error body is echoed back to callers
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Build the pooled client an adapter keeps for its lifetime.
///
/// `timeout` bounds each request from connect to the end of the body.
pub fn build_client(timeout: Duration, accept_invalid_certs: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Classify a transport-level failure (no usable HTTP status)
pub fn classify_transport(backend: &str, err: reqwest::Error) -> LLMError {
    if err.is_timeout() {
        LLMError::timeout(backend, err.to_string())
    } else if err.is_decode() {
        LLMError::unavailable(backend, format!("Failed to parse response: {}", err))
    } else if err.is_connect() {
        LLMError::unavailable(backend, format!("Connection failed: {}", err))
    } else {
        LLMError::unavailable(backend, err.to_string())
    }
}

/// Classify a non-success status. 408/504 are deadline failures, 429 and
/// other 5xx mean the backend cannot serve right now, every remaining 4xx is
/// a rejection of this request or its credentials.
pub fn classify_status(backend: &str, status: StatusCode, body: &str) -> LLMError {
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let reason = format!("HTTP {}: {}", status, body);

    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        LLMError::timeout(backend, reason)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        LLMError::unavailable(backend, reason)
    } else {
        LLMError::rejected(backend, reason)
    }
}

/// Decode a successful JSON body or classify the failure
pub async fn read_json<T: DeserializeOwned>(backend: &str, response: Response) -> Result<T, LLMError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(classify_status(backend, status, &error_text));
    }

    response
        .json()
        .await
        .map_err(|e| classify_transport(backend, e))
}

/// Map a probe response (e.g. `GET /models`) onto health
pub async fn expect_success(backend: &str, response: Response) -> Result<(), LLMError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let error_text = response.text().await.unwrap_or_default();
        Err(classify_status(backend, status, &error_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ErrorKind;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:1234/v1/", "/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(join_url("http://host", "models"), "http://host/models");
    }

    #[test]
    fn test_status_classification() {
        let cases = [
            (StatusCode::BAD_REQUEST, ErrorKind::UpstreamRejected),
            (StatusCode::UNAUTHORIZED, ErrorKind::UpstreamRejected),
            (StatusCode::FORBIDDEN, ErrorKind::UpstreamRejected),
            (StatusCode::NOT_FOUND, ErrorKind::UpstreamRejected),
            (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::UpstreamRejected),
            (StatusCode::TOO_MANY_REQUESTS, ErrorKind::UpstreamUnavailable),
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::UpstreamUnavailable),
            (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::UpstreamUnavailable),
            (StatusCode::REQUEST_TIMEOUT, ErrorKind::UpstreamTimeout),
            (StatusCode::GATEWAY_TIMEOUT, ErrorKind::UpstreamTimeout),
        ];

        for (status, kind) in cases {
            assert_eq!(classify_status("openai", status, "").kind(), kind, "{}", status);
        }
    }

    #[test]
    fn test_error_body_is_truncated() {
        let body = "x".repeat(10_000);
        let err = classify_status("openai", StatusCode::BAD_REQUEST, &body);
        assert!(err.to_string().len() < 1_000);
    }
}
