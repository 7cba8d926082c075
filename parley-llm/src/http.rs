//! Shared HTTP plumbing for the provider adapters.

use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;

/// Longest error body kept in an `HttpStatus` error.
const MAX_ERROR_BODY: usize = 512;

/// Headroom past the last per-call timeout before a dispatch is abandoned.
const DISPATCH_SLACK: Duration = Duration::from_secs(1);

/// Deadline covering every attempt of [`send_json`], each bounded by `timeout`.
pub(crate) fn dispatch_budget(timeout: Duration, max_retries: u32) -> Duration {
    timeout
        .saturating_mul(max_retries.saturating_add(1))
        .saturating_add(DISPATCH_SLACK)
}

/// Send a request and decode its JSON body, retrying transport errors and
/// non-success responses up to `max_retries` extra times.
///
/// `build` is called once per attempt. A 2xx response with an undecodable
/// body is returned immediately as `ParseError`.
pub(crate) async fn send_json<F>(
    provider: &str,
    max_retries: u32,
    timeout: Duration,
    build: F,
) -> Result<Value, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let mut last_error = LlmError::Unavailable(format!("{provider}: no attempt made"));

    for attempt in 0..=max_retries {
        if attempt > 0 {
            debug!(provider, "Retrying chat backend (attempt {}/{})", attempt + 1, max_retries + 1);
        }

        let start = Instant::now();
        let result = build().timeout(timeout).send().await;
        let latency_ms = start.elapsed().as_millis();

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(provider, latency_ms, "Backend responded");
                return resp
                    .json::<Value>()
                    .await
                    .map_err(|e| LlmError::ParseError(e.to_string()));
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let mut body = resp.text().await.unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                    body.truncate(cut);
                }
                warn!(provider, status, latency_ms, "Backend returned error status");
                last_error = LlmError::HttpStatus { status, body };
            }
            Err(e) if e.is_timeout() => {
                warn!(provider, timeout_ms, "Backend request timed out");
                last_error = LlmError::Timeout(timeout_ms);
            }
            Err(e) => {
                let err = LlmError::from(e);
                warn!(provider, error = %err, "Backend request failed");
                last_error = err;
            }
        }
    }

    if max_retries == 0 {
        Err(last_error)
    } else {
        Err(LlmError::RetriesExhausted {
            attempts: max_retries + 1,
            last_error: last_error.to_string(),
        })
    }
}

/// Text at a JSON pointer, or a `ParseError` naming the missing path.
pub(crate) fn text_at(value: &Value, pointer: &str) -> Result<String, LlmError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::ParseError(format!("missing string at {pointer}")))
}

/// Build a reqwest client with a per-request timeout default.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_at_reads_nested_strings() {
        let value = json!({ "choices": [{ "message": { "content": "hi" } }] });
        assert_eq!(text_at(&value, "/choices/0/message/content").expect("present"), "hi");
        assert!(matches!(text_at(&value, "/choices/1/message/content"), Err(LlmError::ParseError(_))));
    }

    #[test]
    fn budget_covers_every_attempt() {
        let per_call = Duration::from_secs(60);
        assert_eq!(dispatch_budget(per_call, 0), Duration::from_secs(61));
        assert_eq!(dispatch_budget(per_call, 2), Duration::from_secs(181));
        assert_eq!(dispatch_budget(Duration::MAX, 3), Duration::MAX);
    }
}
