//! Shared HTTP client with a blocking facade.
//!
//! Uses async reqwest on a shared tokio runtime internally, but presents
//! sync calls so the sequential export loops stay plain iterators.

use std::sync::LazyLock;
use std::time::Duration;

use crate::error::FetchError;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Overall per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_RETRIES: u32 = 5;
const BASE_DELAY: Duration = Duration::from_secs(2);

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Blocking HTTP GET returning the response body as text.
///
/// Non-success statuses are returned as `FetchError::Http` with the status
/// code; callers decide whether the whole session fails.
pub fn get_text(url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
    SHARED_RUNTIME.handle().block_on(async {
        let resp = SHARED_CLIENT
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(&e))?;
        resp.text().await.map_err(|e| FetchError::from_reqwest(&e))
    })
}

/// Blocking HTTP GET returning the raw response body, for binary payloads
/// such as gzipped archives.
pub fn get_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    SHARED_RUNTIME.handle().block_on(async {
        let resp = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(&e))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Ok(body.to_vec())
    })
}

/// Exponential backoff: 2s, 4s, 8s, ...
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(BASE_DELAY.as_secs() << attempt)
}

/// GET with bounded retry for transient failures (429, 5xx, network faults).
pub fn get_text_with_retry(url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
    with_retry(|| get_text(url, query))
}

/// Binary GET with the same bounded retry as [`get_text_with_retry`].
pub fn get_bytes_with_retry(url: &str) -> Result<Vec<u8>, FetchError> {
    with_retry(|| get_bytes(url))
}

fn with_retry<T>(mut op: impl FnMut() -> Result<T, FetchError>) -> Result<T, FetchError> {
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < MAX_RETRIES && e.is_retryable() => {
                let delay = backoff_duration(attempt);
                attempt += 1;
                log::warn!("request failed ({e}), retry {attempt}/{MAX_RETRIES} in {delay:?}");
                std::thread::sleep(delay);
            }
            Err(e) => {
                log::error!("request failed permanently: {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_exponential() {
        assert_eq!(backoff_duration(0), Duration::from_secs(2));
        assert_eq!(backoff_duration(1), Duration::from_secs(4));
        assert_eq!(backoff_duration(2), Duration::from_secs(8));
    }

    #[test]
    fn retry_stops_on_non_retryable_error() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(|| {
            calls += 1;
            Err(FetchError::Http {
                status: Some(404),
                message: "not found".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
