//! HTTP client module with retry policy and error handling.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, NonRetryableError, RetryPolicy, check_retryable,
    classify_error,
};
