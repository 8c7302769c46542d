//! Exponential backoff with jitter.
//!
//! Used by the admission loop to pause between consecutive accept failures
//! (e.g. file descriptor exhaustion) instead of spinning.

use std::time::Duration;

use rand::Rng;

/// Base delay after the first accept failure.
pub const ACCEPT_BACKOFF_BASE_MS: u64 = 5;

/// Upper bound on the accept failure delay.
pub const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay before retrying `accept` after `consecutive_failures` errors in a row.
pub fn accept_backoff(consecutive_failures: u32) -> Duration {
    calculate_backoff(
        consecutive_failures,
        ACCEPT_BACKOFF_BASE_MS,
        ACCEPT_BACKOFF_MAX_MS,
    )
}
