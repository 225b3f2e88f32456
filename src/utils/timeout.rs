//! Timeout defaults and helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::{RconError, Result};

/// Default timeout for connecting and authenticating
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for a command's full response
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keepalive commands
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default wait between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Run `future`, failing with [`RconError::Timeout`] if it takes longer than `duration`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(RconError::Timeout),
    }
}
