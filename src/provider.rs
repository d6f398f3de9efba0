//! # Provider Seams
//!
//! Traits at the boundary between the engine and infrastructure adapters.
//! Adapters implement [`RecordFetcher`] for each upstream provider; the
//! correlator implements [`RecordSink`] for both record types.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::error::FetchError;
use crate::models::ProviderRecord;

/// Fetch a page of records from one upstream provider
#[async_trait]
pub trait RecordFetcher<R>: Send + Sync + Debug {
    /// Stable provider name used for breakers, logs and fallback selection
    fn provider_name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<R>, FetchError>;
}

/// Shared fetcher handle
pub type SharedFetcher<R> = Arc<dyn RecordFetcher<R>>;

/// Consumer of successfully fetched records
pub trait RecordSink<R>: Send + Sync {
    fn accept(&self, record: R);

    /// Apply every record in order, returning how many were applied
    fn accept_batch(&self, records: Vec<R>) -> usize {
        let count = records.len();
        for record in records {
            self.accept(record);
        }
        count
    }
}

/// One fetch bounded by `timeout`
///
/// Expiry settles as [`FetchError::Timeout`] and a panicking adapter as
/// [`FetchError::Internal`], so a misbehaving provider can never hold its
/// caller past the deadline.
pub async fn guarded_fetch<R>(
    fetcher: &dyn RecordFetcher<R>,
    timeout: Duration,
) -> Result<Vec<R>, FetchError> {
    let provider = fetcher.provider_name();
    let attempt = AssertUnwindSafe(fetcher.fetch()).catch_unwind();

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => {
            let reason = panic_reason(panic.as_ref());
            error!(provider = %provider, reason = %reason, "💥 Fetcher panicked");
            Err(FetchError::Internal {
                provider: provider.to_string(),
                reason,
            })
        }
        Err(_) => Err(FetchError::Timeout {
            provider: provider.to_string(),
            elapsed: timeout,
        }),
    }
}

pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked without a message".to_string()
    }
}

/// Validate a fetched page, failing the whole page as a malformed payload
pub fn validate_batch<R: ProviderRecord>(provider: &str, records: Vec<R>) -> Result<Vec<R>, FetchError> {
    for (index, record) in records.iter().enumerate() {
        if let Err(e) = record.validate() {
            return Err(FetchError::MalformedPayload {
                provider: provider.to_string(),
                reason: format!("record {index}: {e}"),
            });
        }
    }
    Ok(records)
}
