//! Microsoft Graph drive access: typed errors, the [`DriveStore`] seam used
//! by the pipeline, the lazy tree walker and upload routing.

pub mod client;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod store;
#[cfg(test)]
pub mod stub;
pub mod types;
pub mod upload;
pub mod walker;

pub use client::{DriveClient, GraphClient};
pub use error::GraphError;
pub use store::DriveStore;
pub use types::RemoteItem;

use crate::retry::RetryAction;

/// Retry classifier for idempotent Graph reads.
pub(crate) fn classify(e: &GraphError) -> RetryAction {
    if !e.is_retryable() {
        return RetryAction::Abort;
    }
    match e.retry_after() {
        Some(delay) => RetryAction::RetryAfter(delay),
        None => RetryAction::Retry,
    }
}
