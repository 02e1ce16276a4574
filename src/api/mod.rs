//! Operations backend client.
//!
//! `ApiClient` owns the authorization policy; `visits`, `cases` and `users`
//! add one method per backend route. `VisitSource` is the seam the poller depends on.

pub mod cases;
pub mod client;
pub mod error;
pub mod users;
pub mod visits;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;

pub use cases::{CaseAction, CaseActions};
pub use client::ApiClient;
pub use error::ApiError;

use crate::models::VisitSnapshot;

/// Anything that can produce the current snapshot of a visit.
#[async_trait]
pub trait VisitSource: Send + Sync + 'static {
    /// `Ok(None)` when the backend does not know the visit (404).
    async fn fetch_visit(&self, visit_id: i64) -> Result<Option<VisitSnapshot>, ApiError>;
}

#[async_trait]
impl VisitSource for ApiClient {
    async fn fetch_visit(&self, visit_id: i64) -> Result<Option<VisitSnapshot>, ApiError> {
        ApiClient::fetch_visit(self, visit_id).await
    }
}
