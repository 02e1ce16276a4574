//! Reopen audit trail for one visit/case pair.

use serde::Serialize;

use crate::api::{ApiClient, ApiError};
use crate::models::ReopenEvent;

/// Events sorted most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReopenHistory {
    events: Vec<ReopenEvent>,
}

impl ReopenHistory {
    pub fn from_events(mut events: Vec<ReopenEvent>) -> Self {
        events.sort_by(|a, b| b.reopened_at.cmp(&a.reopened_at));
        Self { events }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&ReopenEvent> {
        self.events.first()
    }

    pub fn latest_reason(&self) -> Option<&str> {
        self.latest().map(|e| e.reason.as_str())
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The full-history affordance only appears once there is more than the
    /// single reopen already shown in the banner.
    pub fn shows_history_badge(&self) -> bool {
        self.events.len() >= 2
    }

    /// Descending list numbered N (most recent) down to 1 (oldest).
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &ReopenEvent)> + '_ {
        let total = self.events.len();
        self.events.iter().enumerate().map(move |(i, e)| (total - i, e))
    }

    pub fn events(&self) -> &[ReopenEvent] {
        &self.events
    }
}

/// Fetch and summarize the history.
///
/// Authentication failures propagate so the caller can force a new login.
/// Anything else degrades to an empty history and never blocks the view.
pub async fn load_reopen_history(
    client: &ApiClient,
    visit_id: i64,
    case_id: &str,
) -> Result<ReopenHistory, ApiError> {
    degrade(visit_id, case_id, client.fetch_reopen_history(visit_id, case_id).await)
}

fn degrade(
    visit_id: i64,
    case_id: &str,
    result: Result<Vec<ReopenEvent>, ApiError>,
) -> Result<ReopenHistory, ApiError> {
    match result {
        Ok(events) => Ok(ReopenHistory::from_events(events)),
        Err(e) if e.is_auth_failure() => Err(e),
        Err(e) => {
            tracing::warn!(visit_id, case_id, error = %e, "Reopen history unavailable");
            Ok(ReopenHistory::empty())
        }
    }
}
