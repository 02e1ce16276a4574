//! Case routes and the close/reopen actions.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, OneOrMany};
use super::error::ApiError;
use crate::models::case::{CaseRecord, PermissionRecord};
use crate::models::{CaseSnapshot, CaseStatus, StatePermission};

#[derive(Serialize)]
struct StateChangeRequest<'a> {
    motivo: &'a str,
}

#[derive(Deserialize)]
struct StateChangeResponse {
    #[serde(default)]
    caso: Option<CaseRecord>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    pub async fn fetch_case(&self, case_id: &str) -> Result<CaseSnapshot, ApiError> {
        let url = self.endpoint(&["casos", "getCasoById", case_id]);
        let payload: OneOrMany<CaseRecord> = self.get_json(url).await?;
        let record = payload
            .into_first()
            .ok_or_else(|| ApiError::ResponseParsing(format!("empty response for case {case_id}")))?;
        Ok(CaseSnapshot::try_from(record)?)
    }

    pub async fn list_cases_by_division(&self, division: i64) -> Result<Vec<CaseSnapshot>, ApiError> {
        let url = self.endpoint(&["casos", "getCasosByDivision", &division.to_string()]);
        let rows: Vec<CaseRecord> = self.get_json(url).await?;
        let mut cases = Vec::with_capacity(rows.len());
        for row in rows {
            match CaseSnapshot::try_from(row) {
                Ok(case) => cases.push(case),
                Err(e) => tracing::warn!(division, error = %e, "Skipping malformed case row"),
            }
        }
        Ok(cases)
    }

    /// Whether the signed-in user may close or reopen cases.
    pub async fn fetch_state_permission(&self) -> Result<StatePermission, ApiError> {
        let record: PermissionRecord = self.get_json(self.endpoint(&["casos", "permisoEstado"])).await?;
        Ok(record.into())
    }

    pub async fn close_case(&self, case_id: &str, reason: &str) -> Result<CaseSnapshot, ApiError> {
        self.change_case_state(case_id, CaseStatus::Closed, reason, "Error al cerrar el caso")
            .await
    }

    /// Return a finished or closed case to "En Proceso".
    pub async fn reopen_case(&self, case_id: &str, reason: &str) -> Result<CaseSnapshot, ApiError> {
        self.change_case_state(case_id, CaseStatus::InProcess, reason, "Error al actualizar el caso")
            .await
    }

    async fn change_case_state(
        &self,
        case_id: &str,
        target: CaseStatus,
        reason: &str,
        fallback: &str,
    ) -> Result<CaseSnapshot, ApiError> {
        let code = target.code().to_string();
        let url = self.endpoint(&["casos", "cierreReaperturaCaso", case_id, &code]);
        let body = StateChangeRequest { motivo: reason };

        let parsed: StateChangeResponse = self
            .send_action(Method::PUT, url, Some(&body), fallback)
            .await?;
        match parsed.caso {
            Some(record) => {
                let case = CaseSnapshot::try_from(record)?;
                tracing::info!(case_id, status = %case.status, "Case state changed");
                Ok(case)
            }
            None => Err(ApiError::Domain(
                parsed
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Action gating
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseAction {
    Close,
    Reopen,
}

/// Which state-change actions to offer for a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseActions {
    pub can_close: bool,
    pub can_reopen: bool,
}

impl CaseActions {
    pub fn for_case(status: CaseStatus, permission: StatePermission) -> Self {
        if !permission.can_modify {
            return Self {
                can_close: false,
                can_reopen: false,
            };
        }
        Self {
            can_close: status != CaseStatus::Closed,
            can_reopen: matches!(status, CaseStatus::Finished | CaseStatus::Closed),
        }
    }

    pub fn allows(&self, action: CaseAction) -> bool {
        match action {
            CaseAction::Close => self.can_close,
            CaseAction::Reopen => self.can_reopen,
        }
    }

    pub fn require(&self, action: CaseAction) -> Result<(), ApiError> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(ApiError::NotAuthorized)
        }
    }
}
