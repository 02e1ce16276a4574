//! Visit routes.

use reqwest::Method;
use serde::Deserialize;

use super::client::{ApiClient, OneOrMany};
use super::error::ApiError;
use crate::models::reopen::ReopenRecord;
use crate::models::visit::{CompletionRecord, CreateVisitRecord, VisitRecord};
use crate::models::{NewVisit, ReopenEvent, VisitCompletionRecord, VisitRow, VisitSnapshot};

const CREATE_FALLBACK: &str = "Error al crear visita de emergencia";

#[derive(Deserialize)]
struct CreateVisitResponse {
    #[serde(default, rename = "nuevaVisita")]
    nueva_visita: Option<VisitRecord>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    /// Current snapshot of one emergency visit. `None` on 404.
    pub async fn fetch_visit(&self, visit_id: i64) -> Result<Option<VisitSnapshot>, ApiError> {
        let url = self.endpoint(&["visitas", "getVisitasEmergenciaById", &visit_id.to_string()]);
        let Some(payload) = self.get_optional::<OneOrMany<VisitRecord>>(url).await? else {
            return Ok(None);
        };
        match payload.into_first() {
            Some(record) => Ok(Some(VisitSnapshot::try_from(record)?)),
            None => Ok(None),
        }
    }

    /// The visit currently attached to a case, if one was assigned.
    pub async fn fetch_visit_for_case(&self, case_id: &str) -> Result<Option<VisitSnapshot>, ApiError> {
        let url = self.endpoint(&["visitas", "getVisitasEmergenciaByCaso", case_id]);
        let Some(payload) = self.get_optional::<Option<OneOrMany<VisitRecord>>>(url).await? else {
            return Ok(None);
        };
        match payload.and_then(OneOrMany::into_first) {
            Some(record) => Ok(Some(VisitSnapshot::try_from(record)?)),
            None => Ok(None),
        }
    }

    /// Completion record written when the supervisor finished on site.
    /// `None` until it exists.
    pub async fn fetch_completion(&self, visit_id: i64) -> Result<Option<VisitCompletionRecord>, ApiError> {
        let url = self.endpoint(&["visitas", "getVisitaByVisitaEmergencia", &visit_id.to_string()]);
        let payload = self
            .get_optional::<Option<OneOrMany<CompletionRecord>>>(url)
            .await?;
        Ok(payload
            .flatten()
            .and_then(OneOrMany::into_first)
            .map(VisitCompletionRecord::from))
    }

    /// Reopen audit trail for a visit/case pair, in backend order.
    /// Rows without a reopen date are skipped.
    pub async fn fetch_reopen_history(
        &self,
        visit_id: i64,
        case_id: &str,
    ) -> Result<Vec<ReopenEvent>, ApiError> {
        let mut url = self.endpoint(&["visitas", "getVisitasReabiertas"]);
        url.query_pairs_mut()
            .append_pair("id_visita", &visit_id.to_string())
            .append_pair("id_caso", case_id);
        let rows: Vec<ReopenRecord> = self.get_optional(url).await?.unwrap_or_default();

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_event(visit_id, case_id) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(visit_id, case_id, error = %e, "Skipping reopen row"),
            }
        }
        Ok(events)
    }

    /// Assign a new emergency visit. The backend answers `{ nuevaVisita }`
    /// on success and `{ message }` when it refuses.
    pub async fn create_visit(&self, visit: &NewVisit) -> Result<VisitSnapshot, ApiError> {
        let body = CreateVisitRecord::from(visit);
        let url = self.endpoint(&["visitas", "createVisitaEmergencia"]);
        let parsed: CreateVisitResponse = self
            .send_action(Method::POST, url, Some(&body), CREATE_FALLBACK)
            .await?;

        match parsed.nueva_visita {
            Some(record) => {
                let created = VisitSnapshot::try_from(record)?;
                tracing::info!(
                    visit_id = created.visit_id,
                    assignee = %visit.assignee_code,
                    "Emergency visit created"
                );
                Ok(created)
            }
            None => Err(ApiError::Domain(
                parsed
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| CREATE_FALLBACK.to_string()),
            )),
        }
    }

    /// Every emergency visit visible to the session.
    pub async fn list_visits(&self) -> Result<Vec<VisitRow>, ApiError> {
        let rows: Vec<VisitRecord> = self
            .get_json(self.endpoint(&["visitas", "getVisitasEmergencia"]))
            .await?;
        let mut visits = Vec::with_capacity(rows.len());
        for row in rows {
            match VisitRow::try_from(row) {
                Ok(visit) => visits.push(visit),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed visit row"),
            }
        }
        Ok(visits)
    }
}
