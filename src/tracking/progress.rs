//! Case-detail loader: the case, its current visit, the completion record
//! and the reopen trail, folded into stage progress.

use serde::Serialize;

use super::reopen::{load_reopen_history, ReopenHistory};
use super::stages::{derive_stages, StageInputs, StageProgress};
use crate::api::{ApiClient, ApiError};
use crate::models::{CaseSnapshot, VisitCompletionRecord, VisitSnapshot};

/// Everything the case-detail view shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseProgress {
    pub case: CaseSnapshot,
    pub visit: Option<VisitSnapshot>,
    pub completion: Option<VisitCompletionRecord>,
    pub reopen: ReopenHistory,
    pub stages: StageProgress,
}

impl CaseProgress {
    pub fn assemble(
        case: CaseSnapshot,
        visit: Option<VisitSnapshot>,
        completion: Option<VisitCompletionRecord>,
        reopen: ReopenHistory,
    ) -> Self {
        let stages = derive_stages(StageInputs {
            case: Some(&case),
            visit: visit.as_ref(),
            completion: completion.as_ref(),
        });
        Self {
            case,
            visit,
            completion,
            reopen,
            stages,
        }
    }
}

/// Case, then its visit, then the visit's completion record and reopen
/// history. Missing related records are absences, not errors. Any
/// authentication failure aborts the whole load.
pub async fn load_case_progress(client: &ApiClient, case_id: &str) -> Result<CaseProgress, ApiError> {
    let case = client.fetch_case(case_id).await?;
    let visit = client.fetch_visit_for_case(case_id).await?;

    let (completion, reopen) = match &visit {
        Some(v) => {
            let completion = client.fetch_completion(v.visit_id).await?;
            let reopen = load_reopen_history(client, v.visit_id, &case.case_id).await?;
            (completion, reopen)
        }
        None => (None, ReopenHistory::empty()),
    };

    tracing::debug!(
        case_id,
        has_visit = visit.is_some(),
        has_completion = completion.is_some(),
        reopens = reopen.count(),
        "Case progress loaded"
    );
    Ok(CaseProgress::assemble(case, visit, completion, reopen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{case_json, client_for, spawn_backend, visit_json};
    use crate::models::{CaseStatus, VisitStatus};
    use crate::session::AuthFailure;
    use crate::tracking::stages::Stage;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};

    fn finished_backend(reopen_unauthorized: bool) -> Router {
        Router::new()
            .route(
                "/casos/getCasoById/:id",
                get(|| async { Json(case_json("c-77", 4)) }),
            )
            .route(
                "/visitas/getVisitasEmergenciaByCaso/:id",
                get(|| async { Json(visit_json(311, 3, "2024-01-02T12:00:00Z")) }),
            )
            .route(
                "/visitas/getVisitaByVisitaEmergencia/:id",
                get(|| async {
                    Json(serde_json::json!({
                        "id_visita_emergencia": 311,
                        "createdAt": "2024-01-02T12:00:00Z",
                        "comentario": "Reparado"
                    }))
                }),
            )
            .route(
                "/visitas/getVisitasReabiertas",
                get(move || async move {
                    if reopen_unauthorized {
                        return (
                            StatusCode::UNAUTHORIZED,
                            Json(serde_json::json!({ "code": "TOKEN_INVALID" })),
                        )
                            .into_response();
                    }
                    Json(serde_json::json!([
                        { "fecha_reapertura": "2024-01-02T14:00:00Z", "motivo_reapertura": "Goteo" },
                        { "fecha_reapertura": "2024-01-02T16:00:00Z", "motivo_reapertura": "Goteo otra vez" }
                    ]))
                    .into_response()
                }),
            )
    }

    #[tokio::test]
    async fn loads_full_progress() {
        let (base, server) = spawn_backend(finished_backend(false)).await;
        let (client, _session) = client_for(&base);

        let progress = load_case_progress(&client, "c-77").await.unwrap();
        assert_eq!(progress.case.status, CaseStatus::Closed);
        assert_eq!(progress.visit.as_ref().unwrap().status, VisitStatus::Finished);
        assert!(progress.completion.is_some());
        assert_eq!(progress.reopen.latest_reason(), Some("Goteo otra vez"));
        assert!(progress.reopen.shows_history_badge());
        assert_eq!(progress.stages.completed().count(), 5);
        server.abort();
    }

    #[tokio::test]
    async fn case_without_visit() {
        let app = Router::new()
            .route(
                "/casos/getCasoById/:id",
                get(|| async { Json(case_json("c-78", 1)) }),
            )
            .route(
                "/visitas/getVisitasEmergenciaByCaso/:id",
                get(|| async { StatusCode::NOT_FOUND.into_response() }),
            );
        let (base, server) = spawn_backend(app).await;
        let (client, _session) = client_for(&base);

        let progress = load_case_progress(&client, "c-78").await.unwrap();
        assert!(progress.visit.is_none());
        assert!(progress.reopen.is_empty());
        assert!(progress.stages.get(Stage::CaseCreated).complete);
        assert!(!progress.stages.get(Stage::Assigned).complete);
        server.abort();
    }

    #[tokio::test]
    async fn reopen_auth_failure_aborts_load() {
        let app = finished_backend(true);
        let (base, server) = spawn_backend(app).await;
        let (client, session) = client_for(&base);

        let err = load_case_progress(&client, "c-77").await.unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::Invalid));
        assert!(!session.is_active());
        server.abort();
    }
}
