//! In-process mock backend for client tests.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::ApiClient;
use crate::config::ClientConfig;
use crate::session::{SessionContext, UserProfile};

/// Serve `app` on an ephemeral port. Returns the base URL and the server task.
pub(crate) async fn spawn_backend(app: Router) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://127.0.0.1:{}", addr.port()), handle)
}

/// Client with an established in-memory session holding `test-token`.
pub(crate) fn client_for(base_url: &str) -> (ApiClient, Arc<SessionContext>) {
    let session = Arc::new(SessionContext::in_memory());
    session
        .establish(
            "test-token",
            UserProfile {
                user_code: "SUP01".into(),
                name: Some("Supervisor Uno".into()),
                role: Some(8),
                division: Some(1),
            },
        )
        .unwrap();
    let client = ApiClient::new(&ClientConfig::new(base_url), session.clone()).unwrap();
    (client, session)
}

pub(crate) fn visit_json(visit_id: i64, state: i64, updated_at: &str) -> serde_json::Value {
    serde_json::json!({
        "id_visita": visit_id,
        "id_caso": "c-77",
        "id_estado": state,
        "new_gps_latitude": "14.6349",
        "new_gps_longitude": "-90.5069",
        "last_gps_latitude": "14.6001",
        "last_gps_longitude": "-90.5202",
        "fecha_programacion": "2024-01-02T08:00:00Z",
        "createdAt": "2024-01-02T08:00:00Z",
        "updatedAt": updated_at,
        "tienda_nombre": "Zona 10",
        "nombre_user_asignado": "Supervisor Uno"
    })
}

pub(crate) fn case_json(case_id: &str, state: i64) -> serde_json::Value {
    serde_json::json!({
        "id_caso": case_id,
        "correlativo": 1042,
        "id_estado": state,
        "tienda_nombre": "Zona 10",
        "mensaje": "Fuga en bodega",
        "createdAt": "2024-01-01T08:00:00Z",
        "updatedAt": "2024-01-03T09:00:00Z",
        "division": 1
    })
}
