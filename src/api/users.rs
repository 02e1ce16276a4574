//! Delegation of the case close/reopen permission.

use reqwest::Method;

use super::client::ApiClient;
use super::error::ApiError;
use crate::models::case::PermissionRecord;
use crate::models::permission::GrantRecord;
use crate::models::{PermissionGrant, StatePermission};

impl ApiClient {
    /// Users currently holding the close/reopen permission.
    pub async fn list_permission_grants(&self) -> Result<Vec<PermissionGrant>, ApiError> {
        let rows: Vec<GrantRecord> = self
            .get_json(self.endpoint(&["users", "getUsersPermisosEstados"]))
            .await?;
        let mut grants = Vec::with_capacity(rows.len());
        for row in rows {
            match PermissionGrant::try_from(row) {
                Ok(grant) => grants.push(grant),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed permission row"),
            }
        }
        Ok(grants)
    }

    pub async fn grant_state_permission(&self, user_id: i64) -> Result<StatePermission, ApiError> {
        let url = self.endpoint(&["users", "createPermisoCaso", &user_id.to_string()]);
        let record: PermissionRecord = self
            .send_action::<(), _>(Method::POST, url, None, "Error al crear permiso")
            .await?;
        tracing::info!(user_id, "State permission granted");
        Ok(record.into())
    }

    /// The backend answer carries nothing the caller needs.
    pub async fn revoke_state_permission(&self, user_id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&["users", "quitPermisoCaso", &user_id.to_string()]);
        let _: serde_json::Value = self
            .send_action::<(), _>(Method::PUT, url, None, "Error al quitar permiso")
            .await?;
        tracing::info!(user_id, "State permission revoked");
        Ok(())
    }
}
