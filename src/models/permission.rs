use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;
use super::ModelError;

/// A user who was delegated the right to close and reopen cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: i64,
    pub user_name: Option<String>,
    pub granted_at: Option<DateTime<Utc>>,
    /// Who delegated it.
    pub granted_by: Option<String>,
}

/// Row of the `getUsersPermisosEstados` view.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GrantRecord {
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_user: Option<i64>,
    #[serde(default)]
    usuario: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_timestamp")]
    fecha: Option<DateTime<Utc>>,
    #[serde(default)]
    creado_por: Option<String>,
}

impl TryFrom<GrantRecord> for PermissionGrant {
    type Error = ModelError;

    fn try_from(record: GrantRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: record.id_user.ok_or(ModelError::MissingField("id_user"))?,
            user_name: record.usuario,
            granted_at: record.fecha,
            granted_by: record.creado_por,
        })
    }
}
