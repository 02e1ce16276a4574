use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CaseStatus;
use super::wire;
use super::ModelError;

/// The parent incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub case_id: String,
    pub correlative_number: Option<i64>,
    pub status: CaseStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub store_name: Option<String>,
    pub message: Option<String>,
    /// Reason entered by staff when the case was closed.
    pub closing_message: Option<String>,
    pub division: Option<i64>,
}

/// Case as served by `getCasoById` (numeric `id_estado`) or by the
/// division list view (textual `estado`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CaseRecord {
    #[serde(default, deserialize_with = "wire::opt_id_string")]
    id_caso: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_int")]
    correlativo: Option<i64>,
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_estado: Option<i64>,
    #[serde(default)]
    estado: Option<String>,
    #[serde(default, rename = "createdAt", deserialize_with = "wire::opt_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt", deserialize_with = "wire::opt_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tienda_nombre: Option<String>,
    #[serde(default)]
    mensaje: Option<String>,
    #[serde(default)]
    mensaje_cierre: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_int")]
    division: Option<i64>,
}

impl TryFrom<CaseRecord> for CaseSnapshot {
    type Error = ModelError;

    fn try_from(record: CaseRecord) -> Result<Self, Self::Error> {
        let status = match (record.id_estado, record.estado.as_deref()) {
            (Some(code), _) => CaseStatus::from_code(code)?,
            (None, Some(label)) => CaseStatus::from_str(label)?,
            (None, None) => return Err(ModelError::MissingField("id_estado")),
        };

        Ok(Self {
            case_id: record.id_caso.ok_or(ModelError::MissingField("id_caso"))?,
            correlative_number: record.correlativo,
            status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            store_name: record.tienda_nombre,
            message: record.mensaje,
            closing_message: record.mensaje_cierre,
            division: record.division,
        })
    }
}

/// Whether the signed-in user may change case states (close / reopen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePermission {
    pub user_id: Option<i64>,
    pub can_modify: bool,
}

impl StatePermission {
    pub fn denied() -> Self {
        Self {
            user_id: None,
            can_modify: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PermissionRecord {
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_user: Option<i64>,
    #[serde(default)]
    puede_modificar: bool,
}

impl From<PermissionRecord> for StatePermission {
    fn from(record: PermissionRecord) -> Self {
        Self {
            user_id: record.id_user,
            can_modify: record.puede_modificar,
        }
    }
}
