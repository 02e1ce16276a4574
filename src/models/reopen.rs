use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;
use super::ModelError;

/// One reopen action performed against a visit/case pair. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReopenEvent {
    pub visit_id: i64,
    pub case_id: String,
    pub reopened_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReopenRecord {
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_visita: Option<i64>,
    #[serde(default, deserialize_with = "wire::opt_id_string")]
    id_caso: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_timestamp")]
    fecha_reapertura: Option<DateTime<Utc>>,
    #[serde(default)]
    motivo_reapertura: Option<String>,
}

impl ReopenRecord {
    /// Convert, filling the composite key from the request when the row omits it.
    pub(crate) fn into_event(self, visit_id: i64, case_id: &str) -> Result<ReopenEvent, ModelError> {
        Ok(ReopenEvent {
            visit_id: self.id_visita.unwrap_or(visit_id),
            case_id: self.id_caso.unwrap_or_else(|| case_id.to_string()),
            reopened_at: self
                .fecha_reapertura
                .ok_or(ModelError::MissingField("fecha_reapertura"))?,
            reason: self.motivo_reapertura.unwrap_or_default(),
        })
    }
}
