use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::VisitStatus;
use super::wire;
use super::ModelError;

/// A GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Some(Self::new(latitude?, longitude?))
    }
}

/// Latest known state of an emergency visit.
///
/// Replaced wholesale on every poll; never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitSnapshot {
    pub visit_id: i64,
    /// Parent case, when the backend includes it.
    pub case_id: Option<String>,
    pub status: VisitStatus,
    /// Supervisor's last confirmed GPS fix.
    pub last_known_location: Option<GeoPoint>,
    /// Fixed at creation.
    pub destination: GeoPoint,
    /// When the visit was assigned to occur.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub store_name: Option<String>,
    pub assignee_name: Option<String>,
    pub visit_type: Option<String>,
    pub objective: Option<String>,
    pub division: Option<i64>,
}

impl VisitSnapshot {
    /// Whether the record was modified after it was created.
    ///
    /// The backend has no explicit "supervisor started" state, so this is the
    /// approximation used for the "In Process" stage: any later write counts.
    pub fn has_been_touched_since_creation(&self) -> bool {
        match (self.created_at, self.updated_at) {
            (Some(created), Some(updated)) => updated > created,
            _ => false,
        }
    }
}

/// Nested state object some visit endpoints embed.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VisitStateRecord {
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_estado: Option<i64>,
    #[serde(default)]
    nombre: Option<String>,
}

/// Visit as served by `getVisitasEmergenciaById`, `getVisitasEmergenciaByCaso`
/// and the visit list (the view rows carry `estado` text instead of a code).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VisitRecord {
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_visita: Option<i64>,
    #[serde(default, deserialize_with = "wire::opt_int")]
    id_estado: Option<i64>,
    #[serde(default)]
    estado: Option<String>,
    #[serde(default, rename = "EstadoVisitaEmergenciaModel")]
    estado_model: Option<VisitStateRecord>,
    #[serde(default, deserialize_with = "wire::opt_coordinate")]
    last_gps_latitude: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_coordinate")]
    last_gps_longitude: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_coordinate")]
    new_gps_latitude: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_coordinate")]
    new_gps_longitude: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_timestamp")]
    fecha_programacion: Option<DateTime<Utc>>,
    #[serde(default, rename = "createdAt", deserialize_with = "wire::opt_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt", deserialize_with = "wire::opt_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::opt_id_string")]
    id_caso: Option<String>,
    #[serde(default)]
    tienda_nombre: Option<String>,
    #[serde(default)]
    nombre_user_asignado: Option<String>,
    #[serde(default)]
    tipo_visita: Option<String>,
    #[serde(default)]
    comentario: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_int")]
    division: Option<i64>,
}

impl VisitRecord {
    /// Textual state wins over the numeric code: it is the only place the
    /// backend can express "En Proceso".
    fn resolve_status(&self) -> Result<VisitStatus, ModelError> {
        let label = self
            .estado_model
            .as_ref()
            .and_then(|m| m.nombre.as_deref())
            .or(self.estado.as_deref());
        if let Some(status) = label.and_then(|l| VisitStatus::from_str(l).ok()) {
            return Ok(status);
        }

        let code = self
            .id_estado
            .or_else(|| self.estado_model.as_ref().and_then(|m| m.id_estado));
        match (code, label) {
            (Some(code), _) => VisitStatus::from_code(code),
            (None, Some(label)) => VisitStatus::from_str(label),
            (None, None) => Err(ModelError::MissingField("id_estado")),
        }
    }
}

impl TryFrom<VisitRecord> for VisitSnapshot {
    type Error = ModelError;

    fn try_from(record: VisitRecord) -> Result<Self, Self::Error> {
        let status = record.resolve_status()?;
        let visit_id = record.id_visita.ok_or(ModelError::MissingField("id_visita"))?;
        let destination =
            GeoPoint::from_parts(record.new_gps_latitude, record.new_gps_longitude)
                .ok_or(ModelError::MissingField("new_gps_latitude/new_gps_longitude"))?;

        Ok(Self {
            visit_id,
            case_id: record.id_caso,
            status,
            last_known_location: GeoPoint::from_parts(
                record.last_gps_latitude,
                record.last_gps_longitude,
            ),
            destination,
            scheduled_at: record.fecha_programacion,
            created_at: record.created_at,
            updated_at: record.updated_at,
            store_name: record.tienda_nombre,
            assignee_name: record.nombre_user_asignado,
            visit_type: record.tipo_visita,
            objective: record.comentario,
            division: record.division,
        })
    }
}

/// One row of the emergency visit list. List rows may omit coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRow {
    pub visit_id: i64,
    pub case_id: Option<String>,
    pub status: VisitStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub store_name: Option<String>,
    pub assignee_name: Option<String>,
}

impl TryFrom<VisitRecord> for VisitRow {
    type Error = ModelError;

    fn try_from(record: VisitRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            status: record.resolve_status()?,
            visit_id: record.id_visita.ok_or(ModelError::MissingField("id_visita"))?,
            case_id: record.id_caso,
            scheduled_at: record.fecha_programacion,
            store_name: record.tienda_nombre,
            assignee_name: record.nombre_user_asignado,
        })
    }
}

/// Written once the supervisor finishes the visit on site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitCompletionRecord {
    /// Back-reference to the emergency visit.
    pub visit_id: Option<i64>,
    /// Ground-truth "Finished" moment.
    pub created_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionRecord {
    #[serde(default, alias = "id_visita", deserialize_with = "wire::opt_int")]
    id_visita_emergencia: Option<i64>,
    #[serde(default, rename = "createdAt", deserialize_with = "wire::opt_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    comentario: Option<String>,
    #[serde(default)]
    url_image: Option<String>,
}

impl From<CompletionRecord> for VisitCompletionRecord {
    fn from(record: CompletionRecord) -> Self {
        Self {
            visit_id: record.id_visita_emergencia,
            created_at: record.created_at,
            comment: record.comentario,
            image_url: record.url_image,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════

/// An emergency visit to assign to a supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVisit {
    pub company: String,
    pub store_code: String,
    pub store_name: String,
    pub store_address: Option<String>,
    pub visit_type_id: i64,
    /// Where the supervisor was last seen, if known.
    pub last_location: Option<GeoPoint>,
    pub destination: GeoPoint,
    pub comment: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub assignee_code: String,
    pub assignee_name: String,
    pub case_id: Option<String>,
    pub division: Option<i64>,
}

/// Body of `createVisitaEmergencia`. Coordinates travel as strings.
#[derive(Debug, Serialize)]
pub(crate) struct CreateVisitRecord {
    empresa: String,
    tienda: String,
    tienda_nombre: String,
    tienda_direccion: String,
    id_tipo_visita: i64,
    last_gps_latitude: Option<String>,
    last_gps_longitude: Option<String>,
    new_gps_latitude: String,
    new_gps_longitude: String,
    comentario: Option<String>,
    id_estado: i64,
    fecha_programacion: DateTime<Utc>,
    user_asignado: String,
    nombre_user_asignado: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_caso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    division: Option<i64>,
}

impl From<&NewVisit> for CreateVisitRecord {
    fn from(visit: &NewVisit) -> Self {
        Self {
            empresa: visit.company.clone(),
            tienda: visit.store_code.clone(),
            tienda_nombre: visit.store_name.clone(),
            tienda_direccion: visit
                .store_address
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "Sin direccion establecida".to_string()),
            id_tipo_visita: visit.visit_type_id,
            last_gps_latitude: visit.last_location.map(|p| p.latitude.to_string()),
            last_gps_longitude: visit.last_location.map(|p| p.longitude.to_string()),
            new_gps_latitude: visit.destination.latitude.to_string(),
            new_gps_longitude: visit.destination.longitude.to_string(),
            comentario: visit.comment.clone(),
            // Asignada
            id_estado: 1,
            fecha_programacion: visit.scheduled_at,
            user_asignado: visit.assignee_code.clone(),
            nombre_user_asignado: visit.assignee_name.clone(),
            id_caso: visit.case_id.clone(),
            division: visit.division,
        }
    }
}
