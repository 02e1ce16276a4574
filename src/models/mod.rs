//! Typed records for the operations backend.
//!
//! Each domain type has a crate-private wire record mirroring the backend's
//! JSON field names; conversion validates and normalizes.

pub mod case;
pub mod enums;
pub mod permission;
pub mod reopen;
pub mod visit;
pub(crate) mod wire;

pub use case::{CaseSnapshot, StatePermission};
pub use enums::{CaseStatus, VisitStatus};
pub use permission::PermissionGrant;
pub use reopen::ReopenEvent;
pub use visit::{GeoPoint, NewVisit, VisitCompletionRecord, VisitRow, VisitSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
