//! Haulboard Core - Entity Types
//!
//! Pure data structures shared by the storage and data-access crates:
//! entities, column availability, errors, configuration and the normalized
//! `{ data, error }` result. No I/O lives here.

pub mod config;
pub mod entities;
pub mod error;
pub mod result;
pub mod schema;

use chrono::{DateTime, Utc};

/// Primary key of a row in the hosted database (bigint identity).
pub type RowId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A row as exchanged with the backend: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub use config::{BackendConfig, CacheTtlConfig, HaulboardConfig, SchemaProbeConfig, VolumeConfig};
pub use entities::{
    Client, DailyVolumePoint, LinkedRef, NameRef, NewProject, Operator, OperatorPayload, Project,
    ProjectPatch, ProjectStatus, Trip, TripStatus, Truck, TruckPatch,
};
pub use error::{
    BackendError, ConfigError, HaulError, HaulResult, SchemaError, ValidationError,
    POSTGREST_UNKNOWN_COLUMN, SQLSTATE_UNDEFINED_COLUMN,
};
pub use result::DataResult;
pub use schema::{trucks, ColumnAvailability};

/// Deserialize backend rows into typed entities.
///
/// A row that does not match `T` is a data-shape error for the named
/// operation.
pub fn rows_into<T: serde::de::DeserializeOwned>(
    operation: &str,
    rows: Vec<Row>,
) -> HaulResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(serde_json::Value::Object(row))
                .map_err(|e| HaulError::decode(operation, e))
        })
        .collect()
}

/// Serialize a typed record into a backend row.
pub fn to_row<T: serde::Serialize>(operation: &str, value: &T) -> HaulResult<Row> {
    match serde_json::to_value(value).map_err(|e| HaulError::decode(operation, e))? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(HaulError::decode(
            operation,
            format!("expected an object, got {}", other),
        )),
    }
}
