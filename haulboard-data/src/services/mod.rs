//! Table accessors used by the dashboard pages.
//!
//! Accessors that the pages treat as must-succeed (lists behind a spinner,
//! the trip feeds) log and return an empty list on failure. Writes and the
//! plain list reads return [`HaulResult`] so the caller can surface the error.

mod clients;
mod dashboard;
mod operators;
mod projects;
mod repair;
mod trips;
mod trucks;

pub use clients::ClientService;
pub use dashboard::{Dashboard, DashboardSnapshot};
pub use operators::{OperatorService, OPERATORS_CACHE_KEY};
pub use projects::ProjectService;
pub use repair::{SchemaRepair, EXECUTE_SQL_RPC};
pub use trips::TripService;
pub use trucks::TruckService;

use haulboard_core::{rows_into, HaulError, HaulResult, Row, RowId, ValidationError};
use serde::de::DeserializeOwned;

/// The first returned row of a write against one id.
pub(crate) fn row_for_id<T: DeserializeOwned>(
    operation: &str,
    entity: &str,
    id: RowId,
    rows: Vec<Row>,
) -> HaulResult<T> {
    rows_into::<T>(operation, rows)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ValidationError::RowMissing {
                entity: entity.to_string(),
                id,
            }
            .into()
        })
}

/// The first row returned by an insert.
pub(crate) fn inserted_row<T: DeserializeOwned>(operation: &str, rows: Vec<Row>) -> HaulResult<T> {
    rows_into::<T>(operation, rows)?
        .into_iter()
        .next()
        .ok_or_else(|| HaulError::decode(operation, "insert returned no rows"))
}
