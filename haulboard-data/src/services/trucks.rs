//! Truck accessors that map writes onto whichever columns the table has.

use std::sync::Arc;

use haulboard_core::{
    rows_into, trucks, ColumnAvailability, HaulResult, RowId, Truck, TruckPatch,
};
use haulboard_storage::{DataBackend, Filter, Query, SortDirection};

use super::{inserted_row, row_for_id};
use crate::mapper::adapt_truck_record;
use crate::schema::{SchemaMemo, SchemaProber};

/// Truck reads and schema-adaptive writes.
pub struct TruckService {
    backend: Arc<dyn DataBackend>,
    prober: Arc<SchemaProber>,
    memo: Arc<SchemaMemo>,
}

impl TruckService {
    pub fn new(backend: Arc<dyn DataBackend>, prober: Arc<SchemaProber>, memo: Arc<SchemaMemo>) -> Self {
        Self {
            backend,
            prober,
            memo,
        }
    }

    /// Memoized column availability of the trucks table.
    pub async fn columns(&self) -> ColumnAvailability {
        self.memo.columns(&self.prober).await
    }

    /// All trucks ordered by name.
    pub async fn list(&self) -> HaulResult<Vec<Truck>> {
        let query = Query::table(trucks::TABLE_NAME).order_by(trucks::NAME, SortDirection::Asc);
        let rows = self.backend.select(&query).await?;
        rows_into("select trucks", rows)
    }

    /// Trucks assigned to a project.
    ///
    /// Tries `current_project`, then `project_id`; an empty or failed read
    /// moves on to the next. With neither available every truck is treated
    /// as active. Never fails: errors yield an empty list.
    pub async fn active(&self) -> Vec<Truck> {
        let columns = self.columns().await;
        for column in assignment_columns(&columns) {
            if let Some(found) = self.non_empty(Query::table(trucks::TABLE_NAME).not_null(column), column).await {
                return found;
            }
        }

        tracing::warn!("cannot tell active trucks by column, returning every truck");
        match self.list().await {
            Ok(all) => all,
            Err(e) => {
                tracing::error!(error = %e, "failed to list trucks");
                Vec::new()
            }
        }
    }

    /// Trucks without a project, by the same column order as [`Self::active`].
    ///
    /// Returns an empty list when neither column yields rows.
    pub async fn inactive(&self) -> Vec<Truck> {
        let columns = self.columns().await;
        for column in assignment_columns(&columns) {
            if let Some(found) = self.non_empty(Query::table(trucks::TABLE_NAME).is_null(column), column).await {
                return found;
            }
        }

        tracing::warn!("cannot tell inactive trucks by column, returning none");
        Vec::new()
    }

    async fn non_empty(&self, query: Query, column: &str) -> Option<Vec<Truck>> {
        let query = query.order_by(trucks::NAME, SortDirection::Asc);
        let rows = match self.backend.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(column, error = %e, "truck assignment query failed");
                return None;
            }
        };
        match rows_into::<Truck>("select trucks", rows) {
            Ok(found) if !found.is_empty() => Some(found),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(column, error = %e, "truck rows did not decode");
                None
            }
        }
    }

    pub async fn create(&self, patch: &TruckPatch) -> HaulResult<Truck> {
        let row = adapt_truck_record(patch, &self.columns().await);
        let rows = self.backend.insert(trucks::TABLE_NAME, vec![row]).await?;
        let truck: Truck = inserted_row("insert trucks", rows)?;
        tracing::info!(truck_id = truck.id, "truck created");
        Ok(truck)
    }

    pub async fn update(&self, id: RowId, patch: &TruckPatch) -> HaulResult<Truck> {
        let row = adapt_truck_record(patch, &self.columns().await);
        let rows = self
            .backend
            .update(trucks::TABLE_NAME, row, &[Filter::eq(trucks::ID, id)])
            .await?;
        row_for_id("update trucks", "truck", id, rows)
    }

    pub async fn delete(&self, id: RowId) -> HaulResult<Truck> {
        let rows = self
            .backend
            .delete(trucks::TABLE_NAME, &[Filter::eq(trucks::ID, id)])
            .await?;
        row_for_id("delete trucks", "truck", id, rows)
    }
}

fn assignment_columns(columns: &ColumnAvailability) -> Vec<&'static str> {
    let mut order = Vec::with_capacity(2);
    if columns.current_project {
        order.push(trucks::CURRENT_PROJECT);
    }
    if columns.project_id {
        order.push(trucks::PROJECT_ID);
    }
    order
}
