use std::sync::Arc;

use haulboard_core::{trucks, ColumnAvailability, Row};
use haulboard_storage::{DataBackend, Filter};
use serde_json::{json, Value};

use crate::schema::{ColumnProbe, SelectColumnProbe};

/// Procedure that runs arbitrary SQL on the hosted database.
pub const EXECUTE_SQL_RPC: &str = "execute_sql";

/// Brings an old `trucks` table up to the canonical column names.
pub struct SchemaRepair {
    backend: Arc<dyn DataBackend>,
    probe: Arc<dyn ColumnProbe>,
}

impl SchemaRepair {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        let probe = Arc::new(SelectColumnProbe::new(Arc::clone(&backend)));
        Self { backend, probe }
    }

    /// Add missing `current_project`, `project_id` and `load_volume`
    /// columns, or rename `loadvolume` to `load_volume`.
    ///
    /// A column is only added after a no-op update confirms it is missing.
    /// Returns false if the table could not be probed or a statement failed.
    pub async fn fix_trucks_schema(&self) -> bool {
        let columns = match self.probe.probe_columns(trucks::TABLE_NAME).await {
            Ok(columns) => columns,
            Err(e) => {
                tracing::error!(error = %e, "cannot probe trucks, schema left unchanged");
                return false;
            }
        };

        let mut ok = true;
        for statement in self.plan(&columns).await {
            ok &= self.execute(&statement).await;
        }
        ok
    }

    async fn plan(&self, columns: &ColumnAvailability) -> Vec<String> {
        let mut statements = Vec::new();
        if !columns.current_project && self.confirmed_missing(trucks::CURRENT_PROJECT).await {
            statements.push("ALTER TABLE trucks ADD COLUMN current_project TEXT;".to_string());
        }
        if !columns.project_id && self.confirmed_missing(trucks::PROJECT_ID).await {
            statements.push("ALTER TABLE trucks ADD COLUMN project_id INTEGER;".to_string());
        }
        if !columns.load_volume {
            if columns.load_volume_camel {
                // Unquoted identifiers fold to lower case in Postgres.
                statements.push("ALTER TABLE trucks RENAME COLUMN loadvolume TO load_volume;".to_string());
            } else if self.confirmed_missing(trucks::LOAD_VOLUME).await {
                statements.push("ALTER TABLE trucks ADD COLUMN load_volume INTEGER;".to_string());
            }
        }
        statements
    }

    /// Update no row (`id = -1`) with the column set, and check the backend
    /// rejects the column.
    async fn confirmed_missing(&self, column: &str) -> bool {
        let mut patch = Row::new();
        patch.insert(column.to_string(), Value::Null);
        match self
            .backend
            .update(trucks::TABLE_NAME, patch, &[Filter::eq(trucks::ID, -1)])
            .await
        {
            Ok(_) => false,
            Err(e) => e.is_missing_column(),
        }
    }

    async fn execute(&self, sql: &str) -> bool {
        match self
            .backend
            .rpc(EXECUTE_SQL_RPC, json!({ "sql_query": sql }))
            .await
        {
            Ok(_) => {
                tracing::info!(sql, "schema statement applied");
                true
            }
            Err(e) => {
                tracing::error!(sql, error = %e, "schema statement failed");
                false
            }
        }
    }
}
