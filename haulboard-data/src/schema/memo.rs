//! Process-lifetime memo of a table's column availability.

use haulboard_core::ColumnAvailability;
use tokio::sync::OnceCell;

use super::SchemaProber;

/// Remembers the first successful probe of one table.
///
/// There is no expiry: a schema migrated while the process runs is not
/// noticed until a new memo is built. A failed probe is not remembered; the
/// caller gets the degraded default for that call and the next call probes
/// again.
#[derive(Debug)]
pub struct SchemaMemo {
    table: String,
    columns: OnceCell<ColumnAvailability>,
}

impl SchemaMemo {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: OnceCell::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The memoized result, if a probe has succeeded.
    pub fn get(&self) -> Option<ColumnAvailability> {
        self.columns.get().copied()
    }

    /// Memoized columns, probing on first use.
    ///
    /// Concurrent first calls share a single probe.
    pub async fn columns(&self, prober: &SchemaProber) -> ColumnAvailability {
        let probed = self
            .columns
            .get_or_try_init(|| prober.check_table_columns(&self.table))
            .await;
        match probed {
            Ok(columns) => *columns,
            Err(e) => {
                tracing::warn!(
                    table = self.table.as_str(),
                    error = %e,
                    "schema probe failed, using assumed columns"
                );
                ColumnAvailability::degraded_default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulboard_core::{BackendError, SchemaProbeConfig};
    use haulboard_storage::MockBackend;
    use std::sync::Arc;

    fn unavailable() -> BackendError {
        BackendError::Unavailable {
            capability: "execute_sql".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_success_is_never_reprobed() {
        let backend = MockBackend::new().with_table("trucks", ["id", "loadVolume"]);
        let prober = SchemaProber::new(Arc::new(backend.clone()), SchemaProbeConfig::default());
        let memo = SchemaMemo::new("trucks");

        let first = memo.columns(&prober).await;
        assert!(first.load_volume_camel);

        // A migration after the first probe is not observed.
        backend.rename_column("trucks", "loadVolume", "load_volume");
        let second = memo.columns(&prober).await;
        assert_eq!(first, second);
        assert_eq!(backend.call_count("catalog trucks"), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_memoized() {
        let backend = MockBackend::new().with_table("trucks", ["id", "plateNumber"]);
        backend.fail_catalog(unavailable());
        backend.fail_table("trucks", unavailable());
        let prober = SchemaProber::new(Arc::new(backend.clone()), SchemaProbeConfig::default());
        let memo = SchemaMemo::new("trucks");

        assert_eq!(memo.columns(&prober).await, ColumnAvailability::degraded_default());
        assert!(memo.get().is_none());

        backend.clear_faults();
        let columns = memo.columns(&prober).await;
        assert!(columns.plate_number_camel);
        assert_eq!(memo.get(), Some(columns));
        assert_eq!(backend.call_count("catalog trucks"), 2);
    }
}
