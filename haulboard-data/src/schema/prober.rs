//! Column probing against the live schema.
//!
//! The catalog is asked first. If the catalog is unreachable (the helper
//! procedure is missing, permissions, network) a [`ColumnProbe`] decides
//! column by column. Neither path caches; memoization is the caller's choice
//! (see [`super::SchemaMemo`]).

use std::sync::Arc;

use ::async_trait::async_trait;
use haulboard_core::{
    trucks, ColumnAvailability, HaulResult, SchemaError, SchemaProbeConfig,
};
use haulboard_storage::{DataBackend, Query};
use serde::Serialize;

/// Fallback used when the metadata catalog cannot be read.
#[async_trait]
pub trait ColumnProbe: Send + Sync {
    async fn probe_columns(&self, table: &str) -> HaulResult<ColumnAvailability>;
}

/// Probes each candidate column with a zero-row select.
///
/// A missing-column error means absent and success means present. Any other
/// error is inconclusive: the column is reported absent and a warning logged.
/// Only when every column is inconclusive does the probe fail.
pub struct SelectColumnProbe {
    backend: Arc<dyn DataBackend>,
}

impl SelectColumnProbe {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ColumnProbe for SelectColumnProbe {
    async fn probe_columns(&self, table: &str) -> HaulResult<ColumnAvailability> {
        let mut columns = ColumnAvailability::default();
        let mut inconclusive = Vec::new();
        let mut last_error = None;

        for column in trucks::PROBED_COLUMNS {
            let query = Query::table(table).columns([column]).limit(0);
            match self.backend.select(&query).await {
                Ok(_) => columns.set(column, true),
                Err(e) if e.is_missing_column() => columns.set(column, false),
                Err(e) => {
                    inconclusive.push(column);
                    last_error = Some(e);
                }
            }
        }

        if inconclusive.len() == trucks::PROBED_COLUMNS.len() {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no column could be probed".to_string());
            return Err(SchemaError::ProbeFailed {
                table: table.to_string(),
                reason,
            }
            .into());
        }
        if !inconclusive.is_empty() {
            tracing::warn!(
                table,
                columns = ?inconclusive,
                "column probe inconclusive, assuming absent"
            );
        }
        Ok(columns)
    }
}

/// Outcome of a verification at a call site that must not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaVerification {
    pub columns: ColumnAvailability,
    /// True when the columns are the assumed default, not a probe result.
    pub degraded: bool,
    /// Column pairs where neither name exists.
    pub missing: Vec<&'static str>,
}

/// Reports which historically renamed columns a table has.
pub struct SchemaProber {
    backend: Arc<dyn DataBackend>,
    fallback: Arc<dyn ColumnProbe>,
    config: SchemaProbeConfig,
}

impl SchemaProber {
    /// Prober with the select-based fallback.
    pub fn new(backend: Arc<dyn DataBackend>, config: SchemaProbeConfig) -> Self {
        let fallback = Arc::new(SelectColumnProbe::new(Arc::clone(&backend)));
        Self {
            backend,
            fallback,
            config,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ColumnProbe>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn config(&self) -> &SchemaProbeConfig {
        &self.config
    }

    /// One probe: catalog first, fallback probe on catalog failure.
    ///
    /// Fails only if both paths fail.
    pub async fn check_table_columns(&self, table: &str) -> HaulResult<ColumnAvailability> {
        match self
            .backend
            .catalog_columns(table, &self.config.schema_name)
            .await
        {
            Ok(names) => {
                let columns = ColumnAvailability::from_column_names(&names);
                tracing::debug!(table, ?columns, "columns read from catalog");
                Ok(columns)
            }
            Err(e) => {
                tracing::warn!(table, error = %e, "catalog lookup failed, probing columns");
                self.fallback.probe_columns(table).await
            }
        }
    }

    /// Probe with the configured retry policy: fixed delay, bounded attempts.
    pub async fn verify_with_retry(&self, table: &str) -> HaulResult<ColumnAvailability> {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.check_table_columns(table).await {
                Ok(columns) => return Ok(columns),
                Err(e) => {
                    tracing::warn!(table, attempt, attempts, error = %e, "schema verification failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }
        Err(SchemaError::VerificationUnavailable {
            table: table.to_string(),
            attempts,
        }
        .into())
    }

    /// Verify, falling back to [`ColumnAvailability::degraded_default`] once
    /// the retries are exhausted.
    pub async fn verify_or_default(&self, table: &str) -> SchemaVerification {
        let (columns, degraded) = match self.verify_with_retry(table).await {
            Ok(columns) => (columns, false),
            Err(e) => {
                tracing::error!(table, error = %e, "using assumed schema");
                (ColumnAvailability::degraded_default(), true)
            }
        };
        SchemaVerification {
            missing: columns.missing_pairs(),
            columns,
            degraded,
        }
    }
}
