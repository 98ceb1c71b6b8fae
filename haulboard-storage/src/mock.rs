//! In-memory backend for tests and offline runs.
//!
//! Tables are declared with their column list so the backend can reject
//! unknown columns the way the hosted service does, which is what the schema
//! prober and the record mapper are tested against.

use crate::backend::{DataBackend, Embed, Filter, Join, Query, SortDirection};
use ::async_trait::async_trait;
use chrono::{DateTime, Utc};
use haulboard_core::{BackendError, HaulError, HaulResult, Row, POSTGREST_UNKNOWN_COLUMN};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Handler backing a registered remote procedure.
pub type RpcHandler = Arc<dyn Fn(&Value) -> HaulResult<Value> + Send + Sync>;

/// PostgREST code for an unknown function.
const POSTGREST_UNKNOWN_FUNCTION: &str = "PGRST202";
/// SQLSTATE for an unknown relation.
const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Clone, Default)]
struct MockTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    next_id: i64,
}

impl MockTable {
    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, MockTable>,
    rpcs: HashMap<String, RpcHandler>,
    catalog_fault: Option<BackendError>,
    rpc_faults: HashMap<String, BackendError>,
    table_faults: HashMap<String, BackendError>,
    calls: Vec<String>,
}

/// In-memory, fault-injectable [`DataBackend`].
///
/// Clones share state, so a test can keep a handle for assertions while the
/// services own another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<RwLock<MockState>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        let mut tables: Vec<&String> = state.tables.keys().collect();
        tables.sort();
        f.debug_struct("MockBackend").field("tables", &tables).finish()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // === Setup ===

    /// Declare a table with its columns. Replaces any existing table.
    pub fn create_table<I, S>(&self, table: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write().tables.insert(
            table.to_string(),
            MockTable {
                columns: columns.into_iter().map(Into::into).collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    /// Builder form of [`MockBackend::create_table`].
    pub fn with_table<I, S>(self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_table(table, columns);
        self
    }

    /// Insert rows directly, bypassing column validation and the call log.
    ///
    /// Missing `id`s are assigned. Non-object values are ignored.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.write();
        let Some(target) = state.tables.get_mut(table) else {
            tracing::warn!(table, "seeding undeclared mock table");
            return;
        };
        for row in rows {
            if let Value::Object(row) = row {
                store_row(target, row);
            }
        }
    }

    pub fn add_column(&self, table: &str, column: &str) {
        if let Some(target) = self.write().tables.get_mut(table) {
            if !target.has_column(column) {
                target.columns.push(column.to_string());
            }
        }
    }

    /// Rename a column, carrying over its values.
    pub fn rename_column(&self, table: &str, from: &str, to: &str) {
        if let Some(target) = self.write().tables.get_mut(table) {
            for column in target.columns.iter_mut() {
                if column == from {
                    *column = to.to_string();
                }
            }
            for row in target.rows.iter_mut() {
                if let Some(value) = row.remove(from) {
                    row.insert(to.to_string(), value);
                }
            }
        }
    }

    pub fn register_rpc<F>(&self, function: &str, handler: F)
    where
        F: Fn(&Value) -> HaulResult<Value> + Send + Sync + 'static,
    {
        self.write()
            .rpcs
            .insert(function.to_string(), Arc::new(handler));
    }

    // === Fault injection ===

    pub fn fail_catalog(&self, error: BackendError) {
        self.write().catalog_fault = Some(error);
    }

    pub fn fail_rpc(&self, function: &str, error: BackendError) {
        self.write().rpc_faults.insert(function.to_string(), error);
    }

    /// Fail every row operation on `table`.
    pub fn fail_table(&self, table: &str, error: BackendError) {
        self.write().table_faults.insert(table.to_string(), error);
    }

    pub fn clear_faults(&self) {
        let mut state = self.write();
        state.catalog_fault = None;
        state.rpc_faults.clear();
        state.table_faults.clear();
    }

    // === Inspection ===

    /// Current rows of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.read()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn columns(&self, table: &str) -> Vec<String> {
        self.read()
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    /// Every backend call made so far, e.g. `select trucks` or `rpc get_daily_volume`.
    pub fn calls(&self) -> Vec<String> {
        self.read().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.read().calls.iter().filter(|c| *c == call).count()
    }

    pub fn reset_calls(&self) {
        self.write().calls.clear();
    }

    fn record(&self, call: String) {
        self.write().calls.push(call);
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn store_row(table: &mut MockTable, mut row: Row) -> Row {
    if table.has_column("id") {
        match row.get("id").and_then(Value::as_i64) {
            Some(id) => table.next_id = table.next_id.max(id + 1),
            None => {
                row.insert("id".to_string(), Value::from(table.next_id));
                table.next_id += 1;
            }
        }
    }
    if table.has_column("created_at") && !row.contains_key("created_at") {
        row.insert(
            "created_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
    for column in &table.columns {
        row.entry(column.clone()).or_insert(Value::Null);
    }
    table.rows.push(row.clone());
    row
}

fn missing_table(operation: &str, table: &str) -> HaulError {
    BackendError::Status {
        operation: operation.to_string(),
        status: 404,
        code: Some(SQLSTATE_UNDEFINED_TABLE.to_string()),
        message: format!("relation \"public.{}\" does not exist", table),
    }
    .into()
}

/// Unknown column in a read: Postgres reports it by SQLSTATE.
fn unknown_select_column(operation: &str, table: &str, column: &str) -> HaulError {
    BackendError::Status {
        operation: operation.to_string(),
        status: 400,
        code: Some(haulboard_core::SQLSTATE_UNDEFINED_COLUMN.to_string()),
        message: format!("column {}.{} does not exist", table, column),
    }
    .into()
}

/// Unknown column in a write: PostgREST rejects it from its schema cache.
fn unknown_write_column(operation: &str, table: &str, column: &str) -> HaulError {
    BackendError::Status {
        operation: operation.to_string(),
        status: 400,
        code: Some(POSTGREST_UNKNOWN_COLUMN.to_string()),
        message: format!(
            "Could not find the '{}' column of '{}' in the schema cache",
            column, table
        ),
    }
    .into()
}

fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compare two JSON scalars: numbers numerically, RFC 3339 strings
/// chronologically, other strings lexically.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (as_instant(a), as_instant(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let field = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::IsNull { .. } => field.is_null(),
        Filter::NotNull { .. } => !field.is_null(),
        Filter::Eq { value, .. } => {
            field == value || compare_values(field, value) == Some(Ordering::Equal)
        }
        Filter::Gte { value, .. } => matches!(
            compare_values(field, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte { value, .. } => matches!(
            compare_values(field, value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::Lt { value, .. } => compare_values(field, value) == Some(Ordering::Less),
    }
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn validate_columns<'a>(
    operation: &str,
    table: &MockTable,
    table_name: &str,
    columns: impl IntoIterator<Item = &'a str>,
) -> HaulResult<()> {
    for column in columns {
        if !table.has_column(column) {
            return Err(unknown_select_column(operation, table_name, column));
        }
    }
    Ok(())
}

fn embed_value(state: &MockState, row: &Row, embed: &Embed) -> Value {
    let Some(related) = state.tables.get(&embed.table) else {
        return Value::Null;
    };
    match &embed.join {
        Join::ToOne { local_key } => {
            let key = row.get(local_key).unwrap_or(&Value::Null);
            if key.is_null() {
                return Value::Null;
            }
            related
                .rows
                .iter()
                .find(|r| r.get("id") == Some(key))
                .map(|r| Value::Object(project(r, &embed.columns)))
                .unwrap_or(Value::Null)
        }
        Join::ToMany { foreign_key } => {
            let id = row.get("id").unwrap_or(&Value::Null);
            Value::Array(
                related
                    .rows
                    .iter()
                    .filter(|r| r.get(foreign_key) == Some(id))
                    .map(|r| Value::Object(project(r, &embed.columns)))
                    .collect(),
            )
        }
    }
}

// ============================================================================
// BACKEND IMPLEMENTATION
// ============================================================================

#[async_trait]
impl DataBackend for MockBackend {
    async fn select(&self, query: &Query) -> HaulResult<Vec<Row>> {
        let operation = format!("select {}", query.table);
        self.record(operation.clone());

        let state = self.read();
        if let Some(err) = state.table_faults.get(&query.table) {
            return Err(err.clone().into());
        }
        let table = state
            .tables
            .get(&query.table)
            .ok_or_else(|| missing_table(&operation, &query.table))?;

        validate_columns(
            &operation,
            table,
            &query.table,
            query
                .columns
                .iter()
                .map(String::as_str)
                .chain(query.filters.iter().map(Filter::column))
                .chain(query.order.iter().map(|o| o.column.as_str())),
        )?;

        let mut rows: Vec<&Row> = table
            .rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();

        for order in query.order.iter().rev() {
            rows.sort_by(|a, b| {
                let x = a.get(&order.column).unwrap_or(&Value::Null);
                let y = b.get(&order.column).unwrap_or(&Value::Null);
                // Nulls compare greater than any value, as in Postgres:
                // last when ascending, first when descending.
                let ord = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare_values(x, y).unwrap_or(Ordering::Equal),
                };
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| {
                let mut out = project(row, &query.columns);
                for embed in &query.embeds {
                    out.insert(embed.table.clone(), embed_value(&state, row, embed));
                }
                out
            })
            .collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> HaulResult<Vec<Row>> {
        let operation = format!("insert {}", table);
        self.record(operation.clone());

        let mut state = self.write();
        if let Some(err) = state.table_faults.get(table) {
            return Err(err.clone().into());
        }
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| missing_table(&operation, table))?;

        for row in &rows {
            if let Some(column) = row.keys().find(|c| !target.has_column(c)) {
                return Err(unknown_write_column(&operation, table, column));
            }
        }
        Ok(rows.into_iter().map(|row| store_row(target, row)).collect())
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> HaulResult<Vec<Row>> {
        let operation = format!("update {}", table);
        self.record(operation.clone());

        let mut state = self.write();
        if let Some(err) = state.table_faults.get(table) {
            return Err(err.clone().into());
        }
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| missing_table(&operation, table))?;

        if let Some(column) = patch.keys().find(|c| !target.has_column(c)) {
            return Err(unknown_write_column(&operation, table, column));
        }
        validate_columns(&operation, target, table, filters.iter().map(Filter::column))?;

        let mut updated = Vec::new();
        for row in target.rows.iter_mut() {
            if filters.iter().all(|f| matches(row, f)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> HaulResult<Vec<Row>> {
        let operation = format!("delete {}", table);
        self.record(operation.clone());

        let mut state = self.write();
        if let Some(err) = state.table_faults.get(table) {
            return Err(err.clone().into());
        }
        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| missing_table(&operation, table))?;
        validate_columns(&operation, target, table, filters.iter().map(Filter::column))?;

        let (deleted, kept): (Vec<Row>, Vec<Row>) = target
            .rows
            .drain(..)
            .partition(|row| filters.iter().all(|f| matches(row, f)));
        target.rows = kept;
        Ok(deleted)
    }

    async fn catalog_columns(&self, table: &str, schema: &str) -> HaulResult<Vec<String>> {
        self.record(format!("catalog {}", table));

        let state = self.read();
        if let Some(err) = &state.catalog_fault {
            return Err(err.clone().into());
        }
        if schema != "public" {
            return Ok(Vec::new());
        }
        Ok(state
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn rpc(&self, function: &str, params: Value) -> HaulResult<Value> {
        let operation = format!("rpc {}", function);
        self.record(operation.clone());

        // Release the lock before running the handler; handlers may call back
        // into this backend.
        let handler = {
            let state = self.read();
            if let Some(err) = state.rpc_faults.get(function) {
                return Err(err.clone().into());
            }
            state.rpcs.get(function).cloned()
        };

        match handler {
            Some(handler) => handler(&params),
            None => Err(BackendError::Status {
                operation,
                status: 404,
                code: Some(POSTGREST_UNKNOWN_FUNCTION.to_string()),
                message: format!(
                    "Could not find the function public.{} in the schema cache",
                    function
                ),
            }
            .into()),
        }
    }
}
