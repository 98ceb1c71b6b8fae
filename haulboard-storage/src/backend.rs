//! Backend abstraction for the hosted database service.
//!
//! The data layer only ever talks to the service through [`DataBackend`]:
//! row-level select/insert/update/delete against a table, a metadata-catalog
//! query, and named remote procedure calls. The HTTP implementation lives in
//! `haulboard-data`; [`crate::MockBackend`] is the in-memory one.

use ::async_trait::async_trait;
use haulboard_core::{HaulResult, Row};
use serde_json::Value;

/// Async interface to the hosted database.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Run a select and return the matching rows.
    async fn select(&self, query: &Query) -> HaulResult<Vec<Row>>;

    /// Insert rows and return them as stored.
    async fn insert(&self, table: &str, rows: Vec<Row>) -> HaulResult<Vec<Row>>;

    /// Apply `patch` to every row matching `filters` and return the updated rows.
    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> HaulResult<Vec<Row>>;

    /// Delete every row matching `filters` and return the deleted rows.
    async fn delete(&self, table: &str, filters: &[Filter]) -> HaulResult<Vec<Row>>;

    /// Column names of `schema.table` according to the metadata catalog.
    ///
    /// An unknown table yields an empty list, not an error.
    async fn catalog_columns(&self, table: &str, schema: &str) -> HaulResult<Vec<String>>;

    /// Invoke a remote procedure with named JSON parameters.
    async fn rpc(&self, function: &str, params: Value) -> HaulResult<Value>;
}

// ============================================================================
// FILTERS
// ============================================================================

/// Row filter, rendered as a PostgREST operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    IsNull { column: String },
    NotNull { column: String },
    Gte { column: String, value: Value },
    Lte { column: String, value: Value },
    Lt { column: String, value: Value },
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::NotNull {
            column: column.into(),
        }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. }
            | Self::IsNull { column }
            | Self::NotNull { column }
            | Self::Gte { column, .. }
            | Self::Lte { column, .. }
            | Self::Lt { column, .. } => column,
        }
    }

    /// Query-string operator for this filter, e.g. `eq.completed`.
    pub fn operator(&self) -> String {
        match self {
            Self::Eq { value, .. } => format!("eq.{}", render_value(value)),
            Self::IsNull { .. } => "is.null".to_string(),
            Self::NotNull { .. } => "not.is.null".to_string(),
            Self::Gte { value, .. } => format!("gte.{}", render_value(value)),
            Self::Lte { value, .. } => format!("lte.{}", render_value(value)),
            Self::Lt { value, .. } => format!("lt.{}", render_value(value)),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// ORDERING AND EMBEDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: SortDirection,
}

impl Order {
    /// PostgREST form, e.g. `end_time.desc`.
    pub fn render(&self) -> String {
        match self.direction {
            SortDirection::Asc => format!("{}.asc", self.column),
            SortDirection::Desc => format!("{}.desc", self.column),
        }
    }
}

/// How an embedded table relates to the queried one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Join {
    /// The queried row holds `local_key`, referencing the embedded row's `id`.
    ToOne { local_key: String },
    /// Embedded rows hold `foreign_key`, referencing the queried row's `id`.
    ToMany { foreign_key: String },
}

/// A related table pulled into each result row under its table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub table: String,
    pub columns: Vec<String>,
    pub join: Join,
}

impl Embed {
    pub fn to_one<I, S>(table: impl Into<String>, columns: I, local_key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            join: Join::ToOne {
                local_key: local_key.into(),
            },
        }
    }

    pub fn to_many<I, S>(table: impl Into<String>, columns: I, foreign_key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            join: Join::ToMany {
                foreign_key: foreign_key.into(),
            },
        }
    }

    fn render(&self) -> String {
        format!("{}({})", self.table, render_columns(&self.columns))
    }
}

fn render_columns(columns: &[String]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(",")
    }
}

// ============================================================================
// QUERY
// ============================================================================

/// A select against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    /// Selected columns. Empty selects every column.
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::is_null(column))
    }

    pub fn not_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::not_null(column))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::gte(column, value))
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::lte(column, value))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::lt(column, value))
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The `select=` parameter: own columns followed by embeds.
    pub fn select_clause(&self) -> String {
        let mut parts = vec![render_columns(&self.columns)];
        parts.extend(self.embeds.iter().map(Embed::render));
        parts.join(",")
    }

    /// Query-string pairs for the filters, ordering and limit.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select_clause())];
        params.extend(
            self.filters
                .iter()
                .map(|f| (f.column().to_string(), f.operator())),
        );
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(Order::render).collect();
            params.push(("order".to_string(), order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_clause_with_embeds() {
        let query = Query::table("trips")
            .embed(Embed::to_one("trucks", ["name"], "truck_id"))
            .embed(Embed::to_one("projects", ["name"], "project_id"));
        assert_eq!(query.select_clause(), "*,trucks(name),projects(name)");

        let query = Query::table("trucks").columns(["id", "loadVolume"]);
        assert_eq!(query.select_clause(), "id,loadVolume");
    }

    #[test]
    fn test_params_render_postgrest_operators() {
        let query = Query::table("trips")
            .eq("status", "completed")
            .gte("end_time", "2024-03-01T00:00:00+00:00")
            .not_null("truck_id")
            .order_by("end_time", SortDirection::Desc)
            .limit(3);
        let params = query.params();
        assert_eq!(params[0], ("select".to_string(), "*".to_string()));
        assert_eq!(params[1], ("status".to_string(), "eq.completed".to_string()));
        assert_eq!(
            params[2],
            ("end_time".to_string(), "gte.2024-03-01T00:00:00+00:00".to_string())
        );
        assert_eq!(params[3], ("truck_id".to_string(), "not.is.null".to_string()));
        assert_eq!(params[4], ("order".to_string(), "end_time.desc".to_string()));
        assert_eq!(params[5], ("limit".to_string(), "3".to_string()));
    }

    #[test]
    fn test_numeric_filter_value() {
        assert_eq!(Filter::eq("id", json!(42)).operator(), "eq.42");
        assert_eq!(Filter::is_null("current_project").operator(), "is.null");
        assert_eq!(Filter::lt("end_time", "x").column(), "end_time");
    }
}
