//! HTTP [`DataBackend`] for a PostgREST-style hosted database.
//!
//! Tables live under `/rest/v1/{table}` and procedures under
//! `/rest/v1/rpc/{function}`. Filters, ordering and limits travel as query
//! parameters. Writes ask for the affected rows back with
//! `Prefer: return=representation`.

use ::async_trait::async_trait;
use haulboard_core::{BackendConfig, BackendError, ConfigError, HaulError, HaulResult, Row};
use haulboard_storage::{DataBackend, Filter, Query};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::services::EXECUTE_SQL_RPC;

static IDENTIFIER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Whether `name` is safe to splice into a path or catalog statement.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name))
}

fn check_identifier(name: &str) -> HaulResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(BackendError::InvalidIdentifier {
            name: name.to_string(),
        }
        .into())
    }
}

/// Error body returned by the REST layer.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

#[derive(Clone)]
pub struct PostgrestBackend {
    client: reqwest::Client,
    base_url: String,
    auth_headers: HeaderMap,
}

impl PostgrestBackend {
    pub fn new(config: &BackendConfig) -> HaulResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| request_error("build client", e))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_headers: build_auth_headers(&config.api_key)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> HaulResult<String> {
        check_identifier(table)?;
        Ok(format!("{}/rest/v1/{}", self.base_url, table))
    }

    async fn send(&self, operation: &str, request: reqwest::RequestBuilder) -> HaulResult<Value> {
        let response = request
            .headers(self.auth_headers.clone())
            .send()
            .await
            .map_err(|e| request_error(operation, e))?;
        parse_response(operation, response).await
    }

    async fn send_rows(&self, operation: &str, request: reqwest::RequestBuilder) -> HaulResult<Vec<Row>> {
        let payload = self.send(operation, request).await?;
        into_rows(operation, payload)
    }
}

#[async_trait]
impl DataBackend for PostgrestBackend {
    async fn select(&self, query: &Query) -> HaulResult<Vec<Row>> {
        let operation = format!("select {}", query.table);
        let url = self.table_url(&query.table)?;
        tracing::trace!(table = query.table.as_str(), "select");
        self.send_rows(&operation, self.client.get(url).query(&query.params()))
            .await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> HaulResult<Vec<Row>> {
        let operation = format!("insert {}", table);
        let url = self.table_url(table)?;
        let request = self
            .client
            .post(url)
            .header("prefer", "return=representation")
            .json(&rows);
        self.send_rows(&operation, request).await
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> HaulResult<Vec<Row>> {
        let operation = format!("update {}", table);
        let url = self.table_url(table)?;
        let request = self
            .client
            .patch(url)
            .query(&filter_params(filters))
            .header("prefer", "return=representation")
            .json(&patch);
        self.send_rows(&operation, request).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> HaulResult<Vec<Row>> {
        let operation = format!("delete {}", table);
        let url = self.table_url(table)?;
        let request = self
            .client
            .delete(url)
            .query(&filter_params(filters))
            .header("prefer", "return=representation");
        self.send_rows(&operation, request).await
    }

    /// Reads `information_schema.columns` through the `execute_sql`
    /// procedure.
    async fn catalog_columns(&self, table: &str, schema: &str) -> HaulResult<Vec<String>> {
        check_identifier(table)?;
        check_identifier(schema)?;
        let sql = format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}'",
            schema, table
        );
        let payload = self.rpc(EXECUTE_SQL_RPC, json!({ "sql_query": sql })).await?;
        parse_catalog(&format!("catalog {}", table), payload)
    }

    async fn rpc(&self, function: &str, params: Value) -> HaulResult<Value> {
        check_identifier(function)?;
        let operation = format!("rpc {}", function);
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        self.send(&operation, self.client.post(url).json(&params))
            .await
    }
}

fn build_auth_headers(api_key: &str) -> HaulResult<HeaderMap> {
    let invalid = |e: reqwest::header::InvalidHeaderValue| -> HaulError {
        ConfigError::InvalidValue {
            field: "backend.api_key".to_string(),
            value: "<redacted>".to_string(),
            reason: e.to_string(),
        }
        .into()
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("apikey"),
        HeaderValue::from_str(api_key).map_err(invalid)?,
    );
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid)?,
    );
    Ok(headers)
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column().to_string(), f.operator()))
        .collect()
}

fn request_error(operation: &str, err: reqwest::Error) -> HaulError {
    let reason = if err.is_timeout() {
        format!("timed out: {}", err)
    } else {
        err.to_string()
    };
    BackendError::Request {
        operation: operation.to_string(),
        reason,
    }
    .into()
}

async fn parse_response(operation: &str, response: reqwest::Response) -> HaulResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| request_error(operation, e))?;
    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| HaulError::decode(operation, e))
    } else {
        Err(status_error(operation, status.as_u16(), &text).into())
    }
}

/// Map a non-success response body to [`BackendError::Status`].
fn status_error(operation: &str, status: u16, body: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let mut message = parsed
        .message
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body.trim()));
    if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
        message = format!("{} ({})", message, details);
    }
    if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
        message = format!("{}; hint: {}", message, hint);
    }
    BackendError::Status {
        operation: operation.to_string(),
        status,
        code: parsed.code,
        message,
    }
}

fn into_rows(operation: &str, payload: Value) -> HaulResult<Vec<Row>> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(HaulError::decode(
                    operation,
                    format!("expected a row object, got {}", other),
                )),
            })
            .collect(),
        Value::Object(row) => Ok(vec![row]),
        other => Err(HaulError::decode(
            operation,
            format!("expected an array of rows, got {}", other),
        )),
    }
}

/// Catalog rows come back either as bare names or as `{ column_name }`
/// objects depending on how the procedure was defined.
fn parse_catalog(operation: &str, payload: Value) -> HaulResult<Vec<String>> {
    let items = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(HaulError::decode(
                operation,
                format!("expected an array of columns, got {}", other),
            ))
        }
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            Value::Object(mut row) => match row.remove("column_name") {
                Some(Value::String(name)) => Ok(name),
                _ => Err(HaulError::decode(operation, "row without column_name")),
            },
            other => Err(HaulError::decode(
                operation,
                format!("unexpected catalog entry {}", other),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("trucks"));
        assert!(is_valid_identifier("_operator_trucks2"));
        assert!(!is_valid_identifier("2trucks"));
        assert!(!is_valid_identifier("trucks; drop table trucks"));
        assert!(!is_valid_identifier("trucks'"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_status_error_from_error_body() {
        let body = r#"{"code":"42703","message":"column trucks.load_volume does not exist","details":null,"hint":"Perhaps you meant loadVolume"}"#;
        let err = status_error("select trucks", 400, body);
        assert_eq!(err.code(), Some("42703"));
        assert!(err.is_missing_column());
        match err {
            BackendError::Status { status, message, .. } => {
                assert_eq!(status, 400);
                assert!(message.ends_with("hint: Perhaps you meant loadVolume"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_error_from_plain_body() {
        let err = status_error("rpc get_daily_volume", 502, "Bad Gateway\n");
        assert_eq!(err.code(), None);
        assert_eq!(
            err,
            BackendError::Status {
                operation: "rpc get_daily_volume".to_string(),
                status: 502,
                code: None,
                message: "HTTP 502: Bad Gateway".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_catalog_shapes() {
        let names = parse_catalog("catalog trucks", json!(["id", "name"])).unwrap();
        assert_eq!(names, vec!["id", "name"]);

        let rows = json!([{"column_name": "id"}, {"column_name": "loadVolume"}]);
        let names = parse_catalog("catalog trucks", rows).unwrap();
        assert_eq!(names, vec!["id", "loadVolume"]);

        assert!(parse_catalog("catalog trucks", Value::Null).unwrap().is_empty());
        assert!(parse_catalog("catalog trucks", json!([{"name": "id"}])).is_err());
        assert!(parse_catalog("catalog trucks", json!({"error": true})).is_err());
    }

    #[test]
    fn test_into_rows() {
        let rows = into_rows("select trips", json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(into_rows("insert trips", Value::Null).unwrap().is_empty());
        assert!(into_rows("select trips", json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_names_before_sending() {
        let backend =
            PostgrestBackend::new(&BackendConfig::new("http://127.0.0.1:9/", "anon-key")).unwrap();
        assert_eq!(backend.base_url(), "http://127.0.0.1:9");

        let err = backend.select(&Query::table("trucks?x=1")).await.unwrap_err();
        assert_eq!(
            err,
            HaulError::Backend(BackendError::InvalidIdentifier {
                name: "trucks?x=1".to_string()
            })
        );
        let err = backend.catalog_columns("trucks", "public'--").await.unwrap_err();
        assert!(matches!(err, HaulError::Backend(BackendError::InvalidIdentifier { .. })));
    }

    #[test]
    fn test_api_key_must_be_header_safe() {
        let err = PostgrestBackend::new(&BackendConfig::new("http://localhost", "bad\nkey"))
            .err()
            .unwrap();
        assert!(matches!(err, HaulError::Config(ConfigError::InvalidValue { .. })));
    }
}
