//! Operator accessors.
//!
//! The joined operator list (operators with their linked trucks and
//! projects) is served through the read-through cache. Every mutation,
//! including link changes, invalidates it. Results use the `{ data, error }`
//! shape the operator pages consume.

use std::sync::Arc;
use std::time::Duration;

use haulboard_core::{
    to_row, DataResult, HaulError, HaulResult, Operator, OperatorPayload, Row, RowId,
    ValidationError,
};
use haulboard_storage::{DataBackend, Filter, Query, TtlCache};
use serde_json::{json, Value};

use super::{inserted_row, row_for_id};

/// Cache key of the joined operator list.
pub const OPERATORS_CACHE_KEY: &str = "operators:list";

const TABLE: &str = "operators";
const JOINED_RPC: &str = "get_operators_joined";
const TRUCK_LINKS: &str = "operator_trucks";
const PROJECT_LINKS: &str = "operator_projects";

pub struct OperatorService {
    backend: Arc<dyn DataBackend>,
    cache: TtlCache<Vec<Operator>>,
    ttl: Duration,
}

impl OperatorService {
    pub fn new(backend: Arc<dyn DataBackend>, cache: TtlCache<Vec<Operator>>, ttl: Duration) -> Self {
        Self {
            backend,
            cache,
            ttl,
        }
    }

    pub fn cache(&self) -> &TtlCache<Vec<Operator>> {
        &self.cache
    }

    /// Operators with their linked trucks and projects.
    pub async fn list(&self) -> DataResult<Vec<Operator>> {
        let read = self
            .cache
            .get_or_fetch(OPERATORS_CACHE_KEY, self.ttl, || self.fetch_joined())
            .await;
        match read {
            Ok(read) => {
                tracing::debug!(cache_hit = read.was_cache_hit(), "operators listed");
                DataResult::ok(read.into_value())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to list operators");
                DataResult::err(e)
            }
        }
    }

    async fn fetch_joined(&self) -> HaulResult<Vec<Operator>> {
        let payload = self.backend.rpc(JOINED_RPC, json!({})).await?;
        if payload.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(payload).map_err(|e| HaulError::decode(format!("rpc {}", JOINED_RPC), e))
    }

    /// Whether an operator already uses `login`.
    pub async fn login_exists(&self, login: &str) -> DataResult<bool> {
        self.check_login(login).await.into()
    }

    async fn check_login(&self, login: &str) -> HaulResult<bool> {
        let query = Query::table(TABLE).columns(["id"]).eq("login", login).limit(1);
        Ok(!self.backend.select(&query).await?.is_empty())
    }

    /// Create an operator. Name, login and password are required and the
    /// login must be unused.
    pub async fn create(&self, payload: &OperatorPayload) -> DataResult<Operator> {
        let result = self.try_create(payload).await;
        if let Err(e) = &result {
            tracing::warn!(login = payload.login.as_str(), error = %e, "operator not created");
        }
        result.into()
    }

    async fn try_create(&self, payload: &OperatorPayload) -> HaulResult<Operator> {
        validate_identity(payload)?;
        if payload.password.as_deref().map_or(true, |p| p.is_empty()) {
            return Err(required("password"));
        }
        if self.check_login(&payload.login).await? {
            return Err(ValidationError::DuplicateLogin {
                login: payload.login.clone(),
            }
            .into());
        }

        let row = to_row("insert operators", payload)?;
        let inserted = self.backend.insert(TABLE, vec![row]).await;
        self.invalidate().await;
        let operator: Operator = inserted_row("insert operators", inserted?)?;
        tracing::info!(operator_id = operator.id, "operator created");
        Ok(operator)
    }

    /// Update name, login, phone and project. The password is never changed
    /// here.
    pub async fn update(&self, id: RowId, payload: &OperatorPayload) -> DataResult<Operator> {
        self.try_update(id, payload).await.into()
    }

    async fn try_update(&self, id: RowId, payload: &OperatorPayload) -> HaulResult<Operator> {
        validate_identity(payload)?;
        let payload = OperatorPayload {
            password: None,
            ..payload.clone()
        };
        let row = to_row("update operators", &payload)?;
        let updated = self.backend.update(TABLE, row, &[Filter::eq("id", id)]).await;
        self.invalidate().await;
        row_for_id("update operators", "operator", id, updated?)
    }

    pub async fn delete(&self, id: RowId) -> DataResult<Operator> {
        let deleted = self.backend.delete(TABLE, &[Filter::eq("id", id)]).await;
        self.invalidate().await;
        deleted
            .and_then(|rows| row_for_id::<Operator>("delete operators", "operator", id, rows))
            .into()
    }

    /// Replace the trucks linked to an operator.
    pub async fn set_trucks(&self, operator_id: RowId, truck_ids: &[RowId]) -> DataResult<()> {
        self.replace_links(TRUCK_LINKS, "truck_id", operator_id, truck_ids)
            .await
            .into()
    }

    /// Replace the projects linked to an operator.
    pub async fn set_projects(&self, operator_id: RowId, project_ids: &[RowId]) -> DataResult<()> {
        self.replace_links(PROJECT_LINKS, "project_id", operator_id, project_ids)
            .await
            .into()
    }

    async fn replace_links(
        &self,
        table: &str,
        column: &str,
        operator_id: RowId,
        ids: &[RowId],
    ) -> HaulResult<()> {
        let result = self.write_links(table, column, operator_id, ids).await;
        self.invalidate().await;
        if let Err(e) = &result {
            tracing::error!(table, operator_id, error = %e, "failed to replace operator links");
        }
        result
    }

    async fn write_links(
        &self,
        table: &str,
        column: &str,
        operator_id: RowId,
        ids: &[RowId],
    ) -> HaulResult<()> {
        self.backend
            .delete(table, &[Filter::eq("operator_id", operator_id)])
            .await?;
        if ids.is_empty() {
            return Ok(());
        }
        let rows: Vec<Row> = ids
            .iter()
            .map(|id| {
                let mut row = Row::new();
                row.insert("operator_id".to_string(), Value::from(operator_id));
                row.insert(column.to_string(), Value::from(*id));
                row
            })
            .collect();
        self.backend.insert(table, rows).await?;
        Ok(())
    }

    async fn invalidate(&self) {
        self.cache.invalidate(OPERATORS_CACHE_KEY).await;
    }
}

fn validate_identity(payload: &OperatorPayload) -> HaulResult<()> {
    if payload.name.trim().is_empty() {
        return Err(required("name"));
    }
    if payload.login.trim().is_empty() {
        return Err(required("login"));
    }
    Ok(())
}

fn required(field: &str) -> HaulError {
    ValidationError::RequiredFieldMissing {
        field: field.to_string(),
    }
    .into()
}
