//! Project accessors split by status.

use std::sync::Arc;

use haulboard_core::{
    rows_into, to_row, HaulResult, NewProject, Project, ProjectPatch, ProjectStatus, RowId,
};
use haulboard_storage::{DataBackend, Filter, Query};
use serde::Deserialize;

use super::{inserted_row, row_for_id};

const TABLE: &str = "projects";

#[derive(Deserialize)]
struct ClientId {
    id: RowId,
}

/// Project (job site) accessors.
pub struct ProjectService {
    backend: Arc<dyn DataBackend>,
}

impl ProjectService {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    pub async fn active(&self) -> HaulResult<Vec<Project>> {
        self.by_status(ProjectStatus::Active).await
    }

    pub async fn completed(&self) -> HaulResult<Vec<Project>> {
        self.by_status(ProjectStatus::Completed).await
    }

    async fn by_status(&self, status: ProjectStatus) -> HaulResult<Vec<Project>> {
        let query = Query::table(TABLE).eq("status", status.as_db_str());
        let rows = self.backend.select(&query).await?;
        rows_into("select projects", rows)
    }

    /// Insert a project, resolving `client` to `client_id` by name.
    ///
    /// An unknown client name is not an error; the project is stored without
    /// a `client_id`.
    pub async fn create(&self, project: &NewProject) -> HaulResult<Project> {
        let mut project = project.clone();
        if project.client_id.is_none() {
            if let Some(client) = project.client.as_deref() {
                project.client_id = self.resolve_client(client).await;
            }
        }

        let row = to_row("insert projects", &project)?;
        let rows = self.backend.insert(TABLE, vec![row]).await?;
        let created: Project = inserted_row("insert projects", rows)?;
        tracing::info!(project_id = created.id, "project created");
        Ok(created)
    }

    async fn resolve_client(&self, name: &str) -> Option<RowId> {
        let query = Query::table("clients").columns(["id"]).eq("name", name).limit(1);
        let rows = match self.backend.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(client = name, error = %e, "client lookup failed");
                return None;
            }
        };
        let found = rows_into::<ClientId>("select clients", rows)
            .ok()
            .and_then(|ids| ids.into_iter().next())
            .map(|c| c.id);
        if found.is_none() {
            tracing::debug!(client = name, "no client with that name");
        }
        found
    }

    pub async fn update(&self, id: RowId, patch: &ProjectPatch) -> HaulResult<Project> {
        let row = to_row("update projects", patch)?;
        let rows = self
            .backend
            .update(TABLE, row, &[Filter::eq("id", id)])
            .await?;
        row_for_id("update projects", "project", id, rows)
    }

    /// Mark a project completed.
    pub async fn complete(&self, id: RowId) -> HaulResult<Project> {
        self.update(
            id,
            &ProjectPatch {
                status: Some(ProjectStatus::Completed),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: RowId) -> HaulResult<Project> {
        let rows = self.backend.delete(TABLE, &[Filter::eq("id", id)]).await?;
        row_for_id("delete projects", "project", id, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulboard_storage::MockBackend;
    use serde_json::json;

    fn backend() -> MockBackend {
        let backend = MockBackend::new()
            .with_table("clients", ["id", "name"])
            .with_table(
                "projects",
                ["id", "name", "client", "client_id", "status", "location", "volume", "created_at"],
            );
        backend.seed("clients", vec![json!({"id": 3, "name": "Construtora Horizonte"})]);
        backend
    }

    fn new_project(client: Option<&str>) -> NewProject {
        NewProject {
            name: "Quarry North".to_string(),
            client: client.map(str::to_string),
            client_id: None,
            status: ProjectStatus::Active,
            location: Some("Km 42".to_string()),
            volume: Some(1200.0),
        }
    }

    #[tokio::test]
    async fn test_create_resolves_client_name() {
        let backend = backend();
        let service = ProjectService::new(Arc::new(backend.clone()));

        let project = service
            .create(&new_project(Some("Construtora Horizonte")))
            .await
            .unwrap();
        assert_eq!(project.client_id, Some(3));
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn test_create_with_unknown_client_keeps_going() {
        let service = ProjectService::new(Arc::new(backend()));
        let project = service.create(&new_project(Some("Nobody"))).await.unwrap();
        assert_eq!(project.client_id, None);
        assert_eq!(project.client.as_deref(), Some("Nobody"));
    }

    #[tokio::test]
    async fn test_status_lists_and_complete() {
        let service = ProjectService::new(Arc::new(backend()));
        let created = service.create(&new_project(None)).await.unwrap();
        assert_eq!(service.active().await.unwrap().len(), 1);
        assert!(service.completed().await.unwrap().is_empty());

        let done = service.complete(created.id).await.unwrap();
        assert_eq!(done.status, ProjectStatus::Completed);
        assert!(service.active().await.unwrap().is_empty());
        assert_eq!(service.completed().await.unwrap().len(), 1);

        assert_eq!(service.delete(created.id).await.unwrap().id, created.id);
        assert!(service.delete(created.id).await.is_err());
    }
}
