//! Client accessors.

use std::sync::Arc;

use haulboard_core::{rows_into, Client, HaulResult};
use haulboard_storage::{DataBackend, Embed, Query, SortDirection};

/// Client (customer) reads.
pub struct ClientService {
    backend: Arc<dyn DataBackend>,
}

impl ClientService {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    pub async fn list(&self) -> HaulResult<Vec<Client>> {
        let rows = self.backend.select(&Query::table("clients")).await?;
        rows_into("select clients", rows)
    }

    /// Clients ordered by name, each with its projects embedded.
    pub async fn with_projects(&self) -> HaulResult<Vec<Client>> {
        let query = Query::table("clients")
            .embed(Embed::to_many("projects", Vec::<String>::new(), "client_id"))
            .order_by("name", SortDirection::Asc);
        let rows = self.backend.select(&query).await?;
        rows_into("select clients", rows)
    }
}
