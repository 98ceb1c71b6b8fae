//! Ongoing and recent trip feeds for the dashboard.

use std::sync::Arc;

use chrono::Days;
use haulboard_core::{rows_into, HaulResult, Trip, TripStatus};
use haulboard_storage::{DataBackend, Embed, Query, SortDirection};

use crate::calendar::Calendar;

/// Trip feeds for the dashboard. Both reads log failures and return an
/// empty list.
pub struct TripService {
    backend: Arc<dyn DataBackend>,
    calendar: Calendar,
}

impl TripService {
    pub fn new(backend: Arc<dyn DataBackend>, calendar: Calendar) -> Self {
        Self { backend, calendar }
    }

    fn with_names(query: Query) -> Query {
        query
            .embed(Embed::to_one("trucks", ["name"], "truck_id"))
            .embed(Embed::to_one("projects", ["name"], "project_id"))
    }

    /// Trips in progress, newest start first.
    pub async fn ongoing(&self) -> Vec<Trip> {
        let query = Self::with_names(Query::table("trips"))
            .eq("status", TripStatus::Ongoing.as_db_str())
            .order_by("start_time", SortDirection::Desc);
        self.read_or_empty(&query, "ongoing").await
    }

    /// Completed trips that ended in the last `limit` days, newest first,
    /// at most `limit` of them.
    pub async fn history(&self, limit: u32) -> Vec<Trip> {
        let now = self.calendar.now();
        let since = now.checked_sub_days(Days::new(limit as u64)).unwrap_or(now);
        let query = Self::with_names(Query::table("trips"))
            .eq("status", TripStatus::Completed.as_db_str())
            .gte("end_time", since.to_rfc3339())
            .order_by("end_time", SortDirection::Desc)
            .limit(limit as usize);
        self.read_or_empty(&query, "history").await
    }

    async fn read_or_empty(&self, query: &Query, feed: &'static str) -> Vec<Trip> {
        match self.read(query).await {
            Ok(trips) => trips,
            Err(e) => {
                tracing::error!(feed, error = %e, "failed to read trips");
                Vec::new()
            }
        }
    }

    async fn read(&self, query: &Query) -> HaulResult<Vec<Trip>> {
        let rows = self.backend.select(query).await?;
        rows_into("select trips", rows)
    }
}
