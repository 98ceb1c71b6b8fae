use haulboard_core::{DailyVolumePoint, Trip};
use serde::Serialize;

use super::TripService;
use crate::volume::{VolumePipeline, VolumeSource};

/// Everything the dashboard home page renders, read concurrently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DashboardSnapshot {
    pub volume: Vec<DailyVolumePoint>,
    pub volume_source: VolumeSource,
    pub total_volume: f64,
    pub ongoing_trips: Vec<Trip>,
    pub recent_trips: Vec<Trip>,
}

pub struct Dashboard {
    volume: VolumePipeline,
    trips: TripService,
}

impl Dashboard {
    pub fn new(volume: VolumePipeline, trips: TripService) -> Self {
        Self { volume, trips }
    }

    /// Volume for the last `days` days plus both trip feeds.
    ///
    /// Never fails: each part degrades on its own.
    pub async fn snapshot(&self, days: u32, history_limit: u32) -> DashboardSnapshot {
        let (series, ongoing_trips, recent_trips) = tokio::join!(
            self.volume.daily_volume(days),
            self.trips.ongoing(),
            self.trips.history(history_limit),
        );
        tracing::info!(
            volume_source = ?series.source(),
            ongoing = ongoing_trips.len(),
            recent = recent_trips.len(),
            "dashboard snapshot assembled"
        );
        DashboardSnapshot {
            volume_source: series.source(),
            total_volume: series.total_volume(),
            volume: series.into_points(),
            ongoing_trips,
            recent_trips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::volume::DAILY_VOLUME_RPC;
    use chrono::{FixedOffset, TimeZone, Utc};
    use haulboard_core::BackendError;
    use haulboard_storage::MockBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn dashboard(backend: &MockBackend) -> Dashboard {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let calendar = Calendar::pinned(now, FixedOffset::east_opt(0).unwrap());
        let backend: Arc<MockBackend> = Arc::new(backend.clone());
        Dashboard::new(
            VolumePipeline::new(backend.clone(), calendar),
            TripService::new(backend, calendar),
        )
    }

    #[tokio::test]
    async fn test_snapshot_uses_server_series() {
        let backend = MockBackend::new()
            .with_table("trucks", ["id", "name"])
            .with_table("projects", ["id", "name"])
            .with_table("trips", ["id", "truck_id", "project_id", "status", "volume", "start_time", "end_time"]);
        backend.seed(
            "trips",
            vec![json!({"status": "ongoing", "volume": 8, "start_time": "2024-03-09T07:00:00Z"})],
        );
        backend.register_rpc(DAILY_VOLUME_RPC, |_| {
            Ok(json!([
                {"date": "2024-03-08", "total_volume": 20},
                {"date": "2024-03-09", "total_volume": 12.5}
            ]))
        });

        let snapshot = dashboard(&backend).snapshot(2, 10).await;
        assert_eq!(snapshot.volume_source, VolumeSource::ServerAggregated);
        assert_eq!(snapshot.total_volume, 32.5);
        assert_eq!(snapshot.ongoing_trips.len(), 1);
        assert!(snapshot.recent_trips.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_degrades_to_placeholder() {
        let backend = MockBackend::new();
        backend.fail_rpc(
            DAILY_VOLUME_RPC,
            BackendError::Unavailable {
                capability: DAILY_VOLUME_RPC.to_string(),
            },
        );

        let snapshot = dashboard(&backend).snapshot(3, 10).await;
        assert_eq!(snapshot.volume_source, VolumeSource::Placeholder);
        assert_eq!(snapshot.volume.len(), 3);
        assert_eq!(snapshot.total_volume, 0.0);
        assert!(snapshot.ongoing_trips.is_empty());

        let body = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(body["volume_source"], "placeholder");
        assert_eq!(body["volume"][0]["date"], "2024-03-07");
    }
}
