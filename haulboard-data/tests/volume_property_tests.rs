use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use haulboard_data::{Calendar, VolumePipeline, VolumeSource};
use haulboard_test_utils::generators::arb_trip_row;
use haulboard_test_utils::MockBackend;
use proptest::prelude::*;
use serde_json::Value;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Sum of completed volume per local day, computed row by row.
fn expected_total(rows: &[Value], calendar: &Calendar, dates: &[NaiveDate]) -> f64 {
    rows.iter()
        .filter(|row| row["status"] == "completed")
        .filter_map(|row| {
            let end = chrono::DateTime::parse_from_rfc3339(row["end_time"].as_str()?).ok()?;
            let date = calendar.local_date(end.with_timezone(&Utc));
            dates
                .contains(&date)
                .then(|| row["volume"].as_f64().unwrap_or(0.0))
        })
        .sum()
}

proptest! {
    /// Without the server procedure, the client tier yields one point per
    /// day and counts each completed trip once, on its local end date.
    #[test]
    fn client_tier_buckets_completed_trips(
        rows in prop::collection::vec(
            arb_trip_row(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 32),
            0..30,
        ),
        days in 1u32..40,
        offset_hours in -12i32..=14,
    ) {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 15, 0, 0).unwrap();
        let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        let calendar = Calendar::pinned(now, offset);

        let rt = test_runtime()?;
        rt.block_on(async {
            let backend = MockBackend::new()
                .with_table("trips", ["id", "status", "volume", "start_time", "end_time"]);
            backend.seed("trips", rows.clone());
            let pipeline = VolumePipeline::new(Arc::new(backend), calendar);

            let series = pipeline.daily_volume(days).await;
            prop_assert_eq!(series.source(), VolumeSource::ClientAggregated);

            let dates: Vec<NaiveDate> = series.points().iter().map(|p| p.date).collect();
            prop_assert_eq!(dates.len(), days as usize);
            prop_assert_eq!(&dates, &calendar.trailing_days(days));
            prop_assert!(series.points().iter().all(|p| p.total_volume >= 0.0));
            prop_assert_eq!(series.total_volume(), expected_total(&rows, &calendar, &dates));
            Ok(())
        })?;
    }
}
