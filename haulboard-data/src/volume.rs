//! Daily transported volume with tiered fallback.
//!
//! Strategies are tried in order and the first success wins:
//!
//! 1. [`ServerAggregationStrategy`]: the `get_daily_volume` procedure.
//! 2. [`ClientAggregationStrategy`]: sum completed trips per local day.
//! 3. [`placeholder_series`]: zero volume for every day, cannot fail.
//!
//! Every tier returns one point per day for the same window, so callers
//! render the result without caring which tier produced it. The tier is
//! still carried in [`VolumeSeries`] for diagnostics.

use std::collections::BTreeMap;
use std::sync::Arc;

use ::async_trait::async_trait;
use chrono::{Days, NaiveDate};
use haulboard_core::{rows_into, DailyVolumePoint, HaulError, HaulResult, Timestamp, TripStatus};
use haulboard_storage::{DataBackend, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::calendar::Calendar;

/// Remote procedure computing the series server-side.
pub const DAILY_VOLUME_RPC: &str = "get_daily_volume";

/// Which tier produced a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    ServerAggregated,
    ClientAggregated,
    Placeholder,
}

/// A daily volume series tagged with its producing tier.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeSeries {
    ServerAggregated(Vec<DailyVolumePoint>),
    ClientAggregated(Vec<DailyVolumePoint>),
    Placeholder(Vec<DailyVolumePoint>),
}

impl VolumeSeries {
    pub fn source(&self) -> VolumeSource {
        match self {
            Self::ServerAggregated(_) => VolumeSource::ServerAggregated,
            Self::ClientAggregated(_) => VolumeSource::ClientAggregated,
            Self::Placeholder(_) => VolumeSource::Placeholder,
        }
    }

    pub fn points(&self) -> &[DailyVolumePoint] {
        match self {
            Self::ServerAggregated(points)
            | Self::ClientAggregated(points)
            | Self::Placeholder(points) => points,
        }
    }

    /// Drop the tier tag.
    pub fn into_points(self) -> Vec<DailyVolumePoint> {
        match self {
            Self::ServerAggregated(points)
            | Self::ClientAggregated(points)
            | Self::Placeholder(points) => points,
        }
    }

    pub fn total_volume(&self) -> f64 {
        self.points().iter().map(|p| p.total_volume).sum()
    }
}

/// The days a series covers: `days` consecutive local dates ending `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeWindow {
    days: u32,
    calendar: Calendar,
}

impl VolumeWindow {
    /// A window of `days` days; zero is treated as one.
    pub fn new(days: u32, calendar: Calendar) -> Self {
        Self {
            days: days.max(1),
            calendar,
        }
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.calendar.trailing_days(self.days)
    }

    /// Start of the first day, inclusive.
    pub fn start(&self) -> Timestamp {
        let today = self.calendar.today();
        let first = today
            .checked_sub_days(Days::new(self.days as u64 - 1))
            .unwrap_or(today);
        self.calendar.start_of_day(first)
    }

    /// Start of the day after today, exclusive.
    pub fn end(&self) -> Timestamp {
        let today = self.calendar.today();
        let next = today.checked_add_days(Days::new(1)).unwrap_or(today);
        self.calendar.start_of_day(next)
    }
}

/// One way of producing the series.
#[async_trait]
pub trait VolumeStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn daily_volume(&self, window: &VolumeWindow) -> HaulResult<VolumeSeries>;
}

// ============================================================================
// TIER 1
// ============================================================================

/// Calls the server-side aggregation and returns its rows as-is.
pub struct ServerAggregationStrategy {
    backend: Arc<dyn DataBackend>,
}

impl ServerAggregationStrategy {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl VolumeStrategy for ServerAggregationStrategy {
    fn name(&self) -> &'static str {
        "server_aggregation"
    }

    async fn daily_volume(&self, window: &VolumeWindow) -> HaulResult<VolumeSeries> {
        let payload = self
            .backend
            .rpc(DAILY_VOLUME_RPC, json!({ "days_count": window.days() }))
            .await?;
        let operation = format!("rpc {}", DAILY_VOLUME_RPC);
        let points: Vec<DailyVolumePoint> = if payload.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(payload).map_err(|e| HaulError::decode(&operation, e))?
        };
        // A window always has at least one day, so no rows means no answer.
        if points.is_empty() {
            return Err(HaulError::decode(operation, "no rows for the requested window"));
        }
        Ok(VolumeSeries::ServerAggregated(points))
    }
}

// ============================================================================
// TIER 2
// ============================================================================

#[derive(Debug, Deserialize)]
struct CompletedTrip {
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    end_time: Option<Timestamp>,
}

/// Sums completed trips per local calendar day.
pub struct ClientAggregationStrategy {
    backend: Arc<dyn DataBackend>,
}

impl ClientAggregationStrategy {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl VolumeStrategy for ClientAggregationStrategy {
    fn name(&self) -> &'static str {
        "client_aggregation"
    }

    async fn daily_volume(&self, window: &VolumeWindow) -> HaulResult<VolumeSeries> {
        let query = Query::table("trips")
            .columns(["volume", "end_time"])
            .eq("status", TripStatus::Completed.as_db_str())
            .gte("end_time", window.start().to_rfc3339())
            .lt("end_time", window.end().to_rfc3339());
        let rows = self.backend.select(&query).await?;
        let trips: Vec<CompletedTrip> = rows_into("select trips", rows)?;

        let mut buckets: BTreeMap<NaiveDate, f64> =
            window.dates().into_iter().map(|date| (date, 0.0)).collect();
        for trip in trips {
            let Some(end_time) = trip.end_time else {
                continue;
            };
            let date = window.calendar().local_date(end_time);
            // Rows outside the window are ignored rather than trusted.
            if let Some(total) = buckets.get_mut(&date) {
                *total += trip.volume.unwrap_or(0.0);
            }
        }

        Ok(VolumeSeries::ClientAggregated(
            buckets
                .into_iter()
                .map(|(date, total_volume)| DailyVolumePoint { date, total_volume })
                .collect(),
        ))
    }
}

// ============================================================================
// TIER 3
// ============================================================================

/// Zero volume for every day of the window, ascending.
pub fn placeholder_series(window: &VolumeWindow) -> VolumeSeries {
    VolumeSeries::Placeholder(
        window
            .dates()
            .into_iter()
            .map(DailyVolumePoint::zero)
            .collect(),
    )
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Ordered fallback over [`VolumeStrategy`] tiers.
pub struct VolumePipeline {
    strategies: Vec<Box<dyn VolumeStrategy>>,
    calendar: Calendar,
}

impl VolumePipeline {
    /// Server aggregation, then client aggregation.
    pub fn new(backend: Arc<dyn DataBackend>, calendar: Calendar) -> Self {
        Self::with_strategies(
            vec![
                Box::new(ServerAggregationStrategy::new(Arc::clone(&backend))),
                Box::new(ClientAggregationStrategy::new(backend)),
            ],
            calendar,
        )
    }

    pub fn with_strategies(strategies: Vec<Box<dyn VolumeStrategy>>, calendar: Calendar) -> Self {
        Self {
            strategies,
            calendar,
        }
    }

    /// Evaluate "today" with a different calendar.
    pub fn as_of(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Daily volume for the last `days` days, never failing.
    ///
    /// Each strategy gets one attempt. When all fail the placeholder series
    /// is returned.
    pub async fn daily_volume(&self, days: u32) -> VolumeSeries {
        let window = VolumeWindow::new(days, self.calendar);
        for strategy in &self.strategies {
            match strategy.daily_volume(&window).await {
                Ok(series) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        days = window.days(),
                        "daily volume resolved"
                    );
                    return series;
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "daily volume strategy failed, falling back"
                    );
                }
            }
        }
        tracing::error!(days = window.days(), "all daily volume strategies failed, using placeholder");
        placeholder_series(&window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use haulboard_core::BackendError;
    use haulboard_storage::MockBackend;
    use serde_json::Value;

    fn calendar() -> Calendar {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap();
        Calendar::pinned(now, FixedOffset::west_opt(3 * 3600).unwrap())
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn trips_backend() -> MockBackend {
        MockBackend::new().with_table("trips", ["id", "status", "volume", "end_time"])
    }

    fn down() -> BackendError {
        BackendError::Request {
            operation: "rpc".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_window_bounds_are_local_days() {
        let window = VolumeWindow::new(7, calendar());
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2024, 3, 3, 3, 0, 0).unwrap());
        assert_eq!(window.end(), Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap());
        assert_eq!(window.dates().first(), Some(&date(3)));
        assert_eq!(window.dates().last(), Some(&date(9)));
    }

    #[test]
    fn test_zero_days_is_one() {
        let window = VolumeWindow::new(0, calendar());
        assert_eq!(window.days(), 1);
        assert_eq!(placeholder_series(&window).points(), &[DailyVolumePoint::zero(date(9))]);
    }

    #[tokio::test]
    async fn test_server_rows_returned_verbatim() {
        let backend = trips_backend();
        backend.register_rpc(DAILY_VOLUME_RPC, |params| {
            assert_eq!(params["days_count"], 2);
            Ok(json!([
                {"date": "2024-03-08", "total_volume": 30.5},
                {"date": "2024-03-09", "total_volume": 12}
            ]))
        });
        let pipeline = VolumePipeline::new(Arc::new(backend.clone()), calendar());

        let series = pipeline.daily_volume(2).await;
        assert_eq!(series.source(), VolumeSource::ServerAggregated);
        assert_eq!(series.total_volume(), 42.5);
        assert_eq!(backend.call_count("select trips"), 0);
    }

    #[tokio::test]
    async fn test_client_bucketing_zero_fills() {
        let backend = trips_backend();
        backend.fail_rpc(DAILY_VOLUME_RPC, down());
        backend.seed(
            "trips",
            vec![
                // 2024-03-05 locally.
                json!({"status": "completed", "volume": 10, "end_time": "2024-03-05T14:00:00Z"}),
                // 01:00Z on the 8th is still the 7th at -03:00.
                json!({"status": "completed", "volume": 5, "end_time": "2024-03-08T01:00:00Z"}),
                json!({"status": "ongoing", "volume": 99, "end_time": null}),
                // Before the window.
                json!({"status": "completed", "volume": 50, "end_time": "2024-03-01T12:00:00Z"}),
            ],
        );
        let pipeline = VolumePipeline::new(Arc::new(backend), calendar());

        let series = pipeline.daily_volume(7).await;
        assert_eq!(series.source(), VolumeSource::ClientAggregated);
        let volumes: Vec<(NaiveDate, f64)> = series
            .points()
            .iter()
            .map(|p| (p.date, p.total_volume))
            .collect();
        assert_eq!(
            volumes,
            vec![
                (date(3), 0.0),
                (date(4), 0.0),
                (date(5), 10.0),
                (date(6), 0.0),
                (date(7), 5.0),
                (date(8), 0.0),
                (date(9), 0.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_server_rows_fall_through() {
        let backend = trips_backend();
        backend.register_rpc(DAILY_VOLUME_RPC, |_| Ok(json!({"unexpected": true})));
        let pipeline = VolumePipeline::new(Arc::new(backend.clone()), calendar());

        let series = pipeline.daily_volume(3).await;
        assert_eq!(series.source(), VolumeSource::ClientAggregated);
        assert_eq!(series.points().len(), 3);
        assert_eq!(backend.call_count("select trips"), 1);
    }

    #[tokio::test]
    async fn test_empty_server_payload_falls_through() {
        for payload in [Value::Null, json!([])] {
            let backend = trips_backend();
            backend.register_rpc(DAILY_VOLUME_RPC, move |_| Ok(payload.clone()));
            let pipeline = VolumePipeline::new(Arc::new(backend.clone()), calendar());

            let series = pipeline.daily_volume(4).await;
            assert_eq!(series.source(), VolumeSource::ClientAggregated);
            assert_eq!(series.points().len(), 4);
        }
    }

    #[tokio::test]
    async fn test_double_failure_yields_placeholder() {
        let backend = trips_backend();
        backend.fail_rpc(DAILY_VOLUME_RPC, down());
        backend.fail_table("trips", down());
        let pipeline = VolumePipeline::new(Arc::new(backend.clone()), calendar());

        let series = pipeline.daily_volume(3).await;
        assert_eq!(series.source(), VolumeSource::Placeholder);
        assert_eq!(
            series.into_points(),
            vec![
                DailyVolumePoint::zero(date(7)),
                DailyVolumePoint::zero(date(8)),
                DailyVolumePoint::zero(date(9)),
            ]
        );
        // One attempt per tier, no retries.
        assert_eq!(backend.call_count("rpc get_daily_volume"), 1);
        assert_eq!(backend.call_count("select trips"), 1);
    }

    struct Fixed(VolumeSource);

    #[async_trait]
    impl VolumeStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn daily_volume(&self, window: &VolumeWindow) -> HaulResult<VolumeSeries> {
            let points = placeholder_series(window).into_points();
            Ok(match self.0 {
                VolumeSource::ServerAggregated => VolumeSeries::ServerAggregated(points),
                VolumeSource::ClientAggregated => VolumeSeries::ClientAggregated(points),
                VolumeSource::Placeholder => VolumeSeries::Placeholder(points),
            })
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let pipeline = VolumePipeline::with_strategies(
            vec![
                Box::new(Fixed(VolumeSource::ClientAggregated)),
                Box::new(Fixed(VolumeSource::ServerAggregated)),
            ],
            calendar(),
        );
        assert_eq!(pipeline.daily_volume(1).await.source(), VolumeSource::ClientAggregated);

        let empty = VolumePipeline::with_strategies(Vec::new(), calendar());
        assert_eq!(empty.daily_volume(4).await.points().len(), 4);
    }
}
