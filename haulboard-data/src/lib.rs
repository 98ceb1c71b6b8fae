//! Haulboard Data - Schema-Tolerant Data Access
//!
//! Data access for the fleet operations dashboard. The hosted database has
//! been migrated by hand over time, so several `trucks` columns exist under
//! more than one name. This crate discovers which ones are present, adapts
//! writes to them, and degrades reads instead of failing the page.
//!
//! Entry points:
//! - [`DataContext`] builds every accessor around one [`DataBackend`]
//! - [`PostgrestBackend`] talks to the hosted REST API
//! - [`VolumePipeline`] resolves the daily volume series with fallback tiers

pub mod calendar;
pub mod context;
pub mod mapper;
pub mod postgrest;
pub mod schema;
pub mod services;
pub mod telemetry;
pub mod volume;

pub use calendar::Calendar;
pub use context::DataContext;
pub use mapper::adapt_truck_record;
pub use postgrest::{is_valid_identifier, PostgrestBackend};
pub use schema::{ColumnProbe, SchemaMemo, SchemaProber, SchemaVerification, SelectColumnProbe};
pub use services::{
    ClientService, Dashboard, DashboardSnapshot, OperatorService, ProjectService, SchemaRepair,
    TripService, TruckService, EXECUTE_SQL_RPC, OPERATORS_CACHE_KEY,
};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
pub use volume::{
    placeholder_series, ClientAggregationStrategy, ServerAggregationStrategy, VolumePipeline,
    VolumeSeries, VolumeSource, VolumeStrategy, VolumeWindow, DAILY_VOLUME_RPC,
};

pub use haulboard_storage::{DataBackend, MockBackend, TtlCache};
