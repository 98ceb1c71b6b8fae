use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use haulboard_core::{trucks, BackendError, OperatorPayload, TruckPatch};
use haulboard_data::{Calendar, DataBackend, DataContext, VolumeSource};
use haulboard_storage::Filter;
use haulboard_test_utils::assertions::{
    assert_data, assert_error, assert_missing_column, assert_validation_error,
};
use haulboard_test_utils::fixtures::{fleet_backend, minimal_config, seeded_fleet, TruckSchema};
use haulboard_test_utils::MockBackend;
use serde_json::json;

fn context(backend: &MockBackend) -> DataContext {
    let now = Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap();
    let calendar = Calendar::pinned(now, FixedOffset::west_opt(3 * 3600).unwrap());
    DataContext::with_calendar(Arc::new(backend.clone()), &minimal_config(), calendar)
}

fn full_patch() -> TruckPatch {
    TruckPatch::new()
        .with_name("Mercedes Actros")
        .with_load_volume(18.0)
        .with_plate_number("QRS-4821")
        .with_current_project("7")
}

#[tokio::test]
async fn camel_case_only_table_receives_camel_case_columns() {
    let backend = fleet_backend(TruckSchema::CamelCaseOnly);
    let trucks = context(&backend).trucks();

    let created = trucks.create(&full_patch()).await.unwrap();
    assert_eq!(created.load_volume, Some(18.0));
    assert_eq!(created.plate_number.as_deref(), Some("QRS-4821"));
    assert_eq!(created.current_project, None);

    let stored = &backend.rows(trucks::TABLE_NAME)[0];
    assert_eq!(stored[trucks::LOAD_VOLUME_CAMEL], 18);
    assert_eq!(stored[trucks::PLATE_NUMBER_CAMEL], "QRS-4821");
    assert!(!stored.contains_key(trucks::LOAD_VOLUME));
    assert!(!stored.contains_key(trucks::CURRENT_PROJECT));
}

#[tokio::test]
async fn legacy_table_links_trucks_by_project_id() {
    let backend = fleet_backend(TruckSchema::Legacy);
    let trucks = context(&backend).trucks();

    let assigned = trucks.create(&full_patch()).await.unwrap();
    assert_eq!(assigned.project_id, Some(7));
    trucks
        .create(&TruckPatch::new().with_name("DAF XF").with_load_volume(14.0))
        .await
        .unwrap();

    let active = trucks.active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Mercedes Actros");
    let inactive = trucks.inactive().await;
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].name, "DAF XF");
}

#[tokio::test]
async fn unassigned_canonical_fleet_is_all_active() {
    let backend = seeded_fleet(TruckSchema::Canonical);
    let trucks = context(&backend).trucks();

    let active = trucks.active().await;
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].name, "Scania R450");
    assert_eq!(trucks.inactive().await.len(), 2);

    let moved = trucks
        .update(1, &TruckPatch::new().with_current_project("Quarry North"))
        .await
        .unwrap();
    assert_eq!(moved.current_project.as_deref(), Some("Quarry North"));
    assert_eq!(moved.project_id, None);
    assert_eq!(trucks.active().await.len(), 1);
}

#[tokio::test]
async fn schema_verification_survives_catalog_outage() {
    let backend = fleet_backend(TruckSchema::Legacy);
    backend.fail_catalog(BackendError::Unavailable {
        capability: "execute_sql".to_string(),
    });
    let verification = context(&backend).prober().verify_or_default("trucks").await;

    assert!(!verification.degraded);
    assert!(verification.columns.load_volume_camel);
    assert!(verification.columns.project_id);
    assert!(!verification.columns.current_project);
    assert_eq!(backend.call_count("select trucks"), trucks::PROBED_COLUMNS.len());
}

#[tokio::test]
async fn dashboard_aggregates_trips_without_server_procedure() {
    let backend = seeded_fleet(TruckSchema::Canonical);
    backend.seed(
        "trips",
        vec![
            json!({"truck_id": 1, "project_id": 1, "status": "completed", "volume": 10, "start_time": "2024-03-07T20:00:00Z", "end_time": "2024-03-08T02:00:00Z"}),
            json!({"truck_id": 2, "project_id": 1, "status": "completed", "volume": 5, "start_time": "2024-03-09T10:00:00Z", "end_time": "2024-03-09T12:00:00Z"}),
            json!({"truck_id": 1, "project_id": 1, "status": "ongoing", "volume": 12, "start_time": "2024-03-09T14:00:00Z"}),
        ],
    );

    let snapshot = context(&backend).dashboard().snapshot(3, 10).await;

    assert_eq!(snapshot.volume_source, VolumeSource::ClientAggregated);
    let days: Vec<(NaiveDate, f64)> = snapshot
        .volume
        .iter()
        .map(|p| (p.date, p.total_volume))
        .collect();
    assert_eq!(
        days,
        vec![
            (NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), 10.0),
            (NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(), 0.0),
            (NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), 5.0),
        ]
    );
    assert_eq!(snapshot.total_volume, 15.0);

    assert_eq!(snapshot.ongoing_trips.len(), 1);
    assert_eq!(
        snapshot.ongoing_trips[0].trucks.as_ref().map(|t| t.name.as_str()),
        Some("Volvo FH 540")
    );
    let recent: Vec<f64> = snapshot.recent_trips.iter().map(|t| t.volume).collect();
    assert_eq!(recent, vec![5.0, 10.0]);
}

fn operator(name: &str, login: &str, password: Option<&str>) -> OperatorPayload {
    OperatorPayload {
        name: name.to_string(),
        login: login.to_string(),
        phone: None,
        project_id: Some(1),
        password: password.map(str::to_string),
    }
}

#[tokio::test]
async fn operator_writes_report_validation_in_result_shape() {
    let backend = seeded_fleet(TruckSchema::Canonical);
    let operators = context(&backend).operators();

    let created = operators
        .create(&operator("Maria Santos", "maria.santos", Some("s3cret")))
        .await;
    assert_data(&created);

    let duplicate = operators
        .create(&operator("Maria Souza", "maria.santos", Some("hunter2")))
        .await;
    assert_error(&duplicate);
    assert_validation_error(&duplicate);

    let no_password = operators.create(&operator("Ana", "ana.rodrigues", None)).await;
    assert_validation_error(&no_password);
    assert_eq!(backend.rows("operators").len(), 1);
}

#[tokio::test]
async fn writes_to_absent_columns_report_missing_column() {
    let backend = seeded_fleet(TruckSchema::Legacy);
    let mut patch = haulboard_core::Row::new();
    patch.insert(trucks::CURRENT_PROJECT.to_string(), json!("Quarry North"));

    let result = backend
        .update(trucks::TABLE_NAME, patch, &[Filter::eq("id", 1)])
        .await;
    assert_missing_column(&result);
}
