//! Haulboard Test Utilities
//!
//! Shared test infrastructure for the Haulboard workspace:
//! - Proptest generators for column availability, truck patches and trips
//! - Mock backends seeded with the known `trucks` schema variants
//! - Assertions on the `{ data, error }` result shape

pub use haulboard_storage::MockBackend;

pub use haulboard_core::{
    trucks, BackendConfig, ColumnAvailability, DataResult, HaulError, HaulResult,
    HaulboardConfig, Timestamp, TripStatus, TruckPatch, ValidationError,
};

use chrono::Utc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Haulboard types.

    use super::*;
    use proptest::prelude::*;

    /// Any combination of the probed column flags.
    pub fn arb_column_availability() -> impl Strategy<Value = ColumnAvailability> {
        any::<[bool; 6]>().prop_map(|flags| ColumnAvailability {
            current_project: flags[0],
            project_id: flags[1],
            load_volume: flags[2],
            load_volume_camel: flags[3],
            plate_number: flags[4],
            plate_number_camel: flags[5],
        })
    }

    /// A project reference as typed into the truck form: numeric ids,
    /// padded ids and free text.
    pub fn arb_project_ref() -> impl Strategy<Value = String> {
        prop_oneof![
            (1i64..10_000).prop_map(|id| id.to_string()),
            (1i64..10_000).prop_map(|id| format!(" {} ", id)),
            "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,10})?",
        ]
    }

    pub fn arb_truck_patch() -> impl Strategy<Value = TruckPatch> {
        (
            proptest::option::of("[A-Z][a-z]{2,8} [A-Z0-9]{2,5}"),
            proptest::option::of(prop_oneof![(1u32..60).prop_map(f64::from), 0.5f64..60.0]),
            proptest::option::of("[A-Z]{3}-[0-9]{4}"),
            proptest::option::of(proptest::option::of(arb_project_ref())),
        )
            .prop_map(|(name, load_volume, plate_number, current_project)| TruckPatch {
                name,
                load_volume,
                plate_number,
                current_project,
            })
    }

    /// A timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_trip_status() -> impl Strategy<Value = TripStatus> {
        prop_oneof![Just(TripStatus::Ongoing), Just(TripStatus::Completed)]
    }

    /// A `trips` row as stored by the backend, starting within `span_days`
    /// days after `from`. Completed rows end up to six hours later; some
    /// rows have no recorded volume.
    pub fn arb_trip_row(from: Timestamp, span_days: i64) -> impl Strategy<Value = serde_json::Value> {
        (
            arb_trip_status(),
            proptest::option::weighted(0.8, 0u32..40),
            0i64..(span_days.max(1) * 86_400),
            10i64..(6 * 3600),
        )
            .prop_map(move |(status, volume, offset, seconds)| {
                let start = from + chrono::Duration::seconds(offset);
                let end = start + chrono::Duration::seconds(seconds);
                serde_json::json!({
                    "status": status.as_db_str(),
                    "volume": volume,
                    "start_time": start.to_rfc3339(),
                    "end_time": match status {
                        TripStatus::Completed => serde_json::Value::from(end.to_rfc3339()),
                        _ => serde_json::Value::Null,
                    },
                })
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built backends and configs for common scenarios.

    use super::*;
    use serde_json::json;

    /// Deployed variants of the `trucks` table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TruckSchema {
        /// Every canonical snake_case column.
        Canonical,
        /// Only the camelCase volume and plate columns, no project link.
        CamelCaseOnly,
        /// `loadVolume`, `plate_number` and `project_id`.
        Legacy,
    }

    impl TruckSchema {
        pub fn columns(self) -> Vec<&'static str> {
            let mut columns = vec![trucks::ID, trucks::NAME];
            columns.extend(match self {
                Self::Canonical => vec![
                    trucks::LOAD_VOLUME,
                    trucks::PLATE_NUMBER,
                    trucks::CURRENT_PROJECT,
                    trucks::PROJECT_ID,
                ],
                Self::CamelCaseOnly => vec![trucks::LOAD_VOLUME_CAMEL, trucks::PLATE_NUMBER_CAMEL],
                Self::Legacy => vec![trucks::LOAD_VOLUME_CAMEL, trucks::PLATE_NUMBER, trucks::PROJECT_ID],
            });
            columns.push("created_at");
            columns
        }
    }

    pub fn minimal_config() -> HaulboardConfig {
        HaulboardConfig::with_backend(BackendConfig::new("https://fleet.example.co", "anon-key"))
    }

    /// Mock with every dashboard table, `trucks` shaped as `schema`.
    pub fn fleet_backend(schema: TruckSchema) -> MockBackend {
        MockBackend::new()
            .with_table(trucks::TABLE_NAME, schema.columns())
            .with_table("clients", ["id", "name"])
            .with_table(
                "projects",
                ["id", "name", "client", "client_id", "status", "location", "volume", "created_at"],
            )
            .with_table(
                "trips",
                [
                    "id",
                    "truck_id",
                    "project_id",
                    "status",
                    "volume",
                    "material",
                    "start_time",
                    "end_time",
                    "estimated_end_time",
                    "coordinates",
                    "photo_url",
                ],
            )
            .with_table(
                "operators",
                ["id", "name", "login", "phone", "project_id", "password", "created_at"],
            )
            .with_table("operator_trucks", ["id", "operator_id", "truck_id"])
            .with_table("operator_projects", ["id", "operator_id", "project_id"])
    }

    /// [`fleet_backend`] with two trucks, one client and one project.
    pub fn seeded_fleet(schema: TruckSchema) -> MockBackend {
        let backend = fleet_backend(schema);
        let volume = match schema {
            TruckSchema::Canonical => trucks::LOAD_VOLUME,
            _ => trucks::LOAD_VOLUME_CAMEL,
        };
        backend.seed(
            trucks::TABLE_NAME,
            vec![
                json!({"id": 1, "name": "Volvo FH 540", volume: 20}),
                json!({"id": 2, "name": "Scania R450", volume: 18}),
            ],
        );
        backend.seed("clients", vec![json!({"id": 1, "name": "Construtora Horizonte"})]);
        backend.seed(
            "projects",
            vec![json!({"id": 1, "name": "Quarry North", "client_id": 1, "status": "active"})],
        );
        backend
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the normalized result shape.

    use super::*;

    /// Assert exactly one of `data` / `error` is set and it is `data`.
    pub fn assert_data<T: std::fmt::Debug>(result: &DataResult<T>) {
        assert!(result.data.is_some(), "expected data, got {:?}", result);
        assert!(result.error.is_none(), "expected no error, got {:?}", result);
    }

    /// Assert the result carries an error and no data.
    pub fn assert_error<T: std::fmt::Debug>(result: &DataResult<T>) {
        assert!(result.data.is_none(), "expected no data, got {:?}", result);
        assert!(result.error.is_some(), "expected an error, got {:?}", result);
    }

    pub fn assert_validation_error<T: std::fmt::Debug>(result: &DataResult<T>) {
        assert!(
            matches!(result.error, Some(HaulError::Validation(_))),
            "expected a validation error, got {:?}",
            result
        );
    }

    pub fn assert_missing_column<T: std::fmt::Debug>(result: &HaulResult<T>) {
        match result {
            Err(e) => assert!(e.is_missing_column(), "expected a missing-column error, got {:?}", e),
            Ok(v) => panic!("expected a missing-column error, got Ok({:?})", v),
        }
    }
}
