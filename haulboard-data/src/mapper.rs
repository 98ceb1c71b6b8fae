//! Schema-adaptive mapping of truck records.

use haulboard_core::{trucks, ColumnAvailability, Row, TruckPatch};
use serde_json::Value;

/// Rewrite a partial truck record to the column names the live table has.
///
/// Each semantic field goes to its canonical column when present, otherwise
/// to the camelCase variant, otherwise it is dropped. `name` is never renamed.
/// When the table has `project_id` and `current_project` holds an integer,
/// `project_id` is written as well. Pure: the availability record is the
/// only input besides the patch.
pub fn adapt_truck_record(patch: &TruckPatch, columns: &ColumnAvailability) -> Row {
    let mut row = Row::new();

    if let Some(name) = &patch.name {
        row.insert(trucks::NAME.to_string(), Value::String(name.clone()));
    }

    if let Some(load_volume) = patch.load_volume {
        place(
            &mut row,
            trucks::LOAD_VOLUME,
            first_available(
                columns.load_volume.then_some(trucks::LOAD_VOLUME),
                columns.load_volume_camel.then_some(trucks::LOAD_VOLUME_CAMEL),
            ),
            number_value(load_volume),
        );
    }

    if let Some(plate_number) = &patch.plate_number {
        place(
            &mut row,
            trucks::PLATE_NUMBER,
            first_available(
                columns.plate_number.then_some(trucks::PLATE_NUMBER),
                columns.plate_number_camel.then_some(trucks::PLATE_NUMBER_CAMEL),
            ),
            Value::String(plate_number.clone()),
        );
    }

    if let Some(current_project) = &patch.current_project {
        let value = current_project
            .as_ref()
            .map(|p| Value::String(p.clone()))
            .unwrap_or(Value::Null);
        place(
            &mut row,
            trucks::CURRENT_PROJECT,
            columns.current_project.then_some(trucks::CURRENT_PROJECT),
            value,
        );

        if columns.project_id {
            if let Some(project_id) = current_project
                .as_deref()
                .and_then(|p| p.trim().parse::<i64>().ok())
            {
                row.insert(trucks::PROJECT_ID.to_string(), Value::from(project_id));
            }
        }
    }

    row
}

fn first_available(canonical: Option<&'static str>, alternate: Option<&'static str>) -> Option<&'static str> {
    canonical.or(alternate)
}

fn place(row: &mut Row, field: &str, column: Option<&'static str>, value: Value) {
    match column {
        Some(column) => {
            row.insert(column.to_string(), value);
        }
        None => tracing::debug!(field, "no matching column, dropping field"),
    }
}

/// Whole numbers are written as integers so INTEGER columns accept them.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
