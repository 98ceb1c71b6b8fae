//! Column availability for tables whose column names drifted over time.

use serde::{Deserialize, Serialize};

/// Column names of the `trucks` table, including historical variants.
///
/// Each semantic field has a canonical (snake_case) name and, for some, an
/// alternate (camelCase) name that older deployments still carry.
pub mod trucks {
    /// Table name
    pub const TABLE_NAME: &str = "trucks";

    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    /// current_project TEXT (free-form project reference)
    pub const CURRENT_PROJECT: &str = "current_project";
    /// project_id INTEGER (FK to projects)
    pub const PROJECT_ID: &str = "project_id";
    pub const LOAD_VOLUME: &str = "load_volume";
    pub const LOAD_VOLUME_CAMEL: &str = "loadVolume";
    pub const PLATE_NUMBER: &str = "plate_number";
    pub const PLATE_NUMBER_CAMEL: &str = "plateNumber";

    /// Every column the prober looks for, in probe order.
    pub const PROBED_COLUMNS: [&str; 6] = [
        CURRENT_PROJECT,
        PROJECT_ID,
        LOAD_VOLUME,
        LOAD_VOLUME_CAMEL,
        PLATE_NUMBER,
        PLATE_NUMBER_CAMEL,
    ];
}

/// Which of the historically ambiguous column names exist on a table.
///
/// Produced fresh by every probe and never persisted. Flags reflect the
/// catalog at probe time only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ColumnAvailability {
    pub current_project: bool,
    pub project_id: bool,
    pub load_volume: bool,
    #[serde(rename = "loadVolume")]
    pub load_volume_camel: bool,
    pub plate_number: bool,
    #[serde(rename = "plateNumber")]
    pub plate_number_camel: bool,
}

impl ColumnAvailability {
    /// Build the record from raw catalog column names.
    ///
    /// Names are lower-cased before the membership test, so the camelCase
    /// variants are matched as `loadvolume` / `platenumber`.
    pub fn from_column_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lowered: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_lowercase())
            .collect();
        let has = |column: &str| {
            let wanted = column.to_lowercase();
            lowered.iter().any(|name| *name == wanted)
        };

        Self {
            current_project: has(trucks::CURRENT_PROJECT),
            project_id: has(trucks::PROJECT_ID),
            load_volume: has(trucks::LOAD_VOLUME),
            load_volume_camel: has(trucks::LOAD_VOLUME_CAMEL),
            plate_number: has(trucks::PLATE_NUMBER),
            plate_number_camel: has(trucks::PLATE_NUMBER_CAMEL),
        }
    }

    /// Assumed availability when the schema cannot be verified: the plain
    /// snake_case columns exist, the camelCase ones do not.
    pub fn degraded_default() -> Self {
        Self {
            current_project: true,
            project_id: true,
            load_volume: true,
            load_volume_camel: false,
            plate_number: true,
            plate_number_camel: false,
        }
    }

    /// Set a flag by its column name. Unknown names are ignored.
    pub fn set(&mut self, column: &str, present: bool) {
        match column {
            trucks::CURRENT_PROJECT => self.current_project = present,
            trucks::PROJECT_ID => self.project_id = present,
            trucks::LOAD_VOLUME => self.load_volume = present,
            trucks::LOAD_VOLUME_CAMEL => self.load_volume_camel = present,
            trucks::PLATE_NUMBER => self.plate_number = present,
            trucks::PLATE_NUMBER_CAMEL => self.plate_number_camel = present,
            _ => {}
        }
    }

    /// Column pairs where neither variant exists, for user-facing warnings.
    pub fn missing_pairs(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.load_volume && !self.load_volume_camel {
            missing.push("load_volume/loadVolume");
        }
        if !self.current_project && !self.project_id {
            missing.push("current_project/project_id");
        }
        if !self.plate_number && !self.plate_number_camel {
            missing.push("plate_number/plateNumber");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_column_names_lowercases() {
        let columns =
            ColumnAvailability::from_column_names(["id", "name", "LOADVOLUME", "Plate_Number"]);
        assert!(columns.load_volume_camel);
        assert!(!columns.load_volume);
        assert!(columns.plate_number);
        assert!(!columns.plate_number_camel);
        assert!(!columns.current_project);
    }

    #[test]
    fn test_serializes_with_camel_case_flags() {
        let columns = ColumnAvailability {
            load_volume_camel: true,
            ..Default::default()
        };
        let json = serde_json::to_value(columns).unwrap();
        assert_eq!(json["loadVolume"], true);
        assert_eq!(json["load_volume"], false);
        assert!(json.get("load_volume_camel").is_none());
    }

    #[test]
    fn test_missing_pairs() {
        assert_eq!(
            ColumnAvailability::default().missing_pairs(),
            vec![
                "load_volume/loadVolume",
                "current_project/project_id",
                "plate_number/plateNumber"
            ]
        );
        assert!(ColumnAvailability::degraded_default().missing_pairs().is_empty());
    }

    #[test]
    fn test_set_by_column_name() {
        let mut columns = ColumnAvailability::default();
        columns.set(trucks::PLATE_NUMBER_CAMEL, true);
        columns.set("unrelated", true);
        assert!(columns.plate_number_camel);
        assert_eq!(
            columns,
            ColumnAvailability {
                plate_number_camel: true,
                ..Default::default()
            }
        );
    }
}
