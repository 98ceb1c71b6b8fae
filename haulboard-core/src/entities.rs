//! Core entity structures
//!
//! Rows as the hosted database returns them. Reads are tolerant of the
//! column-name drift described in [`crate::schema`]: camelCase variants are
//! accepted as aliases of their canonical fields.

use crate::{RowId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Truck as read from the `trucks` table.
///
/// Decoding accepts either column variant; when a table carries both, the
/// canonical column wins unless it is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(from = "TruckRow")]
pub struct Truck {
    pub id: RowId,
    pub name: String,
    pub load_volume: Option<f64>,
    pub plate_number: Option<String>,
    pub current_project: Option<String>,
    pub project_id: Option<RowId>,
    pub created_at: Option<Timestamp>,
}

#[derive(Deserialize)]
struct TruckRow {
    id: RowId,
    name: String,
    #[serde(default)]
    load_volume: Option<f64>,
    #[serde(default, rename = "loadVolume")]
    load_volume_camel: Option<f64>,
    #[serde(default)]
    plate_number: Option<String>,
    #[serde(default, rename = "plateNumber")]
    plate_number_camel: Option<String>,
    #[serde(default)]
    current_project: Option<String>,
    #[serde(default)]
    project_id: Option<RowId>,
    #[serde(default)]
    created_at: Option<Timestamp>,
}

impl From<TruckRow> for Truck {
    fn from(row: TruckRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            load_volume: row.load_volume.or(row.load_volume_camel),
            plate_number: row.plate_number.or(row.plate_number_camel),
            current_project: row.current_project,
            project_id: row.project_id,
            created_at: row.created_at,
        }
    }
}

/// Partial truck record, the input to the schema-adaptive mapper.
///
/// `None` means "leave untouched". `current_project` is tri-state:
/// `Some(None)` writes an explicit null (unassigns the truck).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TruckPatch {
    pub name: Option<String>,
    pub load_volume: Option<f64>,
    pub plate_number: Option<String>,
    pub current_project: Option<Option<String>>,
}

impl TruckPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_load_volume(mut self, load_volume: f64) -> Self {
        self.load_volume = Some(load_volume);
        self
    }

    pub fn with_plate_number(mut self, plate_number: impl Into<String>) -> Self {
        self.plate_number = Some(plate_number.into());
        self
    }

    pub fn with_current_project(mut self, project: impl Into<String>) -> Self {
        self.current_project = Some(Some(project.into()));
        self
    }

    /// Mark the truck as unassigned.
    pub fn clear_current_project(mut self) -> Self {
        self.current_project = Some(None);
        self
    }
}

/// Lifecycle status of a project (job site).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
}

impl ProjectStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Project as read from the `projects` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Project {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub client_id: Option<RowId>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// Fields for a new project. `client` is a client name resolved to
/// `client_id` on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<RowId>,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Partial project update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<RowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Client (customer) owning projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Client {
    pub id: RowId,
    pub name: String,
    /// Present only when projects were embedded in the read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
}

/// `{ id, name }` reference used by operator links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LinkedRef {
    pub id: RowId,
    pub name: String,
}

/// Operator (driver) with the trucks and projects linked to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Operator {
    pub id: RowId,
    pub name: String,
    pub login: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub project_id: Option<RowId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub trucks: Vec<LinkedRef>,
    #[serde(default)]
    pub projects: Vec<LinkedRef>,
}

/// Operator insert/update payload. `password` is only sent on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorPayload {
    pub name: String,
    pub login: String,
    pub phone: Option<String>,
    pub project_id: Option<RowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Ongoing,
    Completed,
    #[serde(other)]
    Other,
}

impl TripStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Other => "other",
        }
    }
}

/// Embedded `{ name }` of a related row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NameRef {
    pub name: String,
}

/// A haul from a truck to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Trip {
    pub id: RowId,
    #[serde(default)]
    pub truck_id: Option<RowId>,
    #[serde(default)]
    pub project_id: Option<RowId>,
    pub status: TripStatus,
    /// Zero until the load is recorded; a null column reads as zero.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub volume: f64,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub estimated_end_time: Option<Timestamp>,
    #[serde(default)]
    pub coordinates: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub trucks: Option<NameRef>,
    #[serde(default)]
    pub projects: Option<NameRef>,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Total volume transported on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DailyVolumePoint {
    /// Calendar day, serialized as `YYYY-MM-DD`.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date"))]
    pub date: NaiveDate,
    pub total_volume: f64,
}

impl DailyVolumePoint {
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            date,
            total_volume: 0.0,
        }
    }
}
