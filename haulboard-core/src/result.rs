//! Normalized `{ data, error }` results handed to presentation code.

use crate::{HaulError, HaulResult};
use serde::Serialize;

/// A result that never carries a raw backend error to its caller.
///
/// Exactly one of `data` / `error` is set by the constructors, though callers
/// should only rely on `error` being `None` for success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataResult<T> {
    pub data: Option<T>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<HaulError>,
}

impl<T> DataResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<HaulError>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert back into a `Result`. A success without data is an error only
    /// if `T` cannot be absent, so the data stays optional here.
    pub fn into_result(self) -> HaulResult<Option<T>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

impl<T> From<HaulResult<T>> for DataResult<T> {
    fn from(result: HaulResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(error),
        }
    }
}

fn serialize_error<S>(error: &Option<HaulError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}
