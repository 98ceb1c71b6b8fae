//! Wall-clock and calendar-day arithmetic.
//!
//! Daily buckets are local calendar days at a fixed UTC offset. The current
//! instant can be pinned so date-dependent reads are reproducible.

use chrono::{DateTime, Days, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use haulboard_core::{ConfigError, HaulResult, VolumeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
    pinned_now: Option<DateTime<Utc>>,
}

impl Calendar {
    /// Host offset, live clock.
    pub fn local() -> Self {
        Self::with_offset(Local::now().offset().fix())
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset,
            pinned_now: None,
        }
    }

    /// A calendar whose clock always reads `now`.
    pub fn pinned(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            offset,
            pinned_now: Some(now),
        }
    }

    pub fn from_config(config: &VolumeConfig) -> HaulResult<Self> {
        match config.utc_offset_minutes {
            None => Ok(Self::local()),
            Some(minutes) => {
                let offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: "volume.utc_offset_minutes".to_string(),
                        value: minutes.to_string(),
                        reason: "not a valid UTC offset".to_string(),
                    }
                })?;
                Ok(Self::with_offset(offset))
            }
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.pinned_now.unwrap_or_else(Utc::now)
    }

    /// Local calendar date of the current instant.
    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }

    /// Local calendar date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// The UTC instant at which `date` begins locally.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc_midnight = local_midnight - chrono::Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc_midnight)
    }

    /// `days` consecutive dates ending at `today`, ascending.
    pub fn trailing_days(&self, days: u32) -> Vec<NaiveDate> {
        let today = self.today();
        (0..days)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
            .collect()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::local()
    }
}
