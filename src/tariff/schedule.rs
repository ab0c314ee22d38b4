use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;

use crate::error::{Error, Result};

pub const N_MONTHS: usize = 12;
pub const N_HOURS: usize = 24;

/// Period index by `[month - 1][hour]`.
pub type ScheduleMatrix = [[usize; N_HOURS]; N_MONTHS];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum DayKind {
    Weekday,
    Weekend,
}

impl From<Weekday> for DayKind {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu | Weekday::Fri => {
                Self::Weekday
            }
        }
    }
}

/// Time-of-use schedule: maps a local wall-clock timestamp onto a period index.
///
/// Holidays are not modelled, only the day of the week matters.
#[derive(Clone, Debug)]
pub struct Schedule {
    weekday: ScheduleMatrix,
    weekend: ScheduleMatrix,
}

impl Schedule {
    /// Build the schedule, checking that every cell refers to one of `n_periods` periods.
    pub fn try_new(
        weekday: ScheduleMatrix,
        weekend: ScheduleMatrix,
        n_periods: usize,
    ) -> Result<Self> {
        for (name, matrix) in [("weekday", &weekday), ("weekend", &weekend)] {
            for (month, hours) in matrix.iter().enumerate() {
                for (hour, period) in hours.iter().enumerate() {
                    if *period >= n_periods {
                        return Err(Error::malformed(
                            format!("{name}[{month}][{hour}]"),
                            format!("period #{period} is out of range of {n_periods} period(s)"),
                        ));
                    }
                }
            }
        }
        Ok(Self { weekday, weekend })
    }

    /// Same period all year round.
    pub const fn uniform(period: usize) -> Self {
        let matrix = [[period; N_HOURS]; N_MONTHS];
        Self { weekday: matrix, weekend: matrix }
    }

    /// Look up the period by the 1-based month and the hour of day.
    pub fn period_at(&self, day_kind: DayKind, month: u32, hour: u32) -> Result<usize> {
        let matrix = match day_kind {
            DayKind::Weekday => &self.weekday,
            DayKind::Weekend => &self.weekend,
        };
        usize::try_from(month)
            .ok()
            .and_then(|month| month.checked_sub(1))
            .and_then(|month| matrix.get(month))
            .zip(usize::try_from(hour).ok())
            .and_then(|(hours, hour)| hours.get(hour))
            .copied()
            .ok_or(Error::InvalidScheduleIndex { month, hour: Some(hour) })
    }

    pub fn resolve(&self, timestamp: NaiveDateTime) -> Result<usize> {
        self.period_at(timestamp.weekday().into(), timestamp.month(), timestamp.hour())
    }

    /// Highest period index referenced by either matrix.
    #[must_use]
    pub fn max_period(&self) -> usize {
        self.weekday.iter().chain(&self.weekend).flatten().copied().max().unwrap_or_default()
    }
}
