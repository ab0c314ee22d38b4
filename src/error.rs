use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::load::BillingCycle;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rate structure document is missing fields or violates a tier or schedule invariant.
    #[error("malformed rate structure at `{path}`: {reason}")]
    MalformedRateStructure { path: String, reason: String },

    #[error("load series is empty")]
    EmptyLoadSeries,

    #[error("irregular interval at {timestamp}: expected {expected}, got {actual}")]
    IrregularInterval { timestamp: DateTime<FixedOffset>, expected: TimeDelta, actual: TimeDelta },

    #[error("load value at {timestamp} is not a finite number: {value}")]
    NonFiniteLoadValue { timestamp: DateTime<FixedOffset>, value: f64 },

    #[error("billing cycle {cycle} is incomplete: {reason}")]
    IncompleteBillingCycle { cycle: BillingCycle, reason: String },

    #[error("period #{period} is out of range, the tier table has {n_periods} period(s)")]
    UnknownPeriod { period: usize, n_periods: usize },

    /// Month-only lookups, such as the flat demand months, carry no hour.
    #[error(
        "no schedule entry for month {month}{}",
        .hour.map(|hour| format!(", hour {hour}")).unwrap_or_default()
    )]
    InvalidScheduleIndex { month: u32, hour: Option<u32> },
}

impl Error {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRateStructure { path: path.into(), reason: reason.into() }
    }

    /// Rewrite the path of a [`Error::MalformedRateStructure`].
    #[must_use]
    pub fn map_path(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            Self::MalformedRateStructure { path, reason } => {
                Self::MalformedRateStructure { path: f(path), reason }
            }
            other => other,
        }
    }

    /// Prefix the path of a [`Error::MalformedRateStructure`] with the enclosing field.
    #[must_use]
    pub fn within(self, parent: &str) -> Self {
        self.map_path(|path| {
            if path.is_empty() || path.starts_with('[') {
                format!("{parent}{path}")
            } else {
                format!("{parent}.{path}")
            }
        })
    }
}
