use std::{
    fmt::{Debug, Display, Formatter},
    ops::Range,
};

use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use itertools::Itertools;
use serde::{Serialize, Serializer};
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// Interval start as an absolute instant, with the local offset the tariff applies to.
pub type Timestamp = DateTime<FixedOffset>;

pub type Point<V> = (Timestamp, V);

/// Calendar month, the aggregation unit of every charge.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BillingCycle {
    /// Always the first day of the month.
    start: NaiveDate,
}

impl BillingCycle {
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|start| Self { start })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self { start: date.with_day(1).unwrap_or(date) }
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.start.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.start.month()
    }

    #[must_use]
    pub fn start(self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// Exclusive end: midnight of the first day of the following month.
    #[must_use]
    pub fn end(self) -> Option<NaiveDateTime> {
        self.start.checked_add_months(Months::new(1)).map(|date| date.and_time(NaiveTime::MIN))
    }

    #[must_use]
    pub fn n_days(self) -> u32 {
        match self.month() {
            2 if self.start.leap_year() => 29,
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }
}

impl Display for BillingCycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m"))
    }
}

impl Debug for BillingCycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Serialize for BillingCycle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Energy consumed per interval, on a regular grid covering whole calendar months.
///
/// The grid is regular in absolute time, while billing cycles and schedule lookups
/// follow the local wall clock. A daylight saving month is therefore one hour
/// shorter or longer than its calendar length.
///
/// All input checks happen here, once, so that the charge calculations only
/// ever see well-formed series.
#[must_use]
#[derive(Clone, Debug)]
pub struct LoadSeries {
    interval: TimeDelta,
    points: Vec<Point<KilowattHours>>,
    cycles: Vec<(BillingCycle, Range<usize>)>,
}

impl LoadSeries {
    #[instrument(skip_all, fields(n_points = points.len()))]
    pub fn try_new(points: Vec<Point<KilowattHours>>) -> Result<Self> {
        let interval = infer_interval(&points)?;
        if let Some((timestamp, energy)) = points.iter().find(|(_, energy)| !energy.is_finite()) {
            let value = energy.value();
            return Err(Error::NonFiniteLoadValue { timestamp: *timestamp, value });
        }
        for ((previous, _), (next, _)) in points.iter().tuple_windows() {
            let actual = *next - *previous;
            if actual != interval {
                return Err(Error::IrregularInterval { timestamp: *next, expected: interval, actual });
            }
        }

        let mut cycles = Vec::new();
        for (cycle, mut chunk) in
            &points.iter().enumerate().chunk_by(|(_, (timestamp, _))| {
                BillingCycle::containing(timestamp.date_naive())
            })
        {
            let Some((first_index, (first_timestamp, _))) = chunk.next() else { continue };
            let (last_index, last_timestamp) =
                chunk.last().map_or((first_index, *first_timestamp), |(index, (timestamp, _))| {
                    (index, *timestamp)
                });
            check_coverage(cycle, *first_timestamp, last_timestamp, interval)?;
            cycles.push((cycle, first_index..(last_index + 1)));
        }

        debug!(?interval, n_cycles = cycles.len(), "validated");
        Ok(Self { interval, points, cycles })
    }

    /// Build from average power per interval instead of energy.
    pub fn try_from_power(points: Vec<Point<Kilowatts>>) -> Result<Self> {
        let interval = infer_interval(&points)?;
        Self::try_new(
            points.into_iter().map(|(timestamp, power)| (timestamp, power * interval)).collect(),
        )
    }

    #[must_use]
    pub const fn interval(&self) -> TimeDelta {
        self.interval
    }

    #[must_use]
    pub fn points(&self) -> &[Point<KilowattHours>] {
        &self.points
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Never `true` for a constructed series.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Complete billing cycles in chronological order, with their intervals.
    pub fn cycles(&self) -> impl Iterator<Item = (BillingCycle, &[Point<KilowattHours>])> {
        self.cycles.iter().map(|(cycle, range)| (*cycle, &self.points[range.clone()]))
    }

    /// Average power over one interval.
    pub fn power(&self, energy: KilowattHours) -> Kilowatts {
        energy / self.interval
    }

    pub fn total_energy(&self) -> KilowattHours {
        self.points.iter().map(|(_, energy)| *energy).sum()
    }
}

fn infer_interval<V>(points: &[Point<V>]) -> Result<TimeDelta> {
    match points {
        [] => Err(Error::EmptyLoadSeries),
        [(timestamp, _)] => Err(Error::IncompleteBillingCycle {
            cycle: BillingCycle::containing(timestamp.date_naive()),
            reason: "a single interval cannot span the month".to_string(),
        }),
        [(first, _), (second, _), ..] => {
            let interval = *second - *first;
            if interval <= TimeDelta::zero() {
                Err(Error::IrregularInterval {
                    timestamp: *second,
                    expected: TimeDelta::zero(),
                    actual: interval,
                })
            } else {
                Ok(interval)
            }
        }
    }
}

/// Check that the cycle's intervals run from local midnight of the first day
/// till local midnight of the next month.
fn check_coverage(
    cycle: BillingCycle,
    first: Timestamp,
    last: Timestamp,
    interval: TimeDelta,
) -> Result {
    let first = first.naive_local();
    if first != cycle.start() {
        return Err(Error::IncompleteBillingCycle {
            cycle,
            reason: format!("data starts at {first} instead of {}", cycle.start()),
        });
    }
    let Some(end) = cycle.end() else {
        return Err(Error::IncompleteBillingCycle {
            cycle,
            reason: "month end is out of the supported date range".to_string(),
        });
    };
    let Some(last_end) = last.checked_add_signed(interval).map(|end| end.naive_local()) else {
        return Err(Error::IncompleteBillingCycle {
            cycle,
            reason: "data end is out of the supported date range".to_string(),
        });
    };
    if last_end != end {
        return Err(Error::IncompleteBillingCycle {
            cycle,
            reason: format!("data ends at {last_end} instead of {end}"),
        });
    }
    Ok(())
}
