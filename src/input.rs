use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use chrono::{DateTime, MappedLocalTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use csv::{ReaderBuilder, Trim};
use tariff_bill::{
    load::{LoadSeries, Point, Timestamp},
    quantity::{energy::KilowattHours, power::Kilowatts},
    tariff::RateStructure,
    urdb,
};

use crate::{cli::LoadUnit, prelude::*};

const OFFSET_FORMATS: [&str; 3] =
    ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M%:z", "%Y-%m-%dT%H:%M%:z"];

const LOCAL_FORMATS: [&str; 4] =
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_tariff(path: &Path) -> Result<RateStructure> {
    let file =
        File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
    let rate = urdb::read(BufReader::new(file))
        .with_context(|| format!("failed to load the rate structure from `{}`", path.display()))?;
    info!(name = rate.name.as_deref(), "loaded the tariff");
    Ok(rate)
}

#[instrument(skip_all, fields(path = %path.display(), unit = ?unit, %timezone))]
pub fn read_load(path: &Path, unit: LoadUnit, timezone: Tz) -> Result<LoadSeries> {
    let file =
        File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
    let points = read_points(file, timezone)?;
    info!(n_points = points.len(), "read the load");
    let series = into_series(points, unit).context("invalid load series")?;
    info!(
        interval = ?series.interval(),
        total_energy = %series.total_energy(),
        "validated the load",
    );
    Ok(series)
}

fn read_points(reader: impl Read, timezone: Tz) -> Result<Vec<Point<f64>>> {
    let mut points: Vec<Point<f64>> = Vec::new();
    for (index, record) in
        ReaderBuilder::new().trim(Trim::All).from_reader(reader).deserialize().enumerate()
    {
        let (timestamp, value): (String, f64) =
            record.with_context(|| format!("failed to read record #{}", index + 1))?;
        let previous = points.last().map(|(timestamp, _)| *timestamp);
        points.push((parse_timestamp(&timestamp, timezone, previous)?, value));
    }
    Ok(points)
}

/// Timestamps with an explicit offset are taken as is, the others are local to `timezone`.
fn parse_timestamp(text: &str, timezone: Tz, previous: Option<Timestamp>) -> Result<Timestamp> {
    if let Some(timestamp) = DateTime::parse_from_rfc3339(text).ok().or_else(|| {
        OFFSET_FORMATS.iter().find_map(|format| DateTime::parse_from_str(text, format).ok())
    }) {
        return Ok(timestamp);
    }
    let local = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .with_context(|| format!("unrecognized timestamp `{text}`"))?;
    localize(local, timezone, previous)
}

/// Resolve the wall-clock time in the time zone.
///
/// A wall-clock time repeated by the fall-back transition is the earlier instant,
/// unless the series has already passed it.
fn localize(local: NaiveDateTime, timezone: Tz, previous: Option<Timestamp>) -> Result<Timestamp> {
    match timezone.from_local_datetime(&local) {
        MappedLocalTime::Single(timestamp) => Ok(timestamp.fixed_offset()),
        MappedLocalTime::Ambiguous(earliest, latest) => {
            let earliest = earliest.fixed_offset();
            if previous.is_some_and(|previous| previous >= earliest) {
                Ok(latest.fixed_offset())
            } else {
                Ok(earliest)
            }
        }
        MappedLocalTime::None => bail!("`{local}` does not exist in {timezone}"),
    }
}

fn into_series(points: Vec<Point<f64>>, unit: LoadUnit) -> tariff_bill::Result<LoadSeries> {
    match unit {
        LoadUnit::KilowattHours => LoadSeries::try_new(
            points
                .into_iter()
                .map(|(timestamp, value)| (timestamp, KilowattHours::from(value)))
                .collect(),
        ),
        LoadUnit::Kilowatts => LoadSeries::try_from_power(
            points
                .into_iter()
                .map(|(timestamp, value)| (timestamp, Kilowatts::from(value)))
                .collect(),
        ),
    }
}
