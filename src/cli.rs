use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;

#[derive(Parser)]
#[command(author, version, about)]
#[must_use]
pub struct Args {
    /// Rate structure document in the Utility Rate Database JSON layout.
    ///
    /// Either a bare rate or an API response with exactly one item.
    #[clap(long = "tariff", env = "TARIFF_PATH")]
    pub tariff_path: PathBuf,

    /// CSV with a header and two columns: interval start and the interval value.
    #[clap(long = "load", env = "LOAD_PATH")]
    pub load_path: PathBuf,

    /// Time zone of the load timestamps that carry no UTC offset, for example `America/Denver`.
    #[clap(long, default_value = "UTC", env = "TIMEZONE")]
    pub timezone: Tz,

    #[clap(long, value_enum, default_value = "kwh", env = "LOAD_UNIT")]
    pub load_unit: LoadUnit,

    #[clap(long = "output", value_enum, default_value = "table", env = "OUTPUT_FORMAT")]
    pub output_format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum LoadUnit {
    /// Energy consumed within each interval.
    #[value(name = "kwh")]
    KilowattHours,

    /// Average power over each interval.
    #[value(name = "kw")]
    Kilowatts,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
