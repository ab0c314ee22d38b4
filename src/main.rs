mod cli;
mod input;
mod prelude;
mod tables;

use clap::{Parser, crate_version};
use tariff_bill::{billing::BillingEngine, report::BillReport};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Args, OutputFormat},
    input::{read_load, read_tariff},
    prelude::*,
    tables::build_report_table,
};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
        )
        .init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();
    let rate = read_tariff(&args.tariff_path)?;
    let load = read_load(&args.load_path, args.load_unit, args.timezone)?;
    let bills =
        BillingEngine::new(&rate).calculate_total(&load).context("failed to calculate the bill")?;
    let report = BillReport::new(&rate, &bills);

    match args.output_format {
        OutputFormat::Table => {
            if let Some(name) = &report.name {
                println!("{name}");
            }
            if let Some(description) = &report.description {
                println!("{description}");
            }
            println!("{}", build_report_table(&report));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
