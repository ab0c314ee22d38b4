//! Rate structure documents in the layout published by the
//! [Utility Rate Database](https://openei.org/wiki/Utility_Rate_Database).
//!
//! Fetching the documents is up to the caller, this module only maps and validates them.

use std::io::Read;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
    tariff::{
        ChargeUnit,
        FixedCharge,
        FlatDemand,
        RateStructure,
        TimeOfUse,
        schedule::{N_HOURS, N_MONTHS, Schedule, ScheduleMatrix},
        tier::{Metered, PeriodTable, Tier, TierTable},
    },
};

/// Parse a single rate, either bare or wrapped into the API response envelope.
#[instrument(skip_all)]
pub fn parse(json: &str) -> Result<RateStructure> {
    from_value(serde_json::from_str(json).map_err(invalid_json)?)
}

#[instrument(skip_all)]
pub fn read(reader: impl Read) -> Result<RateStructure> {
    from_value(serde_json::from_reader(reader).map_err(invalid_json)?)
}

fn from_value(mut value: Value) -> Result<RateStructure> {
    if let Some(items) = value.get_mut("items") {
        let Value::Array(items) = items.take() else {
            return Err(Error::malformed("items", "expected an array"));
        };
        let n_items = items.len();
        let [item] = <[Value; 1]>::try_from(items).map_err(|_| {
            Error::malformed("items", format!("expected exactly 1 rate, found {n_items}"))
        })?;
        value = item;
    }
    serde_json::from_value::<Document>(value).map_err(invalid_json)?.try_into()
}

fn invalid_json(error: serde_json::Error) -> Error {
    Error::malformed("", error.to_string())
}

type TierDocuments = Vec<Vec<TierDocument>>;

/// Raw rate document, only the fields the calculations need.
#[derive(Deserialize)]
pub struct Document {
    name: Option<String>,
    description: Option<String>,

    #[serde(rename = "energyratestructure")]
    energy_rates: Option<TierDocuments>,

    #[serde(rename = "energyweekdayschedule")]
    energy_weekday_schedule: Option<Vec<Vec<usize>>>,

    #[serde(rename = "energyweekendschedule")]
    energy_weekend_schedule: Option<Vec<Vec<usize>>>,

    #[serde(rename = "demandratestructure")]
    demand_rates: Option<TierDocuments>,

    #[serde(rename = "demandweekdayschedule")]
    demand_weekday_schedule: Option<Vec<Vec<usize>>>,

    #[serde(rename = "demandweekendschedule")]
    demand_weekend_schedule: Option<Vec<Vec<usize>>>,

    #[serde(rename = "flatdemandstructure")]
    flat_demand_rates: Option<TierDocuments>,

    #[serde(rename = "flatdemandmonths")]
    flat_demand_months: Option<Vec<usize>>,

    #[serde(rename = "fixedchargefirstmeter")]
    fixed_charge: Option<f64>,

    #[serde(rename = "fixedchargeunits")]
    fixed_charge_unit: Option<String>,
}

#[derive(Deserialize)]
struct TierDocument {
    max: Option<f64>,
    rate: Option<f64>,
    adj: Option<f64>,
    unit: Option<String>,
}

impl TryFrom<Document> for RateStructure {
    type Error = Error;

    fn try_from(document: Document) -> Result<Self> {
        let energy = match (
            non_empty(document.energy_rates),
            document.energy_weekday_schedule,
            document.energy_weekend_schedule,
        ) {
            (Some(rates), Some(weekday), Some(weekend)) => {
                time_of_use::<KilowattHours>("energy", rates, weekday, weekend, "kWh")?
            }
            (None, _, _) => return Err(Error::malformed("energyratestructure", "is required")),
            (_, None, _) => return Err(Error::malformed("energyweekdayschedule", "is required")),
            (_, _, None) => return Err(Error::malformed("energyweekendschedule", "is required")),
        };

        let demand = match (
            non_empty(document.demand_rates),
            document.demand_weekday_schedule,
            document.demand_weekend_schedule,
        ) {
            (Some(rates), Some(weekday), Some(weekend)) => {
                Some(time_of_use::<Kilowatts>("demand", rates, weekday, weekend, "kW")?)
            }
            (None, _, _) => None,
            (Some(_), _, _) => {
                return Err(Error::malformed(
                    "demandratestructure",
                    "demand rates require both weekday and weekend demand schedules",
                ));
            }
        };

        let flat_demand =
            match (non_empty(document.flat_demand_rates), document.flat_demand_months) {
                (Some(rates), Some(months)) => Some(flat_demand(rates, months)?),
                (None, _) => None,
                (Some(_), None) => {
                    return Err(Error::malformed("flatdemandmonths", "is required with flat rates"));
                }
            };

        let fixed_charges = match document.fixed_charge {
            Some(amount) => vec![fixed_charge(amount, document.fixed_charge_unit.as_deref())?],
            None => Vec::new(),
        };

        debug!(
            name = document.name.as_deref(),
            n_energy_periods = energy.tiers().len(),
            has_demand = demand.is_some(),
            has_flat_demand = flat_demand.is_some(),
            n_fixed_charges = fixed_charges.len(),
            "loaded",
        );
        Ok(Self::builder()
            .maybe_name(document.name)
            .maybe_description(document.description)
            .energy(energy)
            .maybe_demand(demand)
            .maybe_flat_demand(flat_demand)
            .fixed_charges(fixed_charges)
            .build())
    }
}

/// Empty tables are published for tariffs without the respective charge.
fn non_empty(rates: Option<TierDocuments>) -> Option<TierDocuments> {
    rates.filter(|rates| !rates.is_empty())
}

fn time_of_use<Q>(
    kind: &str,
    rates: TierDocuments,
    weekday: Vec<Vec<usize>>,
    weekend: Vec<Vec<usize>>,
    unit: &str,
) -> Result<TimeOfUse<Q>>
where
    Q: Metered + From<f64>,
    Q::Rate: From<f64>,
{
    let rates_field = format!("{kind}ratestructure");
    let tiers = period_table(&rates_field, rates, unit)?;

    // `weekday[m][h]` becomes `energyweekdayschedule[m][h]`.
    let schedule = Schedule::try_new(
        matrix(&format!("{kind}weekdayschedule"), weekday)?,
        matrix(&format!("{kind}weekendschedule"), weekend)?,
        tiers.len(),
    )
    .map_err(|error| {
        error.map_path(|path| format!("{kind}{}", path.replacen('[', "schedule[", 1)))
    })?;

    TimeOfUse::try_new(tiers, schedule).map_err(|error| error.map_path(|_| rates_field))
}

fn flat_demand(rates: TierDocuments, months: Vec<usize>) -> Result<FlatDemand> {
    let tiers = period_table("flatdemandstructure", rates, "kW")?;
    let months = <[usize; N_MONTHS]>::try_from(months).map_err(|months| {
        Error::malformed(
            "flatdemandmonths",
            format!("expected {N_MONTHS} months, got {}", months.len()),
        )
    })?;
    FlatDemand::try_new(tiers, months)
        .map_err(|error| error.map_path(|path| format!("flatdemand{path}")))
}

fn period_table<Q>(field: &str, periods: TierDocuments, unit: &str) -> Result<PeriodTable<Q>>
where
    Q: Metered + From<f64>,
    Q::Rate: From<f64>,
{
    let periods = periods
        .into_iter()
        .enumerate()
        .map(|(period_index, tiers)| {
            let path = format!("{field}[{period_index}]");
            let tiers = tiers
                .into_iter()
                .enumerate()
                .map(|(tier_index, tier)| {
                    tier.into_tier(unit).map_err(|error| error.within(&format!("[{tier_index}]")))
                })
                .collect::<Result<Vec<Tier<Q>>>>()
                .map_err(|error| error.within(&path))?;
            TierTable::try_new(tiers).map_err(|error| error.within(&path))
        })
        .collect::<Result<Vec<_>>>()?;
    PeriodTable::try_new(periods).map_err(|error| error.within(field))
}

impl TierDocument {
    fn into_tier<Q>(self, expected_unit: &str) -> Result<Tier<Q>>
    where
        Q: Metered + From<f64>,
        Q::Rate: From<f64>,
    {
        if let Some(unit) = self.unit
            && unit != expected_unit
        {
            return Err(Error::malformed(
                "unit",
                format!("unsupported unit `{unit}`, only `{expected_unit}` is supported"),
            ));
        }
        let (rate, adjustment) = match (self.rate, self.adj) {
            (None, None) => return Err(Error::malformed("rate", "neither rate nor adj is given")),
            (rate, adj) => (rate.unwrap_or_default(), adj.unwrap_or_default()),
        };
        Ok(Tier { max: self.max.map(Q::from), rate: rate.into(), adjustment: adjustment.into() })
    }
}

fn matrix(field: &str, rows: Vec<Vec<usize>>) -> Result<ScheduleMatrix> {
    if rows.len() != N_MONTHS {
        return Err(Error::malformed(
            field,
            format!("expected {N_MONTHS} months, got {}", rows.len()),
        ));
    }
    let mut matrix = [[0; N_HOURS]; N_MONTHS];
    for (month, (row, hours)) in matrix.iter_mut().zip(rows).enumerate() {
        *row = <[usize; N_HOURS]>::try_from(hours).map_err(|hours| {
            Error::malformed(
                format!("{field}[{month}]"),
                format!("expected {N_HOURS} hours, got {}", hours.len()),
            )
        })?;
    }
    Ok(matrix)
}

fn fixed_charge(amount: f64, unit: Option<&str>) -> Result<FixedCharge> {
    if amount < 0.0 {
        return Err(Error::malformed("fixedchargefirstmeter", format!("{amount} is negative")));
    }
    let unit = match unit {
        None | Some("$/month") => ChargeUnit::PerMonth,
        Some("$/day") => ChargeUnit::PerDay,
        Some(unit) => {
            return Err(Error::malformed(
                "fixedchargeunits",
                format!("unsupported unit `{unit}`, expected `$/month` or `$/day`"),
            ));
        }
    };
    Ok(FixedCharge::builder()
        .name("Fixed charge (first meter)")
        .amount(Cost::from(amount))
        .unit(unit)
        .build())
}
