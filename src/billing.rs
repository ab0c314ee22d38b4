mod demand;
mod energy;
mod flat_demand;
mod meter;
mod total;

use std::collections::BTreeMap;

use serde::Serialize;

pub use self::total::CycleBill;
use crate::{
    load::BillingCycle,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
    tariff::{
        RateStructure,
        tier::{Metered, Priced},
    },
};

/// Charges keyed by the billing cycle, in chronological order.
pub type PerCycle<T> = BTreeMap<BillingCycle, T>;

pub type EnergyCharges = PerCycle<CycleCharge<PeriodCharge<KilowattHours>>>;
pub type DemandCharges = PerCycle<CycleCharge<PeriodCharge<Kilowatts>>>;
pub type MeterCharges = PerCycle<CycleCharge<FixedChargeLine>>;

/// Calculates the charges of a single rate structure.
///
/// Every calculation is a pure pass over the load series.
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct BillingEngine<'a> {
    rate: &'a RateStructure,
}

impl<'a> BillingEngine<'a> {
    pub const fn new(rate: &'a RateStructure) -> Self {
        Self { rate }
    }

    #[must_use]
    pub const fn rate(&self) -> &'a RateStructure {
        self.rate
    }
}

/// Anything that contributes a cost to a billing cycle.
pub trait Charged {
    fn cost(&self) -> Cost;
}

/// Quantity billed in a single period, with the tier breakdown for auditing.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct PeriodCharge<Q: Metered> {
    pub period: usize,

    #[serde(flatten)]
    pub priced: Priced<Q>,
}

impl<Q: Metered> Charged for PeriodCharge<Q> {
    fn cost(&self) -> Cost {
        self.priced.cost
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FixedChargeLine {
    pub name: String,
    pub cost: Cost,
}

impl Charged for FixedChargeLine {
    fn cost(&self) -> Cost {
        self.cost
    }
}

/// Cost of one charge type within a billing cycle, and the items it is made of.
#[derive(Clone, Debug, Serialize)]
pub struct CycleCharge<T> {
    pub cost: Cost,
    pub items: Vec<T>,
}

impl<T> Default for CycleCharge<T> {
    fn default() -> Self {
        Self { cost: Cost::ZERO, items: Vec::new() }
    }
}

impl<T: Charged> FromIterator<T> for CycleCharge<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<T> = iter.into_iter().collect();
        let cost = items.iter().map(Charged::cost).sum();
        Self { cost, items }
    }
}
