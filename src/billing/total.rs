use itertools::izip;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    billing::{BillingEngine, CycleCharge, FixedChargeLine, PerCycle, PeriodCharge},
    error::Result,
    load::LoadSeries,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
};

/// All charges of a single billing cycle.
#[derive(Clone, Debug, Serialize)]
pub struct CycleBill {
    pub energy: CycleCharge<PeriodCharge<KilowattHours>>,
    pub demand: CycleCharge<PeriodCharge<Kilowatts>>,
    pub flat_demand: CycleCharge<PeriodCharge<Kilowatts>>,
    pub meter: CycleCharge<FixedChargeLine>,
    pub total: Cost,
}

impl BillingEngine<'_> {
    #[instrument(skip_all, fields(n_points = load.len()))]
    pub fn calculate_total(&self, load: &LoadSeries) -> Result<PerCycle<CycleBill>> {
        let energy = self.calculate_energy_charges(load)?;
        let demand = self.calculate_demand_charges(load)?;
        let flat_demand = self.calculate_flat_demand_charges(load)?;
        let meter = self.calculate_meter_charges(load);

        // All four are keyed by the same cycles of the same load.
        let bills: PerCycle<CycleBill> = izip!(energy, demand, flat_demand, meter)
            .map(|((cycle, energy), (_, demand), (_, flat_demand), (_, meter))| {
                let total = energy.cost + demand.cost + flat_demand.cost + meter.cost;
                (cycle, CycleBill { energy, demand, flat_demand, meter, total })
            })
            .collect();
        info!(
            n_cycles = bills.len(),
            total = %bills.values().map(|bill| bill.total).sum::<Cost>(),
            "calculated",
        );
        Ok(bills)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        billing::tests::{flat_energy, hourly},
        load::BillingCycle,
        quantity::rate::KilowattRate,
        tariff::{FixedCharge, RateStructure, TimeOfUse, schedule::Schedule, tier::TierTable},
    };

    #[test]
    fn test_single_flat_rate_month() -> Result {
        // 744 hours of 1 kWh make up the whole of January.
        let rate = RateStructure::builder().energy(flat_energy(0.1)).build();
        let load = hourly(2024, 1, 1, |_| 1.0);
        let bills = BillingEngine::new(&rate).calculate_total(&load)?;

        let bill = &bills[&BillingCycle::new(2024, 1).unwrap()];
        assert_abs_diff_eq!(bill.energy.cost.value(), 74.4, epsilon = 1e-9);
        assert_eq!(bill.demand.cost, Cost::ZERO);
        assert_eq!(bill.flat_demand.cost, Cost::ZERO);
        assert_eq!(bill.meter.cost, Cost::ZERO);
        assert_abs_diff_eq!(bill.total.value(), 74.4, epsilon = 1e-9);
        assert_eq!(bill.total.round_to_cents().to_string(), "$74.40");
        Ok(())
    }

    #[test]
    fn test_total_is_sum_of_components() -> Result {
        let rate = RateStructure::builder()
            .energy(flat_energy(0.1))
            .demand(TimeOfUse::try_new(
                TierTable::<Kilowatts>::flat(KilowattRate::from(10.0)).into(),
                Schedule::uniform(0),
            )?)
            .fixed_charges(vec![FixedCharge::builder().name("Meter").amount(Cost::from(9.5)).build()])
            .build();
        let load = hourly(2024, 11, 2, |_| 2.0);
        let bills = BillingEngine::new(&rate).calculate_total(&load)?;

        assert_eq!(bills.len(), 2);
        let november = &bills[&BillingCycle::new(2024, 11).unwrap()];
        assert_abs_diff_eq!(november.energy.cost.value(), 720.0 * 2.0 * 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(november.demand.cost.value(), 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(november.total.value(), 144.0 + 20.0 + 9.5, epsilon = 1e-9);
        let december = &bills[&BillingCycle::new(2024, 12).unwrap()];
        assert_abs_diff_eq!(december.total.value(), 148.8 + 20.0 + 9.5, epsilon = 1e-9);
        Ok(())
    }
}
