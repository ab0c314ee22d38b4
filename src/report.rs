//! Monthly bill breakdown with an annual summary, ready for rendering.

use serde::Serialize;

use crate::{
    billing::{CycleBill, PerCycle},
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
    tariff::RateStructure,
};

#[derive(Clone, Debug, Serialize)]
pub struct BillReport {
    pub name: Option<String>,
    pub description: Option<String>,

    /// Number of time-of-use demand periods, zero without demand rates.
    pub n_demand_periods: usize,

    pub cycles: PerCycle<ReportRow>,

    /// Whole series: energy and costs are summed, peaks are the maximum ones.
    pub annual: ReportRow,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportRow {
    pub energy: KilowattHours,
    pub energy_cost: Cost,

    /// Indexed by the demand period.
    pub demand: Vec<PeriodDemand>,

    pub flat_demand_peak: Option<Kilowatts>,
    pub flat_demand_cost: Cost,
    pub fixed_cost: Cost,
    pub total: Cost,
}

#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct PeriodDemand {
    /// `None` when the cycle has no intervals in the period.
    pub peak: Option<Kilowatts>,

    pub cost: Cost,
}

impl BillReport {
    pub fn new(rate: &RateStructure, bills: &PerCycle<CycleBill>) -> Self {
        let n_demand_periods = rate.demand.as_ref().map_or(0, |demand| demand.tiers().len());
        let cycles: PerCycle<ReportRow> = bills
            .iter()
            .map(|(cycle, bill)| (*cycle, ReportRow::new(bill, n_demand_periods)))
            .collect();
        let annual = cycles
            .values()
            .cloned()
            .reduce(ReportRow::merge)
            .unwrap_or_else(|| ReportRow::empty(n_demand_periods));
        Self {
            name: rate.name.clone(),
            description: rate.description.clone(),
            n_demand_periods,
            cycles,
            annual,
        }
    }
}

impl ReportRow {
    fn new(bill: &CycleBill, n_demand_periods: usize) -> Self {
        let mut demand = vec![PeriodDemand::default(); n_demand_periods];
        for item in &bill.demand.items {
            if let Some(period) = demand.get_mut(item.period) {
                *period = PeriodDemand { peak: Some(item.priced.quantity), cost: item.priced.cost };
            }
        }
        Self {
            energy: bill.energy.items.iter().map(|item| item.priced.quantity).sum(),
            energy_cost: bill.energy.cost,
            demand,
            flat_demand_peak: bill.flat_demand.items.iter().map(|item| item.priced.quantity).max(),
            flat_demand_cost: bill.flat_demand.cost,
            fixed_cost: bill.meter.cost,
            total: bill.total,
        }
    }

    fn empty(n_demand_periods: usize) -> Self {
        Self {
            energy: KilowattHours::ZERO,
            energy_cost: Cost::ZERO,
            demand: vec![PeriodDemand::default(); n_demand_periods],
            flat_demand_peak: None,
            flat_demand_cost: Cost::ZERO,
            fixed_cost: Cost::ZERO,
            total: Cost::ZERO,
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            energy: self.energy + other.energy,
            energy_cost: self.energy_cost + other.energy_cost,
            demand: self
                .demand
                .into_iter()
                .zip(other.demand)
                .map(|(lhs, rhs)| PeriodDemand {
                    peak: lhs.peak.max(rhs.peak),
                    cost: lhs.cost + rhs.cost,
                })
                .collect(),
            flat_demand_peak: self.flat_demand_peak.max(other.flat_demand_peak),
            flat_demand_cost: self.flat_demand_cost + other.flat_demand_cost,
            fixed_cost: self.fixed_cost + other.fixed_cost,
            total: self.total + other.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::{
        billing::{
            BillingEngine,
            tests::{flat_energy, hourly, summer_peak},
        },
        error::Result,
        load::BillingCycle,
        quantity::rate::KilowattRate,
        tariff::{
            FixedCharge,
            FlatDemand,
            TimeOfUse,
            schedule::N_MONTHS,
            tier::{PeriodTable, TierTable},
        },
    };

    fn rate() -> Result<RateStructure> {
        let demand = TimeOfUse::try_new(
            PeriodTable::try_new(vec![
                TierTable::<Kilowatts>::flat(KilowattRate::from(5.0)),
                TierTable::<Kilowatts>::flat(KilowattRate::from(12.0)),
            ])?,
            summer_peak(),
        )?;
        let flat_demand = FlatDemand::try_new(
            TierTable::<Kilowatts>::flat(KilowattRate::from(2.0)).into(),
            [0; N_MONTHS],
        )?;
        Ok(RateStructure::builder()
            .name("Small commercial")
            .energy(flat_energy(0.1))
            .demand(demand)
            .flat_demand(flat_demand)
            .fixed_charges(vec![FixedCharge::builder().name("Meter").amount(Cost::from(10.0)).build()])
            .build())
    }

    #[test]
    fn test_report() -> Result {
        let rate = rate()?;
        // Summer weekday afternoons draw 3 kW, everything else 1 kW.
        let load = hourly(2024, 5, 2, |timestamp| {
            if timestamp.month() == 6 && timestamp.weekday().num_days_from_monday() < 5 {
                if (14..19).contains(&timestamp.hour()) { 3.0 } else { 1.0 }
            } else {
                1.0
            }
        });
        let bills = BillingEngine::new(&rate).calculate_total(&load)?;
        let report = BillReport::new(&rate, &bills);

        assert_eq!(report.name.as_deref(), Some("Small commercial"));
        assert_eq!(report.n_demand_periods, 2);

        let may = &report.cycles[&BillingCycle::new(2024, 5).unwrap()];
        assert_abs_diff_eq!(may.energy.value(), 744.0, epsilon = 1e-9);
        assert_eq!(may.demand[0].peak, Some(Kilowatts::from(1.0)));
        assert_eq!(may.demand[1].peak, None);
        assert_eq!(may.demand[1].cost, Cost::ZERO);
        assert_abs_diff_eq!(may.total.value(), 74.4 + 5.0 + 2.0 + 10.0, epsilon = 1e-9);

        let june = &report.cycles[&BillingCycle::new(2024, 6).unwrap()];
        assert_eq!(june.demand[1].peak, Some(Kilowatts::from(3.0)));
        assert_eq!(june.flat_demand_peak, Some(Kilowatts::from(3.0)));

        assert_eq!(report.annual.demand[1].peak, Some(Kilowatts::from(3.0)));
        assert_eq!(report.annual.flat_demand_peak, Some(Kilowatts::from(3.0)));
        assert_abs_diff_eq!(report.annual.fixed_cost.value(), 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            report.annual.total.value(),
            may.total.value() + june.total.value(),
            epsilon = 1e-9
        );
        Ok(())
    }

    #[test]
    fn test_serializes() -> Result {
        let rate = rate()?;
        let bills = BillingEngine::new(&rate).calculate_total(&hourly(2024, 1, 1, |_| 1.0))?;
        let value = serde_json::to_value(BillReport::new(&rate, &bills)).unwrap();
        assert!(value["cycles"]["2024-01"]["total"].is_number());
        assert_eq!(value["n_demand_periods"], 2);
        Ok(())
    }
}
