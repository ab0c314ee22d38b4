use tracing::{debug, instrument};

use crate::{
    billing::{BillingEngine, CycleCharge, DemandCharges, PeriodCharge},
    error::Result,
    load::{BillingCycle, LoadSeries, Point},
    quantity::{energy::KilowattHours, power::Kilowatts},
    tariff::FlatDemand,
};

impl BillingEngine<'_> {
    /// Flat demand charge per billing cycle: the single highest power of the cycle,
    /// priced in the period assigned to the cycle's month.
    #[instrument(skip_all, fields(n_points = load.len()))]
    pub fn calculate_flat_demand_charges(&self, load: &LoadSeries) -> Result<DemandCharges> {
        let Some(flat_demand) = &self.rate.flat_demand else {
            return Ok(load.cycles().map(|(cycle, _)| (cycle, CycleCharge::default())).collect());
        };
        load.cycles()
            .map(|(cycle, points)| {
                flat_demand_charge(flat_demand, load, cycle, points).map(|charge| (cycle, charge))
            })
            .collect()
    }
}

fn flat_demand_charge(
    flat_demand: &FlatDemand,
    load: &LoadSeries,
    cycle: BillingCycle,
    points: &[Point<KilowattHours>],
) -> Result<CycleCharge<PeriodCharge<Kilowatts>>> {
    let Some(peak) = points.iter().map(|(_, energy)| load.power(*energy)).max() else {
        return Ok(CycleCharge::default());
    };
    let period = flat_demand.period_in(cycle.month())?;
    let priced = flat_demand.tiers().price(period, peak)?;
    debug!(%cycle, period, %peak, cost = %priced.cost, "priced flat demand");
    Ok([PeriodCharge { period, priced }].into_iter().collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{Datelike, NaiveDate, Timelike};

    use super::*;
    use crate::{
        billing::tests::{flat_energy, hourly, summer_peak},
        quantity::{cost::Cost, rate::KilowattRate},
        tariff::{
            RateStructure,
            schedule::N_MONTHS,
            tier::{PeriodTable, TierTable},
        },
    };

    /// $4.50/kW in July, $3/kW otherwise.
    fn july_premium() -> Result<RateStructure> {
        let mut months = [0; N_MONTHS];
        months[6] = 1;
        let flat_demand = FlatDemand::try_new(
            PeriodTable::try_new(vec![
                TierTable::<Kilowatts>::flat(KilowattRate::from(3.0)),
                TierTable::<Kilowatts>::flat(KilowattRate::from(4.5)),
            ])?,
            months,
        )?;
        Ok(RateStructure::builder().energy(flat_energy(0.1)).flat_demand(flat_demand).build())
    }

    #[test]
    fn test_month_selects_period() -> Result {
        // Off-peak spike in July, on-peak spike in August.
        let july_spike = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap().and_hms_opt(3, 0, 0).unwrap();
        let august_spike =
            NaiveDate::from_ymd_opt(2024, 8, 20).unwrap().and_hms_opt(16, 0, 0).unwrap();
        assert_eq!(summer_peak().resolve(july_spike)?, 0);
        assert_eq!(summer_peak().resolve(august_spike)?, 1);

        let load = hourly(2024, 7, 2, |timestamp| {
            if timestamp == july_spike || timestamp == august_spike { 8.0 } else { 1.0 }
        });
        let rate = july_premium()?;
        let charges = BillingEngine::new(&rate).calculate_flat_demand_charges(&load)?;

        let costs = charges.values().map(|charge| charge.cost.value()).collect::<Vec<_>>();
        assert_abs_diff_eq!(costs[0], 36.0, epsilon = 1e-9);
        assert_abs_diff_eq!(costs[1], 24.0, epsilon = 1e-9);
        let july = &charges[&BillingCycle::new(2024, 7).unwrap()];
        assert_eq!(july.items[0].period, 1);
        assert_eq!(july.items[0].priced.quantity, Kilowatts::from(8.0));
        Ok(())
    }

    #[test]
    fn test_spike_time_does_not_matter() -> Result {
        let rate = july_premium()?;
        let engine = BillingEngine::new(&rate);
        for hour in [0, 9, 15, 23] {
            let load = hourly(2024, 7, 1, |timestamp| {
                if timestamp.day() == 10 && timestamp.hour() == hour { 8.0 } else { 0.5 }
            });
            let charges = engine.calculate_flat_demand_charges(&load)?;
            assert_abs_diff_eq!(
                charges.values().next().unwrap().cost.value(),
                36.0,
                epsilon = 1e-9
            );
        }
        Ok(())
    }

    #[test]
    fn test_without_flat_demand_rates() -> Result {
        let rate = RateStructure::builder().energy(flat_energy(0.1)).build();
        let load = hourly(2024, 1, 1, |_| 100.0);
        let charges = BillingEngine::new(&rate).calculate_flat_demand_charges(&load)?;
        assert_eq!(charges.values().next().unwrap().cost, Cost::ZERO);
        Ok(())
    }
}
