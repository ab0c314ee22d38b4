use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::{
    billing::{BillingEngine, CycleCharge, DemandCharges, PeriodCharge},
    error::Result,
    load::{BillingCycle, LoadSeries, Point},
    quantity::{energy::KilowattHours, power::Kilowatts},
    tariff::TimeOfUse,
};

impl BillingEngine<'_> {
    /// Time-of-use demand charge per billing cycle: every period's peak power is priced on its own.
    ///
    /// Without demand rates, every cycle is charged nothing.
    #[instrument(skip_all, fields(n_points = load.len()))]
    pub fn calculate_demand_charges(&self, load: &LoadSeries) -> Result<DemandCharges> {
        let Some(demand) = &self.rate.demand else {
            return Ok(load.cycles().map(|(cycle, _)| (cycle, CycleCharge::default())).collect());
        };
        load.cycles()
            .map(|(cycle, points)| {
                demand_charge(demand, load, cycle, points).map(|charge| (cycle, charge))
            })
            .collect()
    }
}

fn demand_charge(
    demand: &TimeOfUse<Kilowatts>,
    load: &LoadSeries,
    cycle: BillingCycle,
    points: &[Point<KilowattHours>],
) -> Result<CycleCharge<PeriodCharge<Kilowatts>>> {
    let mut peaks = BTreeMap::<usize, Kilowatts>::new();
    for (timestamp, energy) in points {
        let power = load.power(*energy);
        peaks
            .entry(demand.schedule().resolve(timestamp.naive_local())?)
            .and_modify(|peak| *peak = (*peak).max(power))
            .or_insert(power);
    }
    peaks
        .into_iter()
        .map(|(period, peak)| {
            demand.tiers().price(period, peak).map(|priced| {
                debug!(
                    %cycle,
                    period,
                    %peak,
                    cost = %priced.cost,
                    tier = priced.tier,
                    "priced demand",
                );
                PeriodCharge { period, priced }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

    use super::*;
    use crate::{
        billing::tests::{flat_energy, hourly, summer_peak},
        load::tests::months,
        quantity::{cost::Cost, rate::KilowattRate},
        tariff::{
            RateStructure,
            schedule::Schedule,
            tier::{PeriodTable, Tier, TierTable},
        },
    };

    fn flat_demand_rate(rate: f64) -> RateStructure {
        RateStructure::builder()
            .energy(flat_energy(0.1))
            .demand(
                TimeOfUse::try_new(
                    TierTable::<Kilowatts>::flat(KilowattRate::from(rate)).into(),
                    Schedule::uniform(0),
                )
                .unwrap(),
            )
            .build()
    }

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn test_peak_not_sum() -> Result {
        let rate = flat_demand_rate(10.0);
        let engine = BillingEngine::new(&rate);

        let steady =
            hourly(2024, 3, 1, |timestamp| if timestamp == at(3, 5, 9) { 5.0 } else { 2.0 });
        let spiky = hourly(2024, 3, 1, |timestamp| {
            if timestamp == at(3, 20, 18) {
                5.0
            } else {
                f64::from(timestamp.hour() % 3)
            }
        });

        let steady = engine.calculate_demand_charges(&steady)?;
        let spiky = engine.calculate_demand_charges(&spiky)?;
        let cycle = BillingCycle::new(2024, 3).unwrap();
        assert_abs_diff_eq!(steady[&cycle].cost.value(), 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(spiky[&cycle].cost.value(), 50.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_peak_per_period() -> Result {
        let rate = RateStructure::builder()
            .energy(flat_energy(0.1))
            .demand(TimeOfUse::try_new(
                PeriodTable::try_new(vec![
                    TierTable::<Kilowatts>::flat(KilowattRate::from(5.0)),
                    TierTable::<Kilowatts>::flat(KilowattRate::from(12.0)),
                ])?,
                summer_peak(),
            )?)
            .build();

        // Wednesday afternoon is on-peak, Saturday afternoon is not.
        let load = hourly(2024, 7, 1, |timestamp| {
            if timestamp == at(7, 17, 15) {
                4.0
            } else if timestamp == at(7, 20, 15) {
                6.0
            } else {
                1.0
            }
        });
        let charges = BillingEngine::new(&rate).calculate_demand_charges(&load)?;

        let charge = &charges[&BillingCycle::new(2024, 7).unwrap()];
        assert_eq!(charge.items.len(), 2);
        assert_eq!(charge.items[0].priced.quantity, Kilowatts::from(6.0));
        assert_eq!(charge.items[1].priced.quantity, Kilowatts::from(4.0));
        assert_abs_diff_eq!(charge.cost.value(), 30.0 + 48.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_tiered_peak() -> Result {
        let tiers = TierTable::try_new(vec![
            Tier::builder().max(Kilowatts::from(10.0)).rate(KilowattRate::from(4.0)).build(),
            Tier::unbounded(KilowattRate::from(6.0)),
        ])?;
        let rate = RateStructure::builder()
            .energy(flat_energy(0.1))
            .demand(TimeOfUse::try_new(tiers.into(), Schedule::uniform(0))?)
            .build();
        let load = hourly(2024, 2, 1, |timestamp| if timestamp.day() == 14 { 15.0 } else { 3.0 });
        let charges = BillingEngine::new(&rate).calculate_demand_charges(&load)?;
        assert_abs_diff_eq!(charges.values().next().unwrap().cost.value(), 70.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_power_from_short_intervals() -> Result {
        let rate = flat_demand_rate(10.0);
        let load = LoadSeries::try_new(months(2024, 6, 1, TimeDelta::minutes(15), |_| 0.5))?;
        let charges = BillingEngine::new(&rate).calculate_demand_charges(&load)?;
        let charge = charges.values().next().unwrap();
        assert_abs_diff_eq!(charge.items[0].priced.quantity.value(), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(charge.cost.value(), 20.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_without_demand_rates() -> Result {
        let rate = RateStructure::builder().energy(flat_energy(0.1)).build();
        let load = hourly(2024, 1, 2, |_| 100.0);
        let charges = BillingEngine::new(&rate).calculate_demand_charges(&load)?;
        assert_eq!(charges.len(), 2);
        for charge in charges.values() {
            assert_eq!(charge.cost, Cost::ZERO);
            assert!(charge.items.is_empty());
        }
        Ok(())
    }
}
