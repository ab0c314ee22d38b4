use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::{
    billing::{BillingEngine, CycleCharge, EnergyCharges, PeriodCharge},
    error::Result,
    load::{BillingCycle, LoadSeries, Point},
    quantity::energy::KilowattHours,
};

impl BillingEngine<'_> {
    /// Energy charge per billing cycle.
    ///
    /// Usage is summed per period over the whole cycle first and priced once,
    /// so that the tier boundaries apply to the cumulative usage rather than to single intervals.
    #[instrument(skip_all, fields(n_points = load.len()))]
    pub fn calculate_energy_charges(&self, load: &LoadSeries) -> Result<EnergyCharges> {
        load.cycles()
            .map(|(cycle, points)| self.energy_charge(cycle, points).map(|charge| (cycle, charge)))
            .collect()
    }

    fn energy_charge(
        &self,
        cycle: BillingCycle,
        points: &[Point<KilowattHours>],
    ) -> Result<CycleCharge<PeriodCharge<KilowattHours>>> {
        let energy = &self.rate.energy;
        let mut usage = BTreeMap::<usize, KilowattHours>::new();
        for (timestamp, value) in points {
            let period = energy.schedule().resolve(timestamp.naive_local())?;
            *usage.entry(period).or_default() += *value;
        }
        usage
            .into_iter()
            .map(|(period, quantity)| {
                energy.tiers().price(period, quantity).map(|priced| {
                    debug!(
                        %cycle,
                        period,
                        %quantity,
                        cost = %priced.cost,
                        tier = priced.tier,
                        "priced energy",
                    );
                    PeriodCharge { period, priced }
                })
            })
            .collect()
    }
}
