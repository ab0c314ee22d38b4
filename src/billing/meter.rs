use tracing::{debug, instrument};

use crate::{
    billing::{BillingEngine, CycleCharge, FixedChargeLine, MeterCharges},
    load::LoadSeries,
};

impl BillingEngine<'_> {
    /// Fixed charges of every billing cycle present in the load, regardless of the usage.
    #[instrument(skip_all, fields(n_points = load.len()))]
    pub fn calculate_meter_charges(&self, load: &LoadSeries) -> MeterCharges {
        load.cycles()
            .map(|(cycle, _)| {
                let charge: CycleCharge<_> = self
                    .rate
                    .fixed_charges
                    .iter()
                    .map(|fixed_charge| FixedChargeLine {
                        name: fixed_charge.name.clone(),
                        cost: fixed_charge.charge_for(cycle),
                    })
                    .collect();
                debug!(%cycle, cost = %charge.cost, "fixed charges");
                (cycle, charge)
            })
            .collect()
    }
}
