pub mod schedule;
pub mod tier;

use bon::Builder;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    load::{BillingCycle, Timestamp},
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts},
    tariff::{
        schedule::{N_MONTHS, Schedule},
        tier::{Metered, PeriodTable},
    },
};

/// Normalized tariff. Every component validates itself on construction,
/// so a built structure never needs to be re-checked by the calculations.
#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct RateStructure {
    #[builder(into)]
    pub name: Option<String>,

    #[builder(into)]
    pub description: Option<String>,

    pub energy: TimeOfUse<KilowattHours>,

    /// Absent table means no time-of-use demand charge.
    pub demand: Option<TimeOfUse<Kilowatts>>,

    /// Absent table means no flat demand charge.
    pub flat_demand: Option<FlatDemand>,

    #[builder(default)]
    pub fixed_charges: Vec<FixedCharge>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScheduleKind {
    Energy,
    Demand,
}

impl RateStructure {
    /// Period index applicable at the local time of the timestamp,
    /// `None` when the tariff has no such schedule.
    pub fn resolve_period(&self, timestamp: Timestamp, kind: ScheduleKind) -> Result<Option<usize>> {
        let local = timestamp.naive_local();
        match kind {
            ScheduleKind::Energy => self.energy.schedule.resolve(local).map(Some),
            ScheduleKind::Demand => {
                self.demand.as_ref().map(|demand| demand.schedule.resolve(local)).transpose()
            }
        }
    }
}

/// Tier tables paired with the schedule that selects between their periods.
#[derive(Clone, Debug)]
pub struct TimeOfUse<Q: Metered> {
    tiers: PeriodTable<Q>,
    schedule: Schedule,
}

impl<Q: Metered> TimeOfUse<Q> {
    pub fn try_new(tiers: PeriodTable<Q>, schedule: Schedule) -> Result<Self> {
        let max_period = schedule.max_period();
        if max_period >= tiers.len() {
            return Err(Error::malformed(
                "schedule",
                format!("period #{max_period} is out of range of {} period(s)", tiers.len()),
            ));
        }
        Ok(Self { tiers, schedule })
    }

    #[must_use]
    pub const fn tiers(&self) -> &PeriodTable<Q> {
        &self.tiers
    }

    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }
}

/// Demand charge on the single monthly peak, regardless of the time of use.
#[derive(Clone, Debug)]
pub struct FlatDemand {
    tiers: PeriodTable<Kilowatts>,

    /// Period index by `month - 1`.
    months: [usize; N_MONTHS],
}

impl FlatDemand {
    pub fn try_new(tiers: PeriodTable<Kilowatts>, months: [usize; N_MONTHS]) -> Result<Self> {
        for (month, period) in months.iter().enumerate() {
            if *period >= tiers.len() {
                return Err(Error::malformed(
                    format!("months[{month}]"),
                    format!("period #{period} is out of range of {} period(s)", tiers.len()),
                ));
            }
        }
        Ok(Self { tiers, months })
    }

    #[must_use]
    pub const fn tiers(&self) -> &PeriodTable<Kilowatts> {
        &self.tiers
    }

    /// Period index for the 1-based month.
    pub fn period_in(&self, month: u32) -> Result<usize> {
        usize::try_from(month)
            .ok()
            .and_then(|month| month.checked_sub(1))
            .and_then(|index| self.months.get(index))
            .copied()
            .ok_or(Error::InvalidScheduleIndex { month, hour: None })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum ChargeUnit {
    PerMonth,
    PerDay,
}

#[derive(Clone, Debug, Builder, Serialize)]
pub struct FixedCharge {
    #[builder(into)]
    pub name: String,

    pub amount: Cost,

    #[builder(default = ChargeUnit::PerMonth)]
    pub unit: ChargeUnit,
}

impl FixedCharge {
    /// Amount owed for the billing cycle, regardless of usage.
    pub fn charge_for(&self, cycle: BillingCycle) -> Cost {
        match self.unit {
            ChargeUnit::PerMonth => self.amount,
            ChargeUnit::PerDay => self.amount * f64::from(cycle.n_days()),
        }
    }
}
