use std::{
    fmt::{Debug, Display},
    ops::{Add, Mul, Sub},
};

use bon::Builder;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    quantity::{
        cost::Cost,
        energy::KilowattHours,
        power::Kilowatts,
        rate::{KilowattHourRate, KilowattRate},
    },
};

/// Quantity that a tier table can be keyed by: cumulative energy or peak demand.
pub trait Metered:
    Copy + Ord + Debug + Display + Serialize + Sub<Output = Self> + Mul<Self::Rate, Output = Cost>
{
    type Rate: Copy + Ord + Default + Debug + Display + Serialize + Add<Output = Self::Rate>;

    const ZERO: Self;
    const ZERO_RATE: Self::Rate;

    fn is_finite(self) -> bool;
}

impl Metered for KilowattHours {
    type Rate = KilowattHourRate;

    const ZERO: Self = Self::new(0.0);
    const ZERO_RATE: Self::Rate = KilowattHourRate::new(0.0);

    fn is_finite(self) -> bool {
        self.value().is_finite()
    }
}

impl Metered for Kilowatts {
    type Rate = KilowattRate;

    const ZERO: Self = Self::new(0.0);
    const ZERO_RATE: Self::Rate = KilowattRate::new(0.0);

    fn is_finite(self) -> bool {
        self.value().is_finite()
    }
}

#[derive(Copy, Clone, Debug, Builder)]
pub struct Tier<Q: Metered> {
    /// Upper bound of the cumulative quantity covered by this tier, `None` means unbounded.
    pub max: Option<Q>,

    pub rate: Q::Rate,

    /// Rider added on top of the base rate, may be negative.
    #[builder(default)]
    pub adjustment: Q::Rate,
}

impl<Q: Metered> Tier<Q> {
    pub fn unbounded(rate: Q::Rate) -> Self {
        Self { max: None, rate, adjustment: Q::Rate::default() }
    }

    pub fn effective_rate(&self) -> Q::Rate {
        self.rate + self.adjustment
    }
}

/// Ordered, non-empty tiers of a single period.
#[derive(Clone, Debug)]
pub struct TierTable<Q: Metered>(Vec<Tier<Q>>);

impl<Q: Metered> TierTable<Q> {
    pub fn try_new(tiers: Vec<Tier<Q>>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::malformed("", "at least one tier is required"));
        }
        let mut previous_max = Q::ZERO;
        for (index, tier) in tiers.iter().enumerate() {
            if tier.rate < Q::ZERO_RATE {
                return Err(Error::malformed(
                    format!("[{index}].rate"),
                    format!("rate {} is negative", tier.rate),
                ));
            }
            if tier.effective_rate() < Q::ZERO_RATE {
                return Err(Error::malformed(
                    format!("[{index}].adj"),
                    format!("adjusted rate {} is negative", tier.effective_rate()),
                ));
            }
            match tier.max {
                Some(max) if !max.is_finite() => {
                    return Err(Error::malformed(format!("[{index}].max"), "must be finite"));
                }
                Some(max) if max <= previous_max => {
                    return Err(Error::malformed(
                        format!("[{index}].max"),
                        format!("{max} does not exceed the previous bound {previous_max}"),
                    ));
                }
                Some(max) => previous_max = max,
                None if index + 1 != tiers.len() => {
                    return Err(Error::malformed(
                        format!("[{index}].max"),
                        "only the last tier may be unbounded",
                    ));
                }
                None => {}
            }
        }
        Ok(Self(tiers))
    }

    pub fn flat(rate: Q::Rate) -> Self {
        Self(vec![Tier::unbounded(rate)])
    }

    #[must_use]
    pub fn tiers(&self) -> &[Tier<Q>] {
        &self.0
    }

    /// Block pricing: every tier charges only the slice of `quantity` that falls within its bounds.
    ///
    /// Quantity beyond the last tier's bound is charged at the last tier's rate.
    pub fn price(&self, quantity: Q) -> Priced<Q> {
        let last_index = self.0.len() - 1;
        let mut cost = Cost::ZERO;
        let mut lower = Q::ZERO;
        let mut tier_index = 0;
        let mut marginal_rate = self.0[0].effective_rate();

        for (index, tier) in self.0.iter().enumerate() {
            let bound = if index == last_index { None } else { tier.max };
            let upper = bound.map_or(quantity, |max| max.min(quantity));
            if upper <= lower {
                break;
            }
            cost += (upper - lower) * tier.effective_rate();
            tier_index = index;
            marginal_rate = tier.effective_rate();
            match bound {
                Some(max) if max < quantity => lower = max,
                _ => break,
            }
        }

        Priced { quantity, cost, marginal_rate, tier: tier_index }
    }
}

/// Outcome of pricing a quantity against a tier table.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct Priced<Q: Metered> {
    pub quantity: Q,
    pub cost: Cost,

    /// Effective rate of the tier that received the last unit.
    pub marginal_rate: Q::Rate,

    /// Zero-based index of that tier.
    pub tier: usize,
}

/// Tier tables indexed by a period number from a schedule.
#[derive(Clone, Debug)]
pub struct PeriodTable<Q: Metered>(Vec<TierTable<Q>>);

impl<Q: Metered> PeriodTable<Q> {
    pub fn try_new(periods: Vec<TierTable<Q>>) -> Result<Self> {
        if periods.is_empty() {
            return Err(Error::malformed("", "at least one period is required"));
        }
        Ok(Self(periods))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, period: usize) -> Result<&TierTable<Q>> {
        self.0.get(period).ok_or(Error::UnknownPeriod { period, n_periods: self.0.len() })
    }

    pub fn price(&self, period: usize, quantity: Q) -> Result<Priced<Q>> {
        Ok(self.get(period)?.price(quantity))
    }
}

impl<Q: Metered> From<TierTable<Q>> for PeriodTable<Q> {
    fn from(tiers: TierTable<Q>) -> Self {
        Self(vec![tiers])
    }
}
