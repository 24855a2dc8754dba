//! General functions related to finance.
use crate::units::{Capacity, Dimensionless, Energy, Money, MoneyPerCapacity, MoneyPerEnergy};

/// Number of kW in one MW, for converting per-kW cost inputs
pub const KW_PER_MW: f64 = 1000.0;

/// Convert a cost in $/kW into [`MoneyPerCapacity`] ($/MW)
pub fn per_kw_to_per_mw(cost_per_kw: f64) -> MoneyPerCapacity {
    MoneyPerCapacity(cost_per_kw * KW_PER_MW)
}

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualize capital costs over the lifetime of an asset.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// Calculates the annualised capital cost for a facility of the given capacity
pub fn annual_capital_cost(
    capital_cost: MoneyPerCapacity,
    capacity: Capacity,
    lifetime: u32,
    discount_rate: Dimensionless,
) -> Money {
    let crf = capital_recovery_factor(lifetime, discount_rate);
    capital_cost * capacity * crf
}

/// Calculates the annual cost implied by a reference LCOE at a reference capacity factor.
///
/// Used when a facility has no explicit capital cost.
pub fn reference_annual_cost(
    lcoe: MoneyPerEnergy,
    capacity: Capacity,
    capacity_factor: Dimensionless,
    hours_per_year: f64,
) -> Money {
    lcoe * Energy(capacity.value() * hours_per_year) * capacity_factor
}

/// Levelised cost: annual cost divided by annual energy.
///
/// Returns zero when there is neither cost nor energy and infinity when there is cost but no
/// energy.
pub fn levelised_cost(cost: Money, energy: Energy) -> MoneyPerEnergy {
    if energy.value() > 0.0 {
        cost / energy
    } else if cost.value() > 0.0 {
        MoneyPerEnergy(f64::INFINITY)
    } else {
        MoneyPerEnergy(0.0)
    }
}
