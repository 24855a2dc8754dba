//! Constraints are reusable technical profiles describing how a facility may operate.
use crate::id::{define_id_getter, define_id_type};
use anyhow::{Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::Display;

define_id_type! {ConstraintID}

/// A map of [`Constraint`]s, keyed by name, in the order they were loaded
pub type ConstraintMap = IndexMap<ConstraintID, Constraint>;

/// The broad kind of technology a constraint describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
pub enum Category {
    /// Variable generation driven by a trace (solar, wind, run-of-river...)
    #[default]
    Renewable,
    /// Dispatchable generation (gas, coal, biomass...)
    Generator,
    /// Energy storage (batteries, pumped hydro...)
    Storage,
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || unicase::eq_ascii(s, "renewable") {
            Ok(Self::Renewable)
        } else if unicase::eq_ascii(s, "generator") {
            Ok(Self::Generator)
        } else if unicase::eq_ascii(s, "storage") {
            Ok(Self::Storage)
        } else {
            bail!("Unknown category: {s}")
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: Option<String> = Deserialize::deserialize(deserializer)?;
        s.as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Operating limits shared by every facility referencing the constraint.
///
/// Fractions are of the facility's capacity; ramp, recharge and discharge limits are per hour.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name of the constraint
    pub id: ConstraintID,
    /// The kind of technology
    pub category: Category,
    /// Minimum output when running, as a fraction of capacity
    pub capacity_min: f64,
    /// Maximum output, as a fraction of capacity
    pub capacity_max: f64,
    /// Maximum increase in output per hour, as a fraction of capacity
    pub rampup_max: f64,
    /// Maximum decrease in output per hour, as a fraction of capacity
    pub rampdown_max: f64,
    /// Maximum energy stored per hour, as a fraction of storage capacity
    pub recharge_max: f64,
    /// Fraction of energy lost when recharging
    pub recharge_loss: f64,
    /// Recharging only happens at or below this state of charge (fraction of capacity)
    pub recharge_start: f64,
    /// Maximum energy withdrawn per hour, as a fraction of storage capacity
    pub discharge_max: f64,
    /// Fraction of energy lost when discharging
    pub discharge_loss: f64,
    /// Discharging only happens at or above this state of charge (fraction of capacity)
    pub discharge_start: f64,
    /// Fraction of stored energy lost each hour
    pub parasitic_loss: f64,
    /// Hours a generator must stay on once started
    pub min_run_time: u32,
    /// Hours of reduced output after a generator starts
    pub warm_time: u32,
}
define_id_getter! {Constraint, ConstraintID}

impl Constraint {
    /// A constraint with no operating limits
    pub fn new(id: ConstraintID, category: Category) -> Self {
        Self {
            id,
            category,
            capacity_min: 0.0,
            capacity_max: 1.0,
            rampup_max: 1.0,
            rampdown_max: 1.0,
            recharge_max: 1.0,
            recharge_loss: 0.0,
            recharge_start: 1.0,
            discharge_max: 1.0,
            discharge_loss: 0.0,
            discharge_start: 0.0,
            parasitic_loss: 0.0,
            min_run_time: 0,
            warm_time: 0,
        }
    }

    /// Whether this is a storage constraint
    pub fn is_storage(&self) -> bool {
        self.category == Category::Storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", Category::Renewable)]
    #[case("Renewable", Category::Renewable)]
    #[case("generator", Category::Generator)]
    #[case("GENERATOR", Category::Generator)]
    #[case(" Storage ", Category::Storage)]
    fn test_category_from_str(#[case] s: &str, #[case] expected: Category) {
        assert_eq!(s.parse::<Category>().unwrap(), expected);
    }

    #[test]
    fn test_category_from_str_invalid() {
        assert!("nuclear-fusion".parse::<Category>().is_err());
    }
}
