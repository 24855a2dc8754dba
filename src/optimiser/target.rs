//! Objectives the optimiser can weigh up.
use crate::error::PowermatchError;
use crate::metrics::SystemMetrics;
use anyhow::{Result, bail, ensure};
use indexmap::IndexMap;
use std::str::FromStr;
use strum::{Display, EnumIter, IntoEnumIterator};

/// A system metric which can be optimised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Target {
    /// System levelised cost
    Lcoe,
    /// Total annual cost
    Cost,
    /// Total emissions
    Co2,
    /// Fraction of load met by renewables and storage
    RePct,
    /// Surplus as a fraction of load
    SurplusPct,
    /// Fraction of load served
    LoadPct,
}

impl Target {
    /// Read this target's metric from a set of system results
    pub fn value(self, metrics: &SystemMetrics) -> f64 {
        match self {
            Self::Lcoe => metrics.lcoe,
            Self::Cost => metrics.cost,
            Self::Co2 => metrics.co2,
            Self::RePct => metrics.re_pct,
            Self::SurplusPct => metrics.surplus_pct,
            Self::LoadPct => metrics.load_pct,
        }
    }

    /// The configuration key for this target
    pub fn config_key(self) -> String {
        format!("optimise_{self}")
    }
}

/// How much a target matters, and the range over which it is scored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetWeight {
    /// Weight in the combined score (0 disables the target)
    pub weight: f64,
    /// Value scoring 0
    pub better: f64,
    /// Value scoring 1
    pub worse: f64,
}

impl TargetWeight {
    /// An unweighted target
    pub const DISABLED: Self = Self {
        weight: 0.0,
        better: 0.0,
        worse: 1.0,
    };

    /// Whether the target contributes to the combined score
    pub fn is_active(&self) -> bool {
        self.weight > 0.0
    }

    /// Map a value linearly from [better, worse] onto [0, 1], clamping values outside the range
    pub fn normalise(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 1.0;
        }
        ((value - self.better) / (self.worse - self.better)).clamp(0.0, 1.0)
    }
}

impl FromStr for TargetWeight {
    type Err = anyhow::Error;

    /// Parse a "weight,better,worse" triple
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| PowermatchError::config(format!("Invalid target '{s}'")))?;
        let [weight, better, worse] = parts[..] else {
            bail!(PowermatchError::config(format!(
                "Target '{s}' must have the form weight,better,worse"
            )));
        };
        ensure!(
            weight.is_finite() && weight >= 0.0,
            PowermatchError::config(format!("Target weight must not be negative, got {weight}"))
        );
        ensure!(
            weight == 0.0 || better != worse,
            PowermatchError::config(format!(
                "Target '{s}' must have different better and worse values"
            ))
        );

        Ok(Self {
            weight,
            better,
            worse,
        })
    }
}

/// The weights for every target, in a fixed order
#[derive(Debug, Clone, PartialEq)]
pub struct Targets(IndexMap<Target, TargetWeight>);

impl Default for Targets {
    /// Only LCOE is weighted by default
    fn default() -> Self {
        Self(
            Target::iter()
                .map(|target| {
                    let weight = match target {
                        Target::Lcoe => TargetWeight {
                            weight: 1.0,
                            better: 0.0,
                            worse: 500.0,
                        },
                        _ => TargetWeight::DISABLED,
                    };
                    (target, weight)
                })
                .collect(),
        )
    }
}

impl Targets {
    /// Set the weight for a target
    pub fn set(&mut self, target: Target, weight: TargetWeight) {
        self.0.insert(target, weight);
    }

    /// The weight for a target
    pub fn get(&self, target: Target) -> TargetWeight {
        self.0.get(&target).copied().unwrap_or(TargetWeight::DISABLED)
    }

    /// Targets with a non-zero weight
    pub fn active(&self) -> impl Iterator<Item = (Target, TargetWeight)> + '_ {
        self.0
            .iter()
            .filter(|(_, weight)| weight.is_active())
            .map(|(target, weight)| (*target, *weight))
    }

    /// The weighted sum of normalised target values (lower is better)
    pub fn weighted_score(&self, metrics: &SystemMetrics) -> f64 {
        self.active()
            .map(|(target, weight)| weight.weight * weight.normalise(target.value(metrics)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_config_key() {
        assert_eq!(Target::RePct.config_key(), "optimise_re_pct");
        assert_eq!(Target::Lcoe.config_key(), "optimise_lcoe");
    }

    #[rstest]
    #[case("1,50,200", 1.0, 50.0, 200.0)]
    #[case(" 2 , 1, 0 ", 2.0, 1.0, 0.0)]
    #[case("0,5,5", 0.0, 5.0, 5.0)] // equal bounds are fine when unweighted
    fn test_parse_target_weight(
        #[case] s: &str,
        #[case] weight: f64,
        #[case] better: f64,
        #[case] worse: f64,
    ) {
        assert_eq!(
            s.parse::<TargetWeight>().unwrap(),
            TargetWeight {
                weight,
                better,
                worse
            }
        );
    }

    #[rstest]
    #[case("1,2")]
    #[case("1,2,3,4")]
    #[case("a,2,3")]
    #[case("-1,2,3")]
    #[case("1,5,5")]
    fn test_parse_target_weight_invalid(#[case] s: &str) {
        let err = s.parse::<TargetWeight>().unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[rstest]
    #[case(50.0, 0.0)]
    #[case(125.0, 0.5)]
    #[case(200.0, 1.0)]
    #[case(10.0, 0.0)] // clamped
    #[case(f64::INFINITY, 1.0)] // clamped
    fn test_normalise(#[case] value: f64, #[case] expected: f64) {
        let weight = TargetWeight {
            weight: 1.0,
            better: 50.0,
            worse: 200.0,
        };
        assert_approx_eq!(f64, weight.normalise(value), expected);
    }

    #[test]
    fn test_normalise_higher_is_better() {
        let weight = TargetWeight {
            weight: 1.0,
            better: 1.0,
            worse: 0.0,
        };
        assert_approx_eq!(f64, weight.normalise(0.8), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_score() {
        let mut targets = Targets::default();
        targets.set(
            Target::RePct,
            TargetWeight {
                weight: 2.0,
                better: 1.0,
                worse: 0.0,
            },
        );
        let metrics = SystemMetrics {
            lcoe: 250.0,
            re_pct: 0.75,
            ..Default::default()
        };
        assert_eq!(targets.active().count(), 2);
        assert_approx_eq!(f64, targets.weighted_score(&metrics), 0.5 + 2.0 * 0.25);
    }
}
