//! Optimisation variables define the capacities the optimiser may choose for a facility.
use crate::facility::FacilityID;
use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;

/// A map of optimisation variables keyed by facility, in the order they were loaded
pub type VariableMap = IndexMap<FacilityID, OptimisationVariable>;

/// Tolerance used when deciding whether the last step of a range lands on its maximum
const STEP_TOLERANCE: f64 = 1e-9;

/// How candidate capacities are generated for a facility
#[derive(Debug, Clone, PartialEq)]
pub enum Approach {
    /// Capacity is one of an explicit list of values
    Discrete(Vec<f64>),
    /// Capacity lies within an inclusive range, optionally on a grid of `step`
    Range {
        /// Lowest capacity
        min: f64,
        /// Highest capacity (inclusive)
        max: f64,
        /// Grid spacing, or 0 for a continuous range
        step: f64,
    },
}

/// The search domain for one facility's capacity
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationVariable {
    /// The facility whose capacity is being searched
    pub facility_id: FacilityID,
    /// How capacities are drawn
    pub approach: Approach,
}

/// The number of whole steps from `min` that stay within `max`
fn step_count(min: f64, max: f64, step: f64) -> usize {
    ((max - min) / step + STEP_TOLERANCE).floor() as usize
}

impl OptimisationVariable {
    /// The finite set of capacities this variable can take, if it is not continuous
    pub fn values(&self) -> Option<Vec<f64>> {
        match &self.approach {
            Approach::Discrete(values) => Some(values.clone()),
            Approach::Range { min, max, step } if *step > 0.0 => {
                let count = step_count(*min, *max, *step);
                Some((0..=count).map(|k| min + k as f64 * step).collect())
            }
            Approach::Range { .. } => None,
        }
    }

    /// The lowest and highest capacities this variable can take
    pub fn bounds(&self) -> (f64, f64) {
        match &self.approach {
            Approach::Discrete(values) => values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(*v), hi.max(*v))
                }),
            Approach::Range { min, max, .. } => (*min, *max),
        }
    }

    /// Draw a capacity uniformly from the domain
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match &self.approach {
            Approach::Discrete(values) => *values
                .choose(rng)
                .expect("Optimisation variables always have at least one value"),
            Approach::Range { min, max, step } if *step > 0.0 => {
                let count = step_count(*min, *max, *step);
                min + rng.gen_range(0..=count) as f64 * step
            }
            Approach::Range { min, max, .. } if max > min => rng.gen_range(*min..=*max),
            Approach::Range { min, .. } => *min,
        }
    }
}
