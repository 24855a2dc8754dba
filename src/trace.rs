//! The hourly (or half-hourly) availability and load traces that drive a simulation.
use crate::error::PowermatchError;
use crate::facility::FacilityID;
use anyhow::{Result, bail, ensure};
use indexmap::IndexMap;
use std::fmt;

/// Number of hours in a non-leap year
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// The time step shared by every trace in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// One step per hour (8760 or 8784 steps)
    Hourly,
    /// Two steps per hour (17520 or 17568 steps)
    HalfHourly,
}

impl Resolution {
    /// Work out the resolution implied by a trace length
    pub fn from_len(len: usize) -> Result<Self> {
        match len {
            8760 | 8784 => Ok(Self::Hourly),
            17520 | 17568 => Ok(Self::HalfHourly),
            _ => bail!(PowermatchError::data_shape(format!(
                "Traces must have 8760, 8784, 17520 or 17568 steps, but have {len}"
            ))),
        }
    }

    /// Number of simulation steps in each hour
    pub fn steps_per_hour(self) -> u32 {
        match self {
            Self::Hourly => 1,
            Self::HalfHourly => 2,
        }
    }

    /// Length of one step in hours
    pub fn step_hours(self) -> f64 {
        1.0 / f64::from(self.steps_per_hour())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::HalfHourly => write!(f, "half-hourly"),
        }
    }
}

/// Per-facility availability vectors plus the load, all of one common length.
///
/// Values are energy per step (MWh). Availability traces describe a facility at its base
/// capacity, so a facility's availability is its trace multiplied by its capacity multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceMatrix {
    resolution: Resolution,
    periods: Vec<String>,
    load: Vec<f64>,
    traces: IndexMap<FacilityID, Vec<f64>>,
}

impl TraceMatrix {
    /// Create a new trace matrix, checking that every vector has the same valid length.
    ///
    /// `periods` may be empty, in which case no period labels are reported.
    pub fn new(
        periods: Vec<String>,
        load: Vec<f64>,
        traces: IndexMap<FacilityID, Vec<f64>>,
    ) -> Result<Self> {
        let resolution = Resolution::from_len(load.len())?;
        ensure!(
            periods.is_empty() || periods.len() == load.len(),
            PowermatchError::data_shape(format!(
                "Expected {} period labels, found {}",
                load.len(),
                periods.len()
            ))
        );
        for (id, trace) in &traces {
            check_trace(id.as_str(), trace, load.len())?;
        }
        check_trace("Load", &load, load.len())?;

        Ok(Self {
            resolution,
            periods,
            load,
            traces,
        })
    }

    /// The time step of the traces
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// The number of steps in each trace
    pub fn len(&self) -> usize {
        self.load.len()
    }

    /// Whether the traces have no steps (never true for a valid matrix)
    pub fn is_empty(&self) -> bool {
        self.load.is_empty()
    }

    /// The number of hours covered by the traces
    pub fn hours(&self) -> f64 {
        self.len() as f64 * self.resolution.step_hours()
    }

    /// The load trace
    pub fn load(&self) -> &[f64] {
        &self.load
    }

    /// The label of the given step, if the source provided one
    pub fn period(&self, step: usize) -> Option<&str> {
        self.periods.get(step).map(String::as_str)
    }

    /// The availability trace for a facility, if there is one
    pub fn get(&self, id: &str) -> Option<&[f64]> {
        self.traces.get(id).map(Vec::as_slice)
    }

    /// The column position of a facility's trace, if there is one
    pub fn column(&self, id: &str) -> Option<usize> {
        self.traces.get_index_of(id)
    }

    /// The facilities which have traces, in column order
    pub fn facility_ids(&self) -> impl Iterator<Item = &FacilityID> {
        self.traces.keys()
    }

    /// Replace the load trace, e.g. with a per-year override
    pub fn with_load(mut self, load: Vec<f64>) -> Result<Self> {
        ensure!(
            load.len() == self.len(),
            PowermatchError::data_shape(format!(
                "Load override has {} steps but the traces have {}",
                load.len(),
                self.len()
            ))
        );
        check_trace("Load", &load, self.len())?;
        self.load = load;

        Ok(self)
    }
}

/// Check a single trace has the expected length and holds only non-negative numbers
fn check_trace(name: &str, trace: &[f64], len: usize) -> Result<()> {
    ensure!(
        trace.len() == len,
        PowermatchError::data_shape(format!(
            "Trace for {name} has {} steps but the load has {len}",
            trace.len()
        ))
    );
    if let Some(step) = trace.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        bail!(PowermatchError::data_shape(format!(
            "Trace for {name} has an invalid value at step {step}"
        )));
    }

    Ok(())
}
