//! The time-stepped energy balance simulation.
//!
//! Each step, facilities with availability traces (renewables and any other non-dispatchable
//! plant) serve the load first, in trace column order. Whatever they could have produced beyond
//! the load forms the step's surplus pool. Generators and storage are then offered the
//! remaining load in dispatch order, with storage charging from the surplus pool in steps where
//! the load has been met.
//!
//! The simulation is a pure function of its inputs.
use crate::constraint::{Category, Constraint};
use crate::facility::FacilityID;
use crate::trace::Resolution;
use itertools::Itertools;

pub mod generator;
use generator::GeneratorState;
pub mod storage;
use storage::StorageState;

/// An availability trace along with its column position in the data sheet
#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
    /// Position of the trace among all trace columns
    pub column: usize,
    /// Energy available per step at base capacity
    pub values: &'a [f64],
}

/// A facility as it takes part in one simulation
#[derive(Debug, Clone)]
pub struct DispatchUnit<'a> {
    /// Name of the facility
    pub id: FacilityID,
    /// Operating limits
    pub constraint: &'a Constraint,
    /// Effective capacity (MW, or MWh for storage)
    pub capacity: f64,
    /// Multiplier applied to the base capacity, which also scales the trace
    pub multiplier: f64,
    /// Initial state of charge for storage (MWh)
    pub initial: f64,
    /// Availability trace, if the facility has one
    pub trace: Option<Trace<'a>>,
}

impl DispatchUnit<'_> {
    /// Whether the unit serves load ahead of the dispatch order
    fn is_non_dispatchable(&self) -> bool {
        self.trace.is_some() && !self.constraint.is_storage()
    }
}

/// Per-step results for one facility
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    /// Name of the facility
    pub id: FacilityID,
    /// The kind of technology
    pub category: Category,
    /// Effective capacity used in the simulation
    pub capacity: f64,
    /// Energy delivered to load
    pub dispatched: Vec<f64>,
    /// Available energy neither delivered to load nor stored
    pub curtailed: Vec<f64>,
    /// This facility's share of the surplus taken up by storage charging
    pub stored: Vec<f64>,
    /// Energy produced beyond the load (generators held on by run or ramp limits)
    pub excess: Vec<f64>,
    /// Surplus energy consumed by charging (storage)
    pub charged: Vec<f64>,
    /// State of charge at the start of each step (storage)
    pub soc: Vec<f64>,
    /// Steps since start (generators)
    pub hours_on: Vec<u32>,
    /// State of charge at the end of the run (storage)
    pub final_soc: f64,
    /// Total energy lost by storage
    pub losses: f64,
}

impl DispatchRecord {
    fn new(unit: &DispatchUnit, len: usize) -> Self {
        Self {
            id: unit.id.clone(),
            category: unit.constraint.category,
            capacity: unit.capacity,
            dispatched: vec![0.0; len],
            curtailed: vec![0.0; len],
            stored: vec![0.0; len],
            excess: vec![0.0; len],
            charged: vec![0.0; len],
            soc: vec![0.0; len],
            hours_on: vec![0; len],
            final_soc: 0.0,
            losses: 0.0,
        }
    }

    /// Total energy delivered to load
    pub fn total_dispatched(&self) -> f64 {
        self.dispatched.iter().sum()
    }

    /// Total energy produced, including output beyond the load
    pub fn total_output(&self) -> f64 {
        self.total_dispatched() + self.excess.iter().sum::<f64>()
    }
}

/// The results of a simulation
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Time step of the simulation
    pub resolution: Resolution,
    /// The load that was served
    pub load: Vec<f64>,
    /// One record per participating facility, in dispatch order
    pub records: Vec<DispatchRecord>,
    /// Load not served in each step
    pub shortfall: Vec<f64>,
    /// Energy left over in each step after serving load and charging storage
    pub surplus: Vec<f64>,
}

impl DispatchOutcome {
    /// Energy delivered to load in one step
    pub fn served(&self, step: usize) -> f64 {
        self.load[step] - self.shortfall[step]
    }

    /// The record for a facility
    pub fn record(&self, id: &str) -> Option<&DispatchRecord> {
        self.records.iter().find(|record| record.id.as_str() == id)
    }
}

/// The per-run state of a unit offered load in dispatch order
enum DispatchState {
    Generator(GeneratorState),
    Storage(StorageState),
}

/// Simulate the energy balance over every step of the load trace.
///
/// # Arguments
///
/// * `units` - Participating facilities in dispatch order
/// * `load` - Load per step (MWh)
/// * `resolution` - Time step of `load` and every trace
///
/// # Returns
///
/// Per-facility records (in the same order as `units`) and per-step shortfall and surplus.
pub fn dispatch(units: &[DispatchUnit], load: Vec<f64>, resolution: Resolution) -> DispatchOutcome {
    let len = load.len();
    let steps_per_hour = resolution.steps_per_hour();
    let step_hours = resolution.step_hours();
    let mut records = units.iter().map(|unit| DispatchRecord::new(unit, len)).collect_vec();

    // Non-dispatchable units in trace column order; the sort is stable so ties keep load order
    let first_pass = units
        .iter()
        .enumerate()
        .filter(|(_, unit)| unit.is_non_dispatchable())
        .sorted_by_key(|(_, unit)| unit.trace.map(|trace| trace.column))
        .map(|(i, _)| i)
        .collect_vec();

    // Everything else, skipping units which could never produce anything
    let mut second_pass = units
        .iter()
        .enumerate()
        .filter(|(_, unit)| !unit.is_non_dispatchable() && unit.capacity > 0.0)
        .filter_map(|(i, unit)| {
            let state = match unit.constraint.category {
                Category::Storage => DispatchState::Storage(StorageState::new(
                    unit.constraint,
                    unit.capacity,
                    unit.initial,
                    steps_per_hour,
                )),
                Category::Generator => DispatchState::Generator(GeneratorState::new(
                    unit.constraint,
                    unit.capacity,
                    steps_per_hour,
                )),
                // Renewables must have a trace to take part
                Category::Renewable => return None,
            };
            Some((i, state))
        })
        .collect_vec();

    let mut shortfall = vec![0.0; len];
    let mut surplus = vec![0.0; len];
    // What each first-pass unit put into the recharge pool this step
    let mut contributions = vec![0.0; first_pass.len()];
    for step in 0..len {
        let mut remaining = load[step];
        let mut pool = 0.0;
        let mut excess = 0.0;

        for (&i, contribution) in first_pass.iter().zip(&mut contributions) {
            let unit = &units[i];
            let record = &mut records[i];
            *contribution = 0.0;
            let Some(trace) = unit.trace else { continue };
            let available = trace.values[step] * unit.multiplier;
            let usable = available.min(unit.capacity * unit.constraint.capacity_max * step_hours);
            let to_load = usable.min(remaining);
            remaining -= to_load;
            *contribution = usable - to_load;
            pool += *contribution;
            record.dispatched[step] = to_load;
            record.curtailed[step] = available - to_load;
        }
        let offered = pool;

        for (i, state) in &mut second_pass {
            let record = &mut records[*i];
            match state {
                DispatchState::Generator(generator) => {
                    let outcome = generator.step(remaining);
                    remaining = (remaining - outcome.to_load).max(0.0);
                    excess += outcome.excess;
                    record.dispatched[step] = outcome.to_load;
                    record.excess[step] = outcome.excess;
                    record.hours_on[step] = generator.hours_on();
                }
                DispatchState::Storage(storage) => {
                    let outcome = storage.step(remaining, pool);
                    remaining = (remaining - outcome.delivered).max(0.0);
                    pool = (pool - outcome.consumed).max(0.0);
                    record.soc[step] = outcome.opening;
                    record.dispatched[step] = outcome.delivered;
                    record.charged[step] = outcome.consumed;
                    record.losses += outcome.losses;
                }
            }
        }

        // Storage draws on every contributor in proportion to what it offered
        if offered > 0.0 && pool < offered {
            let stored_fraction = (offered - pool) / offered;
            for (&i, contribution) in first_pass.iter().zip(&contributions) {
                let record = &mut records[i];
                let stored = contribution * stored_fraction;
                record.stored[step] = stored;
                record.curtailed[step] = (record.curtailed[step] - stored).max(0.0);
            }
        }

        shortfall[step] = remaining;
        surplus[step] = pool + excess;
    }

    for (i, state) in second_pass {
        if let DispatchState::Storage(storage) = state {
            records[i].final_soc = storage.soc();
        }
    }

    DispatchOutcome {
        resolution,
        load,
        records,
        shortfall,
        surplus,
    }
}
