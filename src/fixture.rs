//! Fixtures for tests

use crate::adjustment::Adjustments;
use crate::constraint::{Category, Constraint, ConstraintMap};
use crate::facility::{Facility, FacilityMap};
use crate::model::{FilePaths, Model, ModelConfig, ModelParameters};
use crate::progress::ProgressSink;
use crate::trace::TraceMatrix;
use crate::variable::{Approach, OptimisationVariable, VariableMap};
use indexmap::indexmap;
use rstest::fixture;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Number of hours in the test traces
pub const HOURS: usize = 8760;

#[fixture]
pub fn constraints() -> ConstraintMap {
    let solar = Constraint::new("Solar".into(), Category::Renewable);
    let mut gas = Constraint::new("Gas".into(), Category::Generator);
    gas.capacity_min = 0.2;
    let mut battery = Constraint::new("Battery".into(), Category::Storage);
    battery.recharge_loss = 0.1;
    battery.discharge_loss = 0.1;
    battery.discharge_max = 0.25;
    battery.recharge_max = 0.25;

    [solar, gas, battery]
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect()
}

#[fixture]
pub fn facilities() -> FacilityMap {
    let mut solar = Facility::new("Solar".into(), "Solar".into(), 100.0);
    solar.capex = 1200.0;
    solar.fixed_om = 15.0;
    solar.area = 0.02;
    solar.lifetime = 25;
    let mut gas = Facility::new("Gas".into(), "Gas".into(), 50.0);
    gas.capex = 900.0;
    gas.fixed_om = 10.0;
    gas.fuel = 60.0;
    gas.emissions = 0.5;
    let mut battery = Facility::new("Battery".into(), "Battery".into(), 200.0);
    battery.capex = 300.0;
    battery.lifetime = 15;

    [solar, gas, battery]
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect()
}

#[fixture]
pub fn variables() -> VariableMap {
    indexmap! {
        "Solar".into() => OptimisationVariable {
            facility_id: "Solar".into(),
            approach: Approach::Range { min: 0.0, max: 300.0, step: 50.0 },
        },
        "Battery".into() => OptimisationVariable {
            facility_id: "Battery".into(),
            approach: Approach::Discrete(vec![0.0, 100.0, 200.0, 400.0]),
        },
    }
}

/// Solar availability at 100 MW: half output between 06:00 and 18:00, nothing at night
#[fixture]
pub fn traces() -> TraceMatrix {
    let solar = (0..HOURS)
        .map(|h| if (6..18).contains(&(h % 24)) { 50.0 } else { 0.0 })
        .collect();
    TraceMatrix::new(Vec::new(), vec![40.0; HOURS], indexmap! {"Solar".into() => solar})
        .unwrap()
}

/// A model with solar, a battery and gas serving a flat 40 MW load
#[fixture]
pub fn model(
    constraints: ConstraintMap,
    facilities: FacilityMap,
    variables: VariableMap,
    traces: TraceMatrix,
) -> Model {
    let dispatch_order = vec!["Solar".into(), "Battery".into(), "Gas".into()];
    let powermatch = ModelParameters {
        discount_rate: 0.05,
        dispatch_order: ["Solar", "Battery", "Gas"].map(String::from).to_vec(),
        optimise_generations: 10,
        optimise_population: 10,
        optimise_seed: Some(42),
        ..Default::default()
    };

    Model {
        model_dir: PathBuf::new(),
        config: ModelConfig {
            files: FilePaths {
                constraints: "constraints.csv".into(),
                generators: "generators.csv".into(),
                optimisation: None,
                data: "data.csv".into(),
                batch: None,
                load: None,
            },
            powermatch,
        },
        constraints,
        facilities,
        variables,
        dispatch_order,
        ignored: Vec::new(),
        traces,
        adjustments: Adjustments::default(),
        batch: None,
    }
}

/// A progress sink which records updates and can cancel after a number of them
#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<(usize, usize)>>,
    messages: Mutex<Vec<String>>,
    finished: AtomicUsize,
    cancel_after: Option<usize>,
}

impl RecordingProgress {
    /// Cancel once `count` updates have been received
    pub fn cancel_after(count: usize) -> Self {
        Self {
            cancel_after: Some(count),
            ..Default::default()
        }
    }

    /// The `(current, total)` pairs received so far
    pub fn updates(&self) -> Vec<(usize, usize)> {
        self.updates.lock().unwrap().clone()
    }

    /// The messages received so far
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// The number of times `finish` was called
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressSink for RecordingProgress {
    fn update(&self, current: usize, total: usize, message: &str) {
        self.updates.lock().unwrap().push((current, total));
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn cancelled(&self) -> bool {
        self.cancel_after
            .is_some_and(|count| self.updates.lock().unwrap().len() >= count)
    }
}
