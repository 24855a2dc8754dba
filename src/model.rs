//! The model: every input needed to run a scenario, loaded and checked.
use crate::adjustment::Adjustments;
use crate::constraint::{Category, ConstraintMap};
use crate::dispatch::{DispatchUnit, Trace};
use crate::error::PowermatchError;
use crate::facility::{FacilityID, FacilityMap};
use crate::id::IDCollection;
use crate::input::batch::{BatchScenario, read_batch};
use crate::input::constraint::read_constraints;
use crate::input::facility::read_facilities;
use crate::input::optimisation::read_optimisation_variables;
use crate::input::trace::{read_load, read_traces};
use crate::input::{YEAR_PLACEHOLDER, substitute_year};
use crate::metrics::CostParameters;
use crate::trace::TraceMatrix;
use crate::variable::VariableMap;
use anyhow::{Context, Result, bail, ensure};
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub mod parameters;
pub use parameters::{FilePaths, ModelConfig, ModelParameters, OptimiseChoice};

/// The default name of the configuration file within a model directory
pub const CONFIG_FILE_NAME: &str = "powermatch.toml";

/// Model definition
pub struct Model {
    /// Directory containing the configuration file, against which input paths are resolved
    pub model_dir: PathBuf,
    /// The configuration file contents
    pub config: ModelConfig,
    /// Constraints, keyed by name
    pub constraints: ConstraintMap,
    /// Facilities, keyed by name, in the order they were loaded
    pub facilities: FacilityMap,
    /// Optimisation variables (empty without an optimisation table)
    pub variables: VariableMap,
    /// Facilities taking part in the simulation, in dispatch order
    pub dispatch_order: Vec<FacilityID>,
    /// Facilities left out of the simulation
    pub ignored: Vec<FacilityID>,
    /// Traces for the load year, or the first transition year
    pub traces: TraceMatrix,
    /// Multipliers from the configuration file
    pub adjustments: Adjustments,
    /// Scenarios from the batch sheet, if there is one
    pub batch: Option<Vec<BatchScenario>>,
}

/// Resolve the dispatch order against the known facilities.
///
/// # Returns
///
/// The facilities in dispatch order and the facilities left out of it.
fn resolve_dispatch_order(
    names: &[String],
    facilities: &FacilityMap,
) -> Result<(Vec<FacilityID>, Vec<FacilityID>)> {
    ensure!(
        !names.is_empty(),
        PowermatchError::data_shape("The dispatch order is empty")
    );

    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(names.len());
    for name in names {
        let id = facilities.get_id_by_str(name).map_err(|_| {
            PowermatchError::config(format!(
                "[powermatch] dispatch_order: unknown generator {name}"
            ))
        })?;
        ensure!(
            seen.insert(id.clone()),
            PowermatchError::config(format!(
                "[powermatch] dispatch_order: {name} appears more than once"
            ))
        );
        order.push(id);
    }

    let ignored = facilities
        .keys()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect();

    Ok((order, ignored))
}

/// Resolve a file name which may contain a year placeholder
fn year_path(model_dir: &Path, file_name: &str, year: Option<u32>, key: &str) -> Result<PathBuf> {
    let file_name = match year {
        Some(year) => substitute_year(file_name, year),
        None if file_name.contains(YEAR_PLACEHOLDER) => {
            bail!(PowermatchError::config(format!(
                "[files] {key} contains {YEAR_PLACEHOLDER} but no year was given \
                (set load_year or transition_years in [powermatch])"
            )))
        }
        None => file_name.to_string(),
    };

    Ok(model_dir.join(file_name))
}

/// Read the traces for a year, applying the per-year load file if there is one
fn read_year_traces(model_dir: &Path, files: &FilePaths, year: Option<u32>) -> Result<TraceMatrix> {
    let traces = read_traces(&year_path(model_dir, &files.data, year, "data")?)?;
    let Some(load_file) = &files.load else {
        return Ok(traces);
    };

    let load = read_load(&year_path(model_dir, load_file, year, "load")?, traces.len())?;
    traces.with_load(load)
}

impl Model {
    /// Read a model from its configuration file.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Path to the configuration file, or to a directory containing
    ///   `powermatch.toml`
    pub fn from_path<P: AsRef<Path>>(config_path: P) -> Result<Model> {
        let mut config_path = config_path.as_ref().to_path_buf();
        if config_path.is_dir() {
            config_path.push(CONFIG_FILE_NAME);
        }
        let model_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let config = ModelConfig::from_path(&config_path)?;

        let mut constraints = read_constraints(&model_dir.join(&config.files.constraints))?;
        let facilities = read_facilities(&model_dir.join(&config.files.generators), &mut constraints)?;
        let variables = match &config.files.optimisation {
            Some(path) => read_optimisation_variables(&model_dir.join(path), &facilities)?,
            None => VariableMap::new(),
        };
        let batch = config
            .files
            .batch
            .as_ref()
            .map(|path| read_batch(&model_dir.join(path), &facilities))
            .transpose()?;

        let params = &config.powermatch;
        let (dispatch_order, ignored) = resolve_dispatch_order(&params.dispatch_order, &facilities)?;
        if !ignored.is_empty() {
            info!(
                "Not in the dispatch order, so left out of the simulation: {}",
                ignored.iter().map(FacilityID::as_str).collect::<Vec<_>>().join(", ")
            );
        }
        for id in variables.keys() {
            ensure!(
                dispatch_order.contains(id),
                PowermatchError::validation(format!(
                    "Cannot optimise {id}: it is not in the dispatch order"
                ))
            );
        }

        let adjustments = Adjustments::from_named(
            params
                .adjusted_capacities
                .iter()
                .map(|(name, value)| (name.as_str(), *value)),
            &facilities,
        )?;

        let traces = read_year_traces(&model_dir, &config.files, params.base_year()?)?;
        let model = Model {
            model_dir,
            config,
            constraints,
            facilities,
            variables,
            dispatch_order,
            ignored,
            traces,
            adjustments,
            batch,
        };

        // Check every participant can be simulated before anything runs
        model.dispatch_units(&model.traces, &model.adjustments)?;

        Ok(model)
    }

    /// Read the traces for a year, applying the per-year load file if there is one.
    ///
    /// # Arguments
    ///
    /// * `year` - The year to substitute into file names, if any
    pub fn traces_for_year(&self, year: Option<u32>) -> Result<TraceMatrix> {
        read_year_traces(&self.model_dir, &self.config.files, year)
    }

    /// Economic parameters for the metrics calculation
    pub fn cost_parameters(&self) -> CostParameters {
        CostParameters {
            discount_rate: self.config.powermatch.discount_rate,
            carbon_price: self.config.powermatch.carbon_price,
        }
    }

    /// The model parameters
    pub fn parameters(&self) -> &ModelParameters {
        &self.config.powermatch
    }

    /// Build the simulation inputs for the facilities in the dispatch order.
    ///
    /// # Arguments
    ///
    /// * `traces` - The traces to simulate
    /// * `adjustments` - Capacity multipliers
    pub fn dispatch_units<'a>(
        &'a self,
        traces: &'a TraceMatrix,
        adjustments: &Adjustments,
    ) -> Result<Vec<DispatchUnit<'a>>> {
        self.dispatch_order
            .iter()
            .map(|id| {
                let facility = &self.facilities[id];
                let constraint = self
                    .constraints
                    .get(&facility.constraint)
                    .with_context(|| format!("Unknown constraint for {id}"))?;
                let trace = traces.column(id.as_str()).and_then(|column| {
                    traces
                        .get(id.as_str())
                        .map(|values| Trace { column, values })
                });
                if constraint.category == Category::Renewable && trace.is_none() {
                    bail!(PowermatchError::data_shape(format!(
                        "No trace column for renewable generator {id}"
                    )));
                }
                if constraint.is_storage() && trace.is_some() {
                    warn!("Ignoring trace column for storage {id}");
                }

                let multiplier = adjustments.multiplier(id);
                Ok(DispatchUnit {
                    id: id.clone(),
                    constraint,
                    capacity: facility.capacity * multiplier,
                    multiplier,
                    initial: facility.initial.min(facility.capacity) * multiplier,
                    trace,
                })
            })
            .collect()
    }
}
