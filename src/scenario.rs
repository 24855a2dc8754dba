//! Running the model in its summary, detail, batch and transition modes.
use crate::adjustment::Adjustments;
use crate::dispatch::{DispatchOutcome, dispatch};
use crate::error::PowermatchError;
use crate::facility::FacilityID;
use crate::metrics::{Metrics, calculate_metrics};
use crate::model::Model;
use crate::progress::{ProgressSink, with_finish};
use crate::trace::TraceMatrix;
use anyhow::{Context, Result, bail};
use log::{info, warn};

/// The results of one simulation
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    /// A label for the scenario
    pub name: String,
    /// The adjustments which produced the results
    pub adjustments: Adjustments,
    /// Facility and system metrics
    pub metrics: Metrics,
}

/// The results of a run over several scenarios
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRun {
    /// The participating facilities, in dispatch order
    pub facilities: Vec<FacilityID>,
    /// Results for each scenario completed
    pub results: Vec<ScenarioResult>,
    /// Whether the run stopped early because it was cancelled
    pub cancelled: bool,
}

/// Simulate the model with the given traces and adjustments.
///
/// # Arguments
///
/// * `model` - The model to simulate
/// * `traces` - Availability and load traces
/// * `adjustments` - Capacity multipliers (applied on their own, not on top of the model's)
pub fn simulate(
    model: &Model,
    traces: &TraceMatrix,
    adjustments: &Adjustments,
) -> Result<(DispatchOutcome, Metrics)> {
    let units = model.dispatch_units(traces, adjustments)?;
    let load = traces.load().iter().map(|l| l * adjustments.load()).collect();
    let outcome = dispatch(&units, load, traces.resolution());
    let metrics = calculate_metrics(&outcome, &model.facilities, &model.cost_parameters())?;

    Ok((outcome, metrics))
}

/// Simulate the model with its configured adjustments.
///
/// # Returns
///
/// The summary results along with the full simulation outcome for detailed output.
pub fn run_single(model: &Model) -> Result<(ScenarioResult, DispatchOutcome)> {
    let (outcome, metrics) = simulate(model, &model.traces, &model.adjustments)?;
    info!(
        "LCOE: {:.2} $/MWh, load met: {:.1}%",
        metrics.system.lcoe,
        metrics.system.load_pct * 100.0
    );
    let result = ScenarioResult {
        name: "Base".into(),
        adjustments: model.adjustments.clone(),
        metrics,
    };

    Ok((result, outcome))
}

/// Simulate each scenario in the batch sheet.
///
/// Each scenario's multipliers are layered on top of the configured adjustments. Cancellation is
/// checked before each scenario.
pub fn run_batch(model: &Model, progress: &dyn ProgressSink) -> Result<ScenarioRun> {
    let scenarios = model.batch.as_ref().ok_or_else(|| {
        PowermatchError::config("[files] batch must be given to run in batch mode")
    })?;

    let (results, cancelled) = with_finish(progress, || {
        let mut results = Vec::with_capacity(scenarios.len());
        for (i, scenario) in scenarios.iter().enumerate() {
            if progress.cancelled() {
                warn!("Batch run cancelled after {i} of {} scenarios", scenarios.len());
                return Ok((results, true));
            }

            let adjustments = model.adjustments.overridden_by(&scenario.adjustments);
            let (_, metrics) = simulate(model, &model.traces, &adjustments)
                .with_context(|| format!("Failed to run batch scenario {}", scenario.name))?;
            results.push(ScenarioResult {
                name: scenario.name.clone(),
                adjustments,
                metrics,
            });
            progress.update(i + 1, scenarios.len(), &scenario.name);
        }
        Ok((results, false))
    })?;

    Ok(ScenarioRun {
        facilities: model.dispatch_order.clone(),
        results,
        cancelled,
    })
}

/// Simulate each transition year, reading that year's data and load files.
///
/// Facilities and adjustments are shared across years.
pub fn run_transition(model: &Model, progress: &dyn ProgressSink) -> Result<ScenarioRun> {
    let years = model.parameters().transition_years()?;
    if years.is_empty() {
        bail!(PowermatchError::config(
            "[powermatch] transition_years must be given to run in transition mode",
        ));
    }

    let (results, cancelled) = with_finish(progress, || {
        let mut results = Vec::with_capacity(years.len());
        for (i, year) in years.iter().enumerate() {
            if progress.cancelled() {
                warn!("Transition run cancelled before {year}");
                return Ok((results, true));
            }

            let traces = model.traces_for_year(Some(*year))?;
            let (_, metrics) = simulate(model, &traces, &model.adjustments)
                .with_context(|| format!("Failed to run transition year {year}"))?;
            results.push(ScenarioResult {
                name: year.to_string(),
                adjustments: model.adjustments.clone(),
                metrics,
            });
            progress.update(i + 1, years.len(), &format!("Year {year}"));
        }
        Ok((results, false))
    })?;

    Ok(ScenarioRun {
        facilities: model.dispatch_order.clone(),
        results,
        cancelled,
    })
}
