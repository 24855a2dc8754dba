//! Searching for the capacity mix which best meets the optimisation targets.
use crate::adjustment::Adjustments;
use crate::error::PowermatchError;
use crate::facility::FacilityID;
use crate::metrics::SystemMetrics;
use crate::model::{Model, OptimiseChoice};
use crate::progress::{ProgressSink, with_finish};
use crate::scenario::simulate;
use crate::variable::OptimisationVariable;
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::HashMap;
use strum::Display;

pub mod genetic;
pub mod pareto;
pub mod target;
use genetic::{Chromosome, GeneticSearch, GeneticSettings};
use pareto::pareto_fronts;
use target::{Target, Targets};

/// The results of simulating one chromosome
#[derive(Debug, Clone, PartialEq)]
struct Evaluation {
    adjustments: Adjustments,
    metrics: SystemMetrics,
    weighted: f64,
}

impl Evaluation {
    /// Whether any load was served
    fn is_feasible(&self) -> bool {
        self.metrics.served > 0.0
    }

    /// The value minimised by the search (infeasible fleets score +inf)
    fn score(&self, mode: SearchMode) -> f64 {
        if !self.is_feasible() {
            return f64::INFINITY;
        }

        match mode {
            SearchMode::Lcoe => self.metrics.lcoe,
            SearchMode::Weighted => self.weighted,
        }
    }
}

/// The objective of a single genetic search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum SearchMode {
    #[strum(serialize = "LCOE")]
    Lcoe,
    #[strum(serialize = "Multi")]
    Weighted,
}

/// Simulates chromosomes, remembering results so each distinct fleet is simulated once
struct Evaluator<'a> {
    model: &'a Model,
    variables: &'a [&'a OptimisationVariable],
    targets: &'a Targets,
    cache: HashMap<Vec<u64>, Evaluation>,
}

/// Key for the evaluation cache
fn chromosome_key(chromosome: &[f64]) -> Vec<u64> {
    chromosome.iter().map(|gene| gene.to_bits()).collect()
}

impl<'a> Evaluator<'a> {
    fn new(model: &'a Model, variables: &'a [&'a OptimisationVariable], targets: &'a Targets) -> Self {
        Self {
            model,
            variables,
            targets,
            cache: HashMap::new(),
        }
    }

    /// Convert a chromosome into capacity multipliers on top of the model's adjustments
    fn adjustments(&self, chromosome: &[f64]) -> Result<Adjustments> {
        let mut adjustments = self.model.adjustments.clone();
        for (var, capacity) in self.variables.iter().zip(chromosome) {
            let base = self.model.facilities[&var.facility_id].capacity;
            adjustments.set(var.facility_id.clone(), capacity / base)?;
        }

        Ok(adjustments)
    }

    fn simulate(&self, chromosome: &[f64]) -> Result<Evaluation> {
        let adjustments = self.adjustments(chromosome)?;
        let (_, metrics) = simulate(self.model, &self.model.traces, &adjustments)?;
        let weighted = self.targets.weighted_score(&metrics.system);

        Ok(Evaluation {
            adjustments,
            metrics: metrics.system,
            weighted,
        })
    }

    /// Evaluate a population, simulating uncached chromosomes in parallel
    fn evaluate(&mut self, population: &[Chromosome]) -> Result<Vec<Evaluation>> {
        let missing = population
            .iter()
            .filter(|chromosome| !self.cache.contains_key(&chromosome_key(chromosome)))
            .unique_by(|chromosome| chromosome_key(chromosome))
            .collect_vec();
        let this = &*self;
        let results: Vec<_> = missing
            .par_iter()
            .map(|chromosome| Ok((chromosome_key(chromosome), this.simulate(chromosome)?)))
            .collect::<Result<_>>()?;
        self.cache.extend(results);

        population
            .iter()
            .map(|chromosome| {
                self.cache
                    .get(&chromosome_key(chromosome))
                    .cloned()
                    .context("Chromosome missing from evaluation cache")
            })
            .collect()
    }

    /// Run one genetic search
    fn search(
        &mut self,
        mode: SearchMode,
        settings: GeneticSettings,
        seeds: &[Chromosome],
        rng: &mut StdRng,
        progress: &dyn ProgressSink,
    ) -> Result<genetic::Evolution> {
        info!("Starting {mode} optimisation");
        let variables = self.variables;
        let evaluate = |population: &[Chromosome]| -> Result<Vec<f64>> {
            Ok(self
                .evaluate(population)?
                .iter()
                .map(|evaluation| evaluation.score(mode))
                .collect())
        };
        GeneticSearch::new(variables, settings, rng).run(
            seeds,
            evaluate,
            progress,
            &mode.to_string(),
        )
    }
}

/// A representative solution offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Choice {
    /// The cheapest fleet per unit of energy served
    LowestLcoe,
    /// The fleet with the lowest weighted score
    LowestWeighted,
    /// The fleet with the median weighted score
    Median,
}

/// One distinct fleet from the final population
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Capacity of each optimised facility, in the order of [`OptimisationResult::facilities`]
    pub capacities: Vec<f64>,
    /// The multipliers which reproduce this fleet
    pub adjustments: Adjustments,
    /// System results for this fleet
    pub metrics: SystemMetrics,
    /// Weighted score over the active targets
    pub weighted: f64,
    /// Pareto front (0 is non-dominated)
    pub front: usize,
}

/// The outcome of an optimisation run
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationResult {
    /// The facilities whose capacities were searched
    pub facilities: Vec<FacilityID>,
    /// Distinct fleets from the final population, ordered by front then score
    pub candidates: Vec<Candidate>,
    /// Representative fleets, as indices into `candidates`
    pub choices: Vec<(Choice, usize)>,
    /// Generations bred in the last search
    pub generations: u32,
    /// Whether the run was cancelled
    pub cancelled: bool,
}

impl OptimisationResult {
    /// The candidate selected for a choice
    pub fn choice(&self, choice: Choice) -> Option<&Candidate> {
        self.choices
            .iter()
            .find(|(c, _)| *c == choice)
            .map(|(_, idx)| &self.candidates[*idx])
    }
}

/// The metrics compared when sorting into Pareto fronts, oriented so lower is better
fn objectives(targets: &Targets, evaluation: &Evaluation) -> Vec<f64> {
    let active = targets.active().collect_vec();
    if !evaluation.is_feasible() {
        return vec![f64::INFINITY; active.len().max(1)];
    }
    if active.is_empty() {
        return vec![evaluation.metrics.lcoe];
    }

    active
        .into_iter()
        .map(|(target, weight)| {
            let value = target.value(&evaluation.metrics);
            if weight.worse >= weight.better {
                value
            } else {
                -value
            }
        })
        .collect()
}

/// Pick the representative candidates from the feasible ones
fn choose(candidates: &[Candidate]) -> Vec<(Choice, usize)> {
    let feasible = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.metrics.served > 0.0)
        .collect_vec();
    let Some((lowest_lcoe, _)) = feasible
        .iter()
        .min_by(|(_, a), (_, b)| a.metrics.lcoe.total_cmp(&b.metrics.lcoe))
    else {
        return Vec::new();
    };
    let by_weighted = feasible
        .iter()
        .sorted_by(|(_, a), (_, b)| a.weighted.total_cmp(&b.weighted))
        .map(|(idx, _)| *idx)
        .collect_vec();

    vec![
        (Choice::LowestLcoe, *lowest_lcoe),
        (Choice::LowestWeighted, by_weighted[0]),
        (Choice::Median, by_weighted[(by_weighted.len() - 1) / 2]),
    ]
}

/// Describe the search domain, for error messages
fn describe_bounds(variables: &[&OptimisationVariable]) -> String {
    variables
        .iter()
        .map(|var| {
            let (min, max) = var.bounds();
            format!("{} [{min}, {max}]", var.facility_id)
        })
        .join(", ")
}

/// Search for the fleet which best meets the optimisation targets.
///
/// The choice of objective (LCOE, weighted targets or both in turn) and the genetic algorithm's
/// parameters come from the model configuration. Progress is reported once per generation and
/// cancellation is checked between generations, in which case the current population is returned.
///
/// # Arguments
///
/// * `model` - The model, including its optimisation variables
/// * `progress` - Progress sink
///
/// # Returns
///
/// The distinct fleets from the final population, ranked into Pareto fronts, and the
/// representative choices.
pub fn optimise(model: &Model, progress: &dyn ProgressSink) -> Result<OptimisationResult> {
    ensure!(
        !model.variables.is_empty(),
        PowermatchError::config(
            "No optimisation variables: [files] optimisation must list at least one generator"
        )
    );

    let parameters = model.parameters();
    let variables = model.variables.values().collect_vec();
    let targets = parameters.targets();
    let settings = GeneticSettings {
        population: parameters.optimise_population as usize,
        generations: parameters.optimise_generations,
        mutation: parameters.optimise_mutation,
        stop: parameters.optimise_stop,
    };
    let mut rng = match parameters.optimise_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut evaluator = Evaluator::new(model, &variables, &targets);
    let evolution = with_finish(progress, || match parameters.optimise_choice {
        OptimiseChoice::Lcoe => {
            evaluator.search(SearchMode::Lcoe, settings, &[], &mut rng, progress)
        }
        OptimiseChoice::Multi => {
            evaluator.search(SearchMode::Weighted, settings, &[], &mut rng, progress)
        }
        OptimiseChoice::Both => {
            let first = evaluator.search(SearchMode::Lcoe, settings, &[], &mut rng, progress)?;
            let best = first
                .best()
                .filter(|_| !first.cancelled)
                .map(|(best, _)| best.clone());
            match best {
                Some(best) => evaluator.search(
                    SearchMode::Weighted,
                    settings,
                    &[best],
                    &mut rng,
                    progress,
                ),
                None => Ok(first),
            }
        }
    })?;
    if evolution.cancelled {
        warn!(
            "Optimisation cancelled after {} generations",
            evolution.generations
        );
    }

    let population = evolution
        .population
        .iter()
        .unique_by(|chromosome| chromosome_key(chromosome))
        .cloned()
        .collect_vec();
    let evaluations = evaluator.evaluate(&population)?;
    if !evaluations.iter().any(Evaluation::is_feasible) {
        bail!(PowermatchError::infeasible(format!(
            "No candidate fleet served any load. Capacities tried: {}",
            describe_bounds(&variables)
        )));
    }

    let mode = match parameters.optimise_choice {
        OptimiseChoice::Lcoe => SearchMode::Lcoe,
        OptimiseChoice::Multi | OptimiseChoice::Both => SearchMode::Weighted,
    };
    let objectives = evaluations
        .iter()
        .map(|evaluation| objectives(&targets, evaluation))
        .collect_vec();
    let fronts = pareto_fronts(&objectives);
    let candidates = population
        .into_iter()
        .zip(evaluations)
        .zip(fronts)
        .sorted_by(|((_, a), front_a), ((_, b), front_b)| {
            front_a
                .cmp(front_b)
                .then(a.score(mode).total_cmp(&b.score(mode)))
        })
        .map(|((capacities, evaluation), front)| Candidate {
            capacities,
            adjustments: evaluation.adjustments,
            metrics: evaluation.metrics,
            weighted: evaluation.weighted,
            front,
        })
        .collect_vec();
    let choices = choose(&candidates);
    if let Some((_, idx)) = choices.first() {
        info!(
            "Lowest LCOE found: {:.2} $/MWh",
            candidates[*idx].metrics.lcoe
        );
    }

    Ok(OptimisationResult {
        facilities: variables.iter().map(|var| var.facility_id.clone()).collect(),
        candidates,
        choices,
        generations: evolution.generations,
        cancelled: evolution.cancelled,
    })
}

/// Names of the targets used to rank the results, for output headers
pub fn ranking_targets(targets: &Targets) -> Vec<Target> {
    let active = targets.active().map(|(target, _)| target).collect_vec();
    if active.is_empty() {
        vec![Target::Lcoe]
    } else {
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintID;
    use crate::error::{ErrorKind, error_kind};
    use crate::fixture::{RecordingProgress, model};
    use crate::scenario;
    use crate::variable::Approach;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use target::TargetWeight;

    fn run(model: &Model) -> OptimisationResult {
        optimise(model, &RecordingProgress::default()).unwrap()
    }

    #[rstest]
    fn test_optimise_is_deterministic(model: Model) {
        assert_eq!(run(&model), run(&model));
    }

    #[rstest]
    fn test_optimise_lcoe_ranking(model: Model) {
        let result = run(&model);
        assert!(!result.cancelled);
        assert_eq!(
            result.facilities,
            [FacilityID::from("Solar"), FacilityID::from("Battery")]
        );
        assert!(
            result
                .candidates
                .windows(2)
                .all(|w| w[0].metrics.lcoe <= w[1].metrics.lcoe)
        );
        assert_eq!(result.choice(Choice::LowestLcoe), result.candidates.first());
    }

    #[rstest]
    fn test_candidates_within_domain(model: Model) {
        let result = run(&model);
        let solar = [0.0, 50.0, 100.0, 150.0, 200.0, 250.0, 300.0];
        let battery = [0.0, 100.0, 200.0, 400.0];
        for candidate in &result.candidates {
            assert!(solar.contains(&candidate.capacities[0]));
            assert!(battery.contains(&candidate.capacities[1]));
            assert_approx_eq!(
                f64,
                candidate.adjustments.multiplier(&"Solar".into()),
                candidate.capacities[0] / 100.0
            );
            assert_approx_eq!(
                f64,
                candidate.adjustments.multiplier(&"Battery".into()),
                candidate.capacities[1] / 200.0
            );
        }
        let unique = result
            .candidates
            .iter()
            .map(|c| chromosome_key(&c.capacities))
            .unique()
            .count();
        assert_eq!(unique, result.candidates.len());
    }

    #[rstest]
    fn test_candidate_can_be_rerun(model: Model) {
        let result = run(&model);
        let candidate = result.choice(Choice::Median).unwrap();
        let (_, metrics) =
            scenario::simulate(&model, &model.traces, &candidate.adjustments).unwrap();
        assert_eq!(metrics.system, candidate.metrics);
    }

    #[rstest]
    fn test_optimise_multi(mut model: Model) {
        model.config.powermatch.optimise_choice = OptimiseChoice::Multi;
        model.config.powermatch.optimise_re_pct = Some(TargetWeight {
            weight: 1.0,
            better: 1.0,
            worse: 0.0,
        });
        let result = run(&model);

        let lowest = result.choice(Choice::LowestWeighted).unwrap();
        assert!(result.candidates.iter().all(|c| lowest.weighted <= c.weighted));
        let median = result.choice(Choice::Median).unwrap();
        assert!(median.weighted >= lowest.weighted);
        assert_eq!(result.candidates[0].front, 0);
        assert!(result.candidates.windows(2).all(|w| w[0].front <= w[1].front));
    }

    #[rstest]
    fn test_optimise_both(mut model: Model) {
        model.config.powermatch.optimise_choice = OptimiseChoice::Both;
        let progress = RecordingProgress::default();
        let result = optimise(&model, &progress).unwrap();
        assert_eq!(result.choices.len(), 3);
        assert_eq!(progress.updates().len(), 20);
        assert_eq!(progress.finished(), 1);
    }

    #[rstest]
    fn test_optimise_cancelled(model: Model) {
        let progress = RecordingProgress::cancel_after(3);
        let result = optimise(&model, &progress).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.generations, 3);
        assert!(!result.candidates.is_empty());
        assert_eq!(progress.finished(), 1);
    }

    #[rstest]
    fn test_optimise_no_variables(mut model: Model) {
        model.variables.clear();
        let err = optimise(&model, &RecordingProgress::default()).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[rstest]
    fn test_optimise_failure_still_finishes(mut model: Model) {
        model.constraints.shift_remove(&ConstraintID::from("Gas"));
        let progress = RecordingProgress::default();
        assert!(optimise(&model, &progress).is_err());
        assert_eq!(progress.finished(), 1);
    }

    #[rstest]
    fn test_optimise_infeasible(mut model: Model) {
        model.adjustments.set("Solar".into(), 0.0).unwrap();
        model.adjustments.set("Gas".into(), 0.0).unwrap();
        model.variables.shift_remove(&FacilityID::from("Solar"));
        model.variables.insert(
            "Battery".into(),
            OptimisationVariable {
                facility_id: "Battery".into(),
                approach: Approach::Discrete(vec![100.0, 200.0]),
            },
        );
        let err = optimise(&model, &RecordingProgress::default()).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Infeasible);
        assert!(err.to_string().contains("Battery [100, 200]"));
    }

    #[test]
    fn test_ranking_targets() {
        let mut targets = Targets::default();
        assert_eq!(ranking_targets(&targets), [Target::Lcoe]);
        targets.set(Target::Lcoe, TargetWeight::DISABLED);
        assert_eq!(ranking_targets(&targets), [Target::Lcoe]);
        targets.set(
            Target::Co2,
            TargetWeight {
                weight: 1.0,
                better: 0.0,
                worse: 10.0,
            },
        );
        assert_eq!(ranking_targets(&targets), [Target::Co2]);
    }
}
