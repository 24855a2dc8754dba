//! A generational genetic algorithm over vectors of capacities.
use crate::progress::ProgressSink;
use crate::variable::OptimisationVariable;
use anyhow::Result;
use log::debug;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

/// A candidate solution: one capacity per optimisation variable
pub type Chromosome = Vec<f64>;

/// Parameters controlling the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneticSettings {
    /// Number of individuals in each generation
    pub population: usize,
    /// Maximum number of generations
    pub generations: u32,
    /// Probability that each gene is resampled after crossover
    pub mutation: f64,
    /// Stop after this many generations without improvement (0 disables)
    pub stop: u32,
}

/// The state of the search when it ended
#[derive(Debug, Clone, PartialEq)]
pub struct Evolution {
    /// The final population
    pub population: Vec<Chromosome>,
    /// The score of each member of the final population
    pub scores: Vec<f64>,
    /// Number of generations bred
    pub generations: u32,
    /// Whether the search stopped because it was cancelled
    pub cancelled: bool,
}

impl Evolution {
    /// The best individual and its score
    pub fn best(&self) -> Option<(&Chromosome, f64)> {
        self.population
            .iter()
            .zip(self.scores.iter().copied())
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
    }
}

/// Evolves a population of chromosomes towards lower scores
pub struct GeneticSearch<'a> {
    variables: &'a [&'a OptimisationVariable],
    settings: GeneticSettings,
    rng: &'a mut StdRng,
}

impl<'a> GeneticSearch<'a> {
    /// Create a new search over the given variables
    pub fn new(
        variables: &'a [&'a OptimisationVariable],
        settings: GeneticSettings,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            variables,
            settings,
            rng,
        }
    }

    /// Draw a random chromosome
    fn sample(&mut self) -> Chromosome {
        self.variables
            .iter()
            .map(|var| var.sample(&mut *self.rng))
            .collect()
    }

    /// Resample each gene with the mutation probability
    fn mutate(&mut self, chromosome: &mut Chromosome) {
        for (gene, var) in chromosome.iter_mut().zip(self.variables) {
            if self.rng.gen_bool(self.settings.mutation) {
                *gene = var.sample(&mut *self.rng);
            }
        }
    }

    /// Single-point crossover. Chromosomes with one gene are passed through unchanged.
    fn crossover(&mut self, a: &Chromosome, b: &Chromosome) -> (Chromosome, Chromosome) {
        if a.len() < 2 {
            return (a.clone(), b.clone());
        }

        let point = self.rng.gen_range(1..a.len());
        let first = a[..point].iter().chain(&b[point..]).copied().collect();
        let second = b[..point].iter().chain(&a[point..]).copied().collect();
        (first, second)
    }

    /// Breed the next generation from scored parents.
    ///
    /// Parents are chosen by roulette over rank, with the best of `P` individuals given weight
    /// `P` and the worst weight 1. The best parent is carried over unchanged.
    fn breed(&mut self, population: &[Chromosome], scores: &[f64]) -> Result<Vec<Chromosome>> {
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));
        let size = order.len();
        let roulette = WeightedIndex::new((0..size).map(|rank| size - rank))?;

        let mut next = Vec::with_capacity(self.settings.population);
        next.push(population[order[0]].clone());
        while next.len() < self.settings.population {
            let a = &population[order[roulette.sample(&mut *self.rng)]];
            let b = &population[order[roulette.sample(&mut *self.rng)]];
            let (mut first, mut second) = self.crossover(a, b);
            self.mutate(&mut first);
            next.push(first);
            if next.len() < self.settings.population {
                self.mutate(&mut second);
                next.push(second);
            }
        }

        Ok(next)
    }

    /// Run the search.
    ///
    /// # Arguments
    ///
    /// * `seeds` - Chromosomes to include in the initial population (the rest are sampled)
    /// * `evaluate` - Scores a whole generation at once (lower is better)
    /// * `progress` - Receives one update per generation and is polled for cancellation
    /// * `label` - Prefix for progress messages
    pub fn run<F>(
        &mut self,
        seeds: &[Chromosome],
        mut evaluate: F,
        progress: &dyn ProgressSink,
        label: &str,
    ) -> Result<Evolution>
    where
        F: FnMut(&[Chromosome]) -> Result<Vec<f64>>,
    {
        let mut population: Vec<Chromosome> = seeds
            .iter()
            .take(self.settings.population)
            .cloned()
            .collect();
        while population.len() < self.settings.population {
            let chromosome = self.sample();
            population.push(chromosome);
        }
        let mut scores = evaluate(&population)?;
        let mut best = scores.iter().copied().fold(f64::INFINITY, f64::min);

        let mut stalled = 0;
        let mut generations = 0;
        let mut cancelled = false;
        for generation in 1..=self.settings.generations {
            if progress.cancelled() {
                cancelled = true;
                break;
            }

            population = self.breed(&population, &scores)?;
            scores = evaluate(&population)?;
            generations = generation;

            let generation_best = scores.iter().copied().fold(f64::INFINITY, f64::min);
            if generation_best < best {
                best = generation_best;
                stalled = 0;
            } else {
                stalled += 1;
            }
            progress.update(
                generation as usize,
                self.settings.generations as usize,
                &format!("{label} generation {generation}: best score {best:.4}"),
            );

            if self.settings.stop > 0 && stalled >= self.settings.stop {
                debug!("{label}: no improvement for {stalled} generations, stopping");
                break;
            }
        }

        Ok(Evolution {
            population,
            scores,
            generations,
            cancelled,
        })
    }
}
