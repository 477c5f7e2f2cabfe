//! Genetic search over complete timetables.
//!
//! The population is owned by the search loop. Each generation is scored
//! in parallel on the rayon pool; evaluation only reads the chromosomes and
//! writes one fitness per slot of the output vector.

pub mod chromosome;
pub mod operators;

use crate::data::{AlgorithmSettings, CrossoverType};
use crate::evaluator::{Evaluator, Fitness};
use chromosome::Chromosome;
use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand::Rng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Settings after sanitizing, as the search uses them.
#[derive(Debug, Clone, PartialEq)]
pub struct GaSettings {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elite_size: usize,
    pub tournament_size: usize,
    pub plateau_generations: usize,
    pub perfection_threshold: f64,
    pub crossover: CrossoverType,
    pub seed: u64,
}

fn rate(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

impl GaSettings {
    /// Honours the requested values, clamping only what would leave the
    /// search undefined.
    pub fn resolve(requested: &AlgorithmSettings, default_seed: u64) -> Self {
        for note in requested.out_of_range() {
            warn!("Unusual algorithm setting: {}", note);
        }
        let defaults = AlgorithmSettings::default();
        let population_size = requested.population_size.max(1);
        Self {
            population_size,
            generations: requested.generations.max(1),
            mutation_rate: rate(requested.mutation_rate, defaults.mutation_rate),
            crossover_rate: rate(requested.crossover_rate, defaults.crossover_rate),
            elite_size: requested.elite_size.clamp(1, population_size),
            tournament_size: requested.tournament_size.max(1),
            plateau_generations: requested.plateau_generations.max(1),
            perfection_threshold: if requested.perfection_threshold.is_finite() {
                requested.perfection_threshold.clamp(0.0, 100.0)
            } else {
                defaults.perfection_threshold
            },
            crossover: requested.crossover_type,
            seed: requested.seed.unwrap_or(default_seed),
        }
    }
}

/// Cooperative stop signals checked at every generation boundary.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(cancel: Arc<AtomicBool>, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Termination {
    /// Clash-free with a soft score at or above the perfection threshold.
    Perfect,
    /// No improvement over the plateau window.
    Plateau,
    /// The generation bound was reached.
    Exhausted,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Initialized,
    Evolving { generation: usize },
    Converged,
    Exhausted,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: Chromosome,
    pub fitness: Fitness,
    pub generations_run: usize,
    pub termination: Termination,
    pub state: SearchState,
    /// Best fitness of the initial population, then of every generation.
    pub history: Vec<Fitness>,
}

pub struct GeneticSearch<'e> {
    evaluator: &'e Evaluator<'e>,
    settings: GaSettings,
    state: SearchState,
}

impl<'e> GeneticSearch<'e> {
    pub fn new(evaluator: &'e Evaluator<'e>, settings: GaSettings) -> Result<Self, String> {
        let problem = evaluator.problem();
        if let Some(r) = problem
            .requirements
            .iter()
            .find(|r| r.teachers.is_empty() || r.rooms.is_empty() || r.times.is_empty())
        {
            return Err(format!(
                "requirement for subject {} of group {} has an empty candidate pool",
                r.subject, r.group
            ));
        }
        Ok(Self {
            evaluator,
            settings,
            state: SearchState::Initialized,
        })
    }

    fn evaluate_all(&self, population: &[Chromosome]) -> Vec<Fitness> {
        population
            .par_iter()
            .map(|c| self.evaluator.evaluate(&c.genes))
            .collect()
    }

    pub fn run(&mut self, control: &RunControl) -> SearchOutcome {
        let s = self.settings.clone();
        let problem = self.evaluator.problem();
        let mut rng = StdRng::seed_from_u64(s.seed);
        info!(
            "Starting genetic search: {} activities, population {}, up to {} generations, seed {}",
            problem.activities.len(),
            s.population_size,
            s.generations,
            s.seed
        );

        let mut population: Vec<Chromosome> = (0..s.population_size)
            .map(|_| Chromosome::greedy(self.evaluator, &mut rng))
            .collect();
        let mut scores = self.evaluate_all(&population);
        let mut leader = fittest(&scores);
        let mut best = (population[leader].clone(), scores[leader]);
        let mut history = vec![best.1];
        info!("Initial best fitness: hard {} soft {:.2}", best.1.hard, best.1.soft);

        let mut termination = Termination::Exhausted;
        let mut generations_run = 0;
        let mut stale = 0;
        for generation in 1..=s.generations {
            if control.is_cancelled() {
                termination = Termination::Cancelled;
                break;
            }
            if control.deadline_passed() {
                termination = Termination::TimedOut;
                break;
            }
            if best.1.is_feasible() && best.1.soft >= s.perfection_threshold {
                termination = Termination::Perfect;
                break;
            }
            if stale >= s.plateau_generations {
                termination = Termination::Plateau;
                break;
            }
            self.state = SearchState::Evolving { generation };

            let mut ranked: Vec<usize> = (0..population.len()).collect();
            ranked.sort_by(|&a, &b| scores[b].cmp(&scores[a]));
            let mut next: Vec<Chromosome> = ranked
                .iter()
                .take(s.elite_size)
                .map(|&i| population[i].clone())
                .collect();
            while next.len() < s.population_size {
                let first = operators::tournament(&scores, s.tournament_size, &mut rng);
                let mut child = if rng.random_bool(s.crossover_rate) {
                    let second = operators::tournament(&scores, s.tournament_size, &mut rng);
                    operators::crossover(s.crossover, problem, &population[first], &population[second], &mut rng)
                } else {
                    population[first].clone()
                };
                operators::mutate(problem, &mut child, s.mutation_rate, &mut rng);
                next.push(child);
            }

            population = next;
            scores = self.evaluate_all(&population);
            generations_run = generation;
            leader = fittest(&scores);
            history.push(scores[leader]);
            if scores[leader] > best.1 {
                best = (population[leader].clone(), scores[leader]);
                stale = 0;
                debug!(
                    "Generation {}: new best fitness hard {} soft {:.2}",
                    generation, best.1.hard, best.1.soft
                );
            } else {
                stale += 1;
            }
            trace!(
                "Generation {}: best hard {} soft {:.2}, {} stale",
                generation, scores[leader].hard, scores[leader].soft, stale
            );
        }

        if termination == Termination::Exhausted
            && best.1.is_feasible()
            && best.1.soft >= s.perfection_threshold
        {
            termination = Termination::Perfect;
        }
        self.state = match termination {
            Termination::Plateau if !best.1.is_feasible() => SearchState::Exhausted,
            Termination::Perfect | Termination::Plateau => SearchState::Converged,
            Termination::Exhausted => SearchState::Exhausted,
            Termination::Cancelled | Termination::TimedOut => SearchState::Failed,
        };
        info!(
            "Genetic search finished after {} generations ({:?}): hard {} soft {:.2}",
            generations_run, termination, best.1.hard, best.1.soft
        );

        SearchOutcome {
            best: best.0,
            fitness: best.1,
            generations_run,
            termination,
            state: self.state,
            history,
        }
    }
}

/// Index of the best score; the earliest wins ties.
fn fittest(scores: &[Fitness]) -> usize {
    let mut leader = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[leader] {
            leader = i;
        }
    }
    leader
}
