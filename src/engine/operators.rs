//! Selection, recombination and mutation over [`Chromosome`]s.

use super::chromosome::{Chromosome, random_placement, random_room, random_teacher, random_time};
use crate::data::CrossoverType;
use crate::evaluator::Fitness;
use crate::expander::Problem;
use rand::Rng;

/// Index of the fittest of `size` randomly drawn contestants.
pub fn tournament<R: Rng>(scores: &[Fitness], size: usize, rng: &mut R) -> usize {
    let mut winner = rng.random_range(0..scores.len());
    for _ in 1..size.max(1) {
        let contestant = rng.random_range(0..scores.len());
        if scores[contestant] > scores[winner] {
            winner = contestant;
        }
    }
    winner
}

/// Produces one child from two parents.
pub fn crossover<R: Rng>(
    kind: CrossoverType,
    problem: &Problem,
    first: &Chromosome,
    second: &Chromosome,
    rng: &mut R,
) -> Chromosome {
    let genes = match kind {
        CrossoverType::StudentGroup => {
            // a group's whole week travels together, keeping its own sessions clash-free
            let from_first: Vec<bool> = (0..problem.data.students.len())
                .map(|_| rng.random_bool(0.5))
                .collect();
            first
                .genes
                .iter()
                .zip(&second.genes)
                .enumerate()
                .map(|(i, (a, b))| {
                    if from_first[problem.requirement_of(i).group] {
                        *a
                    } else {
                        *b
                    }
                })
                .collect()
        }
        CrossoverType::Uniform => first
            .genes
            .iter()
            .zip(&second.genes)
            .map(|(a, b)| if rng.random_bool(0.5) { *a } else { *b })
            .collect(),
    };
    Chromosome { genes }
}

/// Reassigns each activity with probability `rate`: its time, room,
/// teacher, or all three.
pub fn mutate<R: Rng>(problem: &Problem, chromosome: &mut Chromosome, rate: f64, rng: &mut R) {
    for (activity, gene) in chromosome.genes.iter_mut().enumerate() {
        if !rng.random_bool(rate) {
            continue;
        }
        match rng.random_range(0..4) {
            0 => gene.time = random_time(problem, activity, gene.teacher, rng),
            1 => gene.room = random_room(problem, activity, rng),
            2 => gene.teacher = random_teacher(problem, activity, rng),
            _ => *gene = random_placement(problem, activity, rng),
        }
    }
}
