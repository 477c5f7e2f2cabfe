use crate::evaluator::{Evaluator, Occupancy, Placement};
use crate::expander::{Problem, TimeCell};
use rand::Rng;

/// Candidates drawn per activity during greedy construction.
const GREEDY_SAMPLES: usize = 24;
/// Attempts at finding a time the chosen teacher is free.
const TIME_ATTEMPTS: usize = 8;

/// One complete candidate timetable: gene `i` places activity `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub genes: Vec<Placement>,
}

impl Chromosome {
    /// Randomized greedy construction. Each activity in turn takes the
    /// sampled candidate that adds the fewest hard violations to what has
    /// been placed so far.
    pub fn greedy<R: Rng>(evaluator: &Evaluator, rng: &mut R) -> Self {
        let problem = evaluator.problem();
        let mut occupancy = Occupancy::new(problem);
        let mut genes = Vec::with_capacity(problem.activities.len());
        for activity in 0..problem.activities.len() {
            let mut best = random_placement(problem, activity, rng);
            let mut best_cost = evaluator.placement_cost(&occupancy, activity, &best);
            for _ in 1..GREEDY_SAMPLES {
                if best_cost == 0 {
                    break;
                }
                let candidate = random_placement(problem, activity, rng);
                let cost = evaluator.placement_cost(&occupancy, activity, &candidate);
                if cost < best_cost {
                    best = candidate;
                    best_cost = cost;
                }
            }
            occupancy.place(problem, activity, &best);
            genes.push(best);
        }
        Self { genes }
    }
}

fn pick<T: Copy, R: Rng>(items: &[T], rng: &mut R) -> T {
    items[rng.random_range(0..items.len())]
}

/// A time from the activity's pool, preferring one where `teacher` is free.
pub fn random_time<R: Rng>(problem: &Problem, activity: usize, teacher: usize, rng: &mut R) -> TimeCell {
    let times = &problem.requirement_of(activity).times;
    let mut time = pick(times, rng);
    for _ in 1..TIME_ATTEMPTS {
        if problem.teacher_free(teacher, time) {
            break;
        }
        time = pick(times, rng);
    }
    time
}

pub fn random_room<R: Rng>(problem: &Problem, activity: usize, rng: &mut R) -> usize {
    pick(&problem.requirement_of(activity).rooms, rng)
}

pub fn random_teacher<R: Rng>(problem: &Problem, activity: usize, rng: &mut R) -> usize {
    pick(&problem.requirement_of(activity).teachers, rng)
}

/// A fresh placement drawn from the activity's candidate pools.
pub fn random_placement<R: Rng>(problem: &Problem, activity: usize, rng: &mut R) -> Placement {
    let teacher = random_teacher(problem, activity, rng);
    let room = random_room(problem, activity, rng);
    let time = random_time(problem, activity, teacher, rng);
    Placement { time, room, teacher }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::expand;
    use crate::fixtures;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn greedy_places_every_activity_from_its_pools() {
        let data = fixtures::campus();
        let problem = expand(&data).unwrap();
        let evaluator = Evaluator::new(&problem);
        let mut rng = StdRng::seed_from_u64(7);
        let chromosome = Chromosome::greedy(&evaluator, &mut rng);
        assert_eq!(chromosome.genes.len(), problem.activities.len());
        for (i, gene) in chromosome.genes.iter().enumerate() {
            let requirement = problem.requirement_of(i);
            assert!(requirement.teachers.contains(&gene.teacher));
            assert!(requirement.rooms.contains(&gene.room));
            assert!(requirement.times.contains(&gene.time));
        }
    }

    #[test]
    fn greedy_avoids_clashes_when_space_allows() {
        let data = fixtures::single_course(5);
        let problem = expand(&data).unwrap();
        let evaluator = Evaluator::new(&problem);
        let mut rng = StdRng::seed_from_u64(1);
        let chromosome = Chromosome::greedy(&evaluator, &mut rng);
        assert_eq!(evaluator.evaluate(&chromosome.genes).hard, 0);
    }

    #[test]
    fn same_seed_same_chromosome() {
        let data = fixtures::campus();
        let problem = expand(&data).unwrap();
        let evaluator = Evaluator::new(&problem);
        let a = Chromosome::greedy(&evaluator, &mut StdRng::seed_from_u64(99));
        let b = Chromosome::greedy(&evaluator, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn random_time_prefers_free_teacher_slots() {
        let mut data = fixtures::single_course(1);
        data.teachers[0].research_days = vec![
            crate::data::Weekday::Monday,
            crate::data::Weekday::Tuesday,
            crate::data::Weekday::Wednesday,
            crate::data::Weekday::Thursday,
        ];
        let problem = expand(&data).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let free = (0..50)
            .filter(|_| random_time(&problem, 0, 0, &mut rng).day == 4)
            .count();
        assert!(free > 30);
    }
}
