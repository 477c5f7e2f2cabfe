//! Turns a search outcome into the wire response.

use crate::data::TimeSlotId;
use crate::engine::{SearchOutcome, Termination};
use crate::error::{CapacityStats, Diagnostics, GenerationError};
use crate::evaluator::{Evaluator, HardViolations, Placement, SoftScores};
use crate::expander::{Problem, TimeCell};
use itertools::Itertools;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How many of the most recent best scores the stats carry.
const HISTORY_TAIL: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledActivity {
    pub subject: String,
    pub subject_code: String,
    pub teacher: String,
    pub room: String,
    pub student_group: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Minutes.
    pub duration: u32,
    pub student_count: u32,
    pub department: String,
    pub session_info: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub period: TimeSlotId,
    pub time: String,
    pub activities: Vec<ScheduledActivity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub day: String,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmStats {
    pub generations_run: usize,
    pub final_fitness: f64,
    pub population_size: usize,
    pub total_activities: usize,
    pub constraint_violations: u32,
    pub seed: u64,
    pub termination: Termination,
    pub fitness_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub severity: &'static str,
    pub description: String,
}

impl Conflict {
    fn soft(kind: &'static str, description: String) -> Self {
        Self {
            kind,
            severity: "soft",
            description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintMetrics {
    pub hard: HardViolations,
    pub soft: SoftScores,
    pub soft_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLoad {
    pub name: String,
    pub hours: u32,
    pub capacity: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub teacher_utilization: Vec<ResourceLoad>,
    pub room_utilization: Vec<ResourceLoad>,
    pub total_activities: usize,
    pub total_time_slots: u32,
    pub utilization_percentage: f64,
}

/// Response body of a successful generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSuccess {
    pub success: bool,
    pub message: String,
    pub execution_time: String,
    pub algorithm_stats: AlgorithmStats,
    pub timetable: Vec<DaySchedule>,
    pub conflicts: Vec<Conflict>,
    pub constraint_metrics: ConstraintMetrics,
    pub statistics: Statistics,
    pub generated_at: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    pub error_type: &'static str,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
}

/// Response body of every failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub success: bool,
    pub message: String,
    pub details: FailureDetails,
}

impl FailureReport {
    pub fn new(error_type: &'static str, message: String, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            message,
            details: FailureDetails {
                error_type,
                diagnostics,
            },
        }
    }

    pub fn from_error(err: &GenerationError) -> Self {
        let diagnostics = err.diagnostics().cloned().unwrap_or_default();
        Self::new(err.error_type(), err.to_string(), diagnostics)
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (1000.0 * part as f64 / whole as f64).round() / 10.0
}

fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cells of the week a teacher can actually teach in.
fn teacher_capacity(problem: &Problem, teacher: usize) -> u32 {
    usable_cells(problem)
        .filter(|&t| problem.teacher_free(teacher, t))
        .count() as u32
}

fn room_capacity(problem: &Problem, room: usize) -> u32 {
    usable_cells(problem)
        .filter(|&t| !problem.room_blocked(room, t))
        .count() as u32
}

fn usable_cells<'a>(problem: &'a Problem) -> impl Iterator<Item = TimeCell> + 'a {
    (0..problem.days.len()).flat_map(move |day| problem.usable.iter().map(move |&slot| TimeCell { day, slot }))
}

pub fn build_success(
    evaluator: &Evaluator,
    outcome: &SearchOutcome,
    population_size: usize,
    seed: u64,
    elapsed: Duration,
) -> GenerationSuccess {
    let problem = evaluator.problem();
    let data = problem.data;
    let genes = &outcome.best.genes;
    let analysis = evaluator.analyze(genes);

    let by_cell = genes
        .iter()
        .enumerate()
        .map(|(i, pl)| (pl.time, i))
        .into_group_map();
    let timetable = problem
        .days
        .iter()
        .enumerate()
        .map(|(day, weekday)| DaySchedule {
            day: weekday.name().to_string(),
            periods: problem
                .slots
                .iter()
                .enumerate()
                .filter_map(|(slot, info)| {
                    let activities = by_cell.get(&TimeCell { day, slot })?;
                    Some(Period {
                        period: info.id,
                        time: info.label.clone(),
                        activities: activities
                            .iter()
                            .map(|&i| scheduled(problem, i, &genes[i]))
                            .collect(),
                    })
                })
                .collect(),
        })
        .collect();

    let total_time_slots = (problem.usable.len() * problem.days.len()) as u32;
    let teacher_hours = genes.iter().map(|g| g.teacher).counts();
    let room_hours = genes.iter().map(|g| g.room).counts();
    let statistics = Statistics {
        teacher_utilization: teacher_hours
            .iter()
            .sorted()
            .map(|(&t, &hours)| {
                let teacher = &data.teachers[t];
                ResourceLoad {
                    name: teacher.name.clone(),
                    hours: hours as u32,
                    capacity: teacher.max_hours_per_week,
                    percentage: percent(hours as u32, teacher.max_hours_per_week),
                }
            })
            .collect(),
        room_utilization: room_hours
            .iter()
            .sorted()
            .map(|(&r, &hours)| ResourceLoad {
                name: data.rooms[r].name.clone(),
                hours: hours as u32,
                capacity: room_capacity(problem, r),
                percentage: percent(hours as u32, room_capacity(problem, r)),
            })
            .collect(),
        total_activities: genes.len(),
        total_time_slots,
        utilization_percentage: percent(genes.len() as u32, total_time_slots * data.rooms.len() as u32),
    };

    let fitness_history = outcome
        .history
        .iter()
        .skip(outcome.history.len().saturating_sub(HISTORY_TAIL))
        .map(|f| f.normalized())
        .collect();

    GenerationSuccess {
        success: true,
        message: format!(
            "Timetable generated successfully: {} activities scheduled in {} generations",
            genes.len(),
            outcome.generations_run
        ),
        execution_time: format!("{:.2}s", elapsed.as_secs_f64()),
        algorithm_stats: AlgorithmStats {
            generations_run: outcome.generations_run,
            final_fitness: outcome.fitness.normalized(),
            population_size,
            total_activities: genes.len(),
            constraint_violations: analysis.hard.total(),
            seed,
            termination: outcome.termination,
            fitness_history,
        },
        timetable,
        conflicts: soft_conflicts(evaluator, genes),
        constraint_metrics: ConstraintMetrics {
            hard: analysis.hard,
            soft: analysis.soft,
            soft_score: analysis.fitness.normalized(),
        },
        statistics,
        generated_at: seconds_since_epoch(),
    }
}

fn scheduled(problem: &Problem, activity: usize, placement: &Placement) -> ScheduledActivity {
    let data = problem.data;
    let subject = problem.subject_of(activity);
    let group = problem.group_of(activity);
    let requirement = problem.requirement_of(activity);
    ScheduledActivity {
        subject: subject.name.clone(),
        subject_code: subject.code.clone(),
        teacher: data.teachers[placement.teacher].name.clone(),
        room: data.rooms[placement.room].name.clone(),
        student_group: group.label(),
        kind: subject.subject_type.name().to_string(),
        duration: subject.duration,
        student_count: group.total_students,
        department: subject.department.clone(),
        session_info: format!(
            "Session {} of {}",
            problem.activities[activity].session, requirement.hours
        ),
    }
}

/// Soft-constraint notes on an accepted timetable.
pub fn soft_conflicts(evaluator: &Evaluator, genes: &[Placement]) -> Vec<Conflict> {
    let problem = evaluator.problem();
    let data = problem.data;
    let mut conflicts = Vec::new();

    let per_teacher = genes
        .iter()
        .enumerate()
        .map(|(i, pl)| (pl.teacher, (pl.time, i)))
        .into_group_map();
    for (t, sessions) in per_teacher.iter().sorted_by_key(|(t, _)| **t) {
        let teacher = &data.teachers[*t];
        let misses = sessions
            .iter()
            .filter(|(time, _)| {
                let slot_ok = teacher.preferred_time_slots.is_empty()
                    || teacher.preferred_time_slots.contains(&problem.slots[time.slot].id);
                let day_ok = teacher.preferred_days.is_empty()
                    || teacher.preferred_days.contains(&problem.days[time.day]);
                !(slot_ok && day_ok)
            })
            .count();
        if misses > 0 {
            conflicts.push(Conflict::soft(
                "teacher_preference",
                format!("{} has {} session(s) outside preferred times", teacher.name, misses),
            ));
        }

        let hours = sessions.len() as u32;
        if hours < teacher.min_hours_per_week || hours > teacher.max_hours_per_week {
            conflicts.push(Conflict::soft(
                "teacher_workload",
                format!(
                    "{} teaches {}h/week, outside {}-{}h",
                    teacher.name, hours, teacher.min_hours_per_week, teacher.max_hours_per_week
                ),
            ));
        }

        for (day, slots) in sessions
            .iter()
            .map(|(time, _)| (time.day, time.slot))
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(day, _)| *day)
        {
            let slots: Vec<usize> = slots.into_iter().sorted().dedup().collect();
            let mut run = 1;
            let mut longest = 1;
            for (a, b) in slots.iter().tuple_windows() {
                run = if *b == a + 1 { run + 1 } else { 1 };
                longest = longest.max(run);
            }
            if longest > teacher.max_consecutive_hours as usize {
                conflicts.push(Conflict::soft(
                    "consecutive_hours",
                    format!(
                        "{} teaches {} consecutive periods on {} (limit {})",
                        teacher.name, longest, problem.days[day], teacher.max_consecutive_hours
                    ),
                ));
            }
        }
    }

    let per_group_day = genes
        .iter()
        .enumerate()
        .map(|(i, pl)| ((problem.requirement_of(i).group, pl.time.day), pl.time.slot))
        .into_group_map();
    for ((g, day), slots) in per_group_day.into_iter().sorted_by_key(|(key, _)| *key) {
        let idle: usize = slots
            .into_iter()
            .sorted()
            .dedup()
            .tuple_windows()
            .map(|(a, b)| evaluator.idle_between(a, b))
            .sum();
        if idle > 0 {
            conflicts.push(Conflict::soft(
                "gaps",
                format!(
                    "{} has {} idle period(s) on {}",
                    data.students[g].label(),
                    idle,
                    problem.days[day]
                ),
            ));
        }
    }

    let lunch = genes.iter().filter(|pl| problem.slots[pl.time.slot].lunch).count();
    if lunch > 0 {
        conflicts.push(Conflict::soft(
            "lunch_break",
            format!("{} session(s) scheduled during the lunch break", lunch),
        ));
    }
    conflicts
}

/// Failure diagnostics for a search that kept hard violations, naming every
/// overcommitted teacher, room and student group.
pub fn infeasible_diagnostics(evaluator: &Evaluator, genes: &[Placement], stats: CapacityStats) -> Diagnostics {
    let problem = evaluator.problem();
    let data = problem.data;
    let analysis = evaluator.analyze(genes);
    let mut d = Diagnostics {
        stats,
        ..Diagnostics::default()
    };

    let clashed = |key: &dyn Fn(usize, &Placement) -> usize| -> Vec<usize> {
        genes
            .iter()
            .enumerate()
            .map(|(i, pl)| ((key(i, pl), pl.time), i))
            .into_group_map()
            .into_iter()
            .filter(|(_, sessions)| sessions.len() > 1)
            .map(|((entity, _), _)| entity)
            .unique()
            .sorted()
            .collect()
    };
    let flags = &data.constraints.hard;
    let teacher_clashes = if flags.no_clash_teachers {
        clashed(&|_, pl| pl.teacher)
    } else {
        Vec::new()
    };
    let room_clashes = if flags.no_clash_rooms {
        clashed(&|_, pl| pl.room)
    } else {
        Vec::new()
    };

    // demand that has nowhere else to go than this one teacher
    let forced = problem
        .requirements
        .iter()
        .filter(|r| r.teachers.len() == 1)
        .map(|r| (r.teachers[0], u64::from(r.hours)))
        .into_grouping_map()
        .sum();
    let assigned = genes.iter().map(|pl| pl.teacher).counts();
    let teacher_misplaced = genes
        .iter()
        .filter(|pl| !problem.teacher_free(pl.teacher, pl.time))
        .map(|pl| pl.teacher);
    let overloaded = (0..data.teachers.len()).filter(|&t| {
        let capacity = u64::from(teacher_capacity(problem, t));
        let load = assigned.get(&t).copied().unwrap_or(0) as u64;
        load > capacity || forced.get(&t).is_some_and(|&f| f > capacity)
    });
    for t in teacher_clashes
        .into_iter()
        .chain(teacher_misplaced)
        .chain(overloaded)
        .unique()
        .sorted()
    {
        let teacher = &data.teachers[t];
        let required = (assigned.get(&t).copied().unwrap_or(0) as u64)
            .max(forced.get(&t).copied().unwrap_or(0));
        d.critical_issues.push(format!(
            "Teacher {} is overcommitted: required {}h/week, available {}h/week",
            teacher.name,
            required,
            teacher_capacity(problem, t).min(teacher.max_hours_per_week)
        ));
        d.push_suggestion(format!(
            "Qualify another teacher for the subjects of {} or free more of their time slots",
            teacher.name
        ));
    }

    let room_load = genes.iter().map(|pl| pl.room).counts();
    let room_misplaced = genes
        .iter()
        .filter(|pl| problem.room_blocked(pl.room, pl.time))
        .map(|pl| pl.room);
    let room_overloaded = room_load
        .iter()
        .filter(|&(&r, &n)| n as u64 > u64::from(room_capacity(problem, r)))
        .map(|(&r, _)| r)
        .collect_vec();
    for r in room_clashes
        .into_iter()
        .chain(room_misplaced)
        .chain(room_overloaded)
        .unique()
        .sorted()
    {
        d.critical_issues.push(format!(
            "Room {} is overcommitted: required {}h/week, available {}h/week",
            data.rooms[r].name,
            room_load.get(&r).copied().unwrap_or(0),
            room_capacity(problem, r)
        ));
        d.push_suggestion("Add rooms of the required type or capacity".to_string());
    }
    let daily_over: Vec<usize> = (0..data.students.len())
        .filter(|&g| {
            let cap = data.students[g].max_hours_per_day as usize;
            genes
                .iter()
                .enumerate()
                .filter(|(i, _)| problem.requirement_of(*i).group == g)
                .map(|(_, pl)| pl.time.day)
                .counts()
                .values()
                .any(|&n| n > cap)
        })
        .collect();
    let group_clashes = if flags.no_clash_students {
        clashed(&|i, _| problem.requirement_of(i).group)
    } else {
        Vec::new()
    };
    let group_misplaced = genes
        .iter()
        .enumerate()
        .filter(|(i, pl)| problem.group_blocked(problem.requirement_of(*i).group, pl.time))
        .map(|(i, _)| problem.requirement_of(i).group);
    for g in group_clashes
        .into_iter()
        .chain(daily_over)
        .chain(group_misplaced)
        .unique()
        .sorted()
    {
        let group = &data.students[g];
        let required: u32 = problem
            .requirements
            .iter()
            .filter(|r| r.group == g)
            .map(|r| r.hours)
            .sum();
        let free = problem
            .requirements
            .iter()
            .find(|r| r.group == g)
            .map(|r| r.times.len() as u32)
            .unwrap_or(0);
        let available = free.min(group.max_hours_per_day.saturating_mul(problem.days.len() as u32));
        d.critical_issues.push(format!(
            "Student group {} is overcommitted: required {}h/week, available {}h/week",
            group.label(),
            required,
            available
        ));
        d.push_suggestion(format!(
            "Add time slots or working days, or reduce the weekly hours of {}",
            group.label()
        ));
    }

    let h = analysis.hard;
    for (count, what) in [
        (h.teacher_clashes, "teacher double-booking(s)"),
        (h.room_clashes, "room double-booking(s)"),
        (h.group_clashes, "student group double-booking(s)"),
        (h.room_capacity, "session(s) in rooms below group size"),
        (h.room_suitability, "session(s) in unsuitable rooms"),
        (h.qualification, "session(s) taught by unqualified teachers"),
        (h.research_days, "session(s) on teacher research days"),
        (h.unavailable, "session(s) in unavailable slots"),
        (h.daily_cap, "hour(s) above group daily limits"),
        (h.working_hours, "session(s) outside working hours"),
        (h.lunch_break, "session(s) during the lunch break"),
    ] {
        if count > 0 {
            d.errors.push(format!("{} {}", count, what));
        }
    }
    d.push_suggestion("Increase generations or population size and try again".to_string());
    d
}
