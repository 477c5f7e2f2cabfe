//! Hard and soft constraint evaluation of a (possibly partial) assignment.
//!
//! Hard violations are counted instance by instance. Soft constraints each
//! yield a satisfaction in [0, 1]; the weighted mean scaled to [0, 100] is
//! the soft score. [`Fitness`] orders lexicographically: fewer hard
//! violations always wins, soft score breaks ties.

use crate::data::SoftConstraints;
use crate::expander::{Problem, TimeCell};
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Where and by whom one activity is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub time: TimeCell,
    /// Index into `data.rooms`.
    pub room: usize,
    /// Index into `data.teachers`.
    pub teacher: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardViolations {
    pub teacher_clashes: u32,
    pub room_clashes: u32,
    pub group_clashes: u32,
    pub room_capacity: u32,
    pub room_suitability: u32,
    pub qualification: u32,
    pub research_days: u32,
    pub unavailable: u32,
    pub daily_cap: u32,
    pub working_hours: u32,
    pub lunch_break: u32,
}

impl HardViolations {
    pub fn total(&self) -> u32 {
        self.teacher_clashes
            + self.room_clashes
            + self.group_clashes
            + self.room_capacity
            + self.room_suitability
            + self.qualification
            + self.research_days
            + self.unavailable
            + self.daily_cap
            + self.working_hours
            + self.lunch_break
    }
}

/// Satisfaction of each soft constraint, 1.0 meaning fully met.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftScores {
    pub teacher_preferences: f64,
    pub student_preferences: f64,
    pub room_preferences: f64,
    pub gaps: f64,
    pub distribution: f64,
    pub consecutive_hours: f64,
    pub building_changes: f64,
    pub lunch_break: f64,
    pub workload: f64,
}

impl SoftScores {
    /// Weighted mean on a 0-100 scale.
    pub fn weighted(&self, weights: &SoftConstraints) -> f64 {
        let terms = [
            (weights.teacher_preferences, self.teacher_preferences),
            (weights.student_preferences, self.student_preferences),
            (weights.room_preferences, self.room_preferences),
            (weights.minimize_gaps, self.gaps),
            (weights.even_distribution, self.distribution),
            (weights.max_consecutive_hours, self.consecutive_hours),
            (weights.building_change_minimize, self.building_changes),
            (weights.lunch_break_respect, self.lunch_break),
            (weights.teacher_workload, self.workload),
        ];
        let (sum, total_weight) = terms.iter().fold((0.0, 0.0), |(sum, tw), &(w, s)| {
            let w = if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 };
            (sum + w * s, tw + w)
        });
        if total_weight == 0.0 {
            100.0
        } else {
            100.0 * sum / total_weight
        }
    }
}

/// Combined score. Greater is better.
#[derive(Debug, Clone, Copy)]
pub struct Fitness {
    pub hard: u32,
    pub soft: f64,
}

impl Fitness {
    pub fn is_feasible(&self) -> bool {
        self.hard == 0
    }

    /// The soft score as reported to callers, rounded to two decimals.
    pub fn normalized(&self) -> f64 {
        (self.soft.clamp(0.0, 100.0) * 100.0).round() / 100.0
    }
}

impl PartialEq for Fitness {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fitness {}

impl PartialOrd for Fitness {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fitness {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .hard
            .cmp(&self.hard)
            .then_with(|| self.soft.total_cmp(&other.soft))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Analysis {
    pub hard: HardViolations,
    pub soft: SoftScores,
    pub fitness: Fitness,
}

/// Clash bookkeeping for building an assignment one activity at a time.
#[derive(Debug, Clone)]
pub struct Occupancy {
    cells: usize,
    days: usize,
    teachers: Vec<u16>,
    rooms: Vec<u16>,
    groups: Vec<u16>,
    group_days: Vec<u16>,
}

impl Occupancy {
    pub fn new(problem: &Problem) -> Self {
        let cells = problem.cells();
        let data = problem.data;
        Self {
            cells,
            days: problem.days.len(),
            teachers: vec![0; data.teachers.len() * cells],
            rooms: vec![0; data.rooms.len() * cells],
            groups: vec![0; data.students.len() * cells],
            group_days: vec![0; data.students.len() * problem.days.len()],
        }
    }

    pub fn place(&mut self, problem: &Problem, activity: usize, placement: &Placement) {
        let cell = problem.cell(placement.time);
        let group = problem.requirement_of(activity).group;
        self.teachers[placement.teacher * self.cells + cell] += 1;
        self.rooms[placement.room * self.cells + cell] += 1;
        self.groups[group * self.cells + cell] += 1;
        self.group_days[group * self.days + placement.time.day] += 1;
    }
}

pub struct Evaluator<'p> {
    problem: &'p Problem<'p>,
    /// Number of usable slots before each slot index.
    usable_before: Vec<usize>,
    /// Teachers appearing in at least one candidate pool.
    pooled_teachers: Vec<usize>,
}

impl<'p> Evaluator<'p> {
    pub fn new(problem: &'p Problem<'p>) -> Self {
        let usable: HashSet<usize> = problem.usable.iter().copied().collect();
        let mut usable_before = Vec::with_capacity(problem.slots.len() + 1);
        let mut seen = 0;
        for slot in 0..=problem.slots.len() {
            usable_before.push(seen);
            if usable.contains(&slot) {
                seen += 1;
            }
        }
        let pooled_teachers = problem
            .requirements
            .iter()
            .flat_map(|r| r.teachers.iter().copied())
            .unique()
            .sorted()
            .collect();
        Self {
            problem,
            usable_before,
            pooled_teachers,
        }
    }

    pub fn problem(&self) -> &'p Problem<'p> {
        self.problem
    }

    pub fn evaluate(&self, placements: &[Placement]) -> Fitness {
        self.analyze(placements).fitness
    }

    /// Violations that depend on this placement alone.
    fn placement_violations(&self, activity: usize, placement: &Placement, hard: &mut HardViolations) {
        let p = self.problem;
        let data = p.data;
        let flags = &data.constraints.hard;
        let requirement = p.requirement_of(activity);
        let subject = &data.subjects[requirement.subject];
        let group = &data.students[requirement.group];
        let room = &data.rooms[placement.room];
        let slot = &p.slots[placement.time.slot];

        if flags.room_capacity_check && room.capacity < group.total_students {
            hard.room_capacity += 1;
        }
        if !subject.required_room_type.accepts(room.room_type)
            || !room.has_equipment(&subject.equipment_required)
        {
            hard.room_suitability += 1;
        }
        if flags.teacher_qualification_check && !p.is_qualified(placement.teacher, requirement.subject) {
            hard.qualification += 1;
        }
        if p.is_research_day(placement.teacher, placement.time.day) {
            hard.research_days += 1;
        }
        hard.unavailable += p.teacher_blocked(placement.teacher, placement.time) as u32
            + p.room_blocked(placement.room, placement.time) as u32
            + p.group_blocked(requirement.group, placement.time) as u32;
        if flags.respect_working_hours && !slot.working {
            hard.working_hours += 1;
        }
        if flags.respect_lunch_break && slot.lunch {
            hard.lunch_break += 1;
        }
    }

    /// Hard violations `placement` would add on top of `occupancy`.
    pub fn placement_cost(&self, occupancy: &Occupancy, activity: usize, placement: &Placement) -> u32 {
        let p = self.problem;
        let flags = &p.data.constraints.hard;
        let mut hard = HardViolations::default();
        self.placement_violations(activity, placement, &mut hard);

        let cell = p.cell(placement.time);
        let group = p.requirement_of(activity).group;
        let cells = occupancy.cells;
        if flags.no_clash_teachers && occupancy.teachers[placement.teacher * cells + cell] > 0 {
            hard.teacher_clashes += 1;
        }
        if flags.no_clash_rooms && occupancy.rooms[placement.room * cells + cell] > 0 {
            hard.room_clashes += 1;
        }
        if flags.no_clash_students && occupancy.groups[group * cells + cell] > 0 {
            hard.group_clashes += 1;
        }
        let cap = p.data.students[group].max_hours_per_day;
        if u32::from(occupancy.group_days[group * occupancy.days + placement.time.day]) >= cap {
            hard.daily_cap += 1;
        }
        hard.total()
    }

    pub fn analyze(&self, placements: &[Placement]) -> Analysis {
        let p = self.problem;
        let data = p.data;
        let flags = &data.constraints.hard;
        let n_days = p.days.len();
        let mut hard = HardViolations::default();
        let mut occupancy = Occupancy::new(p);

        let mut teacher_days: Vec<Vec<(usize, usize)>> = vec![Vec::new(); data.teachers.len() * n_days];
        let mut group_days: Vec<Vec<(usize, usize)>> = vec![Vec::new(); data.students.len() * n_days];
        let mut teacher_hours = vec![0u32; data.teachers.len()];
        let mut teacher_pref = Ratio::default();
        let mut student_pref = Ratio::default();
        let mut room_pref = Ratio::default();
        let mut lunch_used = 0u32;

        for (i, pl) in placements.iter().enumerate() {
            let requirement = p.requirement_of(i);
            let group = requirement.group;
            let cell = p.cell(pl.time);
            let cells = occupancy.cells;

            self.placement_violations(i, pl, &mut hard);
            if flags.no_clash_teachers && occupancy.teachers[pl.teacher * cells + cell] > 0 {
                hard.teacher_clashes += 1;
            }
            if flags.no_clash_rooms && occupancy.rooms[pl.room * cells + cell] > 0 {
                hard.room_clashes += 1;
            }
            if flags.no_clash_students && occupancy.groups[group * cells + cell] > 0 {
                hard.group_clashes += 1;
            }
            occupancy.place(p, i, pl);

            teacher_days[pl.teacher * n_days + pl.time.day].push((pl.time.slot, i));
            group_days[group * n_days + pl.time.day].push((pl.time.slot, i));
            teacher_hours[pl.teacher] += 1;
            if p.slots[pl.time.slot].lunch {
                lunch_used += 1;
            }

            let slot_id = p.slots[pl.time.slot].id;
            let day = p.days[pl.time.day];
            let teacher = &data.teachers[pl.teacher];
            if !teacher.preferred_time_slots.is_empty() || !teacher.preferred_days.is_empty() {
                teacher_pref.add(
                    (teacher.preferred_time_slots.is_empty() || teacher.preferred_time_slots.contains(&slot_id))
                        && (teacher.preferred_days.is_empty() || teacher.preferred_days.contains(&day)),
                );
            }
            let students = &data.students[group];
            if !students.preferred_time_slots.is_empty() {
                student_pref.add(students.preferred_time_slots.contains(&slot_id));
            }
            let room = &data.rooms[pl.room];
            if !room.preferred_for.is_empty() {
                let subject = &data.subjects[requirement.subject];
                let tags = [
                    subject.subject_type.name(),
                    subject.name.as_str(),
                    subject.code.as_str(),
                    subject.department.as_str(),
                    students.department.as_str(),
                ];
                room_pref.add(room.preferred_for.iter().any(|wanted| {
                    tags.iter().any(|t| !t.is_empty() && t.eq_ignore_ascii_case(wanted))
                }));
            }
        }

        for (g, group) in data.students.iter().enumerate() {
            for day in 0..n_days {
                let load = occupancy.group_days[g * n_days + day] as u32;
                hard.daily_cap += load.saturating_sub(group.max_hours_per_day);
            }
        }

        let mut idle = 0usize;
        let mut over_consecutive = 0usize;
        let mut building_changes = 0usize;
        let mut adjacent_pairs = 0usize;

        for (index, sessions) in teacher_days.iter_mut().enumerate() {
            let teacher = &data.teachers[index / n_days.max(1)];
            sessions.sort_unstable();
            let walk = self.walk_day(placements, sessions);
            idle += walk.idle + walk.gap_over(teacher.max_gap_hours as usize);
            over_consecutive += walk.longest_run.saturating_sub(teacher.max_consecutive_hours as usize);
            building_changes += walk.building_changes;
            adjacent_pairs += walk.adjacent_pairs;
        }
        for sessions in group_days.iter_mut() {
            sessions.sort_unstable();
            let walk = self.walk_day(placements, sessions);
            idle += walk.idle;
            building_changes += walk.building_changes;
            adjacent_pairs += walk.adjacent_pairs;
        }

        let spread = teacher_days
            .chunks(n_days.max(1))
            .chain(group_days.chunks(n_days.max(1)))
            .filter_map(|days| variation(days.iter().map(|d| d.len() as f64)))
            .collect::<Vec<f64>>();
        let mean_spread = if spread.is_empty() {
            0.0
        } else {
            spread.iter().sum::<f64>() / spread.len() as f64
        };

        let workload_units: u32 = self
            .pooled_teachers
            .iter()
            .map(|&t| {
                let teacher = &data.teachers[t];
                let hours = teacher_hours[t];
                teacher.min_hours_per_week.saturating_sub(hours)
                    + 2 * hours.saturating_sub(teacher.max_hours_per_week)
            })
            .sum();

        let n = placements.len().max(1) as f64;
        let soft = SoftScores {
            teacher_preferences: teacher_pref.value(),
            student_preferences: student_pref.value(),
            room_preferences: room_pref.value(),
            gaps: 1.0 / (1.0 + idle as f64 / n),
            distribution: 1.0 / (1.0 + mean_spread),
            consecutive_hours: 1.0 / (1.0 + over_consecutive as f64 / n),
            building_changes: if adjacent_pairs == 0 {
                1.0
            } else {
                1.0 - building_changes as f64 / adjacent_pairs as f64
            },
            lunch_break: 1.0 - lunch_used as f64 / n,
            workload: 1.0 / (1.0 + workload_units as f64 / self.pooled_teachers.len().max(1) as f64),
        };
        let fitness = Fitness {
            hard: hard.total(),
            soft: soft.weighted(&data.constraints.soft),
        };
        Analysis { hard, soft, fitness }
    }

    /// Usable periods strictly between two slot indices.
    pub fn idle_between(&self, earlier: usize, later: usize) -> usize {
        if later <= earlier + 1 {
            return 0;
        }
        self.usable_before[later] - self.usable_before[earlier + 1]
    }

    fn walk_day(&self, placements: &[Placement], sessions: &[(usize, usize)]) -> DayWalk {
        let mut walk = DayWalk::default();
        if sessions.is_empty() {
            return walk;
        }
        let rooms = &self.problem.data.rooms;
        let mut run = 1;
        walk.longest_run = 1;
        for ((a, ai), (b, bi)) in sessions.iter().copied().tuple_windows() {
            if b == a {
                // a clash, already counted as hard
                continue;
            }
            let gap = self.idle_between(a, b);
            walk.idle += gap;
            walk.largest_gap = walk.largest_gap.max(gap);
            if b == a + 1 {
                run += 1;
                walk.adjacent_pairs += 1;
                let (from, to) = (&rooms[placements[ai].room].building, &rooms[placements[bi].room].building);
                if !from.is_empty() && !to.is_empty() && from != to {
                    walk.building_changes += 1;
                }
            } else {
                run = 1;
            }
            walk.longest_run = walk.longest_run.max(run);
        }
        walk
    }
}

#[derive(Debug, Default)]
struct DayWalk {
    idle: usize,
    largest_gap: usize,
    longest_run: usize,
    building_changes: usize,
    adjacent_pairs: usize,
}

impl DayWalk {
    fn gap_over(&self, limit: usize) -> usize {
        self.largest_gap.saturating_sub(limit)
    }
}

#[derive(Debug, Default)]
struct Ratio {
    hits: u32,
    total: u32,
}

impl Ratio {
    fn add(&mut self, hit: bool) {
        self.total += 1;
        self.hits += hit as u32;
    }

    fn value(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}

/// Squared coefficient of variation of per-day loads; `None` for an idle
/// entity.
fn variation(loads: impl Iterator<Item = f64> + Clone) -> Option<f64> {
    let (count, sum) = loads.clone().fold((0usize, 0.0), |(c, s), l| (c + 1, s + l));
    if count == 0 || sum == 0.0 {
        return None;
    }
    let mean = sum / count as f64;
    let variance = loads.map(|l| (l - mean).powi(2)).sum::<f64>() / count as f64;
    Some(variance / (mean * mean))
}
