//! Turns the configured resources into the fixed list of activities the
//! search has to place, together with every lookup table the evaluator and
//! the genetic operators need.

use crate::data::{StudentGroup, Subject, TimeSlotId, UniversityData, Weekday, parse_clock};
use crate::error::ConfigIssue;
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::HashSet;

/// One time slot of the daily grid, in period order.
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub id: TimeSlotId,
    pub label: String,
    pub start: u32,
    pub end: u32,
    /// Within the configured number of daily periods.
    pub working: bool,
    /// Overlaps the lunch break window.
    pub lunch: bool,
}

/// A (day, period) position, both as indices into [`Problem::days`] and
/// [`Problem::slots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeCell {
    pub day: usize,
    pub slot: usize,
}

/// Weekly need of one student group for one subject, with its candidate pools.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub subject: usize,
    pub group: usize,
    pub hours: u32,
    pub elective: bool,
    /// Indices into `data.teachers`.
    pub teachers: Vec<usize>,
    /// Indices into `data.rooms`.
    pub rooms: Vec<usize>,
    /// Usable cells the group has not blocked.
    pub times: Vec<TimeCell>,
}

/// One weekly occurrence of a requirement.
#[derive(Debug, Clone, Copy)]
pub struct Activity {
    pub requirement: usize,
    /// 1-based session number within the requirement.
    pub session: u32,
}

/// Days and ordered periods of the working week.
#[derive(Debug, Clone)]
pub struct TimeAxis {
    pub days: Vec<Weekday>,
    pub slots: Vec<SlotInfo>,
}

impl TimeAxis {
    pub fn build(data: &UniversityData) -> Result<Self, Vec<ConfigIssue>> {
        let mut issues = Vec::new();
        let info = &data.basic_info;

        let days: Vec<Weekday> = info.working_days.iter().copied().unique().collect();
        if days.is_empty() {
            issues.push(ConfigIssue::NoWorkingDays);
        }

        let lunch = match (
            parse_clock(&info.lunch_break_start),
            parse_clock(&info.lunch_break_end),
        ) {
            (Ok(start), Ok(end)) if start < end => Some((start, end)),
            _ => {
                warn!(
                    "Ignoring unusable lunch break window {}-{}",
                    info.lunch_break_start, info.lunch_break_end
                );
                None
            }
        };

        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(data.time_slots.len());
        for slot in &data.time_slots {
            if !seen.insert(slot.id) {
                issues.push(ConfigIssue::DuplicateTimeSlot { id: slot.id });
                continue;
            }
            let bounds = parse_clock(&slot.start_time).and_then(|start| {
                let end = parse_clock(&slot.end_time)?;
                if end <= start {
                    Err(format!("ends at {} before it starts", slot.end_time))
                } else {
                    Ok((start, end))
                }
            });
            match bounds {
                Ok((start, end)) => slots.push(SlotInfo {
                    id: slot.id,
                    label: slot.label(),
                    start,
                    end,
                    working: true,
                    lunch: lunch.is_some_and(|(ls, le)| start < le && end > ls),
                }),
                Err(reason) => issues.push(ConfigIssue::MalformedTimeSlot { id: slot.id, reason }),
            }
        }
        slots.sort_by_key(|s| (s.start, s.end, s.id));
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.working = index < info.daily_periods as usize;
        }

        if issues.is_empty() {
            Ok(Self { days, slots })
        } else {
            Err(issues)
        }
    }

    pub fn cells(&self) -> usize {
        self.days.len() * self.slots.len()
    }

    /// Slot indices the search may place activities in.
    pub fn usable_slots(&self, data: &UniversityData) -> Vec<usize> {
        let hard = &data.constraints.hard;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !hard.respect_working_hours || s.working)
            .filter(|(_, s)| !hard.respect_lunch_break || !s.lunch)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Immutable view of one generation run: resources, time grid and the
/// derived activity list.
#[derive(Debug)]
pub struct Problem<'a> {
    pub data: &'a UniversityData,
    pub days: Vec<Weekday>,
    pub slots: Vec<SlotInfo>,
    pub usable: Vec<usize>,
    pub requirements: Vec<Requirement>,
    pub activities: Vec<Activity>,
    teacher_blocked: Vec<bool>,
    room_blocked: Vec<bool>,
    group_blocked: Vec<bool>,
    research: Vec<bool>,
    qualified: Vec<bool>,
}

impl<'a> Problem<'a> {
    pub fn cell(&self, time: TimeCell) -> usize {
        time.day * self.slots.len() + time.slot
    }

    pub fn cells(&self) -> usize {
        self.days.len() * self.slots.len()
    }

    pub fn requirement_of(&self, activity: usize) -> &Requirement {
        &self.requirements[self.activities[activity].requirement]
    }

    pub fn subject_of(&self, activity: usize) -> &'a Subject {
        &self.data.subjects[self.requirement_of(activity).subject]
    }

    pub fn group_of(&self, activity: usize) -> &'a StudentGroup {
        &self.data.students[self.requirement_of(activity).group]
    }

    pub fn is_qualified(&self, teacher: usize, subject: usize) -> bool {
        self.qualified[teacher * self.data.subjects.len() + subject]
    }

    pub fn is_research_day(&self, teacher: usize, day: usize) -> bool {
        self.research[teacher * self.days.len() + day]
    }

    pub fn teacher_blocked(&self, teacher: usize, time: TimeCell) -> bool {
        self.teacher_blocked[teacher * self.cells() + self.cell(time)]
    }

    pub fn room_blocked(&self, room: usize, time: TimeCell) -> bool {
        self.room_blocked[room * self.cells() + self.cell(time)]
    }

    pub fn group_blocked(&self, group: usize, time: TimeCell) -> bool {
        self.group_blocked[group * self.cells() + self.cell(time)]
    }

    /// Whether `teacher` can take a session at `time` at all.
    pub fn teacher_free(&self, teacher: usize, time: TimeCell) -> bool {
        !self.is_research_day(teacher, time.day) && !self.teacher_blocked(teacher, time)
    }
}

/// Whether `room` can host `subject` for `group`, ignoring time.
pub fn room_suits(data: &UniversityData, room: usize, subject: &Subject, group: &StudentGroup) -> bool {
    let room = &data.rooms[room];
    subject.required_room_type.accepts(room.room_type)
        && room.capacity >= group.total_students
        && room.has_equipment(&subject.equipment_required)
}

/// Teachers qualified for `subject`, preferring its own department. Falls
/// back to any qualified teacher when the department has none.
pub fn teacher_pool(data: &UniversityData, subject: &Subject) -> Vec<usize> {
    let qualified: Vec<usize> = data
        .teachers
        .iter()
        .enumerate()
        .filter(|(_, t)| t.can_teach(subject))
        .map(|(i, _)| i)
        .collect();
    if subject.department.trim().is_empty() {
        return qualified;
    }
    let in_department: Vec<usize> = qualified
        .iter()
        .copied()
        .filter(|&i| data.same_department(&data.teachers[i].department, &subject.department))
        .collect();
    if in_department.is_empty() && !qualified.is_empty() {
        warn!(
            "No {} teacher qualified for {}, using teachers from other departments",
            subject.department,
            subject.display_name()
        );
        return qualified;
    }
    in_department
}

fn mask<T>(
    items: &[T],
    axis: &TimeAxis,
    blocked: impl Fn(&T, Weekday, TimeSlotId) -> bool,
) -> Vec<bool> {
    let mut mask = Vec::with_capacity(items.len() * axis.cells());
    for item in items {
        for &day in &axis.days {
            for slot in &axis.slots {
                mask.push(blocked(item, day, slot.id));
            }
        }
    }
    mask
}

/// Builds the activity list. All problems are collected before failing.
pub fn expand(data: &UniversityData) -> Result<Problem<'_>, Vec<ConfigIssue>> {
    let axis = TimeAxis::build(data)?;
    let usable = axis.usable_slots(data);
    let mut issues = Vec::new();
    if usable.is_empty() && !axis.slots.is_empty() {
        issues.push(ConfigIssue::NoUsablePeriods);
    }

    let group_blocked = mask(&data.students, &axis, |g, day, slot| {
        g.unavailable_slots.iter().any(|s| s.matches(day, slot))
    });
    let teacher_blocked = mask(&data.teachers, &axis, |t, day, slot| {
        t.unavailable_slots.iter().any(|s| s.matches(day, slot))
    });
    let room_blocked = mask(&data.rooms, &axis, |r, day, slot| {
        r.unavailable_slots
            .iter()
            .chain(&r.maintenance_slots)
            .any(|s| s.matches(day, slot))
    });
    let research = data
        .teachers
        .iter()
        .flat_map(|t| axis.days.iter().map(move |d| t.research_days.contains(d)))
        .collect();
    let qualified = data
        .teachers
        .iter()
        .flat_map(|t| data.subjects.iter().map(move |s| t.can_teach(s)))
        .collect();

    let cells = axis.cells();
    let mut requirements = Vec::new();
    let mut reported_teachers = HashSet::new();
    let mut reported_rooms = HashSet::new();

    for (g, group) in data.students.iter().enumerate() {
        let label = group.label();
        let mut enrolled = Vec::new();
        for &subject_id in group.subjects.iter().unique() {
            match data.subjects.iter().position(|s| s.id == subject_id) {
                Some(index) => enrolled.push(index),
                None => issues.push(ConfigIssue::UnknownSubject {
                    group: label.clone(),
                    subject_id,
                }),
            }
        }
        // required subjects claim the earlier activities
        enrolled.sort_by_key(|&s| data.subjects[s].is_elective);

        let times: Vec<TimeCell> = (0..axis.days.len())
            .flat_map(|day| usable.iter().map(move |&slot| TimeCell { day, slot }))
            .filter(|t| !group_blocked[g * cells + t.day * axis.slots.len() + t.slot])
            .collect();
        if times.is_empty() && !usable.is_empty() && !axis.days.is_empty() {
            issues.push(ConfigIssue::GroupUnavailable { group: label.clone() });
        }

        let weekly_hours: u64 = enrolled
            .iter()
            .map(|&s| u64::from(data.subjects[s].hours_per_week))
            .sum();
        let daily_capacity = u64::from(group.max_hours_per_day) * axis.days.len() as u64;
        if !axis.days.is_empty() && weekly_hours > daily_capacity {
            issues.push(ConfigIssue::DailyCapTooLow {
                group: label.clone(),
                weekly_hours,
                max_per_day: group.max_hours_per_day,
                days: axis.days.len(),
            });
        }

        for s in enrolled {
            let subject = &data.subjects[s];
            if subject.hours_per_week == 0 {
                continue;
            }
            // one activity is built per hour, so this also bounds the allocation
            if !times.is_empty() && subject.hours_per_week as usize > times.len() {
                issues.push(ConfigIssue::MoreHoursThanSlots {
                    group: label.clone(),
                    subject: subject.display_name(),
                    hours: subject.hours_per_week,
                    available: times.len(),
                });
            }
            let teachers = teacher_pool(data, subject);
            if teachers.is_empty() && reported_teachers.insert(s) {
                issues.push(ConfigIssue::NoQualifiedTeacher {
                    subject: subject.display_name(),
                });
            }
            let rooms: Vec<usize> = (0..data.rooms.len())
                .filter(|&r| room_suits(data, r, subject, group))
                .collect();
            if rooms.is_empty() && reported_rooms.insert((s, group.total_students)) {
                issues.push(ConfigIssue::NoSuitableRoom {
                    subject: subject.display_name(),
                    room_type: subject.required_room_type,
                    students: group.total_students,
                    equipment: subject.equipment_required.clone(),
                });
            }
            requirements.push(Requirement {
                subject: s,
                group: g,
                hours: subject.hours_per_week,
                elective: subject.is_elective,
                teachers,
                rooms,
                times: times.clone(),
            });
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    let activities: Vec<Activity> = requirements
        .iter()
        .enumerate()
        .flat_map(|(requirement, r)| {
            (1..=r.hours).map(move |session| Activity {
                requirement,
                session,
            })
        })
        .collect();

    info!(
        "Expanded {} requirements into {} activities over {} days x {} usable periods",
        requirements.len(),
        activities.len(),
        axis.days.len(),
        usable.len()
    );
    debug!(
        "Elective activities: {}",
        activities
            .iter()
            .filter(|a| requirements[a.requirement].elective)
            .count()
    );

    Ok(Problem {
        data,
        days: axis.days,
        slots: axis.slots,
        usable,
        requirements,
        activities,
        teacher_blocked,
        room_blocked,
        group_blocked,
        research,
        qualified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RoomType, SlotRef, SubjectType};
    use crate::fixtures;

    #[test]
    fn emits_one_activity_per_weekly_hour() {
        let data = fixtures::single_course(3);
        let problem = expand(&data).unwrap();
        assert_eq!(problem.activities.len(), 3);
        assert_eq!(problem.requirements.len(), 1);
        let sessions: Vec<u32> = problem.activities.iter().map(|a| a.session).collect();
        assert_eq!(sessions, vec![1, 2, 3]);
        assert_eq!(problem.requirements[0].teachers, vec![0]);
        assert_eq!(problem.requirements[0].rooms, vec![0]);
        assert_eq!(problem.requirements[0].times.len(), 25);
    }

    #[test]
    fn expansion_is_deterministic() {
        let data = fixtures::campus();
        let a = expand(&data).unwrap();
        let b = expand(&data).unwrap();
        let key = |p: &Problem| -> Vec<(usize, u32)> {
            p.activities.iter().map(|a| (a.requirement, a.session)).collect()
        };
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn required_subjects_come_before_electives() {
        let mut data = fixtures::campus();
        data.subjects[0].is_elective = true;
        let problem = expand(&data).unwrap();
        let first_group: Vec<bool> = problem
            .requirements
            .iter()
            .filter(|r| r.group == 0)
            .map(|r| r.elective)
            .collect();
        assert!(first_group.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn missing_lab_is_reported_with_the_subject() {
        let mut data = fixtures::single_course(2);
        data.subjects[0].subject_type = SubjectType::Lab;
        data.subjects[0].required_room_type = RoomType::Laboratory;
        let issues = expand(&data).unwrap_err();
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            ConfigIssue::NoSuitableRoom { subject, room_type, .. } => {
                assert!(subject.contains("Mathematics"));
                assert_eq!(*room_type, RoomType::Laboratory);
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn problems_are_aggregated_not_fail_fast() {
        let mut data = fixtures::single_course(3);
        data.teachers[0].subjects_can_teach.clear();
        data.rooms[0].capacity = 5;
        data.students[0].max_hours_per_day = 0;
        data.students[0].subjects.push(999);
        let issues = expand(&data).unwrap_err();
        assert!(issues.iter().any(|i| matches!(i, ConfigIssue::NoQualifiedTeacher { .. })));
        assert!(issues.iter().any(|i| matches!(i, ConfigIssue::NoSuitableRoom { .. })));
        assert!(issues.iter().any(|i| matches!(i, ConfigIssue::DailyCapTooLow { .. })));
        assert!(issues.iter().any(|i| matches!(i, ConfigIssue::UnknownSubject { subject_id: 999, .. })));
    }

    #[test]
    fn hours_beyond_free_periods_are_rejected_before_expansion() {
        let mut data = fixtures::single_course(1_000_000_000);
        data.students[0].max_hours_per_day = u32::MAX;
        let issues = expand(&data).unwrap_err();
        assert!(issues.iter().any(|i| matches!(
            i,
            ConfigIssue::MoreHoursThanSlots { hours: 1_000_000_000, available: 25, .. }
        )));
    }

    #[test]
    fn lunch_and_overtime_slots_are_not_usable() {
        let mut data = fixtures::single_course(1);
        data.time_slots.push(crate::data::TimeSlot {
            id: 50,
            start_time: "12:00".into(),
            end_time: "13:00".into(),
        });
        data.basic_info.daily_periods = 5;
        let axis = TimeAxis::build(&data).unwrap();
        assert_eq!(axis.slots.len(), 6);
        let usable = axis.usable_slots(&data);
        assert!(usable.iter().all(|&i| axis.slots[i].id != 50));

        data.constraints.hard.respect_lunch_break = false;
        data.constraints.hard.respect_working_hours = false;
        assert_eq!(axis.usable_slots(&data).len(), 6);
    }

    #[test]
    fn blocked_cells_follow_slot_refs() {
        let mut data = fixtures::single_course(1);
        data.teachers[0].unavailable_slots = vec![SlotRef::OnDay {
            day: Weekday::Tuesday,
            time_slot: 2,
        }];
        data.teachers[0].research_days = vec![Weekday::Friday];
        data.students[0].unavailable_slots = vec![SlotRef::Every(1)];
        let problem = expand(&data).unwrap();
        let tuesday_2 = TimeCell { day: 1, slot: problem.usable[1] };
        assert!(problem.teacher_blocked(0, tuesday_2));
        assert!(!problem.teacher_blocked(0, TimeCell { day: 0, slot: tuesday_2.slot }));
        assert!(problem.is_research_day(0, 4));
        assert!(!problem.teacher_free(0, TimeCell { day: 4, slot: 0 }));
        assert_eq!(problem.requirements[0].times.len(), 20);
    }

    #[test]
    fn department_teachers_are_preferred() {
        let mut data = fixtures::single_course(1);
        let mut outsider = data.teachers[0].clone();
        outsider.id = 2;
        outsider.department = "Physics".into();
        data.teachers.push(outsider);
        let problem = expand(&data).unwrap();
        assert_eq!(problem.requirements[0].teachers, vec![0]);

        data.teachers[0].department = "Chemistry".into();
        let problem = expand(&data).unwrap();
        assert_eq!(problem.requirements[0].teachers, vec![0, 1]);
    }
}
