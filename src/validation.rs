//! Pre-search checks. Every problem is collected so the caller can fix the
//! whole dataset in one round trip.

use crate::data::UniversityData;
use crate::error::{CapacityStats, ConfigIssue, Diagnostics};
use crate::expander::{TimeAxis, expand, teacher_pool};
use itertools::Itertools;
use log::debug;
use serde::Serialize;

/// Share of a group's free periods above which scheduling gets tight.
const HIGH_UTILIZATION: f64 = 0.8;

#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub issues: Vec<ConfigIssue>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub stats: CapacityStats,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics {
            warnings: self.warnings.clone(),
            stats: self.stats,
            ..Diagnostics::default()
        };
        for issue in &self.issues {
            if is_critical(issue) {
                diagnostics.critical_issues.push(issue.to_string());
            }
            diagnostics.errors.push(issue.to_string());
            diagnostics.push_suggestion(issue.suggestion());
        }
        for recommendation in &self.recommendations {
            diagnostics.push_suggestion(recommendation.clone());
        }
        diagnostics
    }

    pub fn report(&self, data: &UniversityData) -> ValidationReport {
        let errors: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        let mut recommendations: Vec<String> = self.issues.iter().map(|i| i.suggestion()).unique().collect();
        for r in &self.recommendations {
            if !recommendations.contains(r) {
                recommendations.push(r.clone());
            }
        }
        let penalty = 20.0 * errors.len() as f64 + 5.0 * self.warnings.len() as f64;
        ValidationReport {
            valid: errors.is_empty(),
            statistics: ValidationStatistics {
                teachers: data.teachers.len(),
                subjects: data.subjects.len(),
                rooms: data.rooms.len(),
                student_groups: data.students.len(),
                total_required_hours: self.stats.total_required_hours,
                total_available_hours: self.stats.total_available_hours,
                total_time_slots: self.stats.total_time_slots,
                utilization_rate: percent(
                    self.stats.total_required_hours,
                    self.stats.total_available_hours.max(1),
                ),
            },
            errors,
            warnings: self.warnings.clone(),
            recommendations,
            feasibility_score: (100.0 - penalty).max(0.0),
        }
    }
}

/// Problems that no amount of per-subject fixing resolves.
fn is_critical(issue: &ConfigIssue) -> bool {
    matches!(
        issue,
        ConfigIssue::MissingResource(_)
            | ConfigIssue::NoWorkingDays
            | ConfigIssue::NoUsablePeriods
            | ConfigIssue::InsufficientTeacherCapacity { .. }
    )
}

fn percent(part: u32, whole: u32) -> f64 {
    (1000.0 * part as f64 / whole as f64).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatistics {
    pub teachers: usize,
    pub subjects: usize,
    pub rooms: usize,
    pub student_groups: usize,
    pub total_required_hours: u32,
    pub total_available_hours: u32,
    pub total_time_slots: u32,
    pub utilization_rate: f64,
}

/// Body of `POST /api/validate-data`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub statistics: ValidationStatistics,
    pub feasibility_score: f64,
}

pub fn validate(data: &UniversityData) -> Validation {
    let mut v = Validation::default();

    for (section, empty) in [
        ("teachers", data.teachers.is_empty()),
        ("subjects", data.subjects.is_empty()),
        ("rooms", data.rooms.is_empty()),
        ("student groups", data.students.is_empty()),
        ("time slots", data.time_slots.is_empty()),
    ] {
        if empty {
            v.issues.push(ConfigIssue::MissingResource(section));
        }
    }

    let axis = TimeAxis::build(data).ok();
    let usable = axis.as_ref().map(|a| a.usable_slots(data).len()).unwrap_or(0);
    let days = axis.as_ref().map(|a| a.days.len()).unwrap_or(0);

    let required = hours(
        data.students
            .iter()
            .flat_map(|g| g.subjects.iter().unique())
            .filter_map(|&id| data.subject(id))
            .map(|s| s.hours_per_week),
    );
    let available = hours(data.teachers.iter().map(|t| t.max_hours_per_week));
    let minimum = hours(data.teachers.iter().map(|t| t.min_hours_per_week));
    v.stats = CapacityStats {
        total_required_hours: required,
        total_available_hours: available,
        total_time_slots: (usable * days) as u32,
    };

    let complete = v.is_valid();
    if required > available {
        v.issues.push(ConfigIssue::InsufficientTeacherCapacity { required, available });
    } else if required < minimum {
        v.warnings.push(format!(
            "Teachers may be under-utilized: need {}h/week, minimum {}h/week",
            required, minimum
        ));
    }

    if complete {
        // per-subject detail is only meaningful once every section exists
        if let Err(issues) = expand(data) {
            v.issues.extend(issues);
        }
    } else if let Err(issues) = TimeAxis::build(data) {
        v.issues.extend(issues);
    }

    collect_warnings(data, usable * days, &mut v);
    debug!(
        "Validation finished: {} issue(s), {} warning(s)",
        v.issues.len(),
        v.warnings.len()
    );
    v
}

/// Weekly hour total, saturating instead of wrapping on absurd inputs.
fn hours(values: impl Iterator<Item = u32>) -> u32 {
    values.fold(0u32, u32::saturating_add)
}

fn collect_warnings(data: &UniversityData, cells: usize, v: &mut Validation) {
    let enrolled: Vec<usize> = data
        .students
        .iter()
        .flat_map(|g| g.subjects.iter())
        .filter_map(|&id| data.subjects.iter().position(|s| s.id == id))
        .unique()
        .sorted()
        .collect();

    for &s in &enrolled {
        let subject = &data.subjects[s];
        if teacher_pool(data, subject).len() == 1 {
            v.warnings.push(format!(
                "Only one teacher can teach {}",
                subject.display_name()
            ));
        }
    }

    for group in &data.students {
        let label = group.label();
        let subjects: Vec<_> = group
            .subjects
            .iter()
            .unique()
            .filter_map(|&id| data.subject(id))
            .collect();

        let weekly = hours(subjects.iter().map(|s| s.hours_per_week));
        if cells > 0 && weekly as f64 > HIGH_UTILIZATION * cells as f64 {
            v.warnings.push(format!(
                "High time slot utilization for {}: {}h/week of {} periods",
                label, weekly, cells
            ));
        }

        for subject in &subjects {
            if group.total_students > subject.max_students {
                v.warnings.push(format!(
                    "{} has {} students, above the {} maximum of {}",
                    label,
                    group.total_students,
                    subject.display_name(),
                    subject.max_students
                ));
            }
            let year_off = group.year != 0 && subject.year != 0 && group.year != subject.year;
            let term_off = group.semester != 0 && subject.semester != 0 && group.semester != subject.semester;
            if year_off || term_off {
                v.warnings.push(format!(
                    "{} (year {}, semester {}) is enrolled in {} offered in year {}, semester {}",
                    label,
                    group.year,
                    group.semester,
                    subject.display_name(),
                    subject.year,
                    subject.semester
                ));
            }
            for prerequisite in &subject.prerequisites {
                if let Some(p) = subjects.iter().find(|p| prerequisite.refers_to(p)) {
                    v.warnings.push(format!(
                        "{} takes {} in the same term as its prerequisite {}",
                        label,
                        subject.display_name(),
                        p.display_name()
                    ));
                }
            }
        }
    }

    let research_conflicts: Vec<&str> = data
        .teachers
        .iter()
        .filter(|t| t.research_days.iter().any(|d| t.preferred_days.contains(d)))
        .map(|t| t.name.as_str())
        .collect();
    if !research_conflicts.is_empty() {
        v.warnings.push(format!(
            "Teachers with research day conflicts: {}",
            research_conflicts.join(", ")
        ));
    }

    for teacher in &data.teachers {
        if teacher.min_hours_per_week > teacher.max_hours_per_week {
            v.warnings.push(format!(
                "{} has minimum hours {} above maximum hours {}",
                teacher.name, teacher.min_hours_per_week, teacher.max_hours_per_week
            ));
        }
        if let Some((low, high)) = teacher.designation.hour_band() {
            if teacher.max_hours_per_week > high || teacher.max_hours_per_week < low {
                v.warnings.push(format!(
                    "{} ({:?}) may teach {}h/week, outside the usual {}-{}h",
                    teacher.name, teacher.designation, teacher.max_hours_per_week, low, high
                ));
            }
        }
    }

    let labs_needed = enrolled
        .iter()
        .filter(|&&s| data.subjects[s].required_room_type == crate::data::RoomType::Laboratory)
        .count();
    let labs = data
        .rooms
        .iter()
        .filter(|r| r.room_type == crate::data::RoomType::Laboratory)
        .count();
    if labs > 0 && labs < labs_needed {
        v.recommendations.push(
            "Consider adding more laboratory rooms or scheduling lab sessions carefully".to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RoomType, SubjectRef, SubjectType};
    use crate::fixtures;

    #[test]
    fn feasible_dataset_is_valid() {
        let data = fixtures::campus();
        let v = validate(&data);
        assert!(v.is_valid(), "{:?}", v.issues);
        assert_eq!(v.stats.total_required_hours, 16);
        assert_eq!(v.stats.total_available_hours, 18 + 18 + 12 + 18);
        assert_eq!(v.stats.total_time_slots, 30);
        assert!(v.report(&data).valid);
    }

    #[test]
    fn missing_lab_names_the_subject() {
        let mut data = fixtures::single_course(2);
        data.subjects[0].subject_type = SubjectType::Lab;
        data.subjects[0].required_room_type = RoomType::Laboratory;
        let diagnostics = validate(&data).diagnostics();
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].contains("Mathematics I (MATH101)"));
        assert!(diagnostics.suggestions.iter().any(|s| s.contains("Laboratory")));
    }

    #[test]
    fn empty_dataset_reports_every_missing_section() {
        let v = validate(&UniversityData::default());
        let diagnostics = v.diagnostics();
        assert!(diagnostics.critical_issues.len() >= 5);
        assert!(diagnostics.errors.iter().any(|e| e.contains("teachers")));
        assert!(diagnostics.errors.iter().any(|e| e.contains("working days")));
        assert_eq!(v.report(&UniversityData::default()).feasibility_score, 0.0);
    }

    #[test]
    fn teacher_capacity_shortfall_is_an_error() {
        let mut data = fixtures::single_course(3);
        data.teachers[0].max_hours_per_week = 2;
        let v = validate(&data);
        assert!(v.issues.contains(&ConfigIssue::InsufficientTeacherCapacity {
            required: 3,
            available: 2
        }));
        assert_eq!(v.diagnostics().critical_issues.len(), 1);
    }

    #[test]
    fn oversized_weekly_hours_are_a_configuration_error() {
        let mut data = fixtures::single_course(3_000_000_000);
        data.subjects.push(data.subjects[0].clone());
        data.subjects[1].id = 2;
        data.subjects[1].code = "MATH102".into();
        data.students[0].subjects.push(2);
        let v = validate(&data);
        assert!(!v.is_valid());
        assert_eq!(v.stats.total_required_hours, u32::MAX);
        assert!(v.issues.iter().any(|i| matches!(i, ConfigIssue::InsufficientTeacherCapacity { .. })));
        assert!(v.issues.iter().any(|i| matches!(i, ConfigIssue::MoreHoursThanSlots { .. })));
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let mut data = fixtures::single_course(3);
        data.subjects[0].max_students = 10;
        data.subjects[0].year = 2;
        data.teachers[0].preferred_days = vec![crate::data::Weekday::Friday];
        data.teachers[0].research_days = vec![crate::data::Weekday::Friday];
        let v = validate(&data);
        assert!(v.is_valid());
        assert!(v.warnings.iter().any(|w| w.contains("above the")));
        assert!(v.warnings.iter().any(|w| w.contains("offered in year 2")));
        assert!(v.warnings.iter().any(|w| w.contains("research day conflicts: Dr. Smith")));
        assert!(v.warnings.iter().any(|w| w.starts_with("Only one teacher")));
    }

    #[test]
    fn prerequisite_in_same_term_is_flagged() {
        let mut data = fixtures::campus();
        data.subjects[1].prerequisites = vec![SubjectRef::Name("MATH101".into())];
        let v = validate(&data);
        assert!(v
            .warnings
            .iter()
            .any(|w| w.contains("Linear Algebra (MATH201)") && w.contains("Calculus (MATH101)")));
    }

    #[test]
    fn feasibility_score_drops_with_problems() {
        let data = fixtures::single_course(3);
        let clean = validate(&data).report(&data);
        let mut broken = data.clone();
        broken.teachers[0].subjects_can_teach.clear();
        let report = validate(&broken).report(&broken);
        assert!(!report.valid);
        assert!(report.feasibility_score < clean.feasibility_score);
        assert!(report.recommendations.iter().any(|r| r.contains("subjectsCanTeach")));
    }
}
