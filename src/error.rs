use crate::data::{RoomType, SubjectId, TimeSlotId};
use serde::Serialize;
use std::fmt;

/// A reason the input data cannot possibly produce a timetable.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    MissingResource(&'static str),
    NoWorkingDays,
    MalformedTimeSlot { id: TimeSlotId, reason: String },
    DuplicateTimeSlot { id: TimeSlotId },
    NoUsablePeriods,
    UnknownSubject { group: String, subject_id: SubjectId },
    NoQualifiedTeacher { subject: String },
    NoSuitableRoom {
        subject: String,
        room_type: RoomType,
        students: u32,
        equipment: Vec<String>,
    },
    GroupUnavailable { group: String },
    DailyCapTooLow {
        group: String,
        weekly_hours: u64,
        max_per_day: u32,
        days: usize,
    },
    MoreHoursThanSlots {
        group: String,
        subject: String,
        hours: u32,
        available: usize,
    },
    InsufficientTeacherCapacity { required: u32, available: u32 },
}

impl ConfigIssue {
    pub fn suggestion(&self) -> String {
        match self {
            ConfigIssue::MissingResource(section) => {
                format!("Add at least one entry to the '{}' section", section)
            }
            ConfigIssue::NoWorkingDays => {
                "Select the working days in the basic information section".to_string()
            }
            ConfigIssue::MalformedTimeSlot { .. } => {
                "Use HH:MM times with the end after the start for every time slot".to_string()
            }
            ConfigIssue::DuplicateTimeSlot { .. } => "Give every time slot a unique id".to_string(),
            ConfigIssue::NoUsablePeriods => {
                "Add time slots inside the daily periods and outside the lunch break".to_string()
            }
            ConfigIssue::UnknownSubject { .. } => {
                "Remove the enrollment or add the missing subject".to_string()
            }
            ConfigIssue::NoQualifiedTeacher { subject } => format!(
                "Add '{}' to the 'subjectsCanTeach' array of a qualified teacher",
                subject
            ),
            ConfigIssue::NoSuitableRoom { room_type, .. } => format!(
                "Add a {} room with enough capacity and equipment, or split the student group into smaller sections",
                room_type
            ),
            ConfigIssue::GroupUnavailable { group } => {
                format!("Free some time slots for {}", group)
            }
            ConfigIssue::DailyCapTooLow { group, .. } => format!(
                "Raise the max hours per day of {} or add working days",
                group
            ),
            ConfigIssue::MoreHoursThanSlots { subject, .. } => format!(
                "Reduce the weekly hours of {} or add time slots",
                subject
            ),
            ConfigIssue::InsufficientTeacherCapacity { .. } => {
                "Reduce course hours, add teachers, or increase teacher working hours".to_string()
            }
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::MissingResource(section) => write!(
                f,
                "No {} defined - cannot generate timetable without them",
                section
            ),
            ConfigIssue::NoWorkingDays => write!(f, "No working days defined"),
            ConfigIssue::MalformedTimeSlot { id, reason } => {
                write!(f, "Time slot {} is malformed: {}", id, reason)
            }
            ConfigIssue::DuplicateTimeSlot { id } => write!(f, "Time slot id {} is used twice", id),
            ConfigIssue::NoUsablePeriods => write!(
                f,
                "No time slot lies within working hours outside the lunch break"
            ),
            ConfigIssue::UnknownSubject { group, subject_id } => write!(
                f,
                "Student group {} is enrolled in unknown subject {}",
                group, subject_id
            ),
            ConfigIssue::NoQualifiedTeacher { subject } => {
                write!(f, "No qualified teacher found for subject: {}", subject)
            }
            ConfigIssue::NoSuitableRoom {
                subject,
                room_type,
                students,
                equipment,
            } => {
                write!(
                    f,
                    "No suitable room for subject {}: needs a {} for {} students",
                    subject, room_type, students
                )?;
                if !equipment.is_empty() {
                    write!(f, " with {}", equipment.join(", "))?;
                }
                Ok(())
            }
            ConfigIssue::GroupUnavailable { group } => {
                write!(f, "Student group {} has no available time slot", group)
            }
            ConfigIssue::DailyCapTooLow {
                group,
                weekly_hours,
                max_per_day,
                days,
            } => write!(
                f,
                "Student group {} needs {}h/week but may only attend {}h/day over {} days",
                group, weekly_hours, max_per_day, days
            ),
            ConfigIssue::MoreHoursThanSlots {
                group,
                subject,
                hours,
                available,
            } => write!(
                f,
                "Subject {} needs {}h/week but student group {} has only {} free periods",
                subject, hours, group, available
            ),
            ConfigIssue::InsufficientTeacherCapacity { required, available } => write!(
                f,
                "Insufficient teacher capacity: need {}h/week, available {}h/week",
                required, available
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityStats {
    pub total_required_hours: u32,
    pub total_available_hours: u32,
    pub total_time_slots: u32,
}

/// Everything a caller needs to fix a failed generation in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub critical_issues: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub stats: CapacityStats,
}

impl Diagnostics {
    pub fn push_suggestion(&mut self, suggestion: String) {
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The input cannot satisfy its own requirements. Found before search.
    Configuration(Diagnostics),
    /// The generation budget ran out with hard violations left.
    Infeasible(Diagnostics),
    /// The service time budget elapsed first.
    Timeout(Diagnostics),
    /// The client went away.
    Cancelled,
    Internal(String),
}

impl GenerationError {
    pub fn error_type(&self) -> &'static str {
        match self {
            GenerationError::Configuration(_) => "CONFIGURATION_ERROR",
            GenerationError::Infeasible(_) => "INFEASIBLE",
            GenerationError::Timeout(_) => "TIMEOUT",
            GenerationError::Cancelled => "CANCELLED",
            GenerationError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            GenerationError::Configuration(d)
            | GenerationError::Infeasible(d)
            | GenerationError::Timeout(d) => Some(d),
            GenerationError::Cancelled | GenerationError::Internal(_) => None,
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Configuration(d) => write!(
                f,
                "Your university data has {} problem(s) that prevent timetable generation",
                d.errors.len().max(1)
            ),
            GenerationError::Infeasible(_) => write!(
                f,
                "The genetic algorithm could not produce a clash-free timetable within its generation budget"
            ),
            GenerationError::Timeout(_) => {
                write!(f, "Timetable generation exceeded the time budget")
            }
            GenerationError::Cancelled => write!(f, "Timetable generation was cancelled"),
            // never leak internals to the caller
            GenerationError::Internal(_) => {
                write!(f, "An unexpected error occurred during timetable generation")
            }
        }
    }
}

impl std::error::Error for GenerationError {}
