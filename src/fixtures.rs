//! Datasets shared by the unit tests.

use crate::data::UniversityData;
use serde_json::{Value, json};

fn week(days: &[&str], slots: Value) -> Value {
    json!({
        "basicInfo": {
            "universityName": "Test University",
            "academicYear": "2024-2025",
            "semester": "Fall",
            "workingDays": days,
            "dailyPeriods": 8,
            "lunchBreakStart": "12:00",
            "lunchBreakEnd": "13:00"
        },
        "timeSlots": slots,
        "departments": [
            { "id": 1, "name": "Mathematics", "code": "MATH" },
            { "id": 2, "name": "Computer Science", "code": "CS" }
        ]
    })
}

fn five_slots() -> Value {
    json!([
        { "id": 1, "startTime": "08:00", "endTime": "09:00" },
        { "id": 2, "startTime": "09:00", "endTime": "10:00" },
        { "id": 3, "startTime": "10:00", "endTime": "11:00" },
        { "id": 4, "startTime": "11:00", "endTime": "12:00" },
        { "id": 5, "startTime": "13:00", "endTime": "14:00" }
    ])
}

const WEEKDAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

fn build(mut base: Value, resources: Value) -> UniversityData {
    if let (Some(base), Some(extra)) = (base.as_object_mut(), resources.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).expect("fixture must deserialize")
}

/// One teacher, one subject of `hours` per week, one group, one room,
/// five periods on five days.
pub fn single_course(hours: u32) -> UniversityData {
    build(
        week(&WEEKDAYS, five_slots()),
        json!({
            "teachers": [{
                "id": 1, "name": "Dr. Smith", "department": "Mathematics",
                "designation": "Lecturer", "subjectsCanTeach": ["MATH101"],
                "minHoursPerWeek": 0, "maxHoursPerWeek": 18
            }],
            "subjects": [{
                "id": 1, "name": "Mathematics I", "code": "MATH101",
                "department": "Mathematics", "hoursPerWeek": hours,
                "semester": 1, "year": 1
            }],
            "rooms": [{ "id": 1, "name": "Room 101", "building": "Main", "capacity": 60 }],
            "students": [{
                "id": 1, "batch": "MATH-2024", "department": "Mathematics",
                "year": 1, "semester": 1, "totalStudents": 40, "subjects": [1]
            }]
        }),
    )
}

/// Two departments, four teachers, a lab course and two groups. Comfortably
/// feasible.
pub fn campus() -> UniversityData {
    let slots = json!([
        { "id": 1, "startTime": "08:00", "endTime": "09:00" },
        { "id": 2, "startTime": "09:00", "endTime": "10:00" },
        { "id": 3, "startTime": "10:00", "endTime": "11:00" },
        { "id": 4, "startTime": "11:00", "endTime": "12:00" },
        { "id": 5, "startTime": "13:00", "endTime": "14:00" },
        { "id": 6, "startTime": "14:00", "endTime": "15:00" }
    ]);
    build(
        week(&WEEKDAYS, slots),
        json!({
            "teachers": [
                { "id": 1, "name": "Dr. Smith", "department": "MATH",
                  "subjectsCanTeach": ["MATH101", "Linear Algebra"],
                  "minHoursPerWeek": 0, "preferredDays": ["Monday", "Tuesday", "Wednesday"] },
                { "id": 2, "name": "Dr. Jones", "department": "Mathematics",
                  "subjectsCanTeach": ["MATH101", "MATH201"], "minHoursPerWeek": 0,
                  "researchDays": ["Friday"] },
                { "id": 3, "name": "Prof. Turing", "department": "CS",
                  "designation": "Professor", "subjectsCanTeach": ["CS101", "CS102"],
                  "minHoursPerWeek": 0, "maxHoursPerWeek": 12, "preferredTimeSlots": [1, 2, 3] },
                { "id": 4, "name": "Dr. Hopper", "department": "Computer Science",
                  "subjectsCanTeach": ["CS101", "CS102"], "minHoursPerWeek": 0,
                  "unavailableSlots": [{ "day": "Monday", "timeSlot": 1 }] }
            ],
            "subjects": [
                { "id": 1, "name": "Calculus", "code": "MATH101", "department": "Mathematics",
                  "hoursPerWeek": 3, "semester": 1, "year": 1 },
                { "id": 2, "name": "Linear Algebra", "code": "MATH201", "department": "Mathematics",
                  "hoursPerWeek": 2, "semester": 1, "year": 1 },
                { "id": 3, "name": "Programming", "code": "CS101", "department": "CS",
                  "hoursPerWeek": 3, "semester": 1, "year": 1 },
                { "id": 4, "name": "Programming Lab", "code": "CS102", "department": "CS",
                  "type": "Lab", "hoursPerWeek": 2, "requiredRoomType": "Laboratory",
                  "equipmentRequired": ["Computer"], "semester": 1, "year": 1 }
            ],
            "rooms": [
                { "id": 1, "name": "A-101", "building": "A", "capacity": 60,
                  "preferredFor": ["Theory"] },
                { "id": 2, "name": "A-102", "building": "A", "capacity": 45 },
                { "id": 3, "name": "B-Lab", "building": "B", "type": "Laboratory",
                  "capacity": 40, "equipment": ["Computer", "Projector"],
                  "maintenanceSlots": [6] }
            ],
            "students": [
                { "id": 1, "batch": "CS-2024", "department": "CS", "year": 1, "semester": 1,
                  "totalStudents": 40, "subjects": [1, 3, 4], "maxHoursPerDay": 4,
                  "preferredTimeSlots": [1, 2, 3, 4] },
                { "id": 2, "batch": "MATH-2024", "department": "Mathematics", "year": 1,
                  "semester": 1, "totalStudents": 35, "subjects": [1, 2, 3],
                  "maxHoursPerDay": 4 }
            ]
        }),
    )
}

/// Two groups that both need the only teacher in the only period of the
/// week. A clash is unavoidable.
pub fn teacher_clash() -> UniversityData {
    build(
        week(&["Monday"], json!([{ "id": 1, "startTime": "09:00", "endTime": "10:00" }])),
        json!({
            "teachers": [{
                "id": 1, "name": "Dr. Busy", "department": "Mathematics",
                "subjectsCanTeach": ["Statistics"], "minHoursPerWeek": 0
            }],
            "subjects": [{
                "id": 1, "name": "Statistics", "code": "STAT1",
                "department": "Mathematics", "hoursPerWeek": 1
            }],
            "rooms": [
                { "id": 1, "name": "R1", "capacity": 50 },
                { "id": 2, "name": "R2", "capacity": 50 }
            ],
            "students": [
                { "id": 1, "batch": "A", "totalStudents": 30, "subjects": [1] },
                { "id": 2, "batch": "B", "totalStudents": 30, "subjects": [1] }
            ]
        }),
    )
}
