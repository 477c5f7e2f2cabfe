use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type DepartmentId = u32;
pub type TeacherId = u32;
pub type SubjectId = u32;
pub type RoomId = u32;
pub type StudentGroupId = u32;
pub type TimeSlotId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Weekday {
    #[serde(alias = "monday", alias = "Mon")]
    Monday,
    #[serde(alias = "tuesday", alias = "Tue")]
    Tuesday,
    #[serde(alias = "wednesday", alias = "Wed")]
    Wednesday,
    #[serde(alias = "thursday", alias = "Thu")]
    Thursday,
    #[serde(alias = "friday", alias = "Fri")]
    Friday,
    #[serde(alias = "saturday", alias = "Sat")]
    Saturday,
    #[serde(alias = "sunday", alias = "Sun")]
    Sunday,
}

impl Weekday {
    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Academic designation, each carrying the weekly teaching band the
/// configuration UI applies when it is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Designation {
    #[default]
    Lecturer,
    #[serde(rename = "Assistant Professor")]
    AssistantProfessor,
    #[serde(rename = "Associate Professor")]
    AssociateProfessor,
    Professor,
    #[serde(other)]
    Other,
}

impl Designation {
    /// (min, max) weekly hours, `None` for designations without a band.
    pub fn hour_band(self) -> Option<(u32, u32)> {
        match self {
            Designation::Lecturer => Some((12, 18)),
            Designation::AssistantProfessor => Some((9, 15)),
            Designation::AssociateProfessor => Some((6, 12)),
            Designation::Professor => Some((3, 9)),
            Designation::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum RoomType {
    #[default]
    Classroom,
    #[serde(alias = "Lab")]
    Laboratory,
    Auditorium,
    #[serde(rename = "Seminar Room", alias = "Seminar")]
    SeminarRoom,
    Studio,
    Workshop,
    #[serde(other)]
    Other,
}

impl RoomType {
    /// Whether a room of type `actual` can host a session requiring `self`.
    pub fn accepts(self, actual: RoomType) -> bool {
        match self {
            RoomType::Classroom => matches!(
                actual,
                RoomType::Classroom | RoomType::Auditorium | RoomType::SeminarRoom
            ),
            required => required == actual,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoomType::Classroom => "Classroom",
            RoomType::Laboratory => "Laboratory",
            RoomType::Auditorium => "Auditorium",
            RoomType::SeminarRoom => "Seminar Room",
            RoomType::Studio => "Studio",
            RoomType::Workshop => "Workshop",
            RoomType::Other => "Other",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum SubjectType {
    #[default]
    Theory,
    #[serde(alias = "Laboratory")]
    Lab,
    Tutorial,
    Practical,
    Seminar,
    #[serde(other)]
    Other,
}

impl SubjectType {
    pub fn name(self) -> &'static str {
        match self {
            SubjectType::Theory => "Theory",
            SubjectType::Lab => "Lab",
            SubjectType::Tutorial => "Tutorial",
            SubjectType::Practical => "Practical",
            SubjectType::Seminar => "Seminar",
            SubjectType::Other => "Other",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An unavailable (or preferred) slot: a bare slot id applies to every
/// working day, the object form pins it to one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SlotRef {
    Every(TimeSlotId),
    #[serde(rename_all = "camelCase")]
    OnDay { day: Weekday, time_slot: TimeSlotId },
}

impl SlotRef {
    pub fn matches(&self, day: Weekday, slot: TimeSlotId) -> bool {
        match *self {
            SlotRef::Every(id) => id == slot,
            SlotRef::OnDay { day: d, time_slot } => d == day && time_slot == slot,
        }
    }
}

/// Entry of a teacher's `subjectsCanTeach`: subject name, code or id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SubjectRef {
    Id(SubjectId),
    Name(String),
}

impl SubjectRef {
    pub fn refers_to(&self, subject: &Subject) -> bool {
        match self {
            SubjectRef::Id(id) => *id == subject.id,
            SubjectRef::Name(name) => {
                let name = name.trim();
                !name.is_empty()
                    && (name == subject.name
                        || (!subject.code.is_empty() && name == subject.code)
                        || name == subject.id.to_string())
            }
        }
    }
}

fn default_daily_periods() -> u32 {
    8
}
fn default_period_duration() -> u32 {
    60
}
fn default_break_duration() -> u32 {
    15
}
fn default_total_weeks() -> u32 {
    16
}
fn default_lunch_start() -> String {
    "12:00".to_string()
}
fn default_lunch_end() -> String {
    "13:00".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    #[serde(default)]
    pub university_name: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default = "default_total_weeks")]
    pub total_weeks: u32,
    #[serde(default)]
    pub working_days: Vec<Weekday>,
    #[serde(default = "default_daily_periods")]
    pub daily_periods: u32,
    #[serde(default = "default_period_duration")]
    pub period_duration: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration: u32,
    #[serde(default = "default_lunch_start")]
    pub lunch_break_start: String,
    #[serde(default = "default_lunch_end")]
    pub lunch_break_end: String,
}

impl Default for BasicInfo {
    fn default() -> Self {
        Self {
            university_name: String::new(),
            academic_year: String::new(),
            semester: String::new(),
            total_weeks: default_total_weeks(),
            working_days: Vec::new(),
            daily_periods: default_daily_periods(),
            period_duration: default_period_duration(),
            break_duration: default_break_duration(),
            lunch_break_start: default_lunch_start(),
            lunch_break_end: default_lunch_end(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub start_time: String,
    pub end_time: String,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{}-{}", self.start_time, self.end_time)
    }
}

/// Parses a wall-clock "HH:MM" into minutes after midnight.
pub fn parse_clock(value: &str) -> Result<u32, String> {
    let (hours, minutes) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("'{}' is not in HH:MM form", value))?;
    let hours: u32 = hours
        .parse()
        .map_err(|_| format!("'{}' has an invalid hour", value))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| format!("'{}' has an invalid minute", value))?;
    if hours > 23 || minutes > 59 {
        return Err(format!("'{}' is not a valid time of day", value));
    }
    Ok(hours * 60 + minutes)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub programs: Vec<String>,
}

fn default_max_hours() -> u32 {
    18
}
fn default_min_hours() -> u32 {
    12
}
fn default_max_consecutive() -> u32 {
    4
}
fn default_max_gap() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub designation: Designation,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub subjects_can_teach: Vec<SubjectRef>,
    #[serde(default = "default_max_hours")]
    pub max_hours_per_week: u32,
    #[serde(default = "default_min_hours")]
    pub min_hours_per_week: u32,
    #[serde(default)]
    pub preferred_time_slots: Vec<TimeSlotId>,
    #[serde(default)]
    pub unavailable_slots: Vec<SlotRef>,
    #[serde(default)]
    pub preferred_days: Vec<Weekday>,
    #[serde(default)]
    pub research_days: Vec<Weekday>,
    #[serde(default = "default_max_consecutive")]
    pub max_consecutive_hours: u32,
    #[serde(default = "default_max_gap")]
    pub max_gap_hours: u32,
}

impl Teacher {
    pub fn can_teach(&self, subject: &Subject) -> bool {
        self.subjects_can_teach.iter().any(|r| r.refers_to(subject))
    }
}

fn default_credits() -> u32 {
    3
}
fn default_hours_per_week() -> u32 {
    3
}
fn default_duration() -> u32 {
    60
}
fn default_max_students() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub department: String,
    #[serde(default = "default_credits")]
    pub credits: u32,
    #[serde(default, rename = "type")]
    pub subject_type: SubjectType,
    #[serde(default = "default_hours_per_week")]
    pub hours_per_week: u32,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub semester: u32,
    #[serde(default)]
    pub year: u32,
    #[serde(default)]
    pub is_elective: bool,
    #[serde(default)]
    pub prerequisites: Vec<SubjectRef>,
    #[serde(default = "default_max_students")]
    pub max_students: u32,
    #[serde(default)]
    pub required_room_type: RoomType,
    #[serde(default)]
    pub equipment_required: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl Subject {
    pub fn display_name(&self) -> String {
        if self.code.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.code)
        }
    }
}

fn default_floor() -> i32 {
    1
}
fn default_capacity() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub building: String,
    #[serde(default = "default_floor")]
    pub floor: i32,
    #[serde(default, rename = "type")]
    pub room_type: RoomType,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub is_accessible: bool,
    #[serde(default, rename = "hasAC")]
    pub has_ac: bool,
    #[serde(default)]
    pub unavailable_slots: Vec<SlotRef>,
    #[serde(default)]
    pub preferred_for: Vec<String>,
    #[serde(default)]
    pub maintenance_slots: Vec<SlotRef>,
}

impl Room {
    pub fn has_equipment(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|tag| self.equipment.iter().any(|e| e.eq_ignore_ascii_case(tag)))
    }
}

fn default_section() -> String {
    "A".to_string()
}
fn default_group_type() -> String {
    "Full-time".to_string()
}
fn default_max_hours_per_day() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGroup {
    pub id: StudentGroupId,
    #[serde(default)]
    pub batch: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub year: u32,
    #[serde(default)]
    pub semester: u32,
    #[serde(default = "default_section")]
    pub section: String,
    pub total_students: u32,
    #[serde(default)]
    pub subjects: Vec<SubjectId>,
    #[serde(default = "default_group_type", rename = "type")]
    pub group_type: String,
    #[serde(default = "default_max_hours_per_day")]
    pub max_hours_per_day: u32,
    #[serde(default)]
    pub preferred_time_slots: Vec<TimeSlotId>,
    #[serde(default)]
    pub unavailable_slots: Vec<SlotRef>,
}

impl StudentGroup {
    pub fn label(&self) -> String {
        let batch = if self.batch.is_empty() {
            format!("Group {}", self.id)
        } else {
            self.batch.clone()
        };
        format!("{} Section {}", batch, self.section)
    }
}

fn enabled() -> bool {
    true
}

/// Hard constraints are switches: enforced whenever enabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardConstraints {
    #[serde(default = "enabled")]
    pub no_clash_students: bool,
    #[serde(default = "enabled")]
    pub no_clash_teachers: bool,
    #[serde(default = "enabled")]
    pub no_clash_rooms: bool,
    #[serde(default = "enabled")]
    pub respect_working_hours: bool,
    #[serde(default = "enabled")]
    pub room_capacity_check: bool,
    #[serde(default = "enabled")]
    pub teacher_qualification_check: bool,
    #[serde(default = "enabled")]
    pub respect_lunch_break: bool,
}

impl Default for HardConstraints {
    fn default() -> Self {
        Self {
            no_clash_students: true,
            no_clash_teachers: true,
            no_clash_rooms: true,
            respect_working_hours: true,
            room_capacity_check: true,
            teacher_qualification_check: true,
            respect_lunch_break: true,
        }
    }
}

fn w_teacher_preferences() -> f64 {
    0.8
}
fn w_student_preferences() -> f64 {
    0.6
}
fn w_room_preferences() -> f64 {
    0.7
}
fn w_minimize_gaps() -> f64 {
    0.9
}
fn w_even_distribution() -> f64 {
    0.8
}
fn w_lunch_break() -> f64 {
    0.9
}
fn w_max_consecutive() -> f64 {
    0.8
}
fn w_building_change() -> f64 {
    0.7
}
fn w_teacher_workload() -> f64 {
    0.5
}

/// Soft constraint weights in [0, 1].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftConstraints {
    #[serde(default = "w_teacher_preferences")]
    pub teacher_preferences: f64,
    #[serde(default = "w_student_preferences")]
    pub student_preferences: f64,
    #[serde(default = "w_room_preferences")]
    pub room_preferences: f64,
    #[serde(default = "w_minimize_gaps")]
    pub minimize_gaps: f64,
    #[serde(default = "w_even_distribution")]
    pub even_distribution: f64,
    #[serde(default = "w_lunch_break")]
    pub lunch_break_respect: f64,
    #[serde(default = "w_max_consecutive")]
    pub max_consecutive_hours: f64,
    #[serde(default = "w_building_change")]
    pub building_change_minimize: f64,
    #[serde(default = "w_teacher_workload")]
    pub teacher_workload: f64,
}

impl Default for SoftConstraints {
    fn default() -> Self {
        Self {
            teacher_preferences: w_teacher_preferences(),
            student_preferences: w_student_preferences(),
            room_preferences: w_room_preferences(),
            minimize_gaps: w_minimize_gaps(),
            even_distribution: w_even_distribution(),
            lunch_break_respect: w_lunch_break(),
            max_consecutive_hours: w_max_consecutive(),
            building_change_minimize: w_building_change(),
            teacher_workload: w_teacher_workload(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default)]
    pub hard: HardConstraints,
    #[serde(default)]
    pub soft: SoftConstraints,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub notes: String,
}

/// The complete university resource dataset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityData {
    #[serde(default)]
    pub basic_info: BasicInfo,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub students: Vec<StudentGroup>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub metadata: Metadata,
}

impl UniversityData {
    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    /// Whether two department references (name or code) denote the same
    /// department. Unknown references only match themselves.
    pub fn same_department(&self, a: &str, b: &str) -> bool {
        let (a, b) = (a.trim(), b.trim());
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        self.departments.iter().any(|d| {
            let is = |r: &str| {
                r.eq_ignore_ascii_case(&d.name) || (!d.code.is_empty() && r.eq_ignore_ascii_case(&d.code))
            };
            is(a) && is(b)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CrossoverType {
    /// Child inherits each student group's whole week from one parent.
    #[default]
    StudentGroup,
    /// Child picks every activity independently from either parent.
    Uniform,
}

fn default_population_size() -> usize {
    60
}
fn default_generations() -> usize {
    150
}
fn default_mutation_rate() -> f64 {
    0.12
}
fn default_crossover_rate() -> f64 {
    0.85
}
fn default_elite_size() -> usize {
    6
}
fn default_tournament_size() -> usize {
    4
}
fn default_plateau_generations() -> usize {
    20
}
fn default_perfection_threshold() -> f64 {
    95.0
}

/// Genetic algorithm settings as sent by the configuration UI.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmSettings {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_elite_size")]
    pub elite_size: usize,
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    #[serde(default = "default_plateau_generations")]
    pub plateau_generations: usize,
    #[serde(default = "default_perfection_threshold")]
    pub perfection_threshold: f64,
    #[serde(default)]
    pub crossover_type: CrossoverType,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            elite_size: default_elite_size(),
            tournament_size: default_tournament_size(),
            plateau_generations: default_plateau_generations(),
            perfection_threshold: default_perfection_threshold(),
            crossover_type: CrossoverType::default(),
            seed: None,
        }
    }
}

impl AlgorithmSettings {
    /// Settings the UI would never send. They are still honoured.
    pub fn out_of_range(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if !(20..=100).contains(&self.population_size) {
            notes.push(format!("populationSize {} outside 20-100", self.population_size));
        }
        if !(25..=200).contains(&self.generations) {
            notes.push(format!("generations {} outside 25-200", self.generations));
        }
        if !(0.05..=0.30).contains(&self.mutation_rate) {
            notes.push(format!("mutationRate {} outside 0.05-0.30", self.mutation_rate));
        }
        if !(0.60..=0.95).contains(&self.crossover_rate) {
            notes.push(format!("crossoverRate {} outside 0.60-0.95", self.crossover_rate));
        }
        if !(1..=10).contains(&self.elite_size) {
            notes.push(format!("eliteSize {} outside 1-10", self.elite_size));
        }
        notes
    }
}

/// Body of `POST /api/generate-timetable`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub university_data: UniversityData,
    #[serde(default)]
    pub algorithm_settings: AlgorithmSettings,
}
