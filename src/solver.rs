use crate::data::{AlgorithmSettings, UniversityData};
use crate::engine::{GaSettings, GeneticSearch, RunControl, Termination};
use crate::error::{Diagnostics, GenerationError};
use crate::evaluator::Evaluator;
use crate::expander::expand;
use crate::report::{GenerationSuccess, build_success, infeasible_diagnostics};
use crate::validation::validate;
use log::{debug, info, warn};
use std::time::Instant;

/// Generates a timetable for `data`.
///
/// Stateless: everything the run needs is passed in, and `seed` fully
/// determines the search. `control` lets the caller cancel the run or bound
/// its wall-clock time.
pub fn generate(
    data: &UniversityData,
    settings: &AlgorithmSettings,
    seed: u64,
    control: &RunControl,
) -> Result<GenerationSuccess, GenerationError> {
    let start_time = Instant::now();

    let validation = validate(data);
    for warning in &validation.warnings {
        debug!("Validation warning: {}", warning);
    }
    if !validation.is_valid() {
        warn!(
            "Rejecting dataset with {} configuration issue(s)",
            validation.issues.len()
        );
        return Err(GenerationError::Configuration(validation.diagnostics()));
    }

    let problem = expand(data).map_err(|issues| {
        let mut diagnostics = validation.diagnostics();
        for issue in issues {
            diagnostics.errors.push(issue.to_string());
            diagnostics.push_suggestion(issue.suggestion());
        }
        GenerationError::Configuration(diagnostics)
    })?;
    let evaluator = Evaluator::new(&problem);
    let ga = GaSettings {
        seed,
        ..GaSettings::resolve(settings, seed)
    };
    let mut search = GeneticSearch::new(&evaluator, ga.clone()).map_err(GenerationError::Internal)?;
    let outcome = search.run(control);
    debug!(
        "Search ended in state {:?} after {} generations",
        outcome.state, outcome.generations_run
    );

    let failure = |mut diagnostics: Diagnostics| {
        diagnostics.warnings.extend(validation.warnings.iter().cloned());
        diagnostics
    };
    match outcome.termination {
        Termination::Cancelled => {
            info!("Generation cancelled after {} generations", outcome.generations_run);
            return Err(GenerationError::Cancelled);
        }
        Termination::TimedOut => {
            warn!(
                "Generation timed out after {} generations, best hard violations {}",
                outcome.generations_run, outcome.fitness.hard
            );
            let mut diagnostics = infeasible_diagnostics(&evaluator, &outcome.best.genes, validation.stats);
            diagnostics.errors.insert(
                0,
                format!(
                    "Stopped after {} of {} generations when the time budget ran out",
                    outcome.generations_run, ga.generations
                ),
            );
            return Err(GenerationError::Timeout(failure(diagnostics)));
        }
        _ if !outcome.fitness.is_feasible() => {
            warn!(
                "No clash-free timetable after {} generations ({} hard violations left)",
                outcome.generations_run, outcome.fitness.hard
            );
            let diagnostics = infeasible_diagnostics(&evaluator, &outcome.best.genes, validation.stats);
            return Err(GenerationError::Infeasible(failure(diagnostics)));
        }
        _ => {}
    }

    let elapsed = start_time.elapsed();
    info!(
        "Timetable with {} activities generated in {:.2?} (fitness {:.2})",
        outcome.best.genes.len(),
        elapsed,
        outcome.fitness.normalized()
    );
    Ok(build_success(&evaluator, &outcome, ga.population_size, seed, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RoomType, SubjectType, Weekday};
    use crate::fixtures;
    use crate::report::ScheduledActivity;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn run(data: &UniversityData, settings: &AlgorithmSettings) -> Result<GenerationSuccess, GenerationError> {
        generate(data, settings, 42, &RunControl::default())
    }

    fn entries(success: &GenerationSuccess) -> Vec<(String, u32, &ScheduledActivity)> {
        success
            .timetable
            .iter()
            .flat_map(|d| {
                d.periods
                    .iter()
                    .flat_map(move |p| p.activities.iter().map(move |a| (d.day.clone(), p.period, a)))
            })
            .collect()
    }

    #[test]
    fn single_course_schedules_every_weekly_hour() {
        let data = fixtures::single_course(3);
        let success = run(&data, &AlgorithmSettings::default()).unwrap();
        assert_eq!(entries(&success).len(), 3);
        assert_eq!(success.algorithm_stats.constraint_violations, 0);
        assert_eq!(success.algorithm_stats.seed, 42);
        assert!(success.algorithm_stats.final_fitness >= 0.0);
        assert!(success.algorithm_stats.final_fitness <= 100.0);
    }

    #[test]
    fn campus_timetable_respects_hard_constraints() {
        let data = fixtures::campus();
        let success = run(&data, &AlgorithmSettings::default()).unwrap();
        let entries = entries(&success);

        let mut teachers = HashSet::new();
        let mut rooms = HashSet::new();
        let mut groups = HashSet::new();
        for (day, period, a) in &entries {
            assert!(teachers.insert((day.clone(), *period, a.teacher.clone())));
            assert!(rooms.insert((day.clone(), *period, a.room.clone())));
            assert!(groups.insert((day.clone(), *period, a.student_group.clone())));

            let room = data.rooms.iter().find(|r| r.name == a.room).unwrap();
            assert!(room.capacity >= a.student_count);
            let subject = data.subjects.iter().find(|s| s.name == a.subject).unwrap();
            let teacher = data.teachers.iter().find(|t| t.name == a.teacher).unwrap();
            assert!(teacher.can_teach(subject));
            assert!(!teacher.research_days.iter().any(|d| d.name() == day.as_str()));
        }

        for group in &data.students {
            for &id in &group.subjects {
                let subject = data.subject(id).unwrap();
                let scheduled = entries
                    .iter()
                    .filter(|(_, _, a)| a.student_group == group.label() && a.subject == subject.name)
                    .count();
                assert_eq!(scheduled as u32, subject.hours_per_week);
            }
        }
    }

    #[test]
    fn fixed_seed_reproduces_timetable_and_fitness() {
        let data = fixtures::campus();
        let settings = AlgorithmSettings {
            population_size: 20,
            generations: 30,
            ..AlgorithmSettings::default()
        };
        let a = run(&data, &settings).unwrap();
        let b = run(&data, &settings).unwrap();
        assert_eq!(
            serde_json::to_value(&a.timetable).unwrap(),
            serde_json::to_value(&b.timetable).unwrap()
        );
        assert_eq!(a.algorithm_stats.final_fitness, b.algorithm_stats.final_fitness);
        assert_eq!(a.algorithm_stats.generations_run, b.algorithm_stats.generations_run);
    }

    #[test]
    fn shared_teacher_without_room_to_move_is_infeasible() {
        let data = fixtures::teacher_clash();
        let err = run(&data, &AlgorithmSettings::default()).unwrap_err();
        assert_eq!(err.error_type(), "INFEASIBLE");
        let diagnostics = err.diagnostics().unwrap();
        assert!(diagnostics.critical_issues.iter().any(|c| c.contains("Dr. Busy")));
        assert_eq!(diagnostics.stats.total_required_hours, 2);
        assert_eq!(diagnostics.stats.total_time_slots, 1);
    }

    #[test]
    fn research_days_leave_the_teacher_overcommitted() {
        let mut data = fixtures::single_course(3);
        data.time_slots.truncate(1);
        data.teachers[0].research_days =
            vec![Weekday::Tuesday, Weekday::Wednesday, Weekday::Thursday, Weekday::Friday];
        let err = run(&data, &AlgorithmSettings::default()).unwrap_err();
        assert_eq!(err.error_type(), "INFEASIBLE");
        let diagnostics = err.diagnostics().unwrap();
        assert!(diagnostics
            .critical_issues
            .iter()
            .any(|c| c.contains("Teacher Dr. Smith") && c.contains("available 1h/week")));
    }

    #[test]
    fn missing_laboratory_fails_before_search() {
        let mut data = fixtures::single_course(2);
        data.subjects[0].subject_type = SubjectType::Lab;
        data.subjects[0].required_room_type = RoomType::Laboratory;
        let err = run(&data, &AlgorithmSettings::default()).unwrap_err();
        assert_eq!(err.error_type(), "CONFIGURATION_ERROR");
        let diagnostics = err.diagnostics().unwrap();
        assert!(diagnostics.errors.iter().any(|e| e.contains("Mathematics I")));
    }

    #[test]
    fn minimal_settings_still_terminate() {
        let data = fixtures::campus();
        let settings = AlgorithmSettings {
            population_size: 1,
            generations: 1,
            elite_size: 1,
            ..AlgorithmSettings::default()
        };
        match run(&data, &settings) {
            Ok(success) => assert_eq!(success.algorithm_stats.population_size, 1),
            Err(err) => assert_eq!(err.error_type(), "INFEASIBLE"),
        }
    }

    #[test]
    fn raised_cancel_flag_cancels() {
        let data = fixtures::campus();
        let settings = AlgorithmSettings {
            perfection_threshold: 100.0,
            ..AlgorithmSettings::default()
        };
        let control = RunControl::new(Arc::new(AtomicBool::new(true)), None);
        let err = generate(&data, &settings, 1, &control).unwrap_err();
        assert_eq!(err, GenerationError::Cancelled);
    }

    #[test]
    fn expired_deadline_reports_timeout_with_stats() {
        let data = fixtures::campus();
        let settings = AlgorithmSettings {
            perfection_threshold: 100.0,
            ..AlgorithmSettings::default()
        };
        let control = RunControl::new(Arc::default(), Some(Instant::now()));
        let err = generate(&data, &settings, 1, &control).unwrap_err();
        assert_eq!(err.error_type(), "TIMEOUT");
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.stats.total_required_hours, 16);
        assert!(diagnostics.errors[0].contains("time budget"));
    }
}
