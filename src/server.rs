use crate::config::ServerConfig;
use crate::data::{AlgorithmSettings, GenerateRequest, UniversityData};
use crate::engine::RunControl;
use crate::error::{Diagnostics, GenerationError};
use crate::report::FailureReport;
use crate::solver;
use crate::validation::validate;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Extra time the handler waits past the engine's own deadline before
/// giving up on the worker.
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    runs: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let runs = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            config: Arc::new(config),
            runs,
        }
    }
}

/// Raises the cancel flag when the request future is dropped, e.g. because
/// the client went away.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn invalid_request(rejection: JsonRejection) -> Response {
    let reason = rejection.body_text();
    warn!("Rejecting malformed request: {}", reason);
    let report = FailureReport::new(
        "INVALID_REQUEST",
        "The request body is not a valid timetable request".to_string(),
        Diagnostics {
            errors: vec![reason],
            ..Diagnostics::default()
        },
    );
    (StatusCode::BAD_REQUEST, Json(report)).into_response()
}

fn failure(err: GenerationError) -> Response {
    let status = match err {
        GenerationError::Internal(ref detail) => {
            error!("Timetable generation failed internally: {}", detail);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::OK,
    };
    (status, Json(FailureReport::from_error(&err))).into_response()
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_request(rejection),
    };
    let permit = match state.runs.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return failure(GenerationError::Internal(format!("run semaphore closed: {}", e))),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(cancel.clone());
    let budget = state.config.timeout;
    let control = RunControl::new(cancel.clone(), Some(Instant::now() + budget));
    let seed = request
        .algorithm_settings
        .seed
        .unwrap_or(state.config.default_seed);
    info!(
        "Generating timetable for {} student groups (seed {})",
        request.university_data.students.len(),
        seed
    );

    let worker = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        solver::generate(
            &request.university_data,
            &request.algorithm_settings,
            seed,
            &control,
        )
    });
    let result = match tokio::time::timeout(budget + TIMEOUT_GRACE, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(GenerationError::Internal(join_error.to_string())),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            Err(GenerationError::Timeout(Diagnostics {
                errors: vec![format!(
                    "No result within the {}s time budget",
                    budget.as_secs()
                )],
                ..Diagnostics::default()
            }))
        }
    };

    match result {
        Ok(success) => Json(success).into_response(),
        Err(err) => failure(err),
    }
}

/// Accepts either `{"universityData": {...}}` or the dataset itself.
async fn validate_handler(payload: Result<Json<Value>, JsonRejection>) -> Response {
    let Json(mut body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_request(rejection),
    };
    let dataset = match body.get_mut("universityData") {
        Some(inner) => inner.take(),
        None => body,
    };
    match serde_json::from_value::<UniversityData>(dataset) {
        Ok(data) => Json(validate(&data).report(&data)).into_response(),
        Err(e) => {
            warn!("Rejecting malformed dataset: {}", e);
            let report = FailureReport::new(
                "INVALID_REQUEST",
                "The request body is not a valid university dataset".to_string(),
                Diagnostics {
                    errors: vec![e.to_string()],
                    ..Diagnostics::default()
                },
            );
            (StatusCode::BAD_REQUEST, Json(report)).into_response()
        }
    }
}

async fn settings_handler() -> Json<Value> {
    let defaults = AlgorithmSettings::default();
    Json(json!({
        "settings": {
            "populationSize": {
                "description": "Number of chromosomes in each generation",
                "default": defaults.population_size, "min": 20, "max": 100, "type": "integer"
            },
            "generations": {
                "description": "Maximum number of generations to run",
                "default": defaults.generations, "min": 25, "max": 200, "type": "integer"
            },
            "mutationRate": {
                "description": "Probability of reassigning each activity",
                "default": defaults.mutation_rate, "min": 0.05, "max": 0.30, "type": "float"
            },
            "crossoverRate": {
                "description": "Probability of recombining two parents",
                "default": defaults.crossover_rate, "min": 0.60, "max": 0.95, "type": "float"
            },
            "eliteSize": {
                "description": "Best chromosomes carried unchanged into the next generation",
                "default": defaults.elite_size, "min": 1, "max": 10, "type": "integer"
            },
            "tournamentSize": {
                "description": "Contestants per parent selection",
                "default": defaults.tournament_size, "type": "integer"
            },
            "plateauGenerations": {
                "description": "Generations without improvement before stopping early",
                "default": defaults.plateau_generations, "type": "integer"
            },
            "perfectionThreshold": {
                "description": "Soft score at which a clash-free timetable is accepted immediately",
                "default": defaults.perfection_threshold, "min": 0.0, "max": 100.0, "type": "float"
            },
            "crossoverType": {
                "description": "How parents are recombined",
                "default": defaults.crossover_type, "options": ["studentGroup", "uniform"]
            },
            "seed": {
                "description": "Random seed; identical input and seed reproduce the timetable",
                "type": "integer"
            }
        },
        "presets": {
            "fast": {
                "populationSize": 40, "generations": 75, "mutationRate": 0.15,
                "crossoverRate": 0.8, "eliteSize": 4,
                "description": "Quick generation with acceptable quality"
            },
            "balanced": {
                "populationSize": 60, "generations": 150, "mutationRate": 0.12,
                "crossoverRate": 0.85, "eliteSize": 6,
                "description": "Good balance of speed and quality"
            },
            "quality": {
                "populationSize": 100, "generations": 200, "mutationRate": 0.1,
                "crossoverRate": 0.9, "eliteSize": 8,
                "description": "High quality results for large datasets"
            }
        }
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate-timetable", post(generate_handler))
        .route("/api/validate-data", post(validate_handler))
        .route("/api/algorithm-settings", get(settings_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn run_server(config: ServerConfig) -> Result<(), String> {
    let addr = config.bind_addr;
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("cannot bind {}: {}", addr, e))?;
    let local = listener.local_addr().map_err(|e| e.to_string())?;
    info!("Server running at http://{}", local);

    axum::serve(listener, app).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(ServerConfig::default()))
    }

    async fn call(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn generates_single_course_timetable() {
        let body = json!({
            "universityData": serde_json::to_value(fixtures::single_course(3)).unwrap(),
            "algorithmSettings": { "populationSize": 20, "generations": 30, "seed": 5 }
        });
        let (status, json) = call(post_json("/api/generate-timetable", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["algorithmStats"]["totalActivities"], 3);
        assert_eq!(json["algorithmStats"]["populationSize"], 20);
        assert_eq!(json["algorithmStats"]["seed"], 5);
        assert!(json["executionTime"].as_str().unwrap().ends_with('s'));
    }

    #[tokio::test]
    async fn configuration_error_is_a_failure_report() {
        let mut data = fixtures::single_course(2);
        data.subjects[0].required_room_type = crate::data::RoomType::Laboratory;
        let body = json!({ "universityData": serde_json::to_value(data).unwrap() });
        let (status, json) = call(post_json("/api/generate-timetable", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["details"]["errorType"], "CONFIGURATION_ERROR");
        assert!(json["details"]["errors"][0].as_str().unwrap().contains("Mathematics I"));
        assert!(json["details"]["stats"]["totalTimeSlots"].is_u64());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_with_400() {
        let (status, json) = call(post_json("/api/generate-timetable", json!({ "wrong": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["details"]["errorType"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn validate_accepts_wrapped_and_bare_datasets() {
        let data = serde_json::to_value(fixtures::campus()).unwrap();
        let (status, wrapped) =
            call(post_json("/api/validate-data", json!({ "universityData": data.clone() }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wrapped["valid"], true);
        assert_eq!(wrapped["statistics"]["totalRequiredHours"], 16);

        let (_, bare) = call(post_json("/api/validate-data", data)).await;
        assert_eq!(bare["valid"], true);
        assert_eq!(bare["feasibilityScore"], wrapped["feasibilityScore"]);
    }

    #[tokio::test]
    async fn settings_and_health_respond() {
        let (status, settings) = call(
            Request::get("/api/algorithm-settings")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settings["settings"]["populationSize"]["default"], 60);
        assert_eq!(settings["presets"]["balanced"]["generations"], 150);

        let (status, health) = call(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
    }

    #[test]
    fn dropping_the_guard_raises_cancel() {
        let flag = Arc::new(AtomicBool::new(false));
        drop(CancelOnDrop(flag.clone()));
        assert!(flag.load(Ordering::Relaxed));
    }
}
