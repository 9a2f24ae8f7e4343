//! AWS Lambda handler for incentive calculations
//!
//! Accepts `{ "practice_id": "..." }` and returns the computed incentive with
//! its yearly schedule, line details and warnings.
//!
//! Supports Lambda Function URLs for direct HTTP access.

use anyhow::Context;
use incentive_engine::coefficients::{load_coefficients, CoefficientTable};
use incentive_engine::config::{data_dir_from_env, COEFFICIENTS_FILE, DATASET_FILE};
use incentive_engine::practice::load_dataset;
use incentive_engine::{CalcError, EngineConfig, IncentiveEngine, InMemoryStore, LineResult, PracticeId};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input of one calculation
#[derive(Debug, Deserialize)]
pub struct CalcRequest {
    #[serde(default)]
    pub practice_id: Option<String>,
}

/// Successful calculation
#[derive(Debug, Serialize)]
pub struct CalcResponse {
    pub ok: bool,
    pub practice_id: String,
    pub total_gross: f64,
    pub total_net: f64,
    pub cap_rate: f64,
    pub duration_years: u32,
    pub rates: Vec<f64>,
    pub warnings: Vec<String>,
    pub details: Vec<LineResult>,
    pub execution_time_ms: u64,
}

/// Failed calculation
#[derive(Debug, Serialize)]
pub struct CalcFailure {
    pub ok: bool,
    pub code: String,
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Reference data loaded once per cold start
struct AppState {
    table: CoefficientTable,
    store: InMemoryStore,
    config: EngineConfig,
}

impl AppState {
    fn load() -> anyhow::Result<Self> {
        let config = EngineConfig::from_env().context("invalid engine configuration")?;
        let data_dir = data_dir_from_env();

        let coefficients_path = data_dir.join(COEFFICIENTS_FILE);
        let import = load_coefficients(&coefficients_path, config.default_duration_years)
            .with_context(|| format!("failed to load {}", coefficients_path.display()))?;
        if !import.report.errors.is_empty() {
            log::warn!("{} coefficient rows skipped at startup", import.report.errors.len());
        }

        let dataset_path = data_dir.join(DATASET_FILE);
        let dataset = load_dataset(&dataset_path).with_context(|| format!("failed to load {}", dataset_path.display()))?;

        Ok(Self {
            table: import.table,
            store: InMemoryStore::from_dataset(dataset),
            config,
        })
    }
}

/// HTTP status for a failed run
fn status_for(err: &CalcError) -> u16 {
    match err {
        CalcError::PracticeNotFound(_) => 404,
        CalcError::NoInterventionsSelected(_) | CalcError::AllLinesUnresolved { .. } => 422,
        CalcError::Store(_) => 500,
    }
}

fn with_cors(builder: lambda_http::http::response::Builder) -> lambda_http::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Result<Response<Body>, Error> {
    let text = serde_json::to_string(body)?;
    Ok(with_cors(Response::builder())
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::Text(text))?)
}

fn error_response(status: u16, code: &str, message: &str) -> Result<Response<Body>, Error> {
    json_response(
        status,
        &CalcFailure {
            ok: false,
            code: code.to_string(),
            error: message.to_string(),
            warnings: Vec::new(),
        },
    )
}

/// Lambda handler function
async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let start = std::time::Instant::now();

    // Handle CORS preflight
    if event.method().as_str() == "OPTIONS" {
        return Ok(with_cors(Response::builder()).status(200).body(Body::Empty)?);
    }
    if event.method().as_str() != "POST" {
        return error_response(405, "MethodNotAllowed", "only POST is supported");
    }

    // Parse request body
    let body_str = match event.body() {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => "{}".to_string(),
    };

    let request: CalcRequest = match serde_json::from_str(&body_str) {
        Ok(r) => r,
        Err(e) => return error_response(400, "BadRequest", &format!("Invalid JSON: {}", e)),
    };
    let practice_id = match request.practice_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => PracticeId::new(id),
        _ => return error_response(400, "BadRequest", "practice_id is required"),
    };

    // The calculation is CPU-bound and takes the store lock; keep it off the async workers
    let worker_state = Arc::clone(&state);
    let worker_id = practice_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let engine = IncentiveEngine::new(&worker_state.table, worker_state.config.clone());
        engine.calculate(&worker_state.store, &worker_id)
    })
    .await?;

    match outcome {
        Ok(record) => json_response(
            200,
            &CalcResponse {
                ok: true,
                practice_id: record.practice_id.to_string(),
                total_gross: record.total_gross,
                total_net: record.total_net,
                cap_rate: record.cap_rate,
                duration_years: record.duration_years,
                rates: record.rates,
                warnings: record.warnings,
                details: record.details,
                execution_time_ms: start.elapsed().as_millis() as u64,
            },
        ),
        Err(err) => {
            let status = status_for(&err);
            if status == 500 {
                log::error!("practice {}: {}", practice_id, err);
            }
            json_response(
                status,
                &CalcFailure {
                    ok: false,
                    code: err.code().to_string(),
                    error: err.to_string(),
                    warnings: err.warnings().to_vec(),
                },
            )
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let state = Arc::new(AppState::load()?);
    log::info!("loaded {} coefficient rows", state.table.len());

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
