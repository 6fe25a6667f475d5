// E-Billing Rules Engine - Web Server
// REST API with Axum over the three stages

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use ebilling::{
    intake, store, telemetry, ApNotification, AssignmentOutcome, AssignmentReport,
    AuditSummary, EngineConfig, Invoice, Lawyer, Matter, OnboardingOutcome, RateDecision,
    Roster, VendorRecord,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ebilling-server", version, about = "E-billing rules engine over HTTP")]
struct ServerArgs {
    /// SQLite database (created if missing)
    #[arg(long, default_value = "ebilling.db")]
    db: PathBuf,

    /// Initial internal roster (JSON); empty roster when omitted
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    /// Held for a whole assignment batch so caseload increments never interleave
    roster: Arc<Mutex<Vec<Lawyer>>>,
    config: Arc<EngineConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

struct ApiError(StatusCode, String);

impl ApiError {
    fn internal(err: impl std::fmt::Display) -> Self {
        error!("request failed: {}", err);
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.1),
        };
        (self.0, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ApiError> {
    mutex
        .lock()
        .map_err(|_| ApiError::internal("state lock poisoned"))
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/vendors - Current vendor database
async fn get_vendors(State(state): State<AppState>) -> ApiResult<Vec<VendorRecord>> {
    let conn = lock(&state.db)?;
    let database = store::load_vendor_database(&conn).map_err(ApiError::internal)?;
    Ok(Json(ApiResponse::ok(database.records().cloned().collect())))
}

/// POST /api/vendors/validate - Onboard rows (column → value) and persist the result
async fn validate_vendors(
    State(state): State<AppState>,
    Json(objects): Json<Vec<serde_json::Map<String, serde_json::Value>>>,
) -> ApiResult<OnboardingOutcome> {
    let rows = intake::vendor_rows_from_json(&objects, "request")
        .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut outcome = state.config.vendor_validator().onboard(&rows);

    let conn = lock(&state.db)?;
    store::upsert_vendors(&conn, &outcome.database).map_err(ApiError::internal)?;
    // Report the ids the database holds, not the batch numbering
    outcome.database =
        store::persisted_vendors(&conn, &outcome.database).map_err(ApiError::internal)?;

    Ok(Json(ApiResponse::ok(outcome)))
}

#[derive(Serialize)]
struct AuditResponse {
    decisions: Vec<RateDecision>,
    notifications: Vec<ApNotification>,
    summary: AuditSummary,
}

/// POST /api/invoices/audit - Audit invoices against the persisted vendor database
async fn audit_invoices(
    State(state): State<AppState>,
    Json(invoices): Json<Vec<Invoice>>,
) -> ApiResult<AuditResponse> {
    let conn = lock(&state.db)?;
    let database = store::load_vendor_database(&conn).map_err(ApiError::internal)?;

    let decisions = state.config.invoice_auditor().audit(&invoices, &database);
    store::insert_decisions(&conn, &new_run_id(), &decisions).map_err(ApiError::internal)?;

    let notifications = ApNotification::batch(&decisions, chrono::Utc::now());
    let summary = AuditSummary::from_decisions(&decisions);

    Ok(Json(ApiResponse::ok(AuditResponse {
        decisions,
        notifications,
        summary,
    })))
}

#[derive(Serialize)]
struct AssignResponse {
    #[serde(flatten)]
    outcome: AssignmentOutcome,
    report: AssignmentReport,
}

/// POST /api/matters/assign - Assign a batch against the live roster
async fn assign_matters(
    State(state): State<AppState>,
    Json(matters): Json<Vec<Matter>>,
) -> ApiResult<AssignResponse> {
    // One batch at a time: the guard lives until the response is built
    let mut roster = lock(&state.roster)?;

    let (assignments, unassigned) = state
        .config
        .matter_assigner()
        .assign_into(&matters, roster.as_mut_slice());

    let outcome = AssignmentOutcome {
        assignments,
        unassigned,
        roster: roster.clone(),
    };
    let report = AssignmentReport::from_outcome(&outcome);

    let conn = lock(&state.db)?;
    store::insert_assignments(&conn, &new_run_id(), &outcome.assignments, &outcome.unassigned)
        .map_err(ApiError::internal)?;

    Ok(Json(ApiResponse::ok(AssignResponse { outcome, report })))
}

/// GET /api/roster - Lawyers with live caseloads
async fn get_roster(State(state): State<AppState>) -> ApiResult<Vec<Lawyer>> {
    let roster = lock(&state.roster)?;
    Ok(Json(ApiResponse::ok(roster.clone())))
}

#[derive(Deserialize)]
struct RosterUpdate {
    lawyers: Vec<Lawyer>,
}

/// POST /api/roster - Replace the roster
async fn replace_roster(
    State(state): State<AppState>,
    Json(update): Json<RosterUpdate>,
) -> ApiResult<Vec<Lawyer>> {
    let validated =
        Roster::new(update.lawyers).map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut roster = lock(&state.roster)?;
    *roster = validated.lawyers;
    info!(lawyers = roster.len(), "roster replaced");

    Ok(Json(ApiResponse::ok(roster.clone())))
}

// ============================================================================
// Main Server
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/vendors", get(get_vendors))
        .route("/vendors/validate", post(validate_vendors))
        .route("/invoices/audit", post(audit_invoices))
        .route("/matters/assign", post(assign_matters))
        .route("/roster", get(get_roster).post(replace_roster))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    telemetry::init(args.verbose.max(1), false);

    let config = EngineConfig::load(args.config.as_deref())?;
    let conn = store::open(&args.db)?;
    let lawyers = match &args.roster {
        Some(path) => intake::load_roster(path)?.lawyers,
        None => Vec::new(),
    };

    info!(db = %args.db.display(), lawyers = lawyers.len(), "state loaded");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        roster: Arc::new(Mutex::new(lawyers)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!(addr = %args.addr, "🚀 server running");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
