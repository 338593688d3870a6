use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Parser;
use secret_santa_api::{
    AssignRequest, AssignResponse, DrawNotices, DrawRequest, ImportResult, MigrateResult,
    RemoveResult, SecretSantaApi, API_CONTRACT_VERSION,
};
use secret_santa_store_sqlite::{DrawRecord, NewParticipant, RegisteredParticipant, SchemaStatus};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Debug, Clone)]
struct ServiceState {
    api: SecretSantaApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MigrateRequest {
    dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "secret-santa-service")]
#[command(about = "Local HTTP service for Secret Santa draws")]
struct Args {
    #[arg(long, default_value = "./secret_santa.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        (status, Json(self)).into_response()
    }
}

impl ServiceState {
    fn error(message: impl Into<String>) -> ServiceError {
        let error = message.into();
        tracing::warn!(%error, "request rejected");
        ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error }
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

type ServiceResult<T> = Result<Json<ServiceEnvelope<T>>, ServiceError>;

fn respond<T>(result: anyhow::Result<T>) -> ServiceResult<T>
where
    T: Serialize,
{
    result
        .map(|data| Json(envelope(data)))
        .map_err(|err| ServiceState::error(format!("{err:#}")))
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/db/schema-version", post(db_schema_version))
        .route("/v1/db/migrate", post(db_migrate))
        .route("/v1/assign", post(assign))
        .route("/v1/participants", get(participants_list).post(participants_add))
        .route("/v1/participants/import", post(participants_import))
        .route("/v1/participants/:name", delete(participants_remove))
        .route("/v1/draws", get(draws_list).post(draws_run))
        .route("/v1/draws/:draw_id", get(draws_show))
        .route("/v1/draws/:draw_id/commit", post(draws_commit))
        .route("/v1/draws/:draw_id/notices", get(draws_notices))
        .with_state(state)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let state = ServiceState { api: SecretSantaApi::new(args.db.clone()) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, db = %args.db.display(), "service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn db_schema_version(State(state): State<ServiceState>) -> ServiceResult<SchemaStatus> {
    respond(state.api.schema_status())
}

async fn db_migrate(
    State(state): State<ServiceState>,
    Json(request): Json<MigrateRequest>,
) -> ServiceResult<MigrateResult> {
    respond(state.api.migrate(request.dry_run))
}

async fn assign(
    State(state): State<ServiceState>,
    Json(request): Json<AssignRequest>,
) -> ServiceResult<AssignResponse> {
    respond(state.api.assign(&request))
}

async fn participants_list(
    State(state): State<ServiceState>,
) -> ServiceResult<Vec<RegisteredParticipant>> {
    respond(state.api.list_participants())
}

async fn participants_add(
    State(state): State<ServiceState>,
    Json(request): Json<NewParticipant>,
) -> ServiceResult<RegisteredParticipant> {
    respond(state.api.register_participant(&request))
}

/// Accepts the roster file format as a YAML or JSON body.
async fn participants_import(
    State(state): State<ServiceState>,
    body: String,
) -> ServiceResult<ImportResult> {
    respond(state.api.import_roster(&body))
}

async fn participants_remove(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
) -> ServiceResult<RemoveResult> {
    respond(state.api.remove_participant(&name))
}

async fn draws_run(
    State(state): State<ServiceState>,
    Json(request): Json<DrawRequest>,
) -> ServiceResult<DrawRecord> {
    respond(state.api.run_draw(&request))
}

async fn draws_list(State(state): State<ServiceState>) -> ServiceResult<Vec<DrawRecord>> {
    respond(state.api.list_draws())
}

async fn draws_show(
    State(state): State<ServiceState>,
    Path(draw_id): Path<String>,
) -> ServiceResult<DrawRecord> {
    respond(state.api.show_draw(&draw_id))
}

async fn draws_commit(
    State(state): State<ServiceState>,
    Path(draw_id): Path<String>,
) -> ServiceResult<DrawRecord> {
    respond(state.api.commit_draw(&draw_id))
}

async fn draws_notices(
    State(state): State<ServiceState>,
    Path(draw_id): Path<String>,
) -> ServiceResult<DrawNotices> {
    respond(state.api.draw_notices(&draw_id))
}
