use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::engine::{append_blank_record, recompute_all, remove_record};
use crate::error::{AuthError, ReportError, StoreError};
use crate::graph::{
    GraphOptions, TransmitterChart, create_switch_chart, create_transmitter_chart,
};
use crate::login::{Authenticator, LoginRequest, LoginResponse, TokenStore, UserStore};
use crate::measurement::{InstrumentConfiguration, MeasurementRecord};
use crate::report::{CalibrationReport, ReportSummary, summarize, to_csv, to_xlsx};
use crate::session::{FileSessionStore, FormSession, SessionStore};
use crate::switch_test::{
    ConformanceSummary, DifferentialStats, SwitchTest, conformance, differential_stats,
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct AppState {
    config: AppConfig,
    auth: Authenticator,
    sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(config: AppConfig, auth: Authenticator, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            config,
            auth,
            sessions,
        }
    }

    /// State backed by the on-disk stores under `config.database_dir`
    ///
    /// Creates the user store if needed and seeds the configured administrator.
    pub fn from_config(config: AppConfig) -> Result<Self, AuthError> {
        let users = UserStore::new(config.users_file());
        users.init()?;

        if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
            users.seed_admin(username, password)?;
        }

        let auth = Authenticator::new(users, TokenStore::new(config.token_ttl()));
        let sessions = Arc::new(FileSessionStore::new(config.sessions_dir()));

        Ok(Self::new(config, auth, sessions))
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }
}

/// Username of the bearer of a valid token
#[derive(Clone, Debug)]
pub struct CurrentUser(pub String);

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("{}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized | AuthError::InactiveUser => {
                Self::new(StatusCode::UNAUTHORIZED, err.to_string())
            }
            AuthError::UserExists => Self::new(StatusCode::CONFLICT, err.to_string()),
            AuthError::InvalidInput(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            AuthError::Storage(_) | AuthError::Hash(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            StoreError::Io(_) | StoreError::Codec(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Empty(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("background task failed: {}", err))
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct RecomputeRequest {
    configuration: InstrumentConfiguration,
    records: Vec<MeasurementRecord>,
}

#[derive(Deserialize)]
struct RowsRequest {
    records: Vec<MeasurementRecord>,
}

#[derive(Deserialize)]
struct RemoveRequest {
    records: Vec<MeasurementRecord>,
    index: usize,
}

#[derive(Deserialize)]
struct SwitchSummaryRequest {
    tests: Vec<SwitchTest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SwitchSummaryResponse {
    conformance: ConformanceSummary,
    differential: Option<DifferentialStats>,
}

#[derive(Deserialize)]
struct ChartQuery {
    #[serde(default)]
    kind: TransmitterChart,
}

/// Build the application router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/measurements/recompute", post(recompute_rows))
        .route("/api/measurements/append", post(append_row))
        .route("/api/measurements/remove", post(remove_row))
        .route("/api/switch-tests/summary", post(switch_summary))
        .route("/api/reports/summary", post(report_summary))
        .route("/api/reports/csv", post(export_csv))
        .route("/api/reports/xlsx", post(export_xlsx))
        .route("/api/charts/transmitter", post(transmitter_chart))
        .route("/api/charts/switch", post(switch_chart))
        .route(
            "/api/sessions/:name",
            get(load_session).put(save_session).delete(delete_session),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/auth/login", post(login))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Start the HTTP server and serve until the process exits
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Reject requests without a live bearer token
///
/// On success the caller's username is available to handlers as a
/// [`CurrentUser`] extension.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let username = bearer.and_then(|TypedHeader(auth)| state.auth.validate_token(auth.token()));

    match username {
        Some(username) => {
            request.extensions_mut().insert(CurrentUser(username));
            next.run(request).await
        }
        None => ApiError::new(StatusCode::UNAUTHORIZED, "Missing or invalid token").into_response(),
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    // argon2 verification is CPU bound
    let response =
        tokio::task::spawn_blocking(move || state.auth.authenticate(&credentials)).await??;
    Ok(Json(response))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> StatusCode {
    state.auth.revoke_token(auth.token());
    StatusCode::NO_CONTENT
}

async fn recompute_rows(Json(body): Json<RecomputeRequest>) -> Json<Vec<MeasurementRecord>> {
    Json(recompute_all(&body.records, &body.configuration))
}

async fn append_row(Json(body): Json<RowsRequest>) -> Json<Vec<MeasurementRecord>> {
    // Rows come back as sent; derivation belongs to /recompute
    Json(append_blank_record(&body.records))
}

async fn remove_row(Json(body): Json<RemoveRequest>) -> Json<Vec<MeasurementRecord>> {
    Json(remove_record(&body.records, body.index))
}

async fn switch_summary(Json(body): Json<SwitchSummaryRequest>) -> Json<SwitchSummaryResponse> {
    Json(SwitchSummaryResponse {
        conformance: conformance(&body.tests),
        differential: differential_stats(&body.tests),
    })
}

async fn report_summary(Json(report): Json<CalibrationReport>) -> Json<ReportSummary> {
    Json(summarize(&report))
}

fn download(content_type: &str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_csv(
    Extension(user): Extension<CurrentUser>,
    Json(report): Json<CalibrationReport>,
) -> ApiResult<Response> {
    let csv = to_csv(&report)?;
    log::info!("{} exported {}.csv", user.0, report.file_stem());

    Ok(download(
        "text/csv; charset=utf-8",
        format!("{}.csv", report.file_stem()),
        csv.into_bytes(),
    ))
}

async fn export_xlsx(
    Extension(user): Extension<CurrentUser>,
    Json(report): Json<CalibrationReport>,
) -> ApiResult<Response> {
    let stem = report.file_stem();
    let xlsx = tokio::task::spawn_blocking(move || to_xlsx(&report)).await??;
    log::info!("{} exported {}.xlsx", user.0, stem);

    Ok(download(XLSX_CONTENT_TYPE, format!("{}.xlsx", stem), xlsx))
}

fn png(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

async fn transmitter_chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
    Json(report): Json<CalibrationReport>,
) -> ApiResult<Response> {
    let options = GraphOptions::for_transmitter(
        &report,
        query.kind,
        state.config.chart_width,
        state.config.chart_height,
    );

    let bytes = tokio::task::spawn_blocking(move || {
        create_transmitter_chart(&report, query.kind, &options)
    })
    .await??;

    Ok(png(bytes))
}

async fn switch_chart(
    State(state): State<Arc<AppState>>,
    Json(report): Json<CalibrationReport>,
) -> ApiResult<Response> {
    let options =
        GraphOptions::for_switch(&report, state.config.chart_width, state.config.chart_height);

    let bytes =
        tokio::task::spawn_blocking(move || create_switch_chart(&report, &options)).await??;

    Ok(png(bytes))
}

async fn load_session(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<FormSession>> {
    match state.sessions.load(&name)? {
        Some(session) => Ok(Json(session)),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No saved session named {}", name),
        )),
    }
}

async fn save_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(name): Path<String>,
    Json(mut session): Json<FormSession>,
) -> ApiResult<Json<FormSession>> {
    session.refresh();
    state.sessions.save(&name, &session)?;
    log::debug!("{} saved session {}", user.0, name);

    Ok(Json(session))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.sessions.delete(&name)?;
    Ok(StatusCode::NO_CONTENT)
}
