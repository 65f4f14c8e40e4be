//! REST API
//!
//! JSON endpoints over the calculation core and the client forecast service.
//! Every response is wrapped in [`ApiResponse`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use nzi_types::{ClientTargets, ScopeValues};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::baseline::Baseline;
use crate::calculation::{calculate_row, RowCalculation, RowInput};
use crate::error::NziError;
use crate::forecast::{build_forecast, ForecastParams, ForecastTable, MAX_FORECAST_YEARS};
use crate::services::{ClientForecast, TargetForecastService};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub forecasts: TargetForecastService,
    /// Working year for client forecasts when the request names none
    pub default_year: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error response mapped from [`NziError`]
#[derive(Debug)]
pub struct ApiError(NziError);

impl From<NziError> for ApiError {
    fn from(err: NziError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else if matches!(self.0, NziError::NotFound { .. }) {
            StatusCode::NOT_FOUND
        } else {
            warn!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ApiResponse::<()>::err(self.0.to_string()))).into_response()
    }
}

fn default_net_zero_year() -> i32 {
    ClientTargets::DEFAULT_NET_ZERO_YEAR
}

fn default_interim_year() -> i32 {
    ClientTargets::DEFAULT_INTERIM_YEAR
}

fn default_interim_pct() -> ScopeValues<u8> {
    ScopeValues::uniform(ClientTargets::DEFAULT_INTERIM_PCT)
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub baseline_year: i32,
    #[serde(default = "default_net_zero_year")]
    pub net_zero_year: i32,
    #[serde(default = "default_interim_year")]
    pub interim_year: i32,
    #[serde(default = "default_interim_pct")]
    pub interim_pct: ScopeValues<u8>,
    /// Baseline emissions keyed by scope name (`"Scope 1"`); absent scopes are zero
    #[serde(default)]
    pub baseline: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct ClientForecastQuery {
    pub working_year: Option<i32>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/calculate", post(calculate))
        .route("/api/forecast", post(forecast))
        .route("/api/clients/:client_id/forecast", get(client_forecast))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::ok("OK".to_string()))
}

// Calculate one activity row
async fn calculate(
    Json(input): Json<RowInput>,
) -> Result<Json<ApiResponse<RowCalculation>>, ApiError> {
    let row = calculate_row(&input).map_err(NziError::from)?;
    Ok(Json(ApiResponse::ok(row)))
}

// Forecast from explicit parameters
async fn forecast(
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ApiResponse<ForecastTable>>, ApiError> {
    let params = ForecastParams::new(
        request.baseline_year,
        request.net_zero_year,
        request.interim_year,
        request.interim_pct,
    );
    let years = params.year_count();
    if years > MAX_FORECAST_YEARS {
        return Err(NziError::ForecastTooLong {
            years,
            max: MAX_FORECAST_YEARS,
        }
        .into());
    }
    for warning in params.check_range() {
        debug!("forecast input out of range: {}", warning);
    }
    let table = build_forecast(&params, &Baseline::from_map(&request.baseline));
    Ok(Json(ApiResponse::ok(table)))
}

// Forecast from a client's stored targets and history
async fn client_forecast(
    Path(client_id): Path<i64>,
    Query(query): Query<ClientForecastQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ClientForecast>>, ApiError> {
    let working_year = query.working_year.unwrap_or(state.default_year);
    let forecast = state
        .forecasts
        .forecast_for_client(client_id, working_year)
        .await?;
    Ok(Json(ApiResponse::ok(forecast)))
}
