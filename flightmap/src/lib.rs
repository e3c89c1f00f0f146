pub mod client;
pub mod config;
pub mod error;
pub mod resolver;
pub mod sphere;
pub mod surface;
pub mod sync;
pub mod synth;
pub mod trajectory;
pub mod view;

#[cfg(test)]
mod testing;

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{FlightStatus, Trajectory, wire::CrisisRequest};
use tower_http::cors::{Any, CorsLayer};

use crate::client::BackendClient;
use crate::config::Config;
use crate::error::{InputError, LookupError, validate_airline_code, validate_flight_number};
use crate::resolver::{CoordinateResolver, known_airports};
use crate::surface::{RecordingSurface, SurfaceSnapshot};
use crate::sync::RenderMode;
use crate::trajectory::TrajectorySampler;
use crate::view::FlightMapView;

pub type MapView = FlightMapView<BackendClient, RecordingSurface>;

#[derive(Clone)]
pub struct AppState {
    pub view: Arc<MapView>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, LookupError> {
        let client = BackendClient::from_config(config)?;
        let resolver = CoordinateResolver::new(client).with_known_airports(known_airports());
        let view = FlightMapView::new(
            resolver,
            TrajectorySampler::new(config.sampler.clone()),
            RecordingSurface::new(),
        );
        Ok(Self {
            view: Arc::new(view),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/map", get(map_handler).delete(clear_handler))
        .route("/api/map/airline/:code", get(airline_handler))
        .route("/api/map/flight/:number", get(flight_handler))
        .route("/api/map/status-filter", post(status_filter_handler))
        .route("/api/map/crisis", post(crisis_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStateResponse {
    pub mode: RenderMode,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<FlightStatus>,
    pub status_counts: BTreeMap<FlightStatus, usize>,
    pub surface: SurfaceSnapshot,
}

impl MapStateResponse {
    pub fn capture(view: &MapView) -> Self {
        Self {
            mode: view.mode(),
            generation: view.generation(),
            selected: view.selected(),
            status_filter: view.status_filter(),
            status_counts: view.status_counts(),
            surface: view.with_surface(RecordingSurface::snapshot),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrajectoryResponse {
    pub trajectory: Trajectory,
    pub map: MapStateResponse,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilterRequest {
    #[serde(default)]
    pub status: Option<FlightStatus>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn map_handler(State(state): State<AppState>) -> Json<MapStateResponse> {
    Json(MapStateResponse::capture(&state.view))
}

async fn clear_handler(State(state): State<AppState>) -> Json<MapStateResponse> {
    state.view.clear();
    Json(MapStateResponse::capture(&state.view))
}

async fn airline_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<MapStateResponse> {
    let code = validate_airline_code(&code).map_err(bad_request)?;
    tracing::info!("loading flights for airline {code}");
    state.view.load_airline(&code).await;
    Ok(Json(MapStateResponse::capture(&state.view)))
}

async fn flight_handler(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<TrajectoryResponse> {
    let number = validate_flight_number(&number).map_err(bad_request)?;
    let (trajectory, _) = state.view.load_flight(&number, Utc::now()).await;
    Ok(Json(TrajectoryResponse {
        trajectory,
        map: MapStateResponse::capture(&state.view),
    }))
}

async fn status_filter_handler(
    State(state): State<AppState>,
    Json(req): Json<StatusFilterRequest>,
) -> Json<MapStateResponse> {
    state.view.set_status_filter(req.status).await;
    Json(MapStateResponse::capture(&state.view))
}

async fn crisis_handler(
    State(state): State<AppState>,
    Json(mut req): Json<CrisisRequest>,
) -> ApiResult<MapStateResponse> {
    req.affected_airlines = req
        .affected_airlines
        .iter()
        .map(String::as_str)
        .map(validate_airline_code)
        .collect::<Result<_, _>>()
        .map_err(bad_request)?;
    tracing::info!(
        "activating {} crisis for {:?}",
        req.crisis_type,
        req.affected_airlines
    );
    state.view.activate_crisis(&req).await;
    Ok(Json(MapStateResponse::capture(&state.view)))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    message: String,
}

fn bad_request(err: InputError) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
