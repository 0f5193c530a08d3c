use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use fleet_core::db::SchemaCapabilities;
use fleet_core::models::wire::{
    BulkTripsRequest, BulkTripsResponse, LastOdometerResponse, ReadingResponse,
    RecordReadingRequest, TripListResponse, TripResponse, TripSummaryResponse,
};
use fleet_core::models::{TripFilter, TripSubmission};
use fleet_core::DatabaseService;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AllowedOrigins, AppConfig};
use crate::error::AppError;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    db: DatabaseService,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, db: DatabaseService) -> Self {
        Self { config, db }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/sync/trips", post(sync_trips))
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/last-odometer", get(last_odometer))
        .route("/trips/summary", get(trip_summary))
        .route("/odometer-readings", post(record_reading))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    match origins {
        // Without an allowed origin the layer adds no CORS headers
        AllowedOrigins::None => CorsLayer::new(),
        AllowedOrigins::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any),
        AllowedOrigins::List(list) => CorsLayer::new()
            .allow_origin(AllowOrigin::list(list.iter().cloned()))
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_methods([Method::GET, Method::POST]),
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    schema: SchemaCapabilities,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        schema: state.db.capabilities(),
    })
}

async fn sync_trips(
    State(state): State<AppState>,
    payload: Result<Json<BulkTripsRequest>, JsonRejection>,
) -> Result<Json<BulkTripsResponse>, AppError> {
    let Json(request) = payload?;
    let batch_size = request.trips.len();
    if batch_size > state.config.max_batch_size {
        return Err(AppError::bad_request(format!(
            "Batch of {batch_size} trips exceeds the limit of {}",
            state.config.max_batch_size
        )));
    }

    let synced_ids = state.db.ingest(request.trips).await?;
    tracing::info!(endpoint = "sync_trips", count = synced_ids.len(), "Synced trip batch");
    Ok(Json(BulkTripsResponse::from_ids(synced_ids)))
}

async fn create_trip(
    State(state): State<AppState>,
    payload: Result<Json<TripSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<TripResponse>), AppError> {
    let Json(submission) = payload?;
    let trip = state.db.create_trip(submission).await?;
    tracing::info!(
        endpoint = "create_trip",
        trip_id = trip.id,
        vehicle_id = %trip.vehicle_id,
        start_odometer = trip.start_odometer,
        "Created trip"
    );
    Ok((
        StatusCode::CREATED,
        Json(TripResponse {
            success: true,
            data: trip,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct LastOdometerQuery {
    vehicle_id: Option<String>,
}

async fn last_odometer(
    State(state): State<AppState>,
    query: Result<Query<LastOdometerQuery>, QueryRejection>,
) -> Result<Json<LastOdometerResponse>, AppError> {
    let Query(query) = query?;
    let vehicle_id = query
        .vehicle_id
        .as_deref()
        .map(str::trim)
        .filter(|vehicle_id| !vehicle_id.is_empty())
        .ok_or_else(|| AppError::bad_request("vehicle_id is required"))?;

    let suggested_start_odometer = state.db.suggested_start_odometer(vehicle_id).await;
    Ok(Json(LastOdometerResponse {
        success: true,
        suggested_start_odometer,
    }))
}

#[derive(Debug, Deserialize)]
struct ListTripsQuery {
    driver_id: Option<String>,
    vehicle_id: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_trips(
    State(state): State<AppState>,
    query: Result<Query<ListTripsQuery>, QueryRejection>,
) -> Result<Json<TripListResponse>, AppError> {
    let Query(query) = query?;
    let filter = TripFilter {
        driver_id: non_empty(query.driver_id),
        vehicle_id: non_empty(query.vehicle_id),
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let trips = state.db.list_trips(&filter, limit, offset).await?;
    Ok(Json(TripListResponse {
        success: true,
        count: trips.len(),
        data: trips,
    }))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    start: Option<i64>,
    end: Option<i64>,
}

async fn trip_summary(
    State(state): State<AppState>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<TripSummaryResponse>, AppError> {
    let Query(query) = query?;
    if let (Some(start), Some(end)) = (query.start, query.end) {
        if start > end {
            return Err(AppError::bad_request("start must not be after end"));
        }
    }

    let summary = state.db.summary(query.start, query.end).await?;
    Ok(Json(TripSummaryResponse {
        success: true,
        summary,
    }))
}

async fn record_reading(
    State(state): State<AppState>,
    payload: Result<Json<RecordReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReadingResponse>), AppError> {
    let Json(request) = payload?;
    let reading = state
        .db
        .record_reading(
            &request.vehicle_id,
            request.odometer_reading,
            request.recorded_by,
            request.notes,
        )
        .await?;
    tracing::info!(
        endpoint = "record_reading",
        vehicle_id = %reading.vehicle_id,
        odometer_reading = reading.odometer_reading,
        "Recorded odometer reading"
    );
    Ok((
        StatusCode::CREATED,
        Json(ReadingResponse {
            success: true,
            data: reading,
        }),
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::{IntoResponse, Response};
    use fleet_core::models::wire::ApiErrorBody;
    use fleet_core::models::Trip;
    use pretty_assertions::assert_eq;
    use serde::de::DeserializeOwned;

    use super::*;

    async fn state() -> AppState {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let db = DatabaseService::open_in_memory().await.unwrap();
        AppState::new(Arc::new(config), db)
    }

    async fn body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn bulk(trips: Vec<TripSubmission>) -> Result<Json<BulkTripsRequest>, JsonRejection> {
        Ok(Json(BulkTripsRequest { trips }))
    }

    fn trip(vehicle_id: &str, end: i64) -> TripSubmission {
        TripSubmission::new("driver-1", vehicle_id, end, None)
    }

    async fn last_odometer_for(state: &AppState, vehicle_id: Option<&str>) -> Response {
        let query = LastOdometerQuery {
            vehicle_id: vehicle_id.map(str::to_string),
        };
        last_odometer(State(state.clone()), Ok(Query(query)))
            .await
            .into_response()
    }

    async fn all_trips(state: &AppState) -> Vec<Trip> {
        let query = ListTripsQuery {
            driver_id: None,
            vehicle_id: None,
            limit: None,
            offset: None,
        };
        let response = list_trips(State(state.clone()), Ok(Query(query)))
            .await
            .into_response();
        body::<TripListResponse>(response).await.data
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_chains_queued_trips() {
        let state = state().await;

        let response = sync_trips(State(state.clone()), bulk(vec![trip("y", 200), trip("y", 220)]))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let payload: BulkTripsResponse = body(response).await;
        assert!(payload.success);
        assert_eq!(payload.count, 2);
        assert_eq!(payload.synced_ids.len(), 2);

        let mut chain: Vec<(i64, i64)> = all_trips(&state)
            .await
            .iter()
            .map(|trip| (trip.start_odometer, trip.end_odometer))
            .collect();
        chain.reverse();
        assert_eq!(chain, vec![(0, 200), (200, 220)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_rejects_regression_atomically() {
        let state = state().await;
        let batch = vec![
            trip("v-1", 100),
            trip("v-1", 150),
            trip("v-1", 120),
            trip("v-1", 200),
            trip("v-1", 250),
        ];

        let response = sync_trips(State(state.clone()), bulk(batch))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorBody = body(response).await;
        assert!(!error.success);
        assert!(error.error.contains("Trip 2"));

        assert!(all_trips(&state).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_enforces_batch_limit() {
        let config = AppConfig::from_lookup(|name| {
            (name == "FLEET_MAX_BATCH_SIZE").then(|| "1".to_string())
        })
        .unwrap();
        let state = AppState::new(
            Arc::new(config),
            DatabaseService::open_in_memory().await.unwrap(),
        );

        let response = sync_trips(State(state), bulk(vec![trip("v-1", 1), trip("v-1", 2)]))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_batch_returns_no_ids() {
        let state = state().await;
        let response = sync_trips(State(state), bulk(Vec::new()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let payload: BulkTripsResponse = body(response).await;
        assert_eq!(payload, BulkTripsResponse::from_ids(Vec::new()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn last_odometer_follows_ledger_then_trips() {
        let state = state().await;

        let response = last_odometer_for(&state, Some("x")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload: LastOdometerResponse = body(response).await;
        assert_eq!(payload.suggested_start_odometer, 0);

        let request = RecordReadingRequest {
            vehicle_id: "x".to_string(),
            odometer_reading: 100,
            recorded_by: None,
            notes: Some("Recorded from fuel purchase".to_string()),
        };
        let response = record_reading(State(state.clone()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let payload: LastOdometerResponse = body(last_odometer_for(&state, Some("x")).await).await;
        assert_eq!(payload.suggested_start_odometer, 100);

        let response = create_trip(State(state.clone()), Ok(Json(trip("x", 150))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: TripResponse = body(response).await;
        assert_eq!(created.data.start_odometer, 100);
        assert_eq!(created.data.distance(), 50);

        let payload: LastOdometerResponse = body(last_odometer_for(&state, Some("x")).await).await;
        assert_eq!(payload.suggested_start_odometer, 150);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn last_odometer_requires_vehicle_id() {
        let state = state().await;
        let response = last_odometer_for(&state, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = last_odometer_for(&state, Some("  ")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_trip_requires_end_odometer() {
        let state = state().await;
        let mut submission = trip("v-1", 10);
        submission.end_odometer = None;

        let response = create_trip(State(state), Ok(Json(submission)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorBody = body(response).await;
        assert!(error.error.contains("end_odometer"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn summary_totals_distance() {
        let state = state().await;
        sync_trips(State(state.clone()), bulk(vec![trip("v-1", 30), trip("v-2", 12)]))
            .await
            .into_response();

        let response = trip_summary(
            State(state.clone()),
            Ok(Query(SummaryQuery {
                start: None,
                end: None,
            })),
        )
        .await
        .into_response();
        let payload: TripSummaryResponse = body(response).await;
        assert_eq!(payload.summary.total_trips, 2);
        assert_eq!(payload.summary.total_distance, 42);

        let response = trip_summary(
            State(state),
            Ok(Query(SummaryQuery {
                start: Some(10),
                end: Some(5),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn healthz_reports_schema() {
        let state = state().await;
        let Json(health) = healthz(State(state)).await;
        assert_eq!(health.status, "ok");
        assert!(health.schema.is_complete());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unmigrated_database_degrades_gracefully() {
        let tmp = tempfile::tempdir().unwrap();
        let db = DatabaseService::open_path(tmp.path().join("fleet.db"), false)
            .await
            .unwrap();
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let state = AppState::new(Arc::new(config), db);

        let payload: LastOdometerResponse = body(last_odometer_for(&state, Some("v-1")).await).await;
        assert_eq!(payload.suggested_start_odometer, 0);
        assert!(all_trips(&state).await.is_empty());

        let response = sync_trips(State(state), bulk(vec![trip("v-1", 10)]))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
