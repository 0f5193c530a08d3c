//! reqwest client for the fleet API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{SyncError, SyncResult, SyncTransport};
use crate::models::wire::{
    BulkTripsRequest, BulkTripsResponse, LastOdometerResponse, ReadingResponse,
    RecordReadingRequest,
};
use crate::models::{OdometerReading, TripSubmission};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Client for the sync and odometer endpoints of a fleet API server
#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Server's suggested start odometer for a vehicle
    pub async fn last_odometer(&self, vehicle_id: &str) -> SyncResult<i64> {
        let vehicle_id = vehicle_id.trim();
        if vehicle_id.is_empty() {
            return Err(SyncError::InvalidConfiguration(
                "vehicle_id must not be empty".to_string(),
            ));
        }

        let response = self
            .client
            .get(self.url("/trips/last-odometer"))
            .query(&[("vehicle_id", vehicle_id)])
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let payload = response.json::<LastOdometerResponse>().await?;
        Ok(payload.suggested_start_odometer)
    }

    /// Append a reading to the server's odometer ledger
    pub async fn record_reading(&self, request: &RecordReadingRequest) -> SyncResult<OdometerReading> {
        let response = self
            .client
            .post(self.url("/odometer-readings"))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let payload = response.json::<ReadingResponse>().await?;
        Ok(payload.data)
    }

    /// Whether `GET /healthz` answers with a success status
    pub async fn is_reachable(&self) -> bool {
        let result = self
            .client
            .get(self.url("/healthz"))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(%error, "Health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl SyncTransport for HttpSyncClient {
    async fn submit_batch(&self, trips: &[TripSubmission]) -> SyncResult<Vec<i64>> {
        let request = BulkTripsRequest {
            trips: trips.to_vec(),
        };

        let response = self
            .client
            .post(self.url("/sync/trips"))
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let payload = response.json::<BulkTripsResponse>().await?;
        validate_bulk_response(payload, trips.len())
    }
}

fn validate_bulk_response(payload: BulkTripsResponse, expected: usize) -> SyncResult<Vec<i64>> {
    if !payload.success {
        return Err(SyncError::InvalidPayload(
            "response reported success = false".to_string(),
        ));
    }
    if payload.synced_ids.len() != expected {
        return Err(SyncError::InvalidPayload(format!(
            "expected {expected} synced ids, got {}",
            payload.synced_ids.len()
        )));
    }
    Ok(payload.synced_ids)
}

async fn error_from_response(response: reqwest::Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if status.is_client_error() {
        SyncError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        SyncError::Api(message)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    error: Option<String>,
    details: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorPayload>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            let message = message.trim();
            return match normalize_text_option(payload.details) {
                Some(details) if details != message => {
                    format!("{message}: {} ({})", compact_text(&details), status.as_u16())
                }
                _ => format!("{message} ({})", status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> SyncResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        SyncError::InvalidConfiguration("server URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(SyncError::InvalidConfiguration(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}
