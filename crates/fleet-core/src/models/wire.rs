//! JSON bodies exchanged between the sync client and the API server.

use serde::{Deserialize, Serialize};

use super::{OdometerReading, Trip, TripSubmission, TripSummary};

/// `POST /sync/trips` request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTripsRequest {
    #[serde(default)]
    pub trips: Vec<TripSubmission>,
}

/// `POST /sync/trips` success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTripsResponse {
    pub success: bool,
    pub synced_ids: Vec<i64>,
    pub count: usize,
}

impl BulkTripsResponse {
    pub fn from_ids(synced_ids: Vec<i64>) -> Self {
        Self {
            success: true,
            count: synced_ids.len(),
            synced_ids,
        }
    }
}

/// Error body shared by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(default)]
    pub details: String,
}

/// `GET /trips/last-odometer` body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOdometerResponse {
    pub success: bool,
    pub suggested_start_odometer: i64,
}

/// `POST /trips` success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripResponse {
    pub success: bool,
    pub data: Trip,
}

/// `GET /trips` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripListResponse {
    pub success: bool,
    pub data: Vec<Trip>,
    pub count: usize,
}

/// `GET /trips/summary` body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSummaryResponse {
    pub success: bool,
    pub summary: TripSummary,
}

/// `POST /odometer-readings` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReadingRequest {
    pub vehicle_id: String,
    pub odometer_reading: i64,
    #[serde(default)]
    pub recorded_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /odometer-readings` success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingResponse {
    pub success: bool,
    pub data: OdometerReading,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_request_parses_wire_contract() {
        let request: BulkTripsRequest = serde_json::from_str(
            r#"{"trips":[{"driver_id":"d-1","vehicle_id":"v-1","end_odo":200,"purpose":"route"}]}"#,
        )
        .unwrap();
        assert_eq!(request.trips.len(), 1);
        assert_eq!(request.trips[0].end_odometer, Some(200));
        assert_eq!(request.trips[0].purpose.as_deref(), Some("route"));
    }

    #[test]
    fn bulk_response_counts_ids() {
        let response = BulkTripsResponse::from_ids(vec![4, 5]);
        assert!(response.success);
        assert_eq!(response.count, 2);
    }
}
