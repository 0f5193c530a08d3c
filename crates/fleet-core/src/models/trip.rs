//! Trip model

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

/// A trip as submitted by a client, before the server assigns id and start odometer.
///
/// `end_odometer` is optional on the wire so that a missing reading surfaces as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSubmission {
    #[serde(default)]
    pub driver_id: String,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(rename = "end_odo", default)]
    pub end_odometer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Manual start override. Queued trips never carry one to the server.
    #[serde(rename = "start_odo", default, skip_serializing_if = "Option::is_none")]
    pub start_odometer: Option<i64>,
}

impl TripSubmission {
    /// Create a submission with the fields a driver normally enters.
    pub fn new(
        driver_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        end_odometer: i64,
        purpose: Option<String>,
    ) -> Self {
        Self {
            driver_id: driver_id.into(),
            vehicle_id: vehicle_id.into(),
            end_odometer: Some(end_odometer),
            purpose: normalize_text_option(purpose),
            start_odometer: None,
        }
    }

    /// Set a manual start odometer override
    #[must_use]
    pub const fn with_start_odometer(mut self, start_odometer: i64) -> Self {
        self.start_odometer = Some(start_odometer);
        self
    }

    /// Drop any client-held start odometer so the server recomputes it.
    #[must_use]
    pub fn without_start_hint(mut self) -> Self {
        self.start_odometer = None;
        self
    }
}

/// A persisted trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// Server-assigned identifier
    pub id: i64,
    pub driver_id: String,
    pub vehicle_id: String,
    /// Server-computed unless manually overridden
    pub start_odometer: i64,
    pub end_odometer: i64,
    pub purpose: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Trip {
    /// Distance implied by the odometer readings
    pub const fn distance(&self) -> i64 {
        self.end_odometer - self.start_odometer
    }
}

/// Filters for listing trip history
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TripFilter {
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
}

/// Aggregate trip statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSummary {
    pub total_trips: i64,
    pub total_distance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_uses_wire_field_names() {
        let submission = TripSubmission::new("d-1", "v-1", 150, Some("delivery".to_string()));
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["end_odo"], 150);
        assert_eq!(json["purpose"], "delivery");
        assert!(json.get("start_odo").is_none());
    }

    #[test]
    fn submission_tolerates_missing_end_odometer() {
        let submission: TripSubmission =
            serde_json::from_str(r#"{"driver_id":"d-1","vehicle_id":"v-1"}"#).unwrap();
        assert_eq!(submission.end_odometer, None);
    }

    #[test]
    fn blank_purpose_is_dropped() {
        let submission = TripSubmission::new("d-1", "v-1", 10, Some("   ".to_string()));
        assert_eq!(submission.purpose, None);
    }

    #[test]
    fn without_start_hint_clears_override() {
        let submission = TripSubmission::new("d-1", "v-1", 10, None)
            .with_start_odometer(5)
            .without_start_hint();
        assert_eq!(submission.start_odometer, None);
    }

    #[test]
    fn distance_is_end_minus_start() {
        let trip = Trip {
            id: 1,
            driver_id: "d-1".to_string(),
            vehicle_id: "v-1".to_string(),
            start_odometer: 100,
            end_odometer: 150,
            purpose: None,
            created_at: 0,
        };
        assert_eq!(trip.distance(), 50);
    }
}
