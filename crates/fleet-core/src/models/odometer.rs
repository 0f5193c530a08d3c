//! Odometer ledger and vehicle assignment models

use serde::{Deserialize, Serialize};

/// A reading in the fallback odometer ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OdometerReading {
    pub id: i64,
    pub vehicle_id: String,
    pub odometer_reading: i64,
    /// Driver who recorded the reading, if known
    pub recorded_by: Option<String>,
    /// Timestamp (Unix ms)
    pub recorded_at: i64,
    pub notes: Option<String>,
}

/// A driver's assignment to a vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleAssignment {
    pub id: i64,
    pub driver_id: String,
    pub vehicle_id: String,
    pub active: bool,
    pub notes: Option<String>,
    /// Timestamp (Unix ms)
    pub assigned_at: i64,
}
