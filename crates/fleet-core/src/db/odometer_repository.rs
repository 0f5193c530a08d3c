//! Odometer ledger repository implementation

#![allow(clippy::cast_possible_wrap)]

use crate::error::Result;
use crate::models::OdometerReading;
use libsql::{params, Connection, Row};

/// Trait for the append-only odometer ledger (async)
#[allow(async_fn_in_trait)]
pub trait OdometerLedger {
    /// Most recent reading for a vehicle
    async fn latest_reading(&self, vehicle_id: &str) -> Result<Option<i64>>;

    /// Append a reading
    async fn append(
        &self,
        vehicle_id: &str,
        odometer_reading: i64,
        recorded_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<OdometerReading>;

    /// Readings for a vehicle, newest first
    async fn list(&self, vehicle_id: &str, limit: usize) -> Result<Vec<OdometerReading>>;
}

/// libSQL implementation of `OdometerLedger`
pub struct LibSqlOdometerLedger<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOdometerLedger<'a> {
    /// Create a new ledger with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_reading(row: &Row) -> Result<OdometerReading> {
        Ok(OdometerReading {
            id: row.get(0)?,
            vehicle_id: row.get(1)?,
            odometer_reading: row.get(2)?,
            recorded_by: row.get(3)?,
            recorded_at: row.get(4)?,
            notes: row.get(5)?,
        })
    }
}

impl OdometerLedger for LibSqlOdometerLedger<'_> {
    async fn latest_reading(&self, vehicle_id: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT odometer_reading FROM vehicle_odometer
                 WHERE vehicle_id = ?
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1",
                [vehicle_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn append(
        &self,
        vehicle_id: &str,
        odometer_reading: i64,
        recorded_by: Option<&str>,
        notes: Option<&str>,
    ) -> Result<OdometerReading> {
        let recorded_at = crate::util::unix_millis_now();
        self.conn
            .execute(
                "INSERT INTO vehicle_odometer (vehicle_id, odometer_reading, recorded_by, recorded_at, notes)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    vehicle_id,
                    odometer_reading,
                    recorded_by.map(str::to_string),
                    recorded_at,
                    notes.map(str::to_string)
                ],
            )
            .await?;

        Ok(OdometerReading {
            id: self.conn.last_insert_rowid(),
            vehicle_id: vehicle_id.to_string(),
            odometer_reading,
            recorded_by: recorded_by.map(str::to_string),
            recorded_at,
            notes: notes.map(str::to_string),
        })
    }

    async fn list(&self, vehicle_id: &str, limit: usize) -> Result<Vec<OdometerReading>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, vehicle_id, odometer_reading, recorded_by, recorded_at, notes
                 FROM vehicle_odometer
                 WHERE vehicle_id = ?
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT ?",
                params![vehicle_id, limit as i64],
            )
            .await?;

        let mut readings = Vec::new();
        while let Some(row) = rows.next().await? {
            readings.push(Self::parse_reading(&row)?);
        }
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SchemaKind};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_latest_reading_prefers_newest() {
        let db = Database::open_in_memory(SchemaKind::Server).await.unwrap();
        let ledger = LibSqlOdometerLedger::new(db.connection());

        assert_eq!(ledger.latest_reading("v-1").await.unwrap(), None);

        ledger.append("v-1", 100, None, None).await.unwrap();
        ledger
            .append("v-1", 180, Some("driver-1"), Some("Recorded from fuel purchase"))
            .await
            .unwrap();

        assert_eq!(ledger.latest_reading("v-1").await.unwrap(), Some(180));

        let readings = ledger.list("v-1", 10).await.unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].recorded_by.as_deref(), Some("driver-1"));
    }
}
