//! Driver to vehicle assignment tracking.
//!
//! Runs after a trip batch commits: each driver becomes actively assigned to
//! the last vehicle they drove in the batch. Failures are logged and never
//! reach the caller, since the trips are already stored.

use std::collections::HashMap;

use libsql::{params, Connection};

use crate::db::Database;
use crate::error::Result;
use crate::models::{Trip, VehicleAssignment};
use crate::util::unix_millis_now;

const AUTO_ASSIGN_NOTE: &str = "Auto-assigned from trip";

/// Trait for assignment storage operations (async)
#[allow(async_fn_in_trait)]
pub trait AssignmentRepository {
    /// The driver's active assignment, if any
    async fn active_for_driver(&self, driver_id: &str) -> Result<Option<VehicleAssignment>>;

    /// Deactivate the driver's active assignments and record a new active one
    async fn assign(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        notes: Option<&str>,
    ) -> Result<VehicleAssignment>;
}

/// libSQL implementation of `AssignmentRepository`
pub struct LibSqlAssignmentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAssignmentRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn replace_active(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        notes: Option<&str>,
        assigned_at: i64,
    ) -> Result<i64> {
        self.conn
            .execute(
                "UPDATE driver_vehicle_assignments SET active = 0
                 WHERE driver_id = ? AND active = 1",
                [driver_id],
            )
            .await?;
        self.conn
            .execute(
                "INSERT INTO driver_vehicle_assignments (driver_id, vehicle_id, active, notes, assigned_at)
                 VALUES (?, ?, 1, ?, ?)",
                params![driver_id, vehicle_id, notes.map(str::to_string), assigned_at],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl AssignmentRepository for LibSqlAssignmentRepository<'_> {
    async fn active_for_driver(&self, driver_id: &str) -> Result<Option<VehicleAssignment>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, driver_id, vehicle_id, active, notes, assigned_at
                 FROM driver_vehicle_assignments
                 WHERE driver_id = ? AND active = 1
                 ORDER BY assigned_at DESC, id DESC
                 LIMIT 1",
                [driver_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(VehicleAssignment {
                id: row.get(0)?,
                driver_id: row.get(1)?,
                vehicle_id: row.get(2)?,
                active: row.get::<i64>(3)? != 0,
                notes: row.get(4)?,
                assigned_at: row.get(5)?,
            })),
            None => Ok(None),
        }
    }

    async fn assign(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        notes: Option<&str>,
    ) -> Result<VehicleAssignment> {
        let assigned_at = unix_millis_now();

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let id = match self
            .replace_active(driver_id, vehicle_id, notes, assigned_at)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        };
        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(VehicleAssignment {
            id,
            driver_id: driver_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            active: true,
            notes: notes.map(str::to_string),
            assigned_at,
        })
    }
}

/// Assign each driver in `trips` to the last vehicle they used.
///
/// Returns the number of assignments written.
pub async fn assign_from_trips(db: &Database, trips: &[Trip]) -> usize {
    if trips.is_empty() {
        return 0;
    }
    if !db.capabilities().assignments {
        tracing::debug!("Assignments table absent; skipping vehicle assignment");
        return 0;
    }

    let mut latest: HashMap<&str, &str> = HashMap::new();
    let mut drivers = Vec::new();
    for trip in trips {
        if latest
            .insert(trip.driver_id.as_str(), trip.vehicle_id.as_str())
            .is_none()
        {
            drivers.push(trip.driver_id.as_str());
        }
    }

    let repo = LibSqlAssignmentRepository::new(db.connection());
    let mut written = 0;
    for driver_id in drivers {
        let Some(&vehicle_id) = latest.get(driver_id) else {
            continue;
        };

        match repo.active_for_driver(driver_id).await {
            Ok(Some(current)) if current.vehicle_id == vehicle_id => continue,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(driver_id, %error, "Failed to read vehicle assignment");
                continue;
            }
        }

        match repo.assign(driver_id, vehicle_id, Some(AUTO_ASSIGN_NOTE)).await {
            Ok(_) => written += 1,
            Err(error) => {
                tracing::warn!(driver_id, vehicle_id, %error, "Failed to update vehicle assignment");
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SchemaKind;

    fn trip(driver_id: &str, vehicle_id: &str) -> Trip {
        Trip {
            id: 1,
            driver_id: driver_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            start_odometer: 0,
            end_odometer: 10,
            purpose: None,
            created_at: 0,
        }
    }

    async fn active_count(db: &Database, driver_id: &str) -> i64 {
        let mut rows = db
            .connection()
            .query(
                "SELECT COUNT(*) FROM driver_vehicle_assignments WHERE driver_id = ? AND active = 1",
                [driver_id],
            )
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_active_assignment_per_driver() {
        let db = Database::open_in_memory(SchemaKind::Server).await.unwrap();

        assign_from_trips(&db, &[trip("d-1", "v-1")]).await;
        let written = assign_from_trips(&db, &[trip("d-1", "v-2"), trip("d-1", "v-3")]).await;
        assert_eq!(written, 1);

        assert_eq!(active_count(&db, "d-1").await, 1);
        let active = LibSqlAssignmentRepository::new(db.connection())
            .active_for_driver("d-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.vehicle_id, "v-3");
        assert_eq!(active.notes.as_deref(), Some(AUTO_ASSIGN_NOTE));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_vehicle_keeps_existing_assignment() {
        let db = Database::open_in_memory(SchemaKind::Server).await.unwrap();

        assert_eq!(assign_from_trips(&db, &[trip("d-1", "v-1")]).await, 1);
        assert_eq!(assign_from_trips(&db, &[trip("d-1", "v-1")]).await, 0);
        assert_eq!(active_count(&db, "d-1").await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_table_is_skipped() {
        let db = Database::open_in_memory_unmigrated(SchemaKind::Server)
            .await
            .unwrap();
        assert_eq!(assign_from_trips(&db, &[trip("d-1", "v-1")]).await, 0);
    }
}
