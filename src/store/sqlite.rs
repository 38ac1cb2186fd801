//! SQLite-backed [`Store`].
//!
//! The connection is the outer unit of work; nested transactions are named
//! savepoints. SQLite keeps savepoint mutations invisible to other readers
//! of the file until the outermost transaction commits, which is what gives
//! ingestion its all-or-nothing replace semantics per agency and feed kind.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{Store, StoreError};
use crate::model::{AlertRow, TripDetails, TripUpdateRow, VehicleRow};
use crate::resolver::FeedKind;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trips (
    trip_id TEXT PRIMARY KEY,
    route_id TEXT,
    direction_id TEXT,
    block_id TEXT,
    service_id TEXT,
    shape_id TEXT
);

CREATE TABLE IF NOT EXISTS rt_vehicles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agency_id TEXT NOT NULL,
    vehicle_id TEXT,
    label TEXT,
    license_plate TEXT,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    bearing REAL,
    odometer REAL,
    speed REAL,
    trip_id TEXT,
    route_id TEXT,
    stop_id TEXT,
    stop_sequence INTEGER,
    status TEXT NOT NULL,
    timestamp INTEGER,
    direction_id TEXT,
    block_id TEXT,
    service_id TEXT,
    shape_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_rt_vehicles_agency ON rt_vehicles(agency_id);

CREATE TABLE IF NOT EXISTS rt_trip_updates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agency_id TEXT NOT NULL,
    trip_id TEXT,
    route_id TEXT,
    direction_id INTEGER,
    start_date TEXT,
    start_time TEXT,
    schedule_relationship TEXT NOT NULL,
    vehicle_id TEXT,
    delay INTEGER,
    timestamp INTEGER
);

CREATE INDEX IF NOT EXISTS idx_rt_trip_updates_agency ON rt_trip_updates(agency_id);

CREATE TABLE IF NOT EXISTS rt_stop_time_updates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agency_id TEXT NOT NULL,
    trip_update_id INTEGER NOT NULL REFERENCES rt_trip_updates(id) ON DELETE CASCADE,
    stop_sequence INTEGER,
    stop_id TEXT,
    arrival_delay INTEGER,
    arrival_time INTEGER,
    departure_delay INTEGER,
    departure_time INTEGER,
    schedule_relationship TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rt_stop_time_updates_agency ON rt_stop_time_updates(agency_id);

CREATE TABLE IF NOT EXISTS rt_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agency_id TEXT NOT NULL,
    cause TEXT NOT NULL,
    effect TEXT NOT NULL,
    url TEXT,
    header_text TEXT,
    description_text TEXT,
    period_start INTEGER,
    period_end INTEGER
);

CREATE INDEX IF NOT EXISTS idx_rt_alerts_agency ON rt_alerts(agency_id);

CREATE TABLE IF NOT EXISTS rt_alert_entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agency_id TEXT NOT NULL,
    alert_id INTEGER NOT NULL REFERENCES rt_alerts(id) ON DELETE CASCADE,
    informed_agency_id TEXT,
    route_id TEXT,
    route_type INTEGER,
    trip_id TEXT,
    stop_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_rt_alert_entities_agency ON rt_alert_entities(agency_id);
"#;

/// Row counts per realtime table for one agency. Handy for operators and
/// for asserting replace semantics in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub vehicles: usize,
    pub trip_updates: usize,
    pub stop_time_updates: usize,
    pub alerts: usize,
    pub alert_entities: usize,
}

pub struct SqliteStore {
    conn: Connection,
    depth: usize,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// schema exists. Failure here is fatal to a polling run: nothing can be
    /// ingested without the outer session.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, depth: 0 })
    }

    /// Adds (or replaces) one static-GTFS trip in the reference table used
    /// for vehicle enrichment lookups.
    pub fn seed_trip(
        &mut self,
        trip_id: &str,
        route_id: Option<&str>,
        details: &TripDetails,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO trips
                 (trip_id, route_id, direction_id, block_id, service_id, shape_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trip_id,
                route_id,
                details.direction_id,
                details.block_id,
                details.service_id,
                details.shape_id,
            ],
        )?;
        Ok(())
    }

    /// Returns the stored vehicle rows for an agency, in insert order.
    pub fn vehicles(&self, agency_id: &str) -> Result<Vec<VehicleRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT vehicle_id, label, license_plate, lat, lon, bearing, odometer, speed,
                    trip_id, route_id, stop_id, stop_sequence, status, timestamp,
                    direction_id, block_id, service_id, shape_id
             FROM rt_vehicles WHERE agency_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map([agency_id], |row| {
            Ok(VehicleRow {
                vehicle_id: row.get(0)?,
                label: row.get(1)?,
                license_plate: row.get(2)?,
                lat: row.get(3)?,
                lon: row.get(4)?,
                bearing: row.get(5)?,
                odometer: row.get(6)?,
                speed: row.get(7)?,
                trip_id: row.get(8)?,
                route_id: row.get(9)?,
                stop_id: row.get(10)?,
                stop_sequence: row.get::<_, Option<i64>>(11)?.map(|v| v as u32),
                status: row.get(12)?,
                timestamp: row.get::<_, Option<i64>>(13)?.map(|v| v as u64),
                direction_id: row.get(14)?,
                block_id: row.get(15)?,
                service_id: row.get(16)?,
                shape_id: row.get(17)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Row counts across all realtime tables for one agency.
    pub fn counts(&self, agency_id: &str) -> Result<StoreCounts, StoreError> {
        Ok(StoreCounts {
            vehicles: self.count_table("rt_vehicles", agency_id)?,
            trip_updates: self.count_table("rt_trip_updates", agency_id)?,
            stop_time_updates: self.count_table("rt_stop_time_updates", agency_id)?,
            alerts: self.count_table("rt_alerts", agency_id)?,
            alert_entities: self.count_table("rt_alert_entities", agency_id)?,
        })
    }

    fn count_table(&self, table: &str, agency_id: &str) -> Result<usize, StoreError> {
        // table names come from the fixed list above, never from input
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE agency_id = ?1");
        let n: i64 = self.conn.query_row(&sql, [agency_id], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn savepoint_name(depth: usize) -> String {
        format!("ingest_sp_{depth}")
    }
}

impl Store for SqliteStore {
    fn begin_nested(&mut self) -> Result<(), StoreError> {
        let name = Self::savepoint_name(self.depth);
        self.conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        self.depth += 1;
        debug!(savepoint = %name, "opened nested transaction");
        Ok(())
    }

    fn commit_nested(&mut self) -> Result<(), StoreError> {
        if self.depth == 0 {
            return Err(StoreError::NoOpenTransaction);
        }
        let name = Self::savepoint_name(self.depth - 1);
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {name};"))?;
        self.depth -= 1;
        debug!(savepoint = %name, "committed nested transaction");
        Ok(())
    }

    fn rollback_nested(&mut self) -> Result<(), StoreError> {
        if self.depth == 0 {
            return Err(StoreError::NoOpenTransaction);
        }
        let name = Self::savepoint_name(self.depth - 1);
        // ROLLBACK TO rewinds but keeps the savepoint on the stack; the
        // RELEASE afterwards pops it so the outer session is back where it
        // was before begin_nested.
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};"
        ))?;
        self.depth -= 1;
        debug!(savepoint = %name, "rolled back nested transaction");
        Ok(())
    }

    fn clear(&mut self, agency_id: &str, kind: FeedKind) -> Result<(), StoreError> {
        match kind {
            FeedKind::Vehicles => {
                self.conn.execute(
                    "DELETE FROM rt_vehicles WHERE agency_id = ?1",
                    [agency_id],
                )?;
            }
            FeedKind::Trips => {
                self.conn.execute(
                    "DELETE FROM rt_stop_time_updates WHERE agency_id = ?1",
                    [agency_id],
                )?;
                self.conn.execute(
                    "DELETE FROM rt_trip_updates WHERE agency_id = ?1",
                    [agency_id],
                )?;
            }
            FeedKind::Alerts => {
                self.conn.execute(
                    "DELETE FROM rt_alert_entities WHERE agency_id = ?1",
                    [agency_id],
                )?;
                self.conn
                    .execute("DELETE FROM rt_alerts WHERE agency_id = ?1", [agency_id])?;
            }
        }
        Ok(())
    }

    fn insert_vehicle(&mut self, agency_id: &str, row: &VehicleRow) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rt_vehicles
                 (agency_id, vehicle_id, label, license_plate, lat, lon, bearing, odometer,
                  speed, trip_id, route_id, stop_id, stop_sequence, status, timestamp,
                  direction_id, block_id, service_id, shape_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19)",
            params![
                agency_id,
                row.vehicle_id,
                row.label,
                row.license_plate,
                row.lat,
                row.lon,
                row.bearing,
                row.odometer,
                row.speed,
                row.trip_id,
                row.route_id,
                row.stop_id,
                row.stop_sequence.map(i64::from),
                row.status,
                row.timestamp.map(|t| t as i64),
                row.direction_id,
                row.block_id,
                row.service_id,
                row.shape_id,
            ],
        )?;
        Ok(())
    }

    fn insert_trip_update(
        &mut self,
        agency_id: &str,
        row: &TripUpdateRow,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rt_trip_updates
                 (agency_id, trip_id, route_id, direction_id, start_date, start_time,
                  schedule_relationship, vehicle_id, delay, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                agency_id,
                row.trip_id,
                row.route_id,
                row.direction_id.map(i64::from),
                row.start_date,
                row.start_time,
                row.schedule_relationship,
                row.vehicle_id,
                row.delay,
                row.timestamp.map(|t| t as i64),
            ],
        )?;
        let trip_update_id = self.conn.last_insert_rowid();

        for stu in &row.stop_times {
            self.conn.execute(
                "INSERT INTO rt_stop_time_updates
                     (agency_id, trip_update_id, stop_sequence, stop_id, arrival_delay,
                      arrival_time, departure_delay, departure_time, schedule_relationship)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    agency_id,
                    trip_update_id,
                    stu.stop_sequence.map(i64::from),
                    stu.stop_id,
                    stu.arrival_delay,
                    stu.arrival_time,
                    stu.departure_delay,
                    stu.departure_time,
                    stu.schedule_relationship,
                ],
            )?;
        }
        Ok(())
    }

    fn insert_alert(&mut self, agency_id: &str, row: &AlertRow) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rt_alerts
                 (agency_id, cause, effect, url, header_text, description_text,
                  period_start, period_end)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                agency_id,
                row.cause,
                row.effect,
                row.url,
                row.header_text,
                row.description_text,
                row.period_start.map(|t| t as i64),
                row.period_end.map(|t| t as i64),
            ],
        )?;
        let alert_id = self.conn.last_insert_rowid();

        for entity in &row.entities {
            self.conn.execute(
                "INSERT INTO rt_alert_entities
                     (agency_id, alert_id, informed_agency_id, route_id, route_type,
                      trip_id, stop_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    agency_id,
                    alert_id,
                    entity.informed_agency_id,
                    entity.route_id,
                    entity.route_type,
                    entity.trip_id,
                    entity.stop_id,
                ],
            )?;
        }
        Ok(())
    }

    fn trip_details(&self, trip_id: &str) -> Result<Option<TripDetails>, StoreError> {
        let details = self
            .conn
            .query_row(
                "SELECT direction_id, block_id, service_id, shape_id
                 FROM trips WHERE trip_id = ?1",
                [trip_id],
                |row| {
                    Ok(TripDetails {
                        direction_id: row.get(0)?,
                        block_id: row.get(1)?,
                        service_id: row.get(2)?,
                        shape_id: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(details)
    }
}
