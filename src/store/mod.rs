//! The transactional sink for decoded feed rows.
//!
//! [`Store`] is the capability the ingestor writes through; [`SqliteStore`]
//! is the production realization. The trait exists so tests can wrap the
//! real store and inject failures at chosen points.

mod sqlite;

pub use sqlite::{SqliteStore, StoreCounts};

use thiserror::Error;

use crate::model::{AlertRow, TripDetails, TripUpdateRow, VehicleRow};
use crate::resolver::FeedKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error("no nested transaction is open")]
    NoOpenTransaction,
}

/// A unit of work over the realtime tables.
///
/// One `Store` corresponds to one outer database session, held for the whole
/// polling run. Each feed ingestion runs inside a nested transaction on that
/// session: `begin_nested`, then mutations, then exactly one `commit_nested`
/// or `rollback_nested`. Rolling back undoes every mutation since the
/// matching begin and leaves the session usable for the next feed.
pub trait Store {
    fn begin_nested(&mut self) -> Result<(), StoreError>;
    fn commit_nested(&mut self) -> Result<(), StoreError>;
    fn rollback_nested(&mut self) -> Result<(), StoreError>;

    /// Deletes every stored row of `kind` (including child rows) for the
    /// agency.
    fn clear(&mut self, agency_id: &str, kind: FeedKind) -> Result<(), StoreError>;

    fn insert_vehicle(&mut self, agency_id: &str, row: &VehicleRow) -> Result<(), StoreError>;
    fn insert_trip_update(
        &mut self,
        agency_id: &str,
        row: &TripUpdateRow,
    ) -> Result<(), StoreError>;
    fn insert_alert(&mut self, agency_id: &str, row: &AlertRow) -> Result<(), StoreError>;

    /// Looks up static-GTFS attributes for `trip_id` in the reference
    /// `trips` table. `Ok(None)` means the trip is not known, a soft miss
    /// the caller tolerates rather than a failure.
    fn trip_details(&self, trip_id: &str) -> Result<Option<TripDetails>, StoreError>;
}
