//! The fetch, decode, resolve, clear-and-replace pipeline for one feed.
//!
//! Every failure mode of a single feed is absorbed here and reported as an
//! [`IngestionResult`]; nothing propagates out to abort sibling feeds or the
//! polling loop. The store is only touched inside a nested transaction, so a
//! reader of the database sees either the previous snapshot's rows or the
//! new snapshot's rows for an (agency, kind) pair, never a mixture.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::fetch::{FetchError, HttpClient, fetch_bytes};
use crate::gtfs_rt::FeedMessage;
use crate::model;
use crate::parser::{DecodeError, parse_feed};
use crate::resolver::{FeedKind, resolve};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unrecognized feed content")]
    UnresolvedFeedKind,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one feed ingestion attempt. Reported to the scheduler and the
/// logs; never persisted.
#[derive(Debug)]
pub struct IngestionResult {
    pub succeeded: bool,
    pub agency_id: String,
    pub feed_kind: Option<FeedKind>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

/// Fetches and stores single feeds, one nested transaction per call.
pub struct Ingestor<C> {
    client: C,
}

impl<C: HttpClient> Ingestor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Ingests one feed URL for `agency_id`: fetch, decode, resolve the
    /// content kind, then replace that kind's rows inside a nested
    /// transaction.
    ///
    /// On success the stored rows for (agency, kind) reflect exactly the
    /// fetched snapshot. On failure they are untouched, and `store` remains
    /// usable for the next feed.
    pub async fn ingest<S: Store>(
        &self,
        store: &mut S,
        agency_id: &str,
        url: &str,
        clear_first: bool,
    ) -> IngestionResult {
        info!(agency_id, url, "loading GTFS-RT feed");

        match self.try_ingest(store, agency_id, url, clear_first).await {
            Ok(kind) => {
                info!(agency_id, kind = %kind, "feed stored");
                IngestionResult {
                    succeeded: true,
                    agency_id: agency_id.to_owned(),
                    feed_kind: Some(kind),
                    timestamp: Utc::now(),
                    error: None,
                }
            }
            Err(e) => {
                match &e {
                    IngestError::UnresolvedFeedKind => {
                        warn!(agency_id, url, "not sure what kind of data came back, skipping")
                    }
                    IngestError::Decode(_) => warn!(agency_id, url, error = %e, "skipping feed"),
                    _ => error!(agency_id, url, error = %e, "feed ingestion failed"),
                }
                IngestionResult {
                    succeeded: false,
                    agency_id: agency_id.to_owned(),
                    feed_kind: None,
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_ingest<S: Store>(
        &self,
        store: &mut S,
        agency_id: &str,
        url: &str,
        clear_first: bool,
    ) -> Result<FeedKind, IngestError> {
        let bytes = fetch_bytes(&self.client, url).await?;
        let feed = parse_feed(&bytes)?;
        let kind = resolve(&feed).ok_or(IngestError::UnresolvedFeedKind)?;

        debug!(
            kind = %kind,
            entities = feed.entity.len(),
            feed_timestamp = feed.header.timestamp,
            "snapshot decoded"
        );

        store_snapshot(store, agency_id, kind, &feed, clear_first)?;
        Ok(kind)
    }
}

/// Replaces the stored rows for (agency, `kind`) with the snapshot's rows,
/// atomically.
///
/// Opens one nested transaction, clears (when `clear_first`), inserts every
/// extracted row, and commits. Any store failure rolls the nested
/// transaction back, undoing the clear and any partial inserts, and the
/// outer session stays usable. An empty snapshot is a legal success: the old
/// rows are cleared and nothing is inserted.
pub fn store_snapshot<S: Store>(
    store: &mut S,
    agency_id: &str,
    kind: FeedKind,
    feed: &FeedMessage,
    clear_first: bool,
) -> Result<(), StoreError> {
    store.begin_nested()?;

    let written = write_rows(store, agency_id, kind, feed, clear_first);
    match written {
        Ok(inserted) => match store.commit_nested() {
            Ok(()) => {
                debug!(agency_id, kind = %kind, inserted, "nested transaction committed");
                Ok(())
            }
            Err(e) => {
                try_rollback(store, agency_id, kind);
                Err(e)
            }
        },
        Err(e) => {
            try_rollback(store, agency_id, kind);
            Err(e)
        }
    }
}

fn try_rollback<S: Store>(store: &mut S, agency_id: &str, kind: FeedKind) {
    if let Err(e) = store.rollback_nested() {
        error!(agency_id, kind = %kind, error = %e, "rollback of nested transaction failed");
    }
}

fn write_rows<S: Store>(
    store: &mut S,
    agency_id: &str,
    kind: FeedKind,
    feed: &FeedMessage,
    clear_first: bool,
) -> Result<usize, StoreError> {
    if clear_first {
        store.clear(agency_id, kind)?;
    }

    let mut inserted = 0;
    match kind {
        FeedKind::Vehicles => {
            for mut row in model::vehicle_rows(feed) {
                enrich_vehicle(store, &mut row)?;
                store.insert_vehicle(agency_id, &row)?;
                inserted += 1;
            }
        }
        FeedKind::Trips => {
            for row in model::trip_update_rows(feed) {
                store.insert_trip_update(agency_id, &row)?;
                inserted += 1;
            }
        }
        FeedKind::Alerts => {
            for row in model::alert_rows(feed) {
                store.insert_alert(agency_id, &row)?;
                inserted += 1;
            }
        }
    }
    Ok(inserted)
}

// A vehicle that references a trip missing from the static tables still gets
// stored, just without the static attributes. Feeds routinely run a service
// day ahead of the loaded GTFS.
fn enrich_vehicle<S: Store>(store: &mut S, row: &mut model::VehicleRow) -> Result<(), StoreError> {
    let Some(trip_id) = row.trip_id.clone() else {
        return Ok(());
    };

    match store.trip_details(&trip_id)? {
        Some(details) => row.apply_trip_details(&details),
        None => warn!(trip_id = %trip_id, "trip not in the static GTFS (out of date?)"),
    }
    Ok(())
}
