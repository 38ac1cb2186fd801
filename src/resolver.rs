//! Determines what kind of content a decoded snapshot carries.
//!
//! Agencies publish vehicle positions, trip updates, and alerts as separate
//! feeds, but nothing in the transport layer says which is which. The kind is
//! read off the decoded entities themselves, never off the URL that produced
//! them.

use std::fmt;

use serde::Serialize;

use crate::gtfs_rt::FeedMessage;

/// The three kinds of GTFS-RT sub-feed an agency can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeedKind {
    Vehicles,
    Trips,
    Alerts,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Vehicles => "vehicles",
            FeedKind::Trips => "trips",
            FeedKind::Alerts => "alerts",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inspects a decoded snapshot and returns the kind of its content.
///
/// Returns `None` when no entity carries a recognizable sub-message: an
/// empty feed, or one populated only with extensions we do not read. `None`
/// is a skip condition for callers, not an error.
pub fn resolve(feed: &FeedMessage) -> Option<FeedKind> {
    let entity = feed
        .entity
        .iter()
        .find(|e| e.vehicle.is_some() || e.trip_update.is_some() || e.alert.is_some())?;

    if entity.vehicle.is_some() {
        Some(FeedKind::Vehicles)
    } else if entity.trip_update.is_some() {
        Some(FeedKind::Trips)
    } else {
        Some(FeedKind::Alerts)
    }
}
