//! Row projection of vehicle-position entities.

use serde::Serialize;
use tracing::debug;

use crate::gtfs_rt::FeedMessage;

/// Static-GTFS attributes of a trip, looked up from the reference `trips`
/// table to enrich a vehicle row beyond what the realtime feed carries.
#[derive(Debug, Clone, Default)]
pub struct TripDetails {
    pub direction_id: Option<String>,
    pub block_id: Option<String>,
    pub service_id: Option<String>,
    pub shape_id: Option<String>,
}

/// One stored vehicle position, scoped to an agency at insert time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleRow {
    pub vehicle_id: Option<String>,
    pub label: Option<String>,
    pub license_plate: Option<String>,

    pub lat: f64,
    pub lon: f64,
    pub bearing: Option<f64>,
    pub odometer: Option<f64>,
    pub speed: Option<f64>,

    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub stop_id: Option<String>,
    pub stop_sequence: Option<u32>,
    pub status: String,
    pub timestamp: Option<u64>,

    // filled from the static-trip lookup, absent when the trip is unknown
    pub direction_id: Option<String>,
    pub block_id: Option<String>,
    pub service_id: Option<String>,
    pub shape_id: Option<String>,
}

impl VehicleRow {
    /// Copies looked-up static-trip attributes onto this row.
    pub fn apply_trip_details(&mut self, details: &TripDetails) {
        self.direction_id = details.direction_id.clone();
        self.block_id = details.block_id.clone();
        self.service_id = details.service_id.clone();
        self.shape_id = details.shape_id.clone();
    }
}

/// Extracts vehicle rows from a snapshot, in entity order.
///
/// Entities without a vehicle sub-message or without a position are skipped;
/// a position is the one thing a vehicle row cannot be stored without.
pub fn vehicle_rows(feed: &FeedMessage) -> Vec<VehicleRow> {
    let mut rows = Vec::new();

    for entity in &feed.entity {
        let Some(v) = &entity.vehicle else { continue };
        let Some(pos) = &v.position else {
            debug!(entity_id = %entity.id, "vehicle entity has no position, skipping");
            continue;
        };

        let trip = v.trip.as_ref();
        let descriptor = v.vehicle.as_ref();

        rows.push(VehicleRow {
            vehicle_id: descriptor.and_then(|d| d.id.clone()),
            label: descriptor.and_then(|d| d.label.clone()),
            license_plate: descriptor.and_then(|d| d.license_plate.clone()),

            lat: round6(f64::from(pos.latitude)),
            lon: round6(f64::from(pos.longitude)),
            bearing: pos.bearing.map(f64::from),
            odometer: pos.odometer,
            speed: pos.speed.map(f64::from),

            trip_id: trip.and_then(|t| t.trip_id.clone()),
            route_id: trip.and_then(|t| t.route_id.clone()),
            stop_id: v.stop_id.clone(),
            stop_sequence: v.current_stop_sequence,
            status: v.current_status().as_str_name().to_string(),
            timestamp: v.timestamp,

            direction_id: None,
            block_id: None,
            service_id: None,
            shape_id: None,
        });
    }

    rows
}

// Coordinates are stored to six decimal places (~10cm), matching the
// precision the rest of the schema assumes.
fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}
