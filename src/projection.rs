//! Read-side projection of stored vehicle rows into API-shaped records.
//!
//! The record layout follows the OpenTripPlanner TI style for stop and
//! route responses, so vehicle data fits alongside services from that
//! system. This is a pure mapping over already-stored rows; it never
//! touches the store, and each call owns its own freshly built output.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::model::VehicleRow;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    pub vehicle_id: String,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    pub destination: Option<String>,

    pub agency_id: String,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
    pub shape_id: Option<String>,
    pub direction_id: Option<String>,
    pub block_id: Option<String>,
    pub stop_id: Option<String>,
    pub stop_sequence: Option<u32>,

    pub status: String,
    pub seconds: i64,
    pub report_date: String,
}

/// Maps stored vehicle rows to response records. `now` is the reference
/// instant for the seconds-since-report field.
pub fn vehicle_records(
    agency_id: &str,
    rows: &[VehicleRow],
    now: DateTime<Utc>,
) -> Vec<VehicleRecord> {
    rows.iter()
        .map(|row| {
            let vehicle_id = row.vehicle_id.clone().unwrap_or_default();
            let (seconds, report_date) = report_time(row.timestamp, now);

            VehicleRecord {
                id: format!("{vehicle_id}-{agency_id}"),
                vehicle_id,
                lat: row.lat,
                lon: row.lon,
                heading: row.bearing.unwrap_or(0.0),
                destination: row.label.clone(),

                agency_id: agency_id.to_owned(),
                route_id: row.route_id.clone(),
                trip_id: row.trip_id.clone(),
                shape_id: row.shape_id.clone(),
                direction_id: row.direction_id.clone(),
                block_id: row.block_id.clone(),
                stop_id: row.stop_id.clone(),
                stop_sequence: row.stop_sequence,

                status: row.status.clone(),
                seconds,
                report_date,
            }
        })
        .collect()
}

fn report_time(timestamp: Option<u64>, now: DateTime<Utc>) -> (i64, String) {
    let Some(reported) = timestamp.and_then(|t| Utc.timestamp_opt(t as i64, 0).single()) else {
        return (0, String::new());
    };

    let seconds = (now - reported).num_seconds().max(0);
    // "07/04/26 1:05 PM" rather than "07/04/26 01:05 PM"
    let pretty = reported
        .format("%m/%d/%y %I:%M %p")
        .to_string()
        .replace(" 0", " ");
    (seconds, pretty)
}
