//! Row projection of trip-update entities.
//!
//! One trip update maps to one parent row plus one child row per stop time
//! update, so a single entity can fan out to many stored rows.

use serde::Serialize;

use crate::gtfs_rt::FeedMessage;

/// One stored trip update, scoped to an agency at insert time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TripUpdateRow {
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub direction_id: Option<u32>,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub schedule_relationship: String,

    pub vehicle_id: Option<String>,
    pub delay: Option<i32>,
    pub timestamp: Option<u64>,

    pub stop_times: Vec<StopTimeUpdateRow>,
}

/// One predicted arrival/departure for a stop along an updated trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopTimeUpdateRow {
    pub stop_sequence: Option<u32>,
    pub stop_id: Option<String>,
    pub arrival_delay: Option<i32>,
    pub arrival_time: Option<i64>,
    pub departure_delay: Option<i32>,
    pub departure_time: Option<i64>,
    pub schedule_relationship: String,
}

/// Extracts trip update rows (with their stop time children) from a
/// snapshot, in entity order.
pub fn trip_update_rows(feed: &FeedMessage) -> Vec<TripUpdateRow> {
    let mut rows = Vec::new();

    for entity in &feed.entity {
        let Some(tu) = &entity.trip_update else {
            continue;
        };

        let stop_times = tu
            .stop_time_update
            .iter()
            .map(|stu| StopTimeUpdateRow {
                stop_sequence: stu.stop_sequence,
                stop_id: stu.stop_id.clone(),
                arrival_delay: stu.arrival.as_ref().and_then(|e| e.delay),
                arrival_time: stu.arrival.as_ref().and_then(|e| e.time),
                departure_delay: stu.departure.as_ref().and_then(|e| e.delay),
                departure_time: stu.departure.as_ref().and_then(|e| e.time),
                schedule_relationship: stu.schedule_relationship().as_str_name().to_string(),
            })
            .collect();

        rows.push(TripUpdateRow {
            trip_id: tu.trip.trip_id.clone(),
            route_id: tu.trip.route_id.clone(),
            direction_id: tu.trip.direction_id,
            start_date: tu.trip.start_date.clone(),
            start_time: tu.trip.start_time.clone(),
            schedule_relationship: tu.trip.schedule_relationship().as_str_name().to_string(),
            vehicle_id: tu.vehicle.as_ref().and_then(|v| v.id.clone()),
            delay: tu.delay,
            timestamp: tu.timestamp,
            stop_times,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{
        FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate,
        trip_update::{StopTimeEvent, StopTimeUpdate},
    };

    fn feed_with_update(tu: TripUpdate) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: None,
            },
            entity: vec![FeedEntity {
                id: "1".to_string(),
                is_deleted: None,
                trip_update: Some(tu),
                vehicle: None,
                alert: None,
            }],
        }
    }

    #[test]
    fn test_maps_parent_and_children() {
        let tu = TripUpdate {
            trip: TripDescriptor {
                trip_id: Some("t1".to_string()),
                route_id: Some("r9".to_string()),
                start_date: Some("20260807".to_string()),
                ..Default::default()
            },
            stop_time_update: vec![
                StopTimeUpdate {
                    stop_sequence: Some(3),
                    stop_id: Some("s3".to_string()),
                    arrival: Some(StopTimeEvent {
                        delay: Some(120),
                        time: Some(1754550000),
                        uncertainty: None,
                    }),
                    departure: None,
                    schedule_relationship: None,
                },
                StopTimeUpdate {
                    stop_sequence: Some(4),
                    ..Default::default()
                },
            ],
            delay: Some(60),
            ..Default::default()
        };

        let rows = trip_update_rows(&feed_with_update(tu));
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.trip_id.as_deref(), Some("t1"));
        assert_eq!(row.route_id.as_deref(), Some("r9"));
        assert_eq!(row.schedule_relationship, "SCHEDULED");
        assert_eq!(row.delay, Some(60));
        assert_eq!(row.stop_times.len(), 2);
        assert_eq!(row.stop_times[0].arrival_delay, Some(120));
        assert_eq!(row.stop_times[0].arrival_time, Some(1754550000));
        assert_eq!(row.stop_times[0].schedule_relationship, "SCHEDULED");
        assert_eq!(row.stop_times[1].stop_sequence, Some(4));
    }

    #[test]
    fn test_update_without_stop_times_is_one_row() {
        let tu = TripUpdate {
            trip: TripDescriptor {
                trip_id: Some("t2".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let rows = trip_update_rows(&feed_with_update(tu));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].stop_times.is_empty());
    }
}
