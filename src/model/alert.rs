//! Row projection of service-alert entities.

use serde::Serialize;

use crate::gtfs_rt::{FeedMessage, TranslatedString};

/// One stored service alert, scoped to an agency at insert time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertRow {
    pub cause: String,
    pub effect: String,
    pub url: Option<String>,
    pub header_text: Option<String>,
    pub description_text: Option<String>,
    pub period_start: Option<u64>,
    pub period_end: Option<u64>,

    pub entities: Vec<AlertEntityRow>,
}

/// One route/trip/stop selector an alert applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertEntityRow {
    pub informed_agency_id: Option<String>,
    pub route_id: Option<String>,
    pub route_type: Option<i32>,
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
}

/// Extracts alert rows (with their informed-entity children) from a
/// snapshot, in entity order.
pub fn alert_rows(feed: &FeedMessage) -> Vec<AlertRow> {
    let mut rows = Vec::new();

    for entity in &feed.entity {
        let Some(alert) = &entity.alert else { continue };

        let entities = alert
            .informed_entity
            .iter()
            .map(|sel| AlertEntityRow {
                informed_agency_id: sel.agency_id.clone(),
                route_id: sel.route_id.clone(),
                route_type: sel.route_type,
                trip_id: sel.trip.as_ref().and_then(|t| t.trip_id.clone()),
                stop_id: sel.stop_id.clone(),
            })
            .collect();

        // agencies rarely publish more than one active period; the first one
        // is what the original schema stored
        let period = alert.active_period.first();

        rows.push(AlertRow {
            cause: alert.cause().as_str_name().to_string(),
            effect: alert.effect().as_str_name().to_string(),
            url: first_translation(alert.url.as_ref()),
            header_text: first_translation(alert.header_text.as_ref()),
            description_text: first_translation(alert.description_text.as_ref()),
            period_start: period.and_then(|p| p.start),
            period_end: period.and_then(|p| p.end),
            entities,
        });
    }

    rows
}

fn first_translation(ts: Option<&TranslatedString>) -> Option<String> {
    ts.and_then(|t| t.translation.first())
        .map(|t| t.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{
        Alert, EntitySelector, FeedEntity, FeedHeader, FeedMessage, TimeRange, TranslatedString,
        TripDescriptor,
        alert::{Cause, Effect},
        translated_string::Translation,
    };

    fn text(s: &str) -> TranslatedString {
        TranslatedString {
            translation: vec![Translation {
                text: s.to_string(),
                language: Some("en".to_string()),
            }],
        }
    }

    fn feed_with_alert(alert: Alert) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: None,
            },
            entity: vec![FeedEntity {
                id: "1".to_string(),
                is_deleted: None,
                trip_update: None,
                vehicle: None,
                alert: Some(alert),
            }],
        }
    }

    #[test]
    fn test_maps_alert_with_entities() {
        let alert = Alert {
            active_period: vec![TimeRange {
                start: Some(1754500000),
                end: Some(1754600000),
            }],
            informed_entity: vec![
                EntitySelector {
                    route_id: Some("20".to_string()),
                    ..Default::default()
                },
                EntitySelector {
                    stop_id: Some("1".to_string()),
                    trip: Some(TripDescriptor {
                        trip_id: Some("t1".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            cause: Some(Cause::Construction as i32),
            effect: Some(Effect::Detour as i32),
            url: None,
            header_text: Some(text("Stark St closed")),
            description_text: Some(text("Use 18th Ave stop")),
        };

        let rows = alert_rows(&feed_with_alert(alert));
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.cause, "CONSTRUCTION");
        assert_eq!(row.effect, "DETOUR");
        assert_eq!(row.header_text.as_deref(), Some("Stark St closed"));
        assert_eq!(row.period_start, Some(1754500000));
        assert_eq!(row.entities.len(), 2);
        assert_eq!(row.entities[0].route_id.as_deref(), Some("20"));
        assert_eq!(row.entities[1].trip_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_defaults_for_bare_alert() {
        let rows = alert_rows(&feed_with_alert(Alert::default()));
        let row = &rows[0];
        assert_eq!(row.cause, "UNKNOWN_CAUSE");
        assert_eq!(row.effect, "UNKNOWN_EFFECT");
        assert!(row.header_text.is_none());
        assert!(row.period_start.is_none());
        assert!(row.entities.is_empty());
    }
}
