//! Shared helpers for the integration tests: canned GTFS-RT payloads and a
//! minimal local HTTP server to fetch them from.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gtfsrt_loader::gtfs_rt::{
    Alert, FeedEntity, FeedHeader, FeedMessage, Position, TranslatedString, TripDescriptor,
    TripUpdate, VehicleDescriptor, VehiclePosition, translated_string::Translation,
};

pub fn header() -> FeedHeader {
    FeedHeader {
        gtfs_realtime_version: "2.0".to_string(),
        incrementality: None,
        timestamp: Some(1754550000),
    }
}

pub fn empty_feed() -> FeedMessage {
    FeedMessage {
        header: header(),
        entity: vec![],
    }
}

/// A vehicle-positions feed with one vehicle per id; each vehicle references
/// trip `t-<id>`.
pub fn vehicles_feed(ids: &[&str]) -> FeedMessage {
    let entity = ids
        .iter()
        .map(|id| FeedEntity {
            id: (*id).to_string(),
            is_deleted: None,
            trip_update: None,
            vehicle: Some(VehiclePosition {
                trip: Some(TripDescriptor {
                    trip_id: Some(format!("t-{id}")),
                    route_id: Some("20".to_string()),
                    ..Default::default()
                }),
                vehicle: Some(VehicleDescriptor {
                    id: Some((*id).to_string()),
                    label: None,
                    license_plate: None,
                }),
                position: Some(Position {
                    latitude: 45.5,
                    longitude: -122.6,
                    bearing: None,
                    odometer: None,
                    speed: None,
                }),
                ..Default::default()
            }),
            alert: None,
        })
        .collect();

    FeedMessage {
        header: header(),
        entity,
    }
}

pub fn trips_feed(trip_ids: &[&str]) -> FeedMessage {
    let entity = trip_ids
        .iter()
        .map(|trip_id| FeedEntity {
            id: format!("tu-{trip_id}"),
            is_deleted: None,
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    trip_id: Some((*trip_id).to_string()),
                    ..Default::default()
                },
                ..Default::default()
            }),
            vehicle: None,
            alert: None,
        })
        .collect();

    FeedMessage {
        header: header(),
        entity,
    }
}

pub fn alerts_feed(headlines: &[&str]) -> FeedMessage {
    let entity = headlines
        .iter()
        .enumerate()
        .map(|(i, headline)| FeedEntity {
            id: format!("a-{i}"),
            is_deleted: None,
            trip_update: None,
            vehicle: None,
            alert: Some(Alert {
                header_text: Some(TranslatedString {
                    translation: vec![Translation {
                        text: (*headline).to_string(),
                        language: None,
                    }],
                }),
                ..Default::default()
            }),
        })
        .collect();

    FeedMessage {
        header: header(),
        entity,
    }
}

pub fn encode(feed: &FeedMessage) -> Vec<u8> {
    feed.encode_to_vec()
}

pub struct TestServer {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `body` as a 200 response to every request, counting hits.
pub async fn serve_bytes(body: Vec<u8>) -> TestServer {
    serve(move |_| {
        let mut resp = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/x-protobuf\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        resp.extend_from_slice(&body);
        resp
    })
    .await
}

/// Serves an empty-bodied response with the given status line to every
/// request.
pub async fn serve_status(status_line: &'static str) -> TestServer {
    serve(move |_| {
        format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .into_bytes()
    })
    .await
}

/// A URL nothing is listening on; connecting to it fails.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

async fn serve<F>(respond: F) -> TestServer
where
    F: Fn(usize) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_srv = hits.clone();
    tokio::spawn(async move {
        let respond = Arc::new(respond);
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let n = hits_srv.fetch_add(1, Ordering::SeqCst);
            let respond = respond.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let mut request = Vec::new();
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(read) => {
                            request.extend_from_slice(&buf[..read]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let _ = sock.write_all(&respond(n)).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    TestServer {
        url: format!("http://{addr}/"),
        hits,
    }
}
