//! Polling loop driving repeated ingestion of an agency's configured feeds.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::info;

use crate::fetch::HttpClient;
use crate::ingest::Ingestor;
use crate::resolver::FeedKind;
use crate::store::Store;

/// The feed URLs configured for one agency, labeled per kind.
///
/// Labels say which kind a URL is *expected* to carry; the actual stored
/// kind is always resolved from the decoded content. Any subset may be
/// configured; an empty set is legal and the loop simply does no work per
/// tick.
#[derive(Debug, Clone, Default)]
pub struct FeedEndpoints {
    pub alerts: Option<String>,
    pub trips: Option<String>,
    pub vehicles: Option<String>,
}

impl FeedEndpoints {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_none() && self.trips.is_none() && self.vehicles.is_none()
    }

    // fixed iteration order keeps runs reproducible; the feeds themselves
    // are independent
    fn iter(&self) -> impl Iterator<Item = (FeedKind, &str)> {
        [
            (FeedKind::Alerts, &self.alerts),
            (FeedKind::Trips, &self.trips),
            (FeedKind::Vehicles, &self.vehicles),
        ]
        .into_iter()
        .filter_map(|(kind, url)| url.as_deref().map(|u| (kind, u)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PollConfig {
    /// Seconds to sleep between iterations. `None` means run one iteration
    /// and stop.
    pub interval: Option<u64>,
    /// Total seconds to keep polling. `None` means no time bound; `Some(0)`
    /// means at most one iteration.
    pub duration: Option<u64>,
    /// Clear an agency's previous rows for a kind before storing the new
    /// snapshot.
    pub clear_first: bool,
}

/// Polls every configured feed for `agency_id` until the duration elapses,
/// the single pass completes, or shutdown is signalled.
///
/// Returns `true` only if every feed of every iteration succeeded. A failed
/// feed never stops the remaining feeds in its iteration nor later
/// iterations.
pub async fn run<C: HttpClient, S: Store>(
    ingestor: &Ingestor<C>,
    store: &mut S,
    agency_id: &str,
    endpoints: &FeedEndpoints,
    config: &PollConfig,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    let start = Instant::now();
    let mut all_succeeded = true;
    let mut iteration: u64 = 0;

    loop {
        if *shutdown.borrow() {
            info!(iteration, "shutdown requested, stopping polling loop");
            break;
        }
        iteration += 1;

        for (expected_kind, url) in endpoints.iter() {
            let result = ingestor
                .ingest(store, agency_id, url, config.clear_first)
                .await;
            if !result.succeeded {
                info!(
                    iteration,
                    expected_kind = %expected_kind,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "feed failed this iteration"
                );
                all_succeeded = false;
            }
        }

        let elapsed = start.elapsed().as_secs();
        if let Some(duration) = config.duration {
            if elapsed >= duration {
                info!(
                    elapsed,
                    duration, iteration, "exiting: process ran for the configured duration"
                );
                break;
            }
            info!(
                elapsed,
                duration, iteration, "continuing: configured duration not yet reached"
            );
        }

        match config.interval {
            Some(interval) => {
                info!(interval, iteration, elapsed, "sleeping before next iteration");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                    changed = shutdown.changed() => {
                        if changed.is_ok() && *shutdown.borrow() {
                            info!(iteration, "shutdown requested during sleep, stopping");
                            return all_succeeded;
                        }
                    }
                }
            }
            None => break,
        }
    }

    all_succeeded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_iteration_order_is_alerts_trips_vehicles() {
        let endpoints = FeedEndpoints {
            alerts: Some("http://a".to_string()),
            trips: Some("http://t".to_string()),
            vehicles: Some("http://v".to_string()),
        };
        let kinds: Vec<FeedKind> = endpoints.iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![FeedKind::Alerts, FeedKind::Trips, FeedKind::Vehicles]
        );
    }

    #[test]
    fn test_unconfigured_slots_are_skipped() {
        let endpoints = FeedEndpoints {
            trips: Some("http://t".to_string()),
            ..Default::default()
        };
        let urls: Vec<&str> = endpoints.iter().map(|(_, u)| u).collect();
        assert_eq!(urls, vec!["http://t"]);
        assert!(!endpoints.is_empty());
        assert!(FeedEndpoints::default().is_empty());
    }
}
