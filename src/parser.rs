//! Protobuf decoding of GTFS Realtime snapshots.

use prost::Message;
use thiserror::Error;

use crate::gtfs_rt::FeedMessage;

#[derive(Debug, Error)]
#[error("malformed GTFS-RT payload: {0}")]
pub struct DecodeError(#[from] prost::DecodeError);

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes are not valid protobuf for a
/// `FeedMessage`. Callers treat this the same as unrecognizable content:
/// skip the feed with a warning, never abort the run.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, DecodeError> {
    Ok(FeedMessage::decode(bytes)?)
}
