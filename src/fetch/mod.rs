//! One-shot HTTP retrieval of raw feed bytes.
//!
//! There is deliberately no retry here: the polling scheduler retries by
//! polling again on its next iteration.

mod basic;
mod client;
mod url_param;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use url_param::UrlParam;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid feed url: {url}")]
    BadUrl { url: String },

    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Performs a single GET against `url` and returns the response body.
///
/// Connection failures, timeouts, and non-success status codes all surface
/// as [`FetchError`].
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>, FetchError> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|_| FetchError::BadUrl {
            url: url.to_owned(),
        })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}
