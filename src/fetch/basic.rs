use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

/// Seconds before an in-flight feed request is abandoned. Agencies serve
/// these snapshots in well under a second; anything slower than this is down.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Plain [`HttpClient`] with a request timeout and no authentication.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("BasicClient: failed to construct reqwest client");
        Self(client)
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
