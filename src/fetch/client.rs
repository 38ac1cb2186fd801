use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between the ingestion pipeline and the HTTP transport.
///
/// Production code uses [`crate::fetch::BasicClient`]; decorators such as
/// [`crate::fetch::UrlParam`] wrap another client to rewrite the request
/// before it goes out.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
