use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for every outbound provider call. Decorators such as
/// [`super::Governed`] and [`super::auth::UrlParam`] wrap an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
