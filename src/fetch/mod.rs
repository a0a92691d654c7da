mod basic;
mod client;
mod governor;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use governor::{BudgetConfig, Governed, RequestBudgetGovernor};

use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};

/// Issues a GET and decodes the body as JSON whatever the status code;
/// providers report failures as JSON documents too.
pub async fn get_json<C: HttpClient + ?Sized>(
    client: &C,
    url: Url,
) -> Result<(StatusCode, serde_json::Value)> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    let body = serde_json::from_slice(&bytes)
        .with_context(|| format!("malformed payload (HTTP {status})"))?;
    Ok((status, body))
}
