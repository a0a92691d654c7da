//! Google Maps directions client (transit mode).

mod client;
mod types;

pub use client::{DEFAULT_BASE_URL, GoogleDirectionsClient};
