//! transport.rest client (stop lookup, station search, journeys).

mod client;
mod types;

pub use client::{DEFAULT_BASE_URL, STOP_NOT_FOUND, VbbClient};
