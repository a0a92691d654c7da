//! Provider-agnostic service seams.

pub mod journey_api;
