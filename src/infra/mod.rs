//! Concrete provider clients.

pub mod google;
pub mod vbb;
