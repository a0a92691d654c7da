//! Stop identifier resolution against an identifier-based provider.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::services::journey_api::StopLookup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    NotFound,
}

/// Turns upstream stop identifiers into provider identifiers.
///
/// Name-based search results are cached by display name for the lifetime of
/// the resolver, i.e. one pipeline run.
pub struct StopIdentifierResolver {
    lookup: Arc<dyn StopLookup>,
    cache: HashMap<String, String>,
}

impl StopIdentifierResolver {
    pub fn new(lookup: Arc<dyn StopLookup>) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
        }
    }

    /// Provider identifier carried by a raw id, if it has the provider's
    /// shape: either purely numeric, or a global id `de:<area>:<number>...`
    /// whose number is the provider identifier.
    pub fn provider_id(raw_id: &str) -> Option<String> {
        if is_numeric(raw_id) {
            return Some(raw_id.to_string());
        }

        let mut parts = raw_id.strip_prefix("de:")?.splitn(2, ':');
        let area = parts.next()?;
        let rest = parts.next()?;
        if !is_numeric(area) {
            return None;
        }
        let number: String = rest.chars().take_while(char::is_ascii_digit).collect();
        (!number.is_empty()).then_some(number)
    }

    /// Resolves a raw id, touching the network only when its shape is not
    /// already usable.
    pub async fn resolve(&mut self, raw_id: &str, display_name: &str) -> Result<Resolution> {
        if let Some(id) = Self::provider_id(raw_id) {
            return Ok(Resolution::Resolved(id));
        }
        self.repair(raw_id, display_name).await
    }

    /// Finds a usable identifier for a stop whose current id was rejected:
    /// cached name hit, else the current id if the provider knows it, else
    /// the best-scored station matching the display name.
    pub async fn repair(&mut self, current_id: &str, display_name: &str) -> Result<Resolution> {
        if let Some(id) = self.cache.get(display_name) {
            debug!(stop = display_name, id, "Resolver cache hit");
            return Ok(Resolution::Resolved(id.clone()));
        }

        if !current_id.is_empty() && self.lookup.stop_exists(current_id).await? {
            return Ok(Resolution::Resolved(current_id.to_string()));
        }

        let mut hits = self.lookup.search_stations(display_name).await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        match hits.into_iter().next() {
            None => Ok(Resolution::NotFound),
            Some(hit) => {
                info!(stop = display_name, found = %hit.name, id = %hit.id, "Found station");
                self.cache.insert(display_name.to_string(), hit.id.clone());
                Ok(Resolution::Resolved(hit.id))
            }
        }
    }

    #[cfg(test)]
    pub fn cached(&self, display_name: &str) -> Option<&str> {
        self.cache.get(display_name).map(String::as_str)
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
