//! Reverse-geocoding response handling and the address cache.

use lru::LruCache;
use serde::Deserialize;
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};
use crate::geo::Coordinate;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("malformed geocode response: {0}")]
    Malformed(String),
    #[error("geocoder rejected request: {status}")]
    Rejected {
        status: String,
        message: Option<String>,
    },
}

impl From<GeocodeError> for AppError {
    fn from(e: GeocodeError) -> Self {
        AppError::new(ErrorKind::Deserialization, e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: String,
}

/// First formatted address in a reverse-geocode body, or `""` when the
/// provider found nothing.
pub fn first_formatted_address(body: &[u8]) -> Result<String, GeocodeError> {
    let response: GeocodeResponse =
        serde_json::from_slice(body).map_err(|e| GeocodeError::Malformed(e.to_string()))?;

    match response.status.as_deref() {
        None | Some("OK" | "ZERO_RESULTS") => {}
        Some(other) => {
            return Err(GeocodeError::Rejected {
                status: other.to_string(),
                message: response.error_message,
            })
        }
    }

    Ok(response
        .results
        .into_iter()
        .next()
        .map(|r| r.formatted_address)
        .unwrap_or_default())
}

/// Bounded LRU of resolved addresses keyed by [`Coordinate::grid_key`].
pub struct AddressCache {
    entries: LruCache<(i64, i64), String>,
}

impl AddressCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, at: Coordinate) -> Option<String> {
        self.entries.get(&at.grid_key()).cloned()
    }

    /// Empty addresses are fallbacks, not answers, so they are not kept.
    pub fn insert(&mut self, at: Coordinate, address: &str) {
        if !address.is_empty() {
            self.entries.put(at.grid_key(), address.to_string());
        }
    }

    pub fn resize(&mut self, capacity: NonZeroUsize) {
        self.entries.resize(capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AddressCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .finish()
    }
}
