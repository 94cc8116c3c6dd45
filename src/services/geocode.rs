use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// Sentinel returned when every fallback query comes back empty. Callers can
/// render it, so lookup failure never aborts a detail generation.
pub const NO_MATCH: [f64; 2] = [0.0, 0.0];

const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
// The public endpoint asks for at most one request per second.
const QUERY_DELAY: Duration = Duration::from_secs(1);
const USER_AGENT: &str = concat!("velzy-api/", env!("CARGO_PKG_VERSION"));

/// Resolves a free-text place name to `[lat, lon]`.
#[async_trait]
pub trait GeocodeClient: Send + Sync {
    /// Tries `"{location} {city}"`, then `"{location}"`, then
    /// `"{city} {country}"`, taking the first query with at least one result.
    /// Returns [`NO_MATCH`] when all three miss.
    async fn resolve_coordinates(&self, location: &str, city: &str, country: &str) -> [f64; 2];
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Clone)]
pub struct NominatimClient {
    http: reqwest::Client,
}

impl NominatimClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn search(&self, query: &str) -> Option<[f64; 2]> {
        tokio::time::sleep(QUERY_DELAY).await;

        let response = self
            .http
            .get(format!("{}/search.php", NOMINATIM_BASE_URL))
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| log::warn!("Geocode query \"{}\" failed: {}", query, e))
            .ok()?;

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| log::warn!("Geocode response unreadable for \"{}\": {}", query, e))
            .ok()?;

        let place = places.first()?;
        Some([place.lat.parse().ok()?, place.lon.parse().ok()?])
    }
}

impl Default for NominatimClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback chain, most specific first. Blank inputs collapse to fewer
/// candidates instead of producing queries of stray whitespace.
pub fn candidate_queries(location: &str, city: &str, country: &str) -> Vec<String> {
    let mut queries = Vec::with_capacity(3);
    for candidate in [
        format!("{} {}", location, city),
        location.to_string(),
        format!("{} {}", city, country),
    ] {
        let trimmed = candidate.trim().to_string();
        if !trimmed.is_empty() && !queries.contains(&trimmed) {
            queries.push(trimmed);
        }
    }
    queries
}

#[async_trait]
impl GeocodeClient for NominatimClient {
    async fn resolve_coordinates(&self, location: &str, city: &str, country: &str) -> [f64; 2] {
        for query in candidate_queries(location, city, country) {
            if let Some(coordinates) = self.search(&query).await {
                return coordinates;
            }
        }
        log::warn!(
            "No geocoding match for \"{}\" ({}, {})",
            location,
            city,
            country
        );
        NO_MATCH
    }
}
