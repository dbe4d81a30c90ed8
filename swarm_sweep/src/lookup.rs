//! Place lookup: turning a typed place name into map coordinates.
//!
//! `PlaceLookup` is the seam. `NominatimClient` talks to an OpenStreetMap
//! Nominatim-compatible search endpoint over HTTP. `suggest` and `search` hold the
//! user-facing rules (minimum query length, quiet failure for suggestions, the
//! alert messages for an explicit search).

use crate::config::LookupConfig;
use crate::error::ScanError;
use futures::future::BoxFuture;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Human-readable name, e.g. "Lisbon, Portugal".
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

/// Anything that can resolve a free-text query into candidate places.
pub trait PlaceLookup: Send + Sync {
    fn lookup<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Place>, ScanError>>;
}

/// Why an explicit search produced no place. The messages are shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Enter a place name first")]
    EmptyQuery,
    #[error("Place not found")]
    NotFound,
    #[error("Search failed")]
    Failed(#[source] ScanError),
}

/// One row of a Nominatim `format=json` response. Coordinates arrive as strings.
#[derive(Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn into_place(self) -> Option<Place> {
        let lat = self.lat.trim().parse::<f64>().ok()?;
        let lon = self.lon.trim().parse::<f64>().ok()?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(Place {
            label: self.display_name,
            lat,
            lon,
        })
    }
}

/// HTTP client for a Nominatim search endpoint.
#[derive(Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    endpoint: Url,
    limit: u32,
}

impl NominatimClient {
    pub fn new(config: &LookupConfig) -> Result<Self, ScanError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ScanError::LookupFailed(format!("bad endpoint {}: {e}", config.endpoint)))?;
        // Nominatim's usage policy requires an identifying user agent.
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScanError::LookupFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            limit: config.result_limit,
        })
    }

    /// The request URL for `query`.
    pub fn search_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("addressdetails", "1")
            .append_pair("limit", &self.limit.to_string())
            .append_pair("q", query);
        url
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Place>, ScanError> {
        let url = self.search_url(query);
        debug!(%url, "place lookup");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::LookupFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::LookupFailed(format!(
                "lookup returned status {}",
                response.status()
            )));
        }

        let rows: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| ScanError::LookupFailed(format!("unreadable lookup response: {e}")))?;

        Ok(rows.into_iter().filter_map(NominatimPlace::into_place).collect())
    }
}

impl PlaceLookup for NominatimClient {
    fn lookup<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Place>, ScanError>> {
        Box::pin(self.fetch(query))
    }
}

/// Candidate places while the user is typing.
///
/// Queries shorter than `min_len` characters yield nothing without a request.
/// Lookup failures are logged and also yield nothing.
pub async fn suggest(lookup: &dyn PlaceLookup, query: &str, min_len: usize) -> Vec<Place> {
    let query = query.trim();
    if query.chars().count() < min_len {
        return Vec::new();
    }
    match lookup.lookup(query).await {
        Ok(places) => places,
        Err(err) => {
            warn!(error = %err, query, "suggestion lookup failed");
            Vec::new()
        }
    }
}

/// Resolves an explicit search to its best match.
pub async fn search(lookup: &dyn PlaceLookup, query: &str) -> Result<Place, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let places = lookup.lookup(query).await.map_err(|err| {
        warn!(error = %err, query, "place search failed");
        SearchError::Failed(err)
    })?;
    places.into_iter().next().ok_or(SearchError::NotFound)
}
