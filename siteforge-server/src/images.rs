//! Image search provider
//!
//! Looks up a single best-match landscape photo for a text query, used to
//! decorate newly created sites. Provider failures never reach API callers
//! as errors: the caller logs a warning and continues without an image.
//! Successful lookups are cached in-process for an hour.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;

const SEARCH_URL: &str = "https://api.pexels.com/v1/search";

/// How long a lookup result stays cached
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Finds a landscape image URL for a query
pub trait ImageSearch: Send + Sync {
    fn find_landscape(&self, query: &str) -> Result<Option<String>, String>;
}

/// Provider used when no API key is configured: every query finds nothing
pub struct DisabledImageSearch;

impl ImageSearch for DisabledImageSearch {
    fn find_landscape(&self, _query: &str) -> Result<Option<String>, String> {
        Ok(None)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    src: PhotoSource,
}

#[derive(Deserialize)]
struct PhotoSource {
    landscape: String,
}

struct CacheEntry {
    url: Option<String>,
    fetched_at: Instant,
}

/// Pexels-backed image search
pub struct PexelsImageSearch {
    client: Client,
    api_key: String,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl PexelsImageSearch {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, query: &str) -> Option<Option<String>> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(query)
            .filter(|entry| entry.fetched_at.elapsed() < CACHE_TTL)
            .map(|entry| entry.url.clone())
    }

    fn remember(&self, query: &str, url: Option<String>) {
        self.cache.lock().unwrap().insert(
            query.to_string(),
            CacheEntry {
                url,
                fetched_at: Instant::now(),
            },
        );
    }
}

impl ImageSearch for PexelsImageSearch {
    fn find_landscape(&self, query: &str) -> Result<Option<String>, String> {
        if let Some(url) = self.cached(query) {
            return Ok(url);
        }

        let response = self
            .client
            .get(SEARCH_URL)
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("orientation", "landscape"), ("per_page", "1")])
            .send()
            .map_err(|e| format!("Image search request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Image search returned HTTP {}", response.status()));
        }

        let body: SearchResponse = response
            .json()
            .map_err(|e| format!("Invalid image search response: {}", e))?;

        let url = body.photos.into_iter().next().map(|photo| photo.src.landscape);
        self.remember(query, url.clone());
        Ok(url)
    }
}
