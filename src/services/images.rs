use std::env;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::ServiceError;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Representative-image lookup. Zero results and transport failures both
/// surface as `None`; one dead lookup must never fail an enrichment batch.
#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn search_image(&self, query: &str) -> Option<String>;
}

pub fn city_image_query(city: &str) -> String {
    format!("{} famous landmarks", city)
}

pub fn location_image_query(name: &str, city: &str) -> String {
    format!("{} {}", name, city)
}

#[derive(Debug, Deserialize)]
struct ImageSearchResponse {
    items: Option<Vec<ImageSearchItem>>,
}

#[derive(Debug, Deserialize)]
struct ImageSearchItem {
    link: String,
}

/// Google Custom Search (image mode) client.
#[derive(Clone)]
pub struct GoogleImageSearch {
    http: reqwest::Client,
    api_key: String,
    cx: String,
}

impl GoogleImageSearch {
    pub fn from_env() -> Result<Self, ServiceError> {
        let api_key = env::var("IMAGE_SEARCH_API_KEY")
            .map_err(|_| ServiceError::Upstream("IMAGE_SEARCH_API_KEY not set".to_string()))?;
        let cx = env::var("IMAGE_SEARCH_CX")
            .map_err(|_| ServiceError::Upstream("IMAGE_SEARCH_CX not set".to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            cx,
        })
    }
}

#[async_trait]
impl ImageClient for GoogleImageSearch {
    async fn search_image(&self, query: &str) -> Option<String> {
        let response = self
            .http
            .get(SEARCH_ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", "1"),
            ])
            .send()
            .await
            .map_err(|e| log::warn!("Image search \"{}\" failed: {}", query, e))
            .ok()?;

        let body: ImageSearchResponse = response
            .json()
            .await
            .map_err(|e| log::warn!("Image search response unreadable for \"{}\": {}", query, e))
            .ok()?;

        body.items?.into_iter().next().map(|item| item.link)
    }
}
