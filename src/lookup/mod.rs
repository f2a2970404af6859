pub mod mock;
pub mod wikipedia;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A fetched article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    /// Plain-text body of the whole article.
    pub content: String,
    /// Primary `(lat, long)` of the article, if it has one.
    pub coordinates: Option<(f64, f64)>,
    /// External links cited by the article.
    pub references: Vec<String>,
}

/// Parameters of a geosearch.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoQuery {
    pub lat: f64,
    pub long: f64,
    /// Restrict the answer to this page (reported only if it lies in the area).
    pub title: Option<String>,
    /// Maximum number of titles to return.
    pub results: u32,
    /// Search radius in meters.
    pub radius: u32,
}

/// The knowledge base. Could be Wikipedia over HTTP or a test double.
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Lead section of `topic`, cut to `sentences` sentences (0 = no limit).
    async fn summary(&self, topic: &str, sentences: u32) -> Result<String>;

    async fn page(&self, topic: &str) -> Result<Page>;

    /// Titles of pages near a point.
    async fn geosearch(&self, query: &GeoQuery) -> Result<Vec<String>>;
}
