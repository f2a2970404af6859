use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::consts::{DEFAULT_API_URL, user_agent};

use super::{GeoQuery, Lookup, Page};

/// Follow-up requests allowed for one page before giving up on the rest.
const MAX_CONTINUATIONS: usize = 50;

/// Where and as whom to talk to the MediaWiki API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: user_agent(),
        }
    }
}

/// A [`Lookup`] backed by the MediaWiki Action API.
pub struct WikipediaClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl WikipediaClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Batch> {
        let url = build_url(&self.config.api_url, params)?;
        log::debug!("GET {url}");

        let resp = self.http.get(url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Wikipedia API error ({}): {}", status, text);
        }

        // Undecodable bytes are replaced, never fatal.
        let bytes = resp.bytes().await?;
        parse_response(&String::from_utf8_lossy(&bytes))
    }
}

#[async_trait]
impl Lookup for WikipediaClient {
    async fn summary(&self, topic: &str, sentences: u32) -> Result<String> {
        let mut params = vec![
            ("prop", "extracts".to_string()),
            ("explaintext", "1".to_string()),
            ("exintro", "1".to_string()),
            ("titles", topic.to_string()),
        ];
        if sentences > 0 {
            params.push(("exsentences", sentences.to_string()));
        }

        let batch = self.query(&params).await?;
        let page = single_page(batch.query, topic)?;
        Ok(page.extract.unwrap_or_default())
    }

    async fn page(&self, topic: &str) -> Result<Page> {
        let params = [
            ("prop", "extracts|coordinates|extlinks|pageprops".to_string()),
            ("explaintext", "1".to_string()),
            ("colimit", "max".to_string()),
            ("ellimit", "max".to_string()),
            ("ppprop", "disambiguation".to_string()),
            ("titles", topic.to_string()),
        ];

        let batch = self.query(&params).await?;
        let mut page = single_page(batch.query, topic)?;

        // Long link lists come in several batches.
        let mut next = batch.next;
        let mut rounds = 0;
        while !next.is_empty() {
            if rounds == MAX_CONTINUATIONS {
                log::warn!("{topic}: stopped after {rounds} continuations, links may be incomplete");
                break;
            }
            rounds += 1;

            let batch = {
                let mut more = params.to_vec();
                more.extend(next.iter().map(|(k, v)| (k.as_str(), v.clone())));
                self.query(&more).await?
            };
            if let Some(rest) = batch.query.pages.into_iter().next() {
                page.absorb(rest);
            }
            next = batch.next;
        }

        Ok(page.into_page())
    }

    async fn geosearch(&self, geo: &GeoQuery) -> Result<Vec<String>> {
        let point = format!("{}|{}", geo.lat, geo.long);

        // A named page is judged by its own distance, not by its rank
        // among the nearest hits.
        if let Some(title) = &geo.title {
            let params = [
                ("prop", "coordinates".to_string()),
                ("codistancefrompoint", point),
                ("titles", title.clone()),
            ];
            let batch = self.query(&params).await?;
            return Ok(titles_in_area(batch.query, geo.radius));
        }

        let params = [
            ("list", "geosearch".to_string()),
            ("gscoord", point),
            ("gsradius", geo.radius.to_string()),
            ("gslimit", geo.results.to_string()),
        ];
        let batch = self.query(&params).await?;
        Ok(geosearch_titles(batch.query))
    }
}

fn build_url(api_url: &str, params: &[(&str, String)]) -> Result<reqwest::Url> {
    let mut all: Vec<(&str, &str)> = vec![
        ("action", "query"),
        ("format", "json"),
        ("formatversion", "2"),
        ("redirects", "1"),
    ];
    all.extend(params.iter().map(|(k, v)| (*k, v.as_str())));
    reqwest::Url::parse_with_params(api_url, &all)
        .with_context(|| format!("invalid API url: {api_url}"))
}

fn parse_response(text: &str) -> Result<Batch> {
    let resp: ApiResponse = serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("failed to parse Wikipedia response: {}\nraw: {}", e, text))?;

    if let Some(err) = resp.error {
        bail!("Wikipedia API error {}: {}", err.code, err.info);
    }

    let next = resp
        .next
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect();

    Ok(Batch {
        query: resp.query.unwrap_or_default(),
        next,
    })
}

/// The one page a `titles=<topic>` query is about.
fn single_page(query: Query, topic: &str) -> Result<ApiPage> {
    let Some(page) = query.pages.into_iter().next() else {
        bail!("page not found: {topic}");
    };
    if page.missing || page.invalid {
        bail!("page not found: {topic}");
    }
    if page.is_disambiguation() {
        bail!(
            "\"{}\" is a disambiguation page; ask for a more specific topic",
            page.title
        );
    }
    Ok(page)
}

fn geosearch_titles(query: Query) -> Vec<String> {
    query.geosearch.into_iter().map(|hit| hit.title).collect()
}

/// Titles of the queried pages lying within `radius` meters of the point
/// their distances were measured from.
fn titles_in_area(query: Query, radius: u32) -> Vec<String> {
    let radius = f64::from(radius);
    query
        .pages
        .into_iter()
        .filter(|p| !p.missing && !p.invalid)
        .filter(|p| {
            p.coordinates
                .iter()
                .any(|c| c.dist.is_some_and(|d| d <= radius))
        })
        .map(|p| p.title)
        .collect()
}

// --- API types ---

/// One API answer plus the parameters that fetch the rest of it.
#[derive(Debug)]
struct Batch {
    query: Query,
    next: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    error: Option<ApiError>,
    query: Option<Query>,
    #[serde(rename = "continue")]
    next: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize, Default)]
struct Query {
    #[serde(default)]
    pages: Vec<ApiPage>,
    #[serde(default)]
    geosearch: Vec<GeoHit>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    extract: Option<String>,
    #[serde(default)]
    coordinates: Vec<Coordinate>,
    #[serde(default)]
    extlinks: Vec<ExtLink>,
    pageprops: Option<PageProps>,
}

impl ApiPage {
    fn is_disambiguation(&self) -> bool {
        self.pageprops
            .as_ref()
            .is_some_and(|p| p.disambiguation.is_some())
    }

    /// Merge a continuation batch for the same page.
    fn absorb(&mut self, rest: ApiPage) {
        if self.extract.is_none() {
            self.extract = rest.extract;
        }
        self.coordinates.extend(rest.coordinates);
        self.extlinks.extend(rest.extlinks);
    }

    fn into_page(self) -> Page {
        let coordinates = self
            .coordinates
            .iter()
            .find(|c| c.primary)
            .or_else(|| self.coordinates.first())
            .map(|c| (c.lat, c.lon));

        Page {
            title: self.title,
            content: self.extract.unwrap_or_default(),
            coordinates,
            references: self.extlinks.into_iter().map(|l| l.url).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Coordinate {
    lat: f64,
    lon: f64,
    #[serde(default)]
    primary: bool,
    /// Meters from `codistancefrompoint`, when asked for.
    dist: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExtLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    disambiguation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoHit {
    title: String,
}
