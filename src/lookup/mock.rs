use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{GeoQuery, Lookup, Page};

/// A canned knowledge base for tests. Counts every call.
#[derive(Default)]
pub struct MockLookup {
    pages: HashMap<String, Page>,
    geo_results: Vec<String>,
    summary_calls: Mutex<Vec<(String, u32)>>,
    geo_calls: Mutex<Vec<GeoQuery>>,
    page_calls: AtomicUsize,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page under its title.
    pub fn with_page(mut self, page: Page) -> Self {
        self.pages.insert(page.title.clone(), page);
        self
    }

    /// Titles every geosearch returns.
    pub fn with_geo_results(mut self, titles: Vec<String>) -> Self {
        self.geo_results = titles;
        self
    }

    pub fn summary_calls(&self) -> Vec<(String, u32)> {
        self.summary_calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn geo_calls(&self) -> Vec<GeoQuery> {
        self.geo_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Total number of lookups of any kind.
    pub fn total_calls(&self) -> usize {
        self.summary_calls().len() + self.geo_calls().len() + self.page_calls()
    }

    fn find(&self, topic: &str) -> Result<&Page> {
        match self.pages.get(topic) {
            Some(page) => Ok(page),
            None => bail!("MockLookup: page not found: {topic}"),
        }
    }
}

/// First `n` sentences of `text` (all of it when `n` is 0).
fn first_sentences(text: &str, n: u32) -> String {
    if n == 0 {
        return text.to_string();
    }
    text.split_inclusive(". ")
        .take(n as usize)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[async_trait]
impl Lookup for MockLookup {
    async fn summary(&self, topic: &str, sentences: u32) -> Result<String> {
        if let Ok(mut calls) = self.summary_calls.lock() {
            calls.push((topic.to_string(), sentences));
        }
        let page = self.find(topic)?;
        Ok(first_sentences(&page.content, sentences))
    }

    async fn page(&self, topic: &str) -> Result<Page> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.find(topic).cloned()
    }

    async fn geosearch(&self, query: &GeoQuery) -> Result<Vec<String>> {
        if let Ok(mut calls) = self.geo_calls.lock() {
            calls.push(query.clone());
        }
        Ok(self.geo_results.clone())
    }
}
