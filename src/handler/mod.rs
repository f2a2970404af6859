//! Turns a lookup request on the bus into a lookup response.
//!
//! ```text
//! {"topic": "Germany", "summary": 2}                    -> {"summary": "..."}
//! {"topic": "Germany", "coordinates": "true"}           -> {"coordinates": "...", "content": "..."}
//! {"topic": "Berlin",  "summary": 1,
//!  "geosearch": {"lat": 52.5, "long": 13.4, "radius": 1000}}
//!                                                       -> {"summary": "...", "geosearch": [...]}
//! ```
//!
//! Without `summary` the caller gets the whole article under `content`.
//! The article is fetched at most once per request.

pub mod request;
pub mod validate;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::bus::{Bus, BusMessage, MessageHandler};
use crate::consts::DEFAULT_GEO_RESULTS;
use crate::lookup::{GeoQuery, Lookup, Page};

pub use validate::{ValidationError, validate};

/// What to put under `references` in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencesMode {
    /// The rendered coordinates, exactly like the `coordinates` field.
    /// Existing callers were built against this.
    #[default]
    Coordinates,
    /// The article's external links.
    Links,
}

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Publish only the error for an invalid request, with no follow-up reply.
    pub strict: bool,
    pub references: ReferencesMode,
    /// Result count passed to every geosearch.
    pub geo_results: u32,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            strict: false,
            references: ReferencesMode::default(),
            geo_results: DEFAULT_GEO_RESULTS,
        }
    }
}

/// Answers lookup requests. Holds no per-request state, so one instance
/// can serve any number of concurrent messages.
pub struct RequestHandler {
    bus: Arc<dyn Bus>,
    lookup: Arc<dyn Lookup>,
    config: HandlerConfig,
}

impl RequestHandler {
    pub fn new(bus: Arc<dyn Bus>, lookup: Arc<dyn Lookup>, config: HandlerConfig) -> Self {
        Self {
            bus,
            lookup,
            config,
        }
    }

    async fn reply(&self, request: &BusMessage, body: Value) -> Result<()> {
        let response = self.bus.make_response(request, body.to_string());
        self.bus.publish(response).await
    }

    /// Issue the lookups `request` asks for and collect their results.
    async fn assemble(&self, request: &Map<String, Value>) -> Result<Map<String, Value>> {
        let topic = request::topic(request)?;
        let mut response = Map::new();
        let mut page = LazyPage::new(self.lookup.as_ref(), &topic);

        let wants_content = match request::present(request, "summary") {
            Some(sentences) => {
                let sentences = request::sentences(sentences)?;
                let summary = self.lookup.summary(&topic, sentences).await?;
                response.insert("summary".to_string(), Value::String(summary));
                false
            }
            None => true,
        };

        if let Some(geo) = request::present(request, "geosearch") {
            let (lat, long, radius) = request::geo_params(geo)?;
            let query = GeoQuery {
                lat,
                long,
                title: Some(topic.clone()),
                results: self.config.geo_results,
                radius,
            };
            let titles = self.lookup.geosearch(&query).await?;
            response.insert("geosearch".to_string(), json!(titles));
        }

        if request::wants(request, "coordinates") {
            let rendered = render_coordinates(page.get().await?.coordinates);
            response.insert("coordinates".to_string(), Value::String(rendered));
        }

        if request::wants(request, "references") {
            let page = page.get().await?;
            let references = match self.config.references {
                ReferencesMode::Coordinates => {
                    Value::String(render_coordinates(page.coordinates))
                }
                ReferencesMode::Links => json!(page.references),
            };
            response.insert("references".to_string(), references);
        }

        if wants_content {
            let content = page.get().await?.content.clone();
            response.insert("content".to_string(), Value::String(content));
        }

        Ok(response)
    }
}

#[async_trait]
impl MessageHandler for RequestHandler {
    async fn handle(&self, message: BusMessage) -> Result<()> {
        let mut request = match serde_json::from_str::<Value>(&message.content) {
            Ok(Value::Object(map)) => map,
            _ => {
                log::warn!("[{}] bad json: {}", message.id, message.content);
                let error = format!("Bad json in wikipedia request: {}", message.content);
                return self.reply(&message, json!({ "error": error })).await;
            }
        };

        if let Err(e) = validate(&mut request) {
            log::warn!("[{}] invalid request: {}", message.id, e);
            self.reply(&message, json!({ "error": e.to_string() })).await?;
            if self.config.strict {
                return Ok(());
            }
            // Lenient mode: callers also get whatever the request still
            // yields, as a second reply.
        }

        let response = self
            .assemble(&request)
            .await
            .with_context(|| format!("request {} abandoned", message.id))?;

        log::info!(
            "[{}] answered {} field(s) for {}",
            message.id,
            response.len(),
            request::display_value(request.get("topic").unwrap_or(&Value::Null))
        );
        self.reply(&message, Value::Object(response)).await
    }
}

/// The article for one request, fetched on first use.
struct LazyPage<'a> {
    lookup: &'a dyn Lookup,
    topic: &'a str,
    page: Option<Page>,
}

impl<'a> LazyPage<'a> {
    fn new(lookup: &'a dyn Lookup, topic: &'a str) -> Self {
        Self {
            lookup,
            topic,
            page: None,
        }
    }

    async fn get(&mut self) -> Result<&Page> {
        let page = match self.page.take() {
            Some(page) => page,
            None => self.lookup.page(self.topic).await?,
        };
        Ok(self.page.insert(page))
    }
}

/// `{"lat" : "<lat>", "long" : "<long>"}`, or `"None"` (quotes included)
/// for an article without coordinates.
pub fn render_coordinates(coordinates: Option<(f64, f64)>) -> String {
    match coordinates {
        Some((lat, long)) => format!(r#"{{"lat" : "{lat:?}", "long" : "{long:?}"}}"#),
        None => r#""None""#.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_coordinates_keeps_decimals() {
        assert_eq!(
            render_coordinates(Some((51.0, 9.0))),
            r#"{"lat" : "51.0", "long" : "9.0"}"#
        );
        assert_eq!(
            render_coordinates(Some((52.516666, 13.383333))),
            r#"{"lat" : "52.516666", "long" : "13.383333"}"#
        );
    }

    #[test]
    fn render_missing_coordinates() {
        assert_eq!(render_coordinates(None), "\"None\"");
    }

    #[test]
    fn default_config_is_lenient() {
        let config = HandlerConfig::default();
        assert!(!config.strict);
        assert_eq!(config.references, ReferencesMode::Coordinates);
        assert_eq!(config.geo_results, DEFAULT_GEO_RESULTS);
    }
}
