use std::sync::Arc;
use std::time::Duration;

use wikibus::bus::local::LocalBus;
use wikibus::bus::{Bus, BusMessage};
use wikibus::handler::{HandlerConfig, RequestHandler};
use wikibus::lookup::Page;
use wikibus::lookup::mock::MockLookup;
use wikibus::stdio::{print_responses, pump, run_once};

#[tokio::test]
async fn pump_publishes_each_non_empty_line() {
    let bus = Arc::new(LocalBus::default());
    let mut inbox = bus.subscribe("wikipedia").await.unwrap();

    let input: &[u8] = b"{\"topic\": \"Germany\"}\n\n   \n{\"topic\": \"Love\"}  \n";
    let sent = pump(input, bus.clone(), "wikipedia").await.unwrap();

    assert_eq!(sent, 2);
    assert_eq!(inbox.recv().await.unwrap().content, r#"{"topic": "Germany"}"#);
    assert_eq!(inbox.recv().await.unwrap().content, r#"{"topic": "Love"}"#);
}

#[tokio::test]
async fn pump_on_empty_input_sends_nothing() {
    let bus = Arc::new(LocalBus::default());
    let sent = pump(&b""[..], bus, "wikipedia").await.unwrap();
    assert_eq!(sent, 0);
}

#[tokio::test]
async fn print_responses_skips_requests() {
    let bus = LocalBus::default();
    let monitor = bus.monitor();

    let req = BusMessage::new("wikipedia", r#"{"topic": "Germany"}"#);
    bus.publish(req.clone()).await.unwrap();
    bus.publish(req.response(r#"{"content":"..."}"#)).await.unwrap();
    drop(bus);

    let mut out: Vec<u8> = Vec::new();
    let printed = print_responses(monitor, &mut out).await.unwrap();

    assert_eq!(printed, 1);
    assert_eq!(String::from_utf8(out).unwrap(), "{\"content\":\"...\"}\n");
}

fn handler(bus: Arc<LocalBus>, strict: bool) -> RequestHandler {
    let lookup = Arc::new(MockLookup::new().with_page(Page {
        title: "Germany".to_string(),
        content: "Germany is a country in Central Europe. Its capital is Berlin.".to_string(),
        coordinates: Some((51.0, 9.0)),
        references: vec![],
    }));
    RequestHandler::new(
        bus,
        lookup,
        HandlerConfig {
            strict,
            ..HandlerConfig::default()
        },
    )
}

#[tokio::test]
async fn run_once_returns_error_and_follow_up() {
    let bus = Arc::new(LocalBus::default());
    let handler = handler(bus.clone(), false);
    let mut monitor = bus.monitor();

    // Someone else's reply on the bus is not ours.
    let other = BusMessage::new("wikipedia", "{}");
    bus.publish(other.response(r#"{"summary":"not ours"}"#))
        .await
        .unwrap();

    let req = BusMessage::new("wikipedia", r#"{"topic": "Germany", "summary": 1, "references": "nope"}"#);
    let replies = run_once(&handler, &mut monitor, req.clone()).await;

    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r.id == req.id));
    assert!(replies[0].content.contains("error"));
    assert!(replies[1].content.contains("Germany is a country"));
}

#[tokio::test]
async fn run_once_returns_at_once_when_the_request_is_abandoned() {
    let bus = Arc::new(LocalBus::default());
    let handler = handler(bus.clone(), false);
    let mut monitor = bus.monitor();

    let replies = tokio::time::timeout(
        Duration::from_secs(1),
        run_once(&handler, &mut monitor, BusMessage::new("wikipedia", "{}")),
    )
    .await
    .expect("run_once kept waiting after the error reply");

    assert_eq!(replies.len(), 1);
    assert!(replies[0].content.contains("no topic supplied"));
}

#[tokio::test]
async fn run_once_strict_stops_at_error() {
    let bus = Arc::new(LocalBus::default());
    let handler = handler(bus.clone(), true);
    let mut monitor = bus.monitor();

    let req = BusMessage::new("wikipedia", r#"{"topic": "Germany", "summary": 0}"#);
    let replies = run_once(&handler, &mut monitor, req).await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].content.contains("error"));
}

#[tokio::test]
async fn run_once_on_lookup_failure_returns_nothing() {
    let bus = Arc::new(LocalBus::default());
    let handler = handler(bus.clone(), false);
    let mut monitor = bus.monitor();

    let req = BusMessage::new("wikipedia", r#"{"topic": "Atlantis", "summary": 1}"#);
    assert!(run_once(&handler, &mut monitor, req).await.is_empty());
}
