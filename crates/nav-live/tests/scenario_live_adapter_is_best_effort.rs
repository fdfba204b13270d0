//! Live session adapter never fails the run.
//!
//! GREEN when:
//! - a healthy session yields classified `LiveSession` events and the NAV,
//! - a session slower than the timeout yields an empty `TimedOut` day,
//! - a failing endpoint yields a partial `Unavailable` day.

use std::time::Duration;

use httpmock::prelude::*;
use nav_classify::ClassifyContext;
use nav_config::EngineConfig;
use nav_live::{AccountSummary, HttpLiveSessionApi, LiveDataAdapter, LiveError, LiveSessionApi, LiveStatus};
use nav_schemas::{EventKind, EventSource, RawTrade};
use rust_decimal_macros::dec;
use serde_json::json;

fn fill_json(id: &str) -> serde_json::Value {
    json!({
        "external_id": id,
        "timestamp": "2024-06-13T14:05:00Z",
        "instrument": {"asset_class": "STK", "symbol": "SPY"},
        "quantity": "10",
        "price": "630.10",
        "commission": "-0.35",
        "currency": "USD"
    })
}

#[tokio::test]
async fn healthy_session_is_classified_as_live() {
    let server = MockServer::start_async().await;
    let account = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/session/account")
                .header("authorization", "Bearer live-token");
            then.status(200).json_body(json!({
                "net_liquidation": "79800.10",
                "currency": "USD",
                "as_of": "2024-06-13T15:00:00Z"
            }));
        })
        .await;
    let fills = server
        .mock_async(|when, then| {
            when.method(GET).path("/session/fills");
            then.status(200)
                .json_body(json!({"fills": [fill_json("L-2"), fill_json("L-1")]}));
        })
        .await;

    let api = HttpLiveSessionApi::new(server.base_url(), "live-token".to_string());
    let adapter = LiveDataAdapter::new(api, &EngineConfig::default());
    let day = adapter.current_day_events().await;

    account.assert_async().await;
    fills.assert_async().await;
    assert_eq!(day.status, LiveStatus::Ok);
    assert_eq!(day.nav, Some(dec!(79800.10)));
    assert_eq!(day.events.len(), 2);
    assert_eq!(day.events[0].external_id, "L-1");
    assert!(day
        .events
        .iter()
        .all(|e| e.source == EventSource::LiveSession && e.kind == EventKind::Trade));
    assert_eq!(day.events[0].commission, dec!(0.35));
}

#[tokio::test]
async fn failing_fills_endpoint_keeps_partial_result() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/session/account");
            then.status(200).json_body(json!({
                "net_liquidation": "79800.10",
                "currency": "USD",
                "as_of": "2024-06-13T15:00:00Z"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/session/fills");
            then.status(503);
        })
        .await;

    let api = HttpLiveSessionApi::new(server.base_url(), "live-token".to_string());
    let day = LiveDataAdapter::new(api, &EngineConfig::default())
        .current_day_events()
        .await;

    assert_eq!(day.status, LiveStatus::Unavailable);
    assert_eq!(day.nav, Some(dec!(79800.10)));
    assert!(day.events.is_empty());
}

struct StalledSession;

#[async_trait::async_trait]
impl LiveSessionApi for StalledSession {
    async fn account_summary(&self) -> Result<AccountSummary, LiveError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(LiveError::Transport("unreachable".to_string()))
    }

    async fn todays_fills(&self) -> Result<Vec<RawTrade>, LiveError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn stalled_session_times_out_empty() {
    let cfg = EngineConfig::default();
    let adapter = LiveDataAdapter::with_timeout(
        StalledSession,
        ClassifyContext::live(&cfg),
        Duration::from_millis(50),
    );

    let day = adapter.current_day_events().await;
    assert_eq!(day.status, LiveStatus::TimedOut);
    assert!(day.events.is_empty());
    assert_eq!(day.nav, None);
}
