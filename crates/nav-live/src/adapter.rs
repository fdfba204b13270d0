use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nav_classify::{classify_batch, ClassifyContext};
use nav_config::EngineConfig;
use nav_schemas::{LedgerEvent, RawRecord};

use crate::LiveSessionApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveStatus {
    Ok,
    /// The session did not answer within the configured timeout.
    TimedOut,
    /// At least one endpoint failed; whatever did arrive is kept.
    Unavailable,
}

/// Today's provisional view of the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveDay {
    /// Classified fills, `source = LiveSession`, canonical order.
    pub events: Vec<LedgerEvent>,
    /// Session-reported net liquidation value, when available.
    pub nav: Option<Decimal>,
    pub status: LiveStatus,
    /// Fills the classifier refused.
    pub rejected: usize,
}

impl LiveDay {
    fn empty(status: LiveStatus) -> Self {
        Self {
            events: Vec::new(),
            nav: None,
            status,
            rejected: 0,
        }
    }
}

pub struct LiveDataAdapter<A: LiveSessionApi> {
    api: A,
    ctx: ClassifyContext,
    timeout: Duration,
}

impl<A: LiveSessionApi> LiveDataAdapter<A> {
    pub fn new(api: A, cfg: &EngineConfig) -> Self {
        Self::with_timeout(api, ClassifyContext::live(cfg), cfg.live_timeout())
    }

    pub fn with_timeout(api: A, ctx: ClassifyContext, timeout: Duration) -> Self {
        Self { api, ctx, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pull and classify today's session data. Never errors: failures are
    /// reported through [`LiveDay::status`].
    pub async fn current_day_events(&self) -> LiveDay {
        let pulled = tokio::time::timeout(self.timeout, async {
            tokio::join!(self.api.account_summary(), self.api.todays_fills())
        })
        .await;

        let (summary, fills) = match pulled {
            Ok(both) => both,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "live session timed out; continuing without live data");
                return LiveDay::empty(LiveStatus::TimedOut);
            }
        };

        let mut status = LiveStatus::Ok;
        let nav = match summary {
            Ok(s) => Some(s.net_liquidation),
            Err(e) => {
                warn!(error = %e, "live account summary unavailable");
                status = LiveStatus::Unavailable;
                None
            }
        };
        let records: Vec<RawRecord> = match fills {
            Ok(fills) => fills.into_iter().map(RawRecord::Trade).collect(),
            Err(e) => {
                warn!(error = %e, "live fills unavailable");
                status = LiveStatus::Unavailable;
                Vec::new()
            }
        };

        let outcome = classify_batch(&records, &self.ctx);
        info!(
            fills = records.len(),
            events = outcome.events.len(),
            rejected = outcome.rejected.len(),
            status = ?status,
            "live session pulled"
        );
        LiveDay {
            events: outcome.events,
            nav,
            status,
            rejected: outcome.rejected.len(),
        }
    }
}
