use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use nav_schemas::RawTrade;

use crate::LiveError;

/// Current account value as the session reports it. Not reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub net_liquidation: Decimal,
    pub currency: String,
    pub as_of: DateTime<Utc>,
}

/// Broker session endpoints used by the live path.
#[async_trait::async_trait]
pub trait LiveSessionApi: Send + Sync {
    async fn account_summary(&self) -> Result<AccountSummary, LiveError>;

    /// Fills since the start of the current session, in the same raw shape
    /// the historical report uses for trades.
    async fn todays_fills(&self) -> Result<Vec<RawTrade>, LiveError>;
}
