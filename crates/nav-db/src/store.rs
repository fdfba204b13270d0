use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use nav_schemas::{
    CarryOverState, DailyNAVRecord, EventCorrection, EventSource, ImportCheckpoint, LedgerEvent,
};

use crate::{StoreError, UpsertPlan};

/// Outcome of one `upsert` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub inserted: u64,
    pub updated: u64,
    /// Identical replays, plus live rows ignored because historical data wins.
    pub unchanged: u64,
    /// Correction rows written.
    pub corrected: u64,
    /// Live rows replaced in place by settled historical data.
    pub superseded: u64,
    pub rejected_frozen: u64,
    /// The correction rows themselves, in write order.
    pub corrections: Vec<EventCorrection>,
    /// `(external_id, field)` for every restatement refused on a frozen row.
    pub frozen_rejections: Vec<(String, String)>,
}

impl UpsertReport {
    /// Rows actually written.
    pub fn applied(&self) -> u64 {
        self.inserted + self.updated
    }

    /// Fold one plan into the counters. Called by store implementations
    /// after the plan has been executed.
    pub fn record(&mut self, external_id: &str, plan: &UpsertPlan) {
        match plan {
            UpsertPlan::Insert => self.inserted += 1,
            UpsertPlan::Unchanged | UpsertPlan::HistoricalWins => self.unchanged += 1,
            UpsertPlan::Apply {
                corrections,
                superseded,
            } => {
                self.updated += 1;
                if *superseded {
                    self.superseded += 1;
                }
                self.corrected += corrections.len() as u64;
                self.corrections.extend(corrections.iter().cloned());
            }
            UpsertPlan::RejectFrozen { fields } => {
                self.rejected_frozen += 1;
                self.frozen_rejections
                    .extend(fields.iter().map(|f| (external_id.to_string(), f.clone())));
            }
        }
    }
}

/// Persistent ledger of classified events and day-level checkpoints.
///
/// Event time windows are half-open on the left: `(start, end]`, matching
/// the narrative day window `(close(D-1), close(D)]`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Idempotent upsert keyed by `external_id`. See [`crate::plan_upsert`].
    async fn upsert_at(&self, events: &[LedgerEvent], now: DateTime<Utc>) -> Result<UpsertReport, StoreError>;

    async fn upsert(&self, events: &[LedgerEvent]) -> Result<UpsertReport, StoreError> {
        self.upsert_at(events, Utc::now()).await
    }

    /// Events with `start < timestamp <= end`, in `(timestamp, external_id)` order.
    async fn events_for_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>, StoreError>;

    async fn event(&self, external_id: &str) -> Result<Option<LedgerEvent>, StoreError>;

    /// Correction trail for one event, oldest first.
    async fn corrections_for(&self, external_id: &str) -> Result<Vec<EventCorrection>, StoreError>;

    async fn record_checkpoint(&self, checkpoint: &ImportCheckpoint) -> Result<(), StoreError>;

    async fn checkpoint(
        &self,
        source: EventSource,
        period_key: &str,
    ) -> Result<Option<ImportCheckpoint>, StoreError>;

    /// Remove `LiveSession` rows in `(start, end]`, writing one
    /// `SUPERSEDED_BY_HISTORICAL` correction per removed row.
    async fn supersede_live_at(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventCorrection>, StoreError>;

    async fn supersede_live(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventCorrection>, StoreError> {
        self.supersede_live_at(start, end, Utc::now()).await
    }

    /// Overwrites any checkpoint for the same `as_of` day.
    async fn save_carry_over(&self, state: &CarryOverState) -> Result<(), StoreError>;

    /// Latest checkpoint strictly before `before`.
    async fn load_carry_over(&self, before: NaiveDate) -> Result<Option<CarryOverState>, StoreError>;

    async fn save_nav_record(&self, record: &DailyNAVRecord) -> Result<(), StoreError>;

    async fn nav_record(&self, date: NaiveDate) -> Result<Option<DailyNAVRecord>, StoreError>;
}

/// Correction row for a live event removed by a historical import.
pub(crate) fn removal_correction(ev: &LedgerEvent, now: DateTime<Utc>) -> EventCorrection {
    EventCorrection {
        external_id: ev.external_id.clone(),
        field: "event".to_string(),
        old_value: Some(format!(
            "{} {} x{} cash={}",
            ev.kind.as_str(),
            ev.instrument,
            ev.quantity,
            ev.cash_impact_local
                .map(|c| c.normalize().to_string())
                .unwrap_or_else(|| "null".to_string())
        )),
        new_value: None,
        reason: nav_schemas::CorrectionReason::SupersededByHistorical,
        recorded_at: now,
    }
}
