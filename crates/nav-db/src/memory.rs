use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use nav_schemas::{
    sort_events, CarryOverState, DailyNAVRecord, EventCorrection, EventSource, ImportCheckpoint,
    LedgerEvent,
};

use crate::store::removal_correction;
use crate::{plan_upsert, retain_known_amounts, LedgerStore, StoreError, UpsertPlan, UpsertReport};

#[derive(Debug, Default)]
struct Inner {
    events: BTreeMap<String, LedgerEvent>,
    corrections: Vec<EventCorrection>,
    checkpoints: BTreeMap<(EventSource, String), ImportCheckpoint>,
    carry_over: BTreeMap<NaiveDate, CarryOverState>,
    nav_records: BTreeMap<NaiveDate, DailyNAVRecord>,
}

/// In-process ledger for tests and `--dry-run`. Same planning rules as the
/// Postgres store; nothing survives the process.
#[derive(Debug)]
pub struct MemoryLedgerStore {
    grace: Duration,
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub async fn event_count(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    pub async fn correction_count(&self) -> usize {
        self.inner.lock().await.corrections.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn upsert_at(&self, events: &[LedgerEvent], now: DateTime<Utc>) -> Result<UpsertReport, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut report = UpsertReport::default();
        for ev in events {
            let merged = retain_known_amounts(inner.events.get(&ev.external_id), ev);
            let ev: &LedgerEvent = &merged;
            let plan = plan_upsert(inner.events.get(&ev.external_id), ev, now, self.grace);
            match &plan {
                UpsertPlan::Insert => {
                    inner.events.insert(ev.external_id.clone(), ev.clone());
                }
                UpsertPlan::Apply { corrections, .. } => {
                    inner.events.insert(ev.external_id.clone(), ev.clone());
                    inner.corrections.extend(corrections.iter().cloned());
                }
                UpsertPlan::RejectFrozen { fields } => {
                    warn!(external_id = %ev.external_id, ?fields, "restatement of frozen event rejected");
                }
                UpsertPlan::Unchanged | UpsertPlan::HistoricalWins => {}
            }
            report.record(&ev.external_id, &plan);
        }
        debug!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            "memory upsert"
        );
        Ok(report)
    }

    async fn events_for_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>, StoreError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<LedgerEvent> = inner
            .events
            .values()
            .filter(|e| e.timestamp > start && e.timestamp <= end)
            .cloned()
            .collect();
        sort_events(&mut out);
        Ok(out)
    }

    async fn event(&self, external_id: &str) -> Result<Option<LedgerEvent>, StoreError> {
        Ok(self.inner.lock().await.events.get(external_id).cloned())
    }

    async fn corrections_for(&self, external_id: &str) -> Result<Vec<EventCorrection>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .corrections
            .iter()
            .filter(|c| c.external_id == external_id)
            .cloned()
            .collect())
    }

    async fn record_checkpoint(&self, checkpoint: &ImportCheckpoint) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.checkpoints.insert(
            (checkpoint.source, checkpoint.period_key.clone()),
            checkpoint.clone(),
        );
        Ok(())
    }

    async fn checkpoint(
        &self,
        source: EventSource,
        period_key: &str,
    ) -> Result<Option<ImportCheckpoint>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.checkpoints.get(&(source, period_key.to_string())).cloned())
    }

    async fn supersede_live_at(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventCorrection>, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut doomed: Vec<LedgerEvent> = inner
            .events
            .values()
            .filter(|e| e.source == EventSource::LiveSession && e.timestamp > start && e.timestamp <= end)
            .cloned()
            .collect();
        sort_events(&mut doomed);

        let mut out = Vec::with_capacity(doomed.len());
        for ev in doomed {
            inner.events.remove(&ev.external_id);
            let c = removal_correction(&ev, now);
            inner.corrections.push(c.clone());
            out.push(c);
        }
        Ok(out)
    }

    async fn save_carry_over(&self, state: &CarryOverState) -> Result<(), StoreError> {
        let as_of = state
            .as_of
            .ok_or_else(|| StoreError::Invalid("carry-over state without as_of date".to_string()))?;
        self.inner.lock().await.carry_over.insert(as_of, state.clone());
        Ok(())
    }

    async fn load_carry_over(&self, before: NaiveDate) -> Result<Option<CarryOverState>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .carry_over
            .range(..before)
            .next_back()
            .map(|(_, s)| s.clone()))
    }

    async fn save_nav_record(&self, record: &DailyNAVRecord) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .nav_records
            .insert(record.date, record.clone());
        Ok(())
    }

    async fn nav_record(&self, date: NaiveDate) -> Result<Option<DailyNAVRecord>, StoreError> {
        Ok(self.inner.lock().await.nav_records.get(&date).cloned())
    }
}
