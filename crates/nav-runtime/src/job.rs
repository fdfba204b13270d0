use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use nav_audit::{AuditRecord, AuditWriter};
use nav_calendar::ExchangeCalendar;
use nav_classify::{classify_batch, ClassifyContext};
use nav_config::EngineConfig;
use nav_db::{LedgerStore, UpsertReport};
use nav_fetch::{report_digest, ReportApi, ReportFetcher, ReportPeriod};
use nav_live::{merge_timeline, LiveDay};
use nav_narrative::{DailyNarrative, DayInput, NarrativeEngine};
use nav_reconcile::{
    report, report_opening, DriftAction, DriftContext, DriftPolicy, DriftReport, OpeningReport,
};
use nav_schemas::{EventSource, ImportCheckpoint, RawReport};

use crate::calendar_from_config;

/// Broker-published NAV figures for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OfficialNav {
    pub opening: Option<Decimal>,
    pub closing: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub period_key: String,
    /// Same digest as the last applied import of this period.
    pub skipped_unchanged: bool,
    pub events: usize,
    pub issues: usize,
    pub rejected: Vec<String>,
    pub upsert: UpsertReport,
    pub superseded_live: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayOutcome {
    pub narrative: DailyNarrative,
    pub opening: OpeningReport,
    pub drift: DriftReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRunOutcome {
    pub ingest: Option<IngestOutcome>,
    pub live: Option<UpsertReport>,
    pub day: DayOutcome,
}

pub struct DailyJob<'a, S: LedgerStore + ?Sized> {
    cfg: &'a EngineConfig,
    store: &'a S,
    engine: NarrativeEngine,
    classify: ClassifyContext,
    audit: Option<AuditWriter>,
    run_id: Uuid,
}

impl<'a, S: LedgerStore + ?Sized> DailyJob<'a, S> {
    pub fn new(cfg: &'a EngineConfig, store: &'a S) -> Result<Self> {
        cfg.validate()?;
        let calendar = calendar_from_config(cfg)?;
        Ok(Self {
            cfg,
            store,
            engine: NarrativeEngine::new(calendar, cfg.grouping_window()),
            classify: ClassifyContext::historical(cfg),
            audit: None,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn with_audit(mut self, writer: AuditWriter) -> Self {
        self.audit = Some(writer);
        self
    }

    /// Continue the audit log named by `audit.path`, if any.
    pub fn with_configured_audit(self) -> Result<Self> {
        match self.cfg.audit.path.as_deref() {
            Some(path) => {
                let writer = AuditWriter::resume(path, self.cfg.audit.hash_chain)
                    .with_context(|| format!("open audit log {path}"))?;
                Ok(self.with_audit(writer))
            }
            None => Ok(self),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn calendar(&self) -> &ExchangeCalendar {
        self.engine.calendar()
    }

    fn audit(&mut self, record: AuditRecord) -> Result<()> {
        if let Some(writer) = self.audit.as_mut() {
            writer
                .append_record(self.run_id, &record)
                .with_context(|| format!("append audit {}", record.event_type()))?;
        }
        Ok(())
    }

    /// Fetch one report period. Failures are audited before being returned.
    pub async fn fetch<A: ReportApi>(
        &mut self,
        fetcher: &ReportFetcher<A>,
        period: &ReportPeriod,
    ) -> Result<RawReport> {
        match fetcher.fetch(period).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.audit(AuditRecord::FetchFailed {
                    period_key: period.period_key(),
                    retryable: e.is_retryable(),
                    message: e.message().to_string(),
                })?;
                Err(e).with_context(|| format!("fetch report {}", period.period_key()))
            }
        }
    }

    /// Classify and upsert a historical report, retire the live rows it now
    /// covers, and checkpoint the period. A report identical to the last one
    /// applied for `period_key` is skipped.
    pub async fn ingest_report(&mut self, period_key: &str, report: &RawReport) -> Result<IngestOutcome> {
        let digest = report_digest(report);
        let previous = self
            .store
            .checkpoint(EventSource::HistoricalReport, period_key)
            .await
            .context("load import checkpoint")?;
        if previous.is_some_and(|c| c.report_digest == digest) {
            info!(period_key, "report unchanged since last import; skipped");
            return Ok(IngestOutcome {
                period_key: period_key.to_string(),
                skipped_unchanged: true,
                ..IngestOutcome::default()
            });
        }

        let batch = classify_batch(&report.records, &self.classify);
        let upsert = self
            .store
            .upsert(&batch.events)
            .await
            .context("upsert historical events")?;
        for c in &upsert.corrections {
            self.audit(AuditRecord::Correction(c.clone()))?;
        }
        for (external_id, field) in &upsert.frozen_rejections {
            warn!(%external_id, %field, "restatement outside the grace window rejected");
            self.audit(AuditRecord::FrozenRestatementRejected {
                external_id: external_id.clone(),
                field: field.clone(),
            })?;
        }

        let calendar = self.engine.calendar();
        let start = calendar.session_close(calendar.previous_trading_day(report.period_start));
        let end = calendar.session_close(report.period_end);
        let superseded = self
            .store
            .supersede_live(start, end)
            .await
            .context("supersede live events")?;
        for c in &superseded {
            self.audit(AuditRecord::LiveSuperseded {
                external_id: c.external_id.clone(),
                period_start: report.period_start,
                period_end: report.period_end,
            })?;
        }

        self.store
            .record_checkpoint(&ImportCheckpoint {
                source: EventSource::HistoricalReport,
                period_key: period_key.to_string(),
                period_start: report.period_start,
                period_end: report.period_end,
                report_digest: digest.clone(),
                events_seen: batch.events.len() as i64,
                applied_at: Utc::now(),
            })
            .await
            .context("record import checkpoint")?;
        self.audit(AuditRecord::ImportApplied {
            period_key: period_key.to_string(),
            report_digest: digest,
            inserted: upsert.inserted,
            updated: upsert.updated,
            unchanged: upsert.unchanged,
        })?;

        info!(
            period_key,
            events = batch.events.len(),
            inserted = upsert.inserted,
            updated = upsert.updated,
            corrected = upsert.corrected,
            rejected = batch.rejected.len(),
            superseded_live = superseded.len(),
            "report ingested"
        );
        Ok(IngestOutcome {
            period_key: period_key.to_string(),
            skipped_unchanged: false,
            events: batch.events.len(),
            issues: batch.issues.len(),
            rejected: batch.rejected.into_iter().map(|r| r.external_id).collect(),
            upsert,
            superseded_live: superseded.len(),
        })
    }

    /// Store today's provisional live events. Live events on days a
    /// historical report already covers are dropped before they reach the
    /// ledger.
    pub async fn ingest_live(&mut self, live: &LiveDay, covered_through: Option<NaiveDate>) -> Result<UpsertReport> {
        let events = merge_timeline(self.engine.calendar(), Vec::new(), live.events.clone(), covered_through);
        let upsert = self
            .store
            .upsert(&events)
            .await
            .context("upsert live events")?;
        info!(
            status = ?live.status,
            received = live.events.len(),
            stored = upsert.applied(),
            "live events ingested"
        );
        Ok(upsert)
    }

    /// Narrate and reconcile `date` from the ledger, then persist its NAV
    /// record and carry-over. `previous_close` overrides the stored official
    /// close of the previous trading day.
    pub async fn narrate(
        &mut self,
        date: NaiveDate,
        officials: OfficialNav,
        previous_close: Option<Decimal>,
    ) -> Result<DayOutcome> {
        let calendar = self.engine.calendar();
        if !calendar.is_trading_day(date) {
            bail!("{date} is not a trading day");
        }
        let prev_day = calendar.previous_trading_day(date);
        let (start, end) = calendar.day_window(date);

        let previous_official_close = match previous_close {
            Some(v) => v,
            None => self
                .store
                .nav_record(prev_day)
                .await
                .context("load previous NAV record")?
                .map(|r| r.official_closing_nav)
                .with_context(|| {
                    format!("no official close stored for {prev_day}; supply the previous close explicitly")
                })?,
        };

        let carry_over = self
            .store
            .load_carry_over(date)
            .await
            .context("load carry-over state")?
            .unwrap_or_default();
        if let Some(as_of) = carry_over.as_of {
            if as_of < prev_day {
                warn!(%as_of, %prev_day, "carry-over is older than the previous trading day");
            }
        }

        let events = self
            .store
            .events_for_period(start, end)
            .await
            .context("load day events")?;

        let narrative = self
            .engine
            .narrate_day(DayInput {
                date,
                previous_official_close,
                official_open: officials.opening,
                official_close: officials.closing,
                events,
                carry_over,
            })
            .with_context(|| format!("narrate {date}"))?;

        let ctx = DriftContext::from_narrative(&narrative);
        let policy = DriftPolicy::from_config(self.cfg);
        let drift = report(&narrative.record, &ctx, &policy);
        let opening = report_opening(&narrative.record, &ctx);
        if drift.action == DriftAction::Escalate {
            self.audit(AuditRecord::DriftEscalated {
                date,
                drift: drift.drift,
                threshold: policy.materiality_threshold,
                unexplained: drift.unexplained,
            })?;
        }

        self.store
            .save_nav_record(&narrative.record)
            .await
            .context("save NAV record")?;
        self.store
            .save_carry_over(&narrative.carry_over)
            .await
            .context("save carry-over state")?;

        Ok(DayOutcome {
            narrative,
            opening,
            drift,
        })
    }

    /// Full daily pass: optional historical report, optional live day, then
    /// narration and reconciliation of `date`.
    pub async fn run_daily(
        &mut self,
        date: NaiveDate,
        historical: Option<(&str, &RawReport)>,
        live: Option<&LiveDay>,
        officials: OfficialNav,
        previous_close: Option<Decimal>,
    ) -> Result<DailyRunOutcome> {
        let mut covered_through = None;
        let ingest = match historical {
            Some((period_key, report)) => {
                covered_through = Some(report.period_end);
                Some(self.ingest_report(period_key, report).await?)
            }
            None => None,
        };
        let live = match live {
            Some(day) => Some(self.ingest_live(day, covered_through).await?),
            None => None,
        };
        let day = self.narrate(date, officials, previous_close).await?;
        info!(
            %date,
            run_id = %self.run_id,
            drift = %day.drift.drift,
            action = ?day.drift.action,
            "daily run complete"
        );
        Ok(DailyRunOutcome { ingest, live, day })
    }
}
