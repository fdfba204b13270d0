use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, warn};

use nav_schemas::{
    CarryOverState, CorrectionReason, DailyNAVRecord, EventCorrection, EventFlag, EventKind,
    EventSource, ImportCheckpoint, Instrument, LedgerEvent,
};

use crate::store::removal_correction;
use crate::{plan_upsert, retain_known_amounts, LedgerStore, StoreError, UpsertPlan, UpsertReport};

const EVENT_COLUMNS: &str = r#"
    external_id, event_ts, source_tz, kind, instrument, quantity, price, commission,
    currency, fx_rate, cash_impact_local, cash_impact_reporting, realized_pnl,
    source, flags, description
"#;

/// Postgres-backed ledger. Every upsert batch runs in one transaction; rows
/// are locked `for update` while their plan is decided, so concurrent runs
/// over the same period serialize per event.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    grace: Duration,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, grace: Duration) -> Self {
        Self { pool, grace }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn event_from_row(row: &PgRow) -> Result<LedgerEvent, StoreError> {
    let external_id: String = row.try_get("external_id")?;
    let bad = |detail: String| StoreError::corrupt("ledger_events", external_id.clone(), detail);

    let tz_raw: String = row.try_get("source_tz")?;
    let source_tz: Tz = tz_raw
        .parse()
        .map_err(|e| bad(format!("source_tz '{tz_raw}': {e}")))?;
    let kind_raw: String = row.try_get("kind")?;
    let kind = EventKind::parse(&kind_raw).ok_or_else(|| bad(format!("kind '{kind_raw}'")))?;
    let source_raw: String = row.try_get("source")?;
    let source = EventSource::parse(&source_raw).ok_or_else(|| bad(format!("source '{source_raw}'")))?;
    let instrument: Instrument = serde_json::from_value(row.try_get::<Value, _>("instrument")?)
        .map_err(|e| bad(format!("instrument: {e}")))?;
    let flags: BTreeSet<EventFlag> = serde_json::from_value(row.try_get::<Value, _>("flags")?)
        .map_err(|e| bad(format!("flags: {e}")))?;

    Ok(LedgerEvent {
        timestamp: row.try_get("event_ts")?,
        source_tz,
        kind,
        instrument,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        commission: row.try_get("commission")?,
        currency: row.try_get("currency")?,
        fx_rate: row.try_get("fx_rate")?,
        cash_impact_local: row.try_get("cash_impact_local")?,
        cash_impact_reporting_ccy: row.try_get("cash_impact_reporting")?,
        realized_pnl: row.try_get("realized_pnl")?,
        source,
        flags,
        description: row.try_get("description")?,
        external_id,
    })
}

fn to_json<T: serde::Serialize>(table: &'static str, key: &str, v: &T) -> Result<Value, StoreError> {
    serde_json::to_value(v).map_err(|e| StoreError::corrupt(table, key, e))
}

async fn lock_event(
    tx: &mut Transaction<'_, Postgres>,
    external_id: &str,
) -> Result<Option<LedgerEvent>, StoreError> {
    let sql = format!("select {EVENT_COLUMNS} from ledger_events where external_id = $1 for update");
    let row = sqlx::query(&sql)
        .bind(external_id)
        .fetch_optional(&mut **tx)
        .await?;
    row.as_ref().map(event_from_row).transpose()
}

/// Insert or overwrite one ledger row. Returns rows affected; an insert that
/// lost a race to a concurrent writer affects zero.
async fn write_event(
    tx: &mut Transaction<'_, Postgres>,
    ev: &LedgerEvent,
    overwrite: bool,
) -> Result<u64, StoreError> {
    let conflict = if overwrite {
        r#"on conflict (external_id) do update set
            event_ts = excluded.event_ts,
            source_tz = excluded.source_tz,
            kind = excluded.kind,
            instrument = excluded.instrument,
            quantity = excluded.quantity,
            price = excluded.price,
            commission = excluded.commission,
            currency = excluded.currency,
            fx_rate = excluded.fx_rate,
            cash_impact_local = excluded.cash_impact_local,
            cash_impact_reporting = excluded.cash_impact_reporting,
            realized_pnl = excluded.realized_pnl,
            source = excluded.source,
            flags = excluded.flags,
            description = excluded.description,
            updated_at_utc = now()"#
    } else {
        "on conflict (external_id) do nothing"
    };
    let sql = format!(
        "insert into ledger_events ({EVENT_COLUMNS}) values \
         ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) {conflict}"
    );

    let res = sqlx::query(&sql)
        .bind(&ev.external_id)
        .bind(ev.timestamp)
        .bind(ev.source_tz.name())
        .bind(ev.kind.as_str())
        .bind(to_json("ledger_events", &ev.external_id, &ev.instrument)?)
        .bind(ev.quantity)
        .bind(ev.price)
        .bind(ev.commission)
        .bind(&ev.currency)
        .bind(ev.fx_rate)
        .bind(ev.cash_impact_local)
        .bind(ev.cash_impact_reporting_ccy)
        .bind(ev.realized_pnl)
        .bind(ev.source.as_str())
        .bind(to_json("ledger_events", &ev.external_id, &ev.flags)?)
        .bind(&ev.description)
        .execute(&mut **tx)
        .await?;
    Ok(res.rows_affected())
}

async fn insert_correction(
    tx: &mut Transaction<'_, Postgres>,
    c: &EventCorrection,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        insert into event_corrections (
          external_id, field, old_value, new_value, reason, recorded_at_utc
        ) values ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&c.external_id)
    .bind(&c.field)
    .bind(&c.old_value)
    .bind(&c.new_value)
    .bind(c.reason.as_str())
    .bind(c.recorded_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn upsert_at(&self, events: &[LedgerEvent], now: DateTime<Utc>) -> Result<UpsertReport, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut report = UpsertReport::default();

        for ev in events {
            let mut existing = lock_event(&mut tx, &ev.external_id).await?;
            let mut merged = retain_known_amounts(existing.as_ref(), ev);
            let mut plan = plan_upsert(existing.as_ref(), &merged, now, self.grace);

            if plan == UpsertPlan::Insert && write_event(&mut tx, ev, false).await? == 0 {
                // A concurrent run inserted it first; decide again against its row.
                existing = lock_event(&mut tx, &ev.external_id).await?;
                merged = retain_known_amounts(existing.as_ref(), ev);
                plan = plan_upsert(existing.as_ref(), &merged, now, self.grace);
            }
            let ev: &LedgerEvent = &merged;

            match &plan {
                UpsertPlan::Insert | UpsertPlan::Unchanged | UpsertPlan::HistoricalWins => {}
                UpsertPlan::Apply { corrections, .. } => {
                    write_event(&mut tx, ev, true).await?;
                    for c in corrections {
                        insert_correction(&mut tx, c).await?;
                    }
                }
                UpsertPlan::RejectFrozen { fields } => {
                    warn!(external_id = %ev.external_id, ?fields, "restatement of frozen event rejected");
                }
            }
            report.record(&ev.external_id, &plan);
        }

        tx.commit().await?;
        debug!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            corrected = report.corrected,
            "ledger upsert committed"
        );
        Ok(report)
    }

    async fn events_for_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>, StoreError> {
        let sql = format!(
            "select {EVENT_COLUMNS} from ledger_events \
             where event_ts > $1 and event_ts <= $2 \
             order by event_ts asc, external_id asc"
        );
        let rows = sqlx::query(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn event(&self, external_id: &str) -> Result<Option<LedgerEvent>, StoreError> {
        let sql = format!("select {EVENT_COLUMNS} from ledger_events where external_id = $1");
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn corrections_for(&self, external_id: &str) -> Result<Vec<EventCorrection>, StoreError> {
        let rows = sqlx::query(
            r#"
            select external_id, field, old_value, new_value, reason, recorded_at_utc
            from event_corrections
            where external_id = $1
            order by correction_id asc
            "#,
        )
        .bind(external_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<EventCorrection, StoreError> {
                let reason_raw: String = r.try_get("reason")?;
                let reason = CorrectionReason::parse(&reason_raw).ok_or_else(|| {
                    StoreError::corrupt("event_corrections", external_id, format!("reason '{reason_raw}'"))
                })?;
                Ok(EventCorrection {
                    external_id: r.try_get("external_id")?,
                    field: r.try_get("field")?,
                    old_value: r.try_get("old_value")?,
                    new_value: r.try_get("new_value")?,
                    reason,
                    recorded_at: r.try_get("recorded_at_utc")?,
                })
            })
            .collect()
    }

    async fn record_checkpoint(&self, cp: &ImportCheckpoint) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into import_checkpoints (
              source, period_key, period_start, period_end, report_digest, events_seen, applied_at_utc
            ) values ($1, $2, $3, $4, $5, $6, $7)
            on conflict (source, period_key) do update set
              period_start = excluded.period_start,
              period_end = excluded.period_end,
              report_digest = excluded.report_digest,
              events_seen = excluded.events_seen,
              applied_at_utc = excluded.applied_at_utc
            "#,
        )
        .bind(cp.source.as_str())
        .bind(&cp.period_key)
        .bind(cp.period_start)
        .bind(cp.period_end)
        .bind(&cp.report_digest)
        .bind(cp.events_seen)
        .bind(cp.applied_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn checkpoint(
        &self,
        source: EventSource,
        period_key: &str,
    ) -> Result<Option<ImportCheckpoint>, StoreError> {
        let row = sqlx::query(
            r#"
            select period_start, period_end, report_digest, events_seen, applied_at_utc
            from import_checkpoints
            where source = $1 and period_key = $2
            "#,
        )
        .bind(source.as_str())
        .bind(period_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<ImportCheckpoint, StoreError> {
            Ok(ImportCheckpoint {
                source,
                period_key: period_key.to_string(),
                period_start: r.try_get("period_start")?,
                period_end: r.try_get("period_end")?,
                report_digest: r.try_get("report_digest")?,
                events_seen: r.try_get("events_seen")?,
                applied_at: r.try_get("applied_at_utc")?,
            })
        })
        .transpose()
    }

    async fn supersede_live_at(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventCorrection>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "delete from ledger_events \
             where source = $1 and event_ts > $2 and event_ts <= $3 \
             returning {EVENT_COLUMNS}"
        );
        let rows = sqlx::query(&sql)
            .bind(EventSource::LiveSession.as_str())
            .bind(start)
            .bind(end)
            .fetch_all(&mut *tx)
            .await?;

        let mut removed = rows.iter().map(event_from_row).collect::<Result<Vec<_>, _>>()?;
        nav_schemas::sort_events(&mut removed);

        let mut out = Vec::with_capacity(removed.len());
        for ev in &removed {
            let c = removal_correction(ev, now);
            insert_correction(&mut tx, &c).await?;
            out.push(c);
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn save_carry_over(&self, state: &CarryOverState) -> Result<(), StoreError> {
        let as_of = state
            .as_of
            .ok_or_else(|| StoreError::Invalid("carry-over state without as_of date".to_string()))?;
        let json = to_json("carry_over_checkpoints", &as_of.to_string(), state)?;
        sqlx::query(
            r#"
            insert into carry_over_checkpoints (as_of, state, saved_at_utc)
            values ($1, $2, now())
            on conflict (as_of) do update set state = excluded.state, saved_at_utc = now()
            "#,
        )
        .bind(as_of)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_carry_over(&self, before: NaiveDate) -> Result<Option<CarryOverState>, StoreError> {
        let row = sqlx::query(
            r#"
            select as_of, state from carry_over_checkpoints
            where as_of < $1
            order by as_of desc
            limit 1
            "#,
        )
        .bind(before)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        let as_of: NaiveDate = r.try_get("as_of")?;
        let state: CarryOverState = serde_json::from_value(r.try_get::<Value, _>("state")?)
            .map_err(|e| StoreError::corrupt("carry_over_checkpoints", as_of.to_string(), e))?;
        Ok(Some(state))
    }

    async fn save_nav_record(&self, rec: &DailyNAVRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into daily_nav_records (
              nav_date, official_opening_nav, calculated_opening_nav,
              official_closing_nav, calculated_closing_nav, reconciliation_delta
            ) values ($1, $2, $3, $4, $5, $6)
            on conflict (nav_date) do update set
              official_opening_nav = excluded.official_opening_nav,
              calculated_opening_nav = excluded.calculated_opening_nav,
              official_closing_nav = excluded.official_closing_nav,
              calculated_closing_nav = excluded.calculated_closing_nav,
              reconciliation_delta = excluded.reconciliation_delta,
              recorded_at_utc = now()
            "#,
        )
        .bind(rec.date)
        .bind(rec.official_opening_nav)
        .bind(rec.calculated_opening_nav)
        .bind(rec.official_closing_nav)
        .bind(rec.calculated_closing_nav)
        .bind(rec.reconciliation_delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn nav_record(&self, date: NaiveDate) -> Result<Option<DailyNAVRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            select official_opening_nav, calculated_opening_nav, official_closing_nav,
                   calculated_closing_nav, reconciliation_delta
            from daily_nav_records
            where nav_date = $1
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<DailyNAVRecord, StoreError> {
            Ok(DailyNAVRecord {
                date,
                official_opening_nav: r.try_get::<Option<Decimal>, _>("official_opening_nav")?,
                calculated_opening_nav: r.try_get("calculated_opening_nav")?,
                official_closing_nav: r.try_get("official_closing_nav")?,
                calculated_closing_nav: r.try_get("calculated_closing_nav")?,
                reconciliation_delta: r.try_get("reconciliation_delta")?,
            })
        })
        .transpose()
    }
}
