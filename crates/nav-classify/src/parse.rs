//! Field parsers. Upstream values are untrusted strings; every failure names
//! the record and the field.

use std::str::FromStr;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use nav_schemas::{Instrument, OptionContract, OptionRight, RawInstrument, DEFAULT_OPTION_MULTIPLIER};

use crate::rule::{asset_class, has_option_descriptor, AssetClass};
use crate::ClassifyError;

fn clean(raw: &str) -> String {
    raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect()
}

pub(crate) fn decimal(external_id: &str, field: &'static str, raw: &str) -> Result<Decimal, ClassifyError> {
    let s = clean(raw);
    Decimal::from_str(&s).map_err(|_| ClassifyError::InvalidDecimal {
        external_id: external_id.to_string(),
        field,
        raw: raw.to_string(),
    })
}

/// `None` and blank both mean absent.
pub(crate) fn opt_decimal(
    external_id: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<Decimal>, ClassifyError> {
    match raw {
        Some(s) if !s.trim().is_empty() => decimal(external_id, field, s).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn quantity(external_id: &str, raw: &str) -> Result<i64, ClassifyError> {
    let d = decimal(external_id, "quantity", raw)?;
    let invalid = || ClassifyError::InvalidQuantity {
        external_id: external_id.to_string(),
        raw: raw.to_string(),
    };
    if d.fract() != Decimal::ZERO {
        return Err(invalid());
    }
    i64::try_from(d.trunc()).map_err(|_| invalid())
}

/// Accepts RFC 3339 (explicit offset) or exchange-local
/// `YYYYMMDD;HHMMSS`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// and bare dates (`YYYY-MM-DD`, `YYYYMMDD`, taken as local midnight).
pub(crate) fn timestamp(external_id: &str, raw: &str, tz: Tz) -> Result<DateTime<Utc>, ClassifyError> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    const LOCAL_FORMATS: &[&str] = &[
        "%Y%m%d;%H%M%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d, %H:%M:%S",
    ];
    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| date(s).map(|d| d.and_time(NaiveTime::MIN)));

    match naive {
        Some(n) => Ok(local_to_utc(tz, n)),
        None => Err(ClassifyError::InvalidTimestamp {
            external_id: external_id.to_string(),
            raw: raw.to_string(),
        }),
    }
}

fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        // Inside a spring-forward gap: the wall clock skipped this hour.
        LocalResult::None => match tz.from_local_datetime(&(naive + chrono::Duration::hours(1))) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
            LocalResult::None => Utc.from_utc_datetime(&naive),
        },
    }
}

pub(crate) fn date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}

fn right(raw: &str) -> Option<OptionRight> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "C" | "CALL" => Some(OptionRight::Call),
        "P" | "PUT" => Some(OptionRight::Put),
        _ => None,
    }
}

/// OCC option symbol, e.g. `SPY   240614C00628000`.
pub(crate) fn occ_symbol(symbol: &str) -> Option<OptionContract> {
    let compact: String = symbol.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() <= 15 || !compact.is_ascii() {
        return None;
    }
    let (root, tail) = compact.split_at(compact.len() - 15);
    let expiry = NaiveDate::parse_from_str(&tail[0..6], "%y%m%d").ok()?;
    let right = right(&tail[6..7])?;
    let strike_milli: i64 = tail[7..15].parse().ok()?;
    Some(OptionContract {
        underlying: root.to_string(),
        strike: Decimal::new(strike_milli, 3).normalize(),
        right,
        expiry,
        multiplier: DEFAULT_OPTION_MULTIPLIER,
    })
}

fn option_contract(external_id: &str, raw: &RawInstrument) -> Result<OptionContract, ClassifyError> {
    let invalid = |reason: String| ClassifyError::InvalidInstrument {
        external_id: external_id.to_string(),
        reason,
    };

    if !has_option_descriptor(raw) {
        return occ_symbol(&raw.symbol)
            .ok_or_else(|| invalid(format!("option '{}' lacks strike/right/expiry", raw.symbol)));
    }

    let underlying = raw
        .underlying
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| occ_symbol(&raw.symbol).map(|c| c.underlying))
        .or_else(|| {
            let s = raw.symbol.trim();
            (!s.is_empty()).then(|| s.split_whitespace().next().unwrap_or(s).to_string())
        })
        .ok_or_else(|| invalid("option without underlying".to_string()))?;

    let strike_raw = raw.strike.as_deref().unwrap_or_default();
    let strike = decimal(external_id, "strike", strike_raw)?;
    let right_raw = raw.right.as_deref().unwrap_or_default();
    let right = right(right_raw).ok_or_else(|| invalid(format!("unknown option right '{right_raw}'")))?;
    let expiry_raw = raw.expiry.as_deref().unwrap_or_default();
    let expiry = date(expiry_raw).ok_or_else(|| invalid(format!("unparseable expiry '{expiry_raw}'")))?;
    let multiplier = match raw.multiplier.as_deref() {
        Some(m) if !m.trim().is_empty() => quantity(external_id, m)?,
        _ => DEFAULT_OPTION_MULTIPLIER,
    };
    if multiplier <= 0 {
        return Err(invalid(format!("non-positive multiplier {multiplier}")));
    }

    Ok(OptionContract {
        underlying,
        strike,
        right,
        expiry,
        multiplier,
    })
}

/// Instrument for trades and classified book entries.
///
/// A trade without an asset class is an equity unless it carries a complete
/// option descriptor or an OCC symbol.
pub(crate) fn instrument(external_id: &str, raw: &RawInstrument) -> Result<Instrument, ClassifyError> {
    let equity = || {
        let symbol = raw.symbol.trim();
        if symbol.is_empty() {
            Err(ClassifyError::InvalidInstrument {
                external_id: external_id.to_string(),
                reason: "empty symbol".to_string(),
            })
        } else {
            Ok(Instrument::equity(symbol))
        }
    };

    match asset_class(raw) {
        AssetClass::Option => option_contract(external_id, raw).map(Instrument::Option),
        AssetClass::Equity => equity(),
        AssetClass::Cash => Ok(Instrument::Cash {
            currency: raw.symbol.trim().to_ascii_uppercase(),
        }),
        AssetClass::Missing if has_option_descriptor(raw) => {
            option_contract(external_id, raw).map(Instrument::Option)
        }
        AssetClass::Missing => match occ_symbol(&raw.symbol) {
            Some(c) => Ok(Instrument::Option(c)),
            None => equity(),
        },
        AssetClass::Other => Err(ClassifyError::InvalidInstrument {
            external_id: external_id.to_string(),
            reason: format!(
                "unsupported asset class '{}'",
                raw.asset_class.as_deref().unwrap_or_default()
            ),
        }),
    }
}
