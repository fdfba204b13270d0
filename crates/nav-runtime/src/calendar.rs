use anyhow::{bail, Result};

use nav_calendar::{CalendarSpec, ExchangeCalendar};
use nav_config::{CalendarKind, EngineConfig};

/// Build the session calendar described by `calendar.*`.
pub fn calendar_from_config(cfg: &EngineConfig) -> Result<ExchangeCalendar> {
    let c = &cfg.calendar;
    let open = c.open_time()?;
    let close = c.close_time()?;
    if open >= close {
        bail!("CONFIG_INVALID calendar.open {} must be before calendar.close {}", c.open, c.close);
    }
    let spec = match c.kind {
        CalendarKind::Nyse => CalendarSpec::NyseWeekdays,
        CalendarKind::AlwaysOn => CalendarSpec::AlwaysOn,
    };
    Ok(ExchangeCalendar::with_session(spec, c.exchange_tz, open, close))
}
