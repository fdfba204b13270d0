//! nav-schemas
//!
//! Shared data model for the NAV reconciliation engine.
//!
//! - `raw`: broker wire shapes (string-typed, untrusted) as delivered by the
//!   report fetcher and the live session adapter.
//! - `event`: the canonical [`LedgerEvent`] produced by the classifier.
//! - `nav`: day-level records (NAV checkpoints, import checkpoints, carry-over
//!   state, correction audit rows).
//!
//! Money is `rust_decimal::Decimal` everywhere. No floats.

mod event;
mod nav;
mod raw;

pub use event::{
    sort_events, EventFlag, EventKind, EventSource, Instrument, LedgerEvent, OptionContract,
    OptionRight,
};
pub use nav::{
    AssignmentPosition, CarryOverState, CorrectionReason, DailyNAVRecord, EventCorrection,
    ImportCheckpoint, OptionLot,
};
pub use raw::{
    RawBookEntry, RawCashTransaction, RawInstrument, RawRecord, RawReport, RawTrade,
};

/// Default contract multiplier for US equity options.
pub const DEFAULT_OPTION_MULTIPLIER: i64 = 100;
