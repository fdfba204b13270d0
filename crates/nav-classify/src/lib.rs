//! nav-classify
//!
//! Event Classifier. The one boundary where untrusted upstream records
//! (string-typed decimals, exchange-local timestamps, generic "book" entries)
//! become canonical [`nav_schemas::LedgerEvent`]s.
//!
//! # Override rules
//! - Assignment cash impact is forced to zero, whatever the source says.
//! - A cash transfer without an amount is stored with `None`, never a guess.
//! - A book entry matching neither rule branch is stored `Unclassified`.
//!
//! Pure and synchronous: no IO, no clock.

mod classify;
mod error;
mod parse;
mod rule;

pub use classify::{classify, classify_batch, BatchOutcome, Classified, ClassifyContext, RejectedRecord};
pub use error::{ClassificationIssue, ClassifyError};
pub use rule::{classify_book_entry, BookEntryClass};
