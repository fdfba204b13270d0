//! nav-live
//!
//! Live Data Adapter. Pulls today's fills and the current account NAV from
//! the broker session API, classifies them with the same classifier as the
//! historical path (tagged `LiveSession`, provisional) and merges them into
//! one timeline with settled historical events.
//!
//! The live path is best effort: a timeout or upstream error yields an empty
//! or partial [`LiveDay`] and a warning, never a failed run.

mod adapter;
mod api;
mod error;
mod http;
mod merge;

pub use adapter::{LiveDataAdapter, LiveDay, LiveStatus};
pub use api::{AccountSummary, LiveSessionApi};
pub use error::LiveError;
pub use http::HttpLiveSessionApi;
pub use merge::merge_timeline;
