//! nav-fetch
//!
//! Report Fetcher. Requests a broker activity report for a period, polls the
//! asynchronous report job on a bounded backoff schedule, downloads the
//! result and validates its shape into a [`nav_schemas::RawReport`].
//!
//! This crate does **not** classify or persist anything: callers hand the
//! raw report to `nav-classify` and the ledger store.

mod api;
mod backoff;
mod csv_import;
mod error;
mod fetcher;
mod http;
mod period;
mod report;

pub use api::{PollStatus, ReferenceHandle, ReportApi};
pub use backoff::BackoffPolicy;
pub use csv_import::{parse_report_csv_str, read_report_csv};
pub use error::FetchError;
pub use fetcher::ReportFetcher;
pub use http::HttpReportApi;
pub use period::{PeriodKind, ReportPeriod};
pub use report::{parse_report, report_digest};
