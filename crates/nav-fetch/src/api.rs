use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FetchError, ReportPeriod};

/// Opaque reference code returned when a report job is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceHandle(pub String);

impl ReferenceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Ready { download_url: String },
    Failed { code: String, message: String },
}

/// Three-step asynchronous report protocol.
#[async_trait::async_trait]
pub trait ReportApi: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn request_report(&self, period: &ReportPeriod) -> Result<ReferenceHandle, FetchError>;

    async fn poll(&self, handle: &ReferenceHandle) -> Result<PollStatus, FetchError>;

    async fn download(&self, download_url: &str) -> Result<Value, FetchError>;
}
