use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FetchError, PollStatus, ReferenceHandle, ReportApi, ReportPeriod};

/// reqwest-backed reporting API client.
///
/// The token is read by the caller (via `nav_config::resolve_secrets`) and
/// passed in; it is sent as a bearer header and never logged.
#[derive(Clone)]
pub struct HttpReportApi {
    http: reqwest::Client,
    base_url: String,
    query_id: String,
    token: String,
}

impl std::fmt::Debug for HttpReportApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReportApi")
            .field("base_url", &self.base_url)
            .field("query_id", &self.query_id)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    query_id: &'a str,
    period_start: String,
    period_end: String,
}

#[derive(Debug, Deserialize)]
struct RequestResponse {
    reference_code: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl HttpReportApi {
    pub fn new(base_url: String, query_id: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            query_id,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response, FetchError> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Retryable(format!("{what}: transport error: {e}")))?;
        check_status(resp.status(), what)?;
        Ok(resp)
    }
}

/// 5xx and 429 are worth retrying; any other non-success status is not.
fn check_status(status: StatusCode, what: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    let msg = format!("{what}: http status {}", status.as_u16());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(FetchError::Retryable(msg))
    } else {
        Err(FetchError::Fatal(msg))
    }
}

#[async_trait::async_trait]
impl ReportApi for HttpReportApi {
    fn source_name(&self) -> &'static str {
        "http-report-api"
    }

    async fn request_report(&self, period: &ReportPeriod) -> Result<ReferenceHandle, FetchError> {
        let body = RequestBody {
            query_id: &self.query_id,
            period_start: period.start.format("%Y-%m-%d").to_string(),
            period_end: period.end.format("%Y-%m-%d").to_string(),
        };
        let resp = self
            .send(self.http.post(self.url("reports")).json(&body), "request report")
            .await?;
        let parsed: RequestResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Fatal(format!("request report: malformed response: {e}")))?;
        if parsed.reference_code.trim().is_empty() {
            return Err(FetchError::Fatal("request report: empty reference_code".to_string()));
        }
        Ok(ReferenceHandle(parsed.reference_code))
    }

    async fn poll(&self, handle: &ReferenceHandle) -> Result<PollStatus, FetchError> {
        let path = format!("reports/{}", handle.as_str());
        let resp = self.send(self.http.get(self.url(&path)), "poll report").await?;
        let parsed: PollResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Fatal(format!("poll report: malformed response: {e}")))?;

        match parsed.status.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "running" => Ok(PollStatus::Pending),
            "ready" => match parsed.download_url {
                Some(url) if !url.trim().is_empty() => Ok(PollStatus::Ready { download_url: url }),
                _ => Err(FetchError::Fatal("poll report: ready without download_url".to_string())),
            },
            "failed" => Ok(PollStatus::Failed {
                code: parsed.error_code.unwrap_or_else(|| "UNKNOWN".to_string()),
                message: parsed.error_message.unwrap_or_default(),
            }),
            other => Err(FetchError::Fatal(format!("poll report: unknown status '{other}'"))),
        }
    }

    async fn download(&self, download_url: &str) -> Result<Value, FetchError> {
        let resp = self.send(self.http.get(download_url), "download report").await?;
        resp.json::<Value>()
            .await
            .map_err(|e| FetchError::Fatal(format!("download report: body is not json: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(check_status(StatusCode::OK, "x").is_ok());
        assert!(check_status(StatusCode::BAD_GATEWAY, "x").unwrap_err().is_retryable());
        assert!(check_status(StatusCode::TOO_MANY_REQUESTS, "x").unwrap_err().is_retryable());
        assert!(!check_status(StatusCode::UNAUTHORIZED, "x").unwrap_err().is_retryable());
    }

    #[test]
    fn debug_redacts_token() {
        let api = HttpReportApi::new("http://x".into(), "Q".into(), "tok-123456789".into());
        assert!(!format!("{api:?}").contains("tok-123456789"));
    }
}
