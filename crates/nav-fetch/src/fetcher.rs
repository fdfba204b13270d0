use tracing::{debug, error, info, warn};

use nav_schemas::RawReport;

use crate::{parse_report, BackoffPolicy, FetchError, PollStatus, ReportApi, ReportPeriod};

/// Drives the request → poll → download protocol against a [`ReportApi`].
///
/// The poll loop is the only place in the engine that suspends. It makes at
/// most `policy.max_attempts` polls; running out of budget while the report
/// is still pending is `Retryable`, never a hang.
pub struct ReportFetcher<A: ReportApi> {
    api: A,
    policy: BackoffPolicy,
}

impl<A: ReportApi> ReportFetcher<A> {
    pub fn new(api: A, policy: BackoffPolicy) -> Self {
        Self { api, policy }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub async fn fetch(&self, period: &ReportPeriod) -> Result<RawReport, FetchError> {
        let period_key = period.period_key();
        let source = self.api.source_name();

        let handle = self.api.request_report(period).await.map_err(|e| {
            log_failure(source, &period_key, &e);
            e
        })?;
        info!(source, period_key = %period_key, reference = %handle.as_str(), "report requested");

        let max = self.policy.max_attempts.max(1);
        let mut last_transient: Option<FetchError> = None;

        for attempt in 1..=max {
            match self.api.poll(&handle).await {
                Ok(PollStatus::Ready { download_url }) => {
                    debug!(source, period_key = %period_key, attempt, "report ready");
                    let body = self.api.download(&download_url).await.map_err(|e| {
                        log_failure(source, &period_key, &e);
                        e
                    })?;
                    let report = parse_report(body).map_err(|e| {
                        log_failure(source, &period_key, &e);
                        e
                    })?;
                    info!(
                        source,
                        period_key = %period_key,
                        records = report.records.len(),
                        attempts = attempt,
                        "report downloaded"
                    );
                    return Ok(report);
                }
                Ok(PollStatus::Failed { code, message }) => {
                    let e = FetchError::Fatal(format!("report job failed code={code} {message}"));
                    log_failure(source, &period_key, &e);
                    return Err(e);
                }
                Ok(PollStatus::Pending) => {
                    debug!(source, period_key = %period_key, attempt, max, "report pending");
                }
                Err(e @ FetchError::Retryable(_)) => {
                    warn!(source, period_key = %period_key, attempt, error = %e, "transient poll failure");
                    last_transient = Some(e);
                }
                Err(e) => {
                    log_failure(source, &period_key, &e);
                    return Err(e);
                }
            }

            if attempt < max {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        let reason = match last_transient {
            Some(e) => format!("poll budget of {max} attempts exhausted (last error: {})", e.message()),
            None => format!("poll budget of {max} attempts exhausted; report still pending"),
        };
        let e = FetchError::Retryable(reason);
        log_failure(source, &period_key, &e);
        Err(e)
    }
}

fn log_failure(source: &str, period_key: &str, e: &FetchError) {
    match e {
        FetchError::Retryable(m) => warn!(source, period_key, error = %m, "report fetch retryable failure"),
        FetchError::Fatal(m) => error!(source, period_key, error = %m, "report fetch fatal failure"),
    }
}
