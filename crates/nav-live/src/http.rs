use serde::Deserialize;

use nav_schemas::RawTrade;

use crate::{AccountSummary, LiveError, LiveSessionApi};

/// reqwest-backed live session client. Bearer token, redacted in `Debug`.
#[derive(Clone)]
pub struct HttpLiveSessionApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpLiveSessionApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLiveSessionApi")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct FillsResponse {
    #[serde(default)]
    fills: Vec<RawTrade>,
}

impl HttpLiveSessionApi {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, LiveError> {
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| LiveError::Transport(format!("{path}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LiveError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| LiveError::Malformed(format!("{path}: {e}")))
    }
}

#[async_trait::async_trait]
impl LiveSessionApi for HttpLiveSessionApi {
    async fn account_summary(&self) -> Result<AccountSummary, LiveError> {
        self.get_json("session/account").await
    }

    async fn todays_fills(&self) -> Result<Vec<RawTrade>, LiveError> {
        let body: FillsResponse = self.get_json("session/fills").await?;
        Ok(body.fills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let api = HttpLiveSessionApi::new("http://x".into(), "live-secret-987".into());
        assert!(!format!("{api:?}").contains("live-secret-987"));
    }
}
