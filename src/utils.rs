use crate::config::{LeechConfig, SiteSettings};
use crate::error::{LeechError, Result};
use crate::traits::FetchProxy;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const DEFAULT_USER_AGENT: &str = "ComicLeech/0.1 (+selector-driven comic importer)";

/// Fetch proxy for one source site: per-site headers and user agent, plus a
/// request-rate cap shared by every clone.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Arc<DirectRateLimiter>,
}

impl HttpClient {
    pub fn new(leech: &LeechConfig, site: &SiteSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(extra) = &site.headers {
            for (key, value) in extra {
                let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    LeechError::configuration(format!("invalid header name `{}`: {}", key, e))
                })?;
                let value = HeaderValue::from_str(value).map_err(|e| {
                    LeechError::configuration(format!("invalid value for header `{}`: {}", key, e))
                })?;
                headers.insert(name, value);
            }
        }

        let user_agent = site
            .user_agent
            .as_deref()
            .or(leech.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT);

        let client = Client::builder()
            .timeout(Duration::from_secs(leech.request_timeout_secs))
            .connect_timeout(Duration::from_secs(leech.connect_timeout_secs))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        let per_second = NonZeroU32::new(leech.requests_per_second).ok_or_else(|| {
            LeechError::configuration("leech.requests_per_second must be greater than zero")
        })?;
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self { client, limiter })
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        let response = self.send(url).await?;
        response
            .text()
            .await
            .map_err(|e| LeechError::proxy(format!("{}: {}", url, e)))
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LeechError::proxy(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, url: &str) -> Result<Response> {
        self.limiter.until_ready().await;
        debug!("[HTTP] GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LeechError::proxy(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeechError::proxy(format!("{}: HTTP {}", url, status)));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl FetchProxy for HttpClient {
    async fn fetch_raw_html(&self, url: &str) -> Result<String> {
        self.get(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.get_bytes(url).await
    }
}
