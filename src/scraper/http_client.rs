use std::time::Duration;

use rand::RngExt;
use reqwest::header::REFERER;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ScraperConfig;

/// Network-level failure for a single page fetch. Callers downgrade these
/// to "no data from this source" and keep going.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("no encoding produced a clean decode")]
    Decode,
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL and decode its body to text, with retry and backoff.
    ///
    /// Naver serves its finance pages as CP949; the response bytes are run
    /// through EUC-KR first (encoding_rs's EUC-KR decoder covers the CP949
    /// superset), then strict UTF-8, then lossy UTF-8 as a last resort, so
    /// decoding never fails terminally.
    pub async fn get_html(&self, url: &str) -> Result<String, FetchError> {
        self.polite_delay().await;

        let mut last_err = FetchError::Status(0);

        for attempt in 1..=(self.config.max_retries + 1) {
            debug!("GET {} (attempt {})", url, attempt);

            match self.inner.get(url).header(REFERER, referer_for(url)).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await?;
                        return Ok(decode_body(&bytes));
                    } else if status.as_u16() == 429 || status.as_u16() == 503 {
                        // Throttled — back off harder
                        let backoff = Duration::from_millis(
                            250 * (2u64.pow(attempt)),
                        );
                        warn!(
                            "Throttled ({}) on attempt {}, sleeping {:?}",
                            status, attempt, backoff
                        );
                        sleep(backoff).await;
                        last_err = FetchError::Status(status.as_u16());
                    } else {
                        return Err(FetchError::Status(status.as_u16()));
                    }
                }
                Err(e) => {
                    warn!("Request failed on attempt {}: {}", attempt, e);
                    last_err = FetchError::Network(e);
                    sleep(Duration::from_millis(250 * attempt as u64)).await;
                }
            }
        }

        Err(last_err)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let total = self.config.request_delay_ms + jitter;
        if total > 0 {
            sleep(Duration::from_millis(total)).await;
        }
    }
}

/// Decode response bytes, trying legacy Korean encodings before UTF-8.
fn decode_body(bytes: &[u8]) -> String {
    for encoding in [encoding_rs::EUC_KR, encoding_rs::UTF_8] {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// The portal rejects some requests without a same-site referer.
fn referer_for(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| format!("{}://{}/", u.scheme(), h)))
        .unwrap_or_else(|| "https://finance.naver.com/".to_string())
}
