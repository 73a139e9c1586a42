use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use scraper::{Html, Selector};
use spider_client::shapes::request::{RequestType, ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{debug, warn};

use crate::config::ScraperSettings;
use crate::error::RetrievalError;

/// How a site's page has to be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// One GET, parse the response body.
    Static,
    /// Headless render; read markup once `selector` shows up.
    Rendered(WaitSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    pub selector: &'static str,
    pub timeout: Duration,
}

/// Where page markup comes from. The production source is [`WebSource`].
pub trait PageSource: Sync {
    type Session: Session + Send;

    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, RetrievalError>> + Send;

    fn open_session(&self) -> impl Future<Output = Result<Self::Session, RetrievalError>> + Send;
}

/// A browser session bound to one descriptor. Must be closed by the caller.
pub trait Session: Sized {
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<(), RetrievalError>> + Send;

    /// Markup once `selector` matches, or `WaitTimeout`.
    fn wait_for(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, RetrievalError>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Acquire stage of every adapter.
pub async fn acquire<S: PageSource>(
    source: &S,
    style: Style,
    url: &str,
) -> Result<String, RetrievalError> {
    match style {
        Style::Static => source.fetch(url).await,
        Style::Rendered(wait) => {
            let mut session = source.open_session().await?;
            let result = render_in(&mut session, url, wait).await;
            // released on every path, including the error ones above
            session.close().await;
            result
        }
    }
}

async fn render_in<T: Session>(
    session: &mut T,
    url: &str,
    wait: WaitSpec,
) -> Result<String, RetrievalError> {
    // a render that never comes back is bounded by the same budget as the wait
    tokio::time::timeout(wait.timeout, session.navigate(url))
        .await
        .map_err(|_| RetrievalError::NavigateTimeout {
            timeout: wait.timeout,
        })??;
    session.wait_for(wait.selector, wait.timeout).await
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or retries run out.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    url: &str,
    mut op: F,
) -> Result<T, RetrievalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetrievalError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let backoff = policy.base_backoff * 2u32.pow(attempt);
                warn!(
                    "Retrieval of {} failed ({}), attempt {}/{}, backing off {:.1}s",
                    url,
                    e,
                    attempt + 1,
                    policy.max_retries,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Plain HTTP through reqwest, rendering through spider.cloud's Chrome backend.
pub struct WebSource {
    http: reqwest::Client,
    spider_api_key: Option<String>,
    poll_interval: Duration,
    render_timeout: Duration,
}

impl WebSource {
    pub fn new(
        settings: &ScraperSettings,
        spider_api_key: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            spider_api_key,
            poll_interval: settings.poll_interval(),
            render_timeout: settings.request_timeout(),
        })
    }
}

impl PageSource for WebSource {
    type Session = SpiderSession;

    async fn fetch(&self, url: &str) -> Result<String, RetrievalError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::HttpStatus { status });
        }
        Ok(response.text().await?)
    }

    async fn open_session(&self) -> Result<SpiderSession, RetrievalError> {
        let key = self.spider_api_key.clone().ok_or_else(|| {
            RetrievalError::Unavailable("SPIDER_API_KEY environment variable must be set".into())
        })?;
        let spider = Spider::new(Some(key))
            .map_err(|e| RetrievalError::Unavailable(format!("Failed to create Spider client: {}", e)))?;
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "Rendering session opened");
        Ok(SpiderSession {
            id,
            spider,
            url: None,
            markup: None,
            poll_interval: self.poll_interval,
            render_timeout: self.render_timeout,
        })
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// One remote Chrome render context. Each `navigate` or re-poll is a fresh render.
pub struct SpiderSession {
    id: u64,
    spider: Spider,
    url: Option<String>,
    markup: Option<String>,
    poll_interval: Duration,
    render_timeout: Duration,
}

impl SpiderSession {
    async fn render(&self, url: &str) -> Result<String, RetrievalError> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            request: Some(RequestType::Chrome),
            ..Default::default()
        };

        // the spider client carries no timeout of its own
        let response = tokio::time::timeout(
            self.render_timeout,
            self.spider.scrape_url(url, Some(params), "application/json"),
        )
        .await
        .map_err(|_| RetrievalError::NavigateTimeout {
            timeout: self.render_timeout,
        })?
        .map_err(|e| RetrievalError::Render(format!("Spider render failed: {}", e)))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(status) = first.and_then(|obj| obj.get("status")).and_then(|s| s.as_u64()) {
            if !(200..300).contains(&status) {
                return Err(RetrievalError::Render(format!("render returned status {}", status)));
            }
        }

        first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| RetrievalError::Render("No content in spider response".into()))
    }
}

impl Session for SpiderSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RetrievalError> {
        let markup = self.render(url).await?;
        self.url = Some(url.to_string());
        self.markup = Some(markup);
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<String, RetrievalError> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| RetrievalError::Render("wait_for before navigate".into()))?;

        let poll = async {
            loop {
                if let Some(markup) = self.markup.take() {
                    if markup_matches(&markup, selector) {
                        return Ok(markup);
                    }
                }
                tokio::time::sleep(self.poll_interval).await;
                match self.render(&url).await {
                    Ok(markup) => self.markup = Some(markup),
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            }),
        }
    }

    async fn close(self) {
        debug!(session = self.id, url = ?self.url, "Rendering session released");
    }
}

/// True when `selector` matches anything in `markup`. Invalid selectors never match.
pub fn markup_matches(markup: &str, selector: &str) -> bool {
    let Ok(sel) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(markup).select(&sel).next().is_some()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn selector_matching() {
        let html = r#"<html><body><span class="money-subtotal">$1.990</span></body></html>"#;
        assert!(markup_matches(html, "span.money-subtotal"));
        assert!(!markup_matches(html, "app-root"));
        assert!(!markup_matches(html, "span[[["));
    }

    #[tokio::test]
    async fn retry_stops_on_permanent_error() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(1),
        };
        let result: Result<(), _> = with_retry(policy, "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RetrievalError::HttpStatus {
                    status: reqwest::StatusCode::NOT_FOUND,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
        };
        let c = Arc::clone(&calls);
        let result = with_retry(policy, "u", move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(RetrievalError::HttpStatus {
                        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    })
                } else {
                    Ok("body")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_budget() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
        };
        let result: Result<(), _> = with_retry(policy, "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RetrievalError::WaitTimeout {
                    selector: "h1".into(),
                    timeout: Duration::from_millis(5),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(RetrievalError::WaitTimeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// Render backend that accepts the session but never finishes loading.
    struct Stalled {
        closed: Arc<AtomicUsize>,
    }

    struct StalledSession {
        closed: Arc<AtomicUsize>,
    }

    impl PageSource for Stalled {
        type Session = StalledSession;

        async fn fetch(&self, _url: &str) -> Result<String, RetrievalError> {
            std::future::pending().await
        }

        async fn open_session(&self) -> Result<StalledSession, RetrievalError> {
            Ok(StalledSession {
                closed: Arc::clone(&self.closed),
            })
        }
    }

    impl Session for StalledSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), RetrievalError> {
            std::future::pending().await
        }

        async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<String, RetrievalError> {
            std::future::pending().await
        }

        async fn close(self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stalled_navigation_times_out_and_releases_session() {
        let closed = Arc::new(AtomicUsize::new(0));
        let source = Stalled {
            closed: Arc::clone(&closed),
        };
        let style = Style::Rendered(WaitSpec {
            selector: "#__next h1",
            timeout: Duration::from_millis(50),
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            acquire(&source, style, "https://farmaloop.cl/producto/eutirox"),
        )
        .await
        .expect("acquire must honour the wait budget");

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::NavigateTimeout { timeout } if timeout == Duration::from_millis(50)
        ));
        assert!(err.is_transient());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
