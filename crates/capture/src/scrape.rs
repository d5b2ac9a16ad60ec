//! Page capture orchestration with bounded retry.
//!
//! One `scrape()` call drives the full Launching → Navigating → Extracting
//! → Closing sequence against a fresh browser instance, retrying the whole
//! sequence with exponential backoff on launch or navigation failure. Each
//! attempt gets its own interceptor, so a failed attempt's manifest is
//! discarded with it. Concurrent `scrape()` calls are independent; each
//! owns its browser lifecycle and shares only the on-disk cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clonify_core::{AssetCache, Error};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::engine::{BrowserEngine, BrowserSession, EngineError};
use crate::intercept::{AssetInterceptor, CapturedAsset};
use crate::retry::RetryPolicy;

/// Result of one successful page capture. Immutable; owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    /// Fully serialized DOM after client-side rendering settled.
    pub html: String,
    /// Sub-resources captured during this session, in first-sighting order.
    pub assets: Vec<CapturedAsset>,
    /// Origin of the target URL, for resolving relative references.
    pub base_url: String,
    /// When the capture completed.
    pub captured_at: DateTime<Utc>,
}

/// Drives end-to-end captures of target URLs.
pub struct PageScraper {
    engine: Arc<dyn BrowserEngine>,
    cache: AssetCache,
    retry: RetryPolicy,
    session: Mutex<Option<Arc<dyn BrowserSession>>>,
}

impl PageScraper {
    /// Create a scraper over an engine and a cache instance.
    pub fn new(engine: Arc<dyn BrowserEngine>, cache: AssetCache, retry: RetryPolicy) -> Self {
        Self { engine, cache, retry, session: Mutex::new(None) }
    }

    /// Wire up a scraper from the application configuration, using the
    /// Chromium engine.
    #[cfg(feature = "chromium")]
    pub fn from_config(config: &clonify_core::AppConfig) -> Self {
        let engine = crate::engine::chromium::ChromiumEngine::from_config(config);
        let cache = AssetCache::new(clonify_core::CacheConfig { directory: config.cache_dir.clone() });
        Self::new(Arc::new(engine), cache, RetryPolicy::from_config(config))
    }

    /// Capture a fully rendered page together with its asset manifest.
    ///
    /// Retries launch and navigation failures up to the policy's attempt
    /// budget with exponential backoff between attempts. After exhaustion
    /// the returned error carries the attempt count and the last underlying
    /// failure.
    pub async fn scrape(&self, url: &str) -> Result<PageCapture, Error> {
        let target = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        match target.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }
        let base_url = target.origin().ascii_serialization();

        tracing::info!(url, "starting page capture");

        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match self.attempt(&target).await {
                Ok((html, assets)) => {
                    tracing::info!(url, attempt, asset_count = assets.len(), "capture succeeded");
                    return Ok(PageCapture { html, assets, base_url, captured_at: Utc::now() });
                }
                Err(e) => {
                    tracing::warn!(url, attempt, error = %e, "capture attempt failed");
                    last_error = e.to_string();

                    if self.retry.should_retry(attempt) {
                        let delay = self.retry.delay_for(attempt);
                        tracing::info!(url, delay_ms = delay.as_millis() as u64, "backing off before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(Error::RetriesExhausted { attempts: self.retry.max_attempts, last_error })
    }

    /// Tear down any live browser session. Idempotent and safe to call when
    /// nothing was ever launched; also usable to abort an in-flight capture
    /// from outside.
    pub async fn close(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "error closing browser session");
            }
        }
    }

    /// One Launching → Navigating → Extracting → Closing pass. The browser
    /// is always torn down before this returns, success or failure.
    async fn attempt(&self, target: &Url) -> Result<(String, Vec<CapturedAsset>), Error> {
        let session: Arc<dyn BrowserSession> = Arc::from(
            self.engine
                .launch()
                .await
                .map_err(|e| Error::LaunchFailed(e.to_string()))?,
        );
        *self.session.lock().await = Some(session.clone());

        // Fresh interceptor per attempt; its manifest lives and dies with it.
        let interceptor = Arc::new(AssetInterceptor::new(self.cache.clone()));

        let rendered = session.render(target, interceptor.clone()).await;

        self.close().await;

        let html = rendered.map_err(|e| match e {
            EngineError::Launch(msg) => Error::LaunchFailed(msg),
            EngineError::ContentRetrieval(msg) => Error::ContentRetrieval(msg),
            other => Error::NavigationFailed(other.to_string()),
        })?;

        Ok((html, interceptor.take_manifest()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, InterceptAction, RequestMediator, ResourceKind, SubresourceRequest};
    use clonify_core::CacheConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn temp_cache() -> (tempfile::TempDir, AssetCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig { directory: dir.path().join("assets") });
        (dir, cache)
    }

    /// Engine whose first `navigation_failures` sessions fail to navigate.
    struct FlakyEngine {
        launches: AtomicU32,
        navigation_failures: u32,
    }

    impl FlakyEngine {
        fn new(navigation_failures: u32) -> Self {
            Self { launches: AtomicU32::new(0), navigation_failures }
        }
    }

    #[async_trait::async_trait]
    impl BrowserEngine for FlakyEngine {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, EngineError> {
            let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Box::new(FlakySession { fail: n <= self.navigation_failures }))
        }
    }

    struct FlakySession {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl BrowserSession for FlakySession {
        async fn render(&self, _url: &Url, _mediator: Arc<dyn RequestMediator>) -> Result<String, EngineError> {
            if self.fail {
                Err(EngineError::Navigation("net::ERR_CONNECTION_RESET".into()))
            } else {
                Ok("<html><body>rendered</body></html>".into())
            }
        }

        async fn close(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    /// Engine that cannot start a browser at all.
    struct BrokenEngine {
        launches: AtomicU32,
    }

    #[async_trait::async_trait]
    impl BrowserEngine for BrokenEngine {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, EngineError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Launch("no chromium binary".into()))
        }
    }

    /// Engine serving a synthetic page with one image and one stylesheet,
    /// counting how often a resource actually goes to the "network". The
    /// image is requested twice per render, like a page reusing an asset.
    struct SyntheticEngine {
        network_fetches: Arc<AtomicU32>,
    }

    struct SyntheticSession {
        network_fetches: Arc<AtomicU32>,
    }

    impl SyntheticSession {
        async fn serve(&self, mediator: &Arc<dyn RequestMediator>, url: &str, kind: ResourceKind, mime: &str, body: &[u8]) {
            let request = SubresourceRequest { url: url.to_string(), kind };
            match mediator.on_request(&request).await {
                InterceptAction::Continue => {
                    if kind.is_static_asset() {
                        self.network_fetches.fetch_add(1, Ordering::SeqCst);
                        mediator.on_response(&request, mime, body).await;
                    }
                }
                InterceptAction::Fulfill { .. } => {}
            }
        }
    }

    #[async_trait::async_trait]
    impl BrowserEngine for SyntheticEngine {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, EngineError> {
            Ok(Box::new(SyntheticSession { network_fetches: self.network_fetches.clone() }))
        }
    }

    #[async_trait::async_trait]
    impl BrowserSession for SyntheticSession {
        async fn render(&self, url: &Url, mediator: Arc<dyn RequestMediator>) -> Result<String, EngineError> {
            self.serve(&mediator, url.as_str(), ResourceKind::Document, "text/html", b"").await;
            self.serve(&mediator, "https://x/a.png", ResourceKind::Image, "image/png", b"png bytes").await;
            self.serve(&mediator, "https://x/b.css", ResourceKind::Stylesheet, "text/css", b"body{}").await;
            self.serve(&mediator, "https://x/a.png", ResourceKind::Image, "image/png", b"png bytes").await;

            Ok(concat!(
                "<html><head><link rel=\"stylesheet\" href=\"https://x/b.css\"></head>",
                "<body><img src=\"https://x/a.png\"></body></html>"
            )
            .to_string())
        }

        async fn close(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn scraper_with(engine: Arc<dyn BrowserEngine>, cache: AssetCache) -> PageScraper {
        PageScraper::new(engine, cache, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_third_attempt_with_backoff() {
        let (_dir, cache) = temp_cache();
        let engine = Arc::new(FlakyEngine::new(2));
        let scraper = scraper_with(engine.clone(), cache);

        let start = tokio::time::Instant::now();
        let capture = scraper.scrape("https://example.com/page").await.unwrap();

        assert_eq!(engine.launches.load(Ordering::SeqCst), 3);
        assert!(capture.html.contains("rendered"));
        assert_eq!(capture.base_url, "https://example.com");

        // 2s after the first failure, 4s after the second.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "waited {elapsed:?}");
        assert!(elapsed < Duration::from_secs(7), "waited {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_after_three_attempts() {
        let (_dir, cache) = temp_cache();
        let engine = Arc::new(FlakyEngine::new(u32::MAX));
        let scraper = scraper_with(engine.clone(), cache);

        let err = scraper.scrape("https://example.com").await.unwrap_err();

        assert_eq!(engine.launches.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts(), Some(3));
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("ERR_CONNECTION_RESET"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failures_count_against_budget() {
        let (_dir, cache) = temp_cache();
        let engine = Arc::new(BrokenEngine { launches: AtomicU32::new(0) });
        let scraper = scraper_with(engine.clone(), cache);

        let err = scraper.scrape("https://example.com").await.unwrap_err();

        assert_eq!(engine.launches.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("no chromium binary"));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_launch() {
        let (_dir, cache) = temp_cache();
        let engine = Arc::new(FlakyEngine::new(0));
        let scraper = scraper_with(engine.clone(), cache);

        assert!(matches!(scraper.scrape("not a url").await, Err(Error::InvalidUrl(_))));
        assert!(matches!(scraper.scrape("ftp://example.com").await, Err(Error::InvalidUrl(_))));
        assert_eq!(engine.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_dir, cache) = temp_cache();
        let scraper = scraper_with(Arc::new(FlakyEngine::new(0)), cache);

        // Never launched, then twice in a row.
        scraper.close().await;
        scraper.close().await;

        scraper.scrape("https://example.com").await.unwrap();
        scraper.close().await;
        scraper.close().await;
    }

    #[tokio::test]
    async fn test_synthetic_capture_end_to_end() {
        let (_dir, cache) = temp_cache();
        let network_fetches = Arc::new(AtomicU32::new(0));
        let engine = Arc::new(SyntheticEngine { network_fetches: network_fetches.clone() });
        let scraper = scraper_with(engine, cache.clone());

        let capture = scraper.scrape("https://x/page").await.unwrap();

        assert_eq!(capture.assets.len(), 2);
        assert_eq!(capture.assets[0].url, "https://x/a.png");
        assert_eq!(capture.assets[0].mime_type, "image/png");
        assert_eq!(capture.assets[1].url, "https://x/b.css");
        assert_eq!(capture.assets[1].mime_type, "text/css");
        assert_eq!(capture.base_url, "https://x");

        // The duplicate image request was already served from cache.
        assert_eq!(network_fetches.load(Ordering::SeqCst), 2);

        // A second capture of the same page touches the network zero times.
        let again = scraper.scrape("https://x/page").await.unwrap();
        assert_eq!(again.assets.len(), 2);
        assert_eq!(network_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_attempt_discards_manifest() {
        let (_dir, cache) = temp_cache();

        // Prime the cache so a hit gets recorded during the failing attempt.
        cache.store("https://x/a.png", b"png bytes", "image/png").await.unwrap();

        struct HalfwayEngine {
            launches: AtomicU32,
        }
        struct HalfwaySession {
            fail: bool,
        }

        #[async_trait::async_trait]
        impl BrowserEngine for HalfwayEngine {
            async fn launch(&self) -> Result<Box<dyn BrowserSession>, EngineError> {
                let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Box::new(HalfwaySession { fail: n == 1 }))
            }
        }

        #[async_trait::async_trait]
        impl BrowserSession for HalfwaySession {
            async fn render(&self, _url: &Url, mediator: Arc<dyn RequestMediator>) -> Result<String, EngineError> {
                if self.fail {
                    // Picks up one asset, then the navigation falls over.
                    let request = SubresourceRequest { url: "https://x/a.png".into(), kind: ResourceKind::Image };
                    let _ = mediator.on_request(&request).await;
                    return Err(EngineError::Navigation("connection dropped mid-load".into()));
                }
                Ok("<html></html>".into())
            }

            async fn close(&self) -> Result<(), EngineError> {
                Ok(())
            }
        }

        let scraper = PageScraper::new(
            Arc::new(HalfwayEngine { launches: AtomicU32::new(0) }),
            cache,
            RetryPolicy { max_attempts: 2, base_delay: Duration::from_millis(1) },
        );

        // The retry renders a page that requests nothing, so the asset seen
        // by the failed attempt must not leak into the result.
        let capture = scraper.scrape("https://x/page").await.unwrap();
        assert!(capture.assets.is_empty());
    }
}
