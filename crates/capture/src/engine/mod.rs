//! Narrow abstraction over a headless browser engine.
//!
//! The capture core only needs a handful of capabilities: launch a browser,
//! open a page with request interception installed, read back the rendered
//! document, and tear the browser down. These traits capture exactly that
//! surface so any CDP-class engine can be swapped in without touching the
//! interceptor or orchestrator, and tests run against scripted stubs.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clonify_core::AppConfig;
use thiserror::Error;
use url::Url;

#[cfg(feature = "chromium")]
pub mod chromium;

/// Errors that can occur inside the browser engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to launch or connect to the browser process.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Failed to navigate to the target URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to read the rendered document back.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// Navigation did not settle within the timeout.
    #[error("navigation timeout after {0}ms")]
    Timeout(u64),

    /// The session was already torn down.
    #[error("browser session closed")]
    Closed,
}

/// Resource classification for an intercepted network request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Font,
    Script,
    Xhr,
    Fetch,
    Media,
    Other,
}

impl ResourceKind {
    /// Whether this kind of resource flows through the asset cache.
    ///
    /// Capture scope is limited to static visual assets; documents, scripts,
    /// and XHR traffic always pass straight through to the network.
    pub fn is_static_asset(&self) -> bool {
        matches!(self, ResourceKind::Image | ResourceKind::Stylesheet | ResourceKind::Font)
    }
}

/// An outgoing sub-resource request observed during a capture.
#[derive(Debug, Clone)]
pub struct SubresourceRequest {
    /// Absolute URL of the resource.
    pub url: String,
    /// Resource classification reported by the engine.
    pub kind: ResourceKind,
}

/// How the mediator wants an intercepted request handled.
#[derive(Debug, Clone)]
pub enum InterceptAction {
    /// Let the request proceed to the network unmodified.
    Continue,

    /// Answer the request locally without a network round-trip.
    Fulfill {
        /// HTTP status code for the synthesized response.
        status: u16,
        /// Value for the content-type header.
        content_type: String,
        /// Response body bytes.
        body: Bytes,
    },
}

/// Request-level hook the engine drives for every observed request.
///
/// `on_request` fires before the request leaves; `on_response` fires once a
/// passed-through request's body is available. Both are infallible by
/// contract: a mediator that cannot serve or store a resource degrades to
/// pass-through instead of failing the page load.
#[async_trait::async_trait]
pub trait RequestMediator: Send + Sync {
    /// Decide how an outgoing request should be handled.
    async fn on_request(&self, request: &SubresourceRequest) -> InterceptAction;

    /// Observe the body of a request that went to the network.
    async fn on_response(&self, request: &SubresourceRequest, content_type: &str, body: &[u8]);
}

/// Options for a browser session.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// User-Agent presented by the browser.
    pub user_agent: String,

    /// Viewport dimensions (default: 1280x720).
    pub viewport: (u32, u32),

    /// Navigation timeout covering goto + settle (default: 60s).
    pub navigation_timeout: Duration,

    /// Settle window after navigation resolves, letting straggler
    /// sub-resource requests drain before the DOM is serialized.
    pub settle: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            user_agent: "clonify/0.1".to_string(),
            viewport: (1280, 720),
            navigation_timeout: Duration::from_secs(60),
            settle: Duration::from_secs(2),
        }
    }
}

impl EngineOptions {
    /// Build engine options from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            viewport: (config.viewport_width, config.viewport_height),
            navigation_timeout: config.navigation_timeout(),
            settle: config.settle(),
        }
    }
}

/// A launchable headless browser engine.
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Start a fresh browser process and return a session handle.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, EngineError>;
}

/// One live browser instance.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to `url` with the mediator installed on every outgoing
    /// request, wait for the page to settle, and return the serialized DOM.
    async fn render(&self, url: &Url, mediator: Arc<dyn RequestMediator>) -> Result<String, EngineError>;

    /// Tear down the browser process. Idempotent.
    async fn close(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_asset_kinds() {
        assert!(ResourceKind::Image.is_static_asset());
        assert!(ResourceKind::Stylesheet.is_static_asset());
        assert!(ResourceKind::Font.is_static_asset());

        assert!(!ResourceKind::Document.is_static_asset());
        assert!(!ResourceKind::Script.is_static_asset());
        assert!(!ResourceKind::Xhr.is_static_asset());
        assert!(!ResourceKind::Fetch.is_static_asset());
        assert!(!ResourceKind::Media.is_static_asset());
        assert!(!ResourceKind::Other.is_static_asset());
    }

    #[test]
    fn test_engine_options_default() {
        let opts = EngineOptions::default();
        assert_eq!(opts.user_agent, "clonify/0.1");
        assert_eq!(opts.viewport, (1280, 720));
        assert_eq!(opts.navigation_timeout, Duration::from_secs(60));
        assert_eq!(opts.settle, Duration::from_secs(2));
    }

    #[test]
    fn test_engine_options_from_config() {
        let config = AppConfig {
            user_agent: "custom-agent".into(),
            viewport_width: 1920,
            viewport_height: 1080,
            navigation_timeout_ms: 30_000,
            settle_ms: 500,
            ..Default::default()
        };

        let opts = EngineOptions::from_config(&config);
        assert_eq!(opts.user_agent, "custom-agent");
        assert_eq!(opts.viewport, (1920, 1080));
        assert_eq!(opts.navigation_timeout, Duration::from_secs(30));
        assert_eq!(opts.settle, Duration::from_millis(500));
    }
}
