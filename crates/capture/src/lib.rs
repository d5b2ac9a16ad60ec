//! Capture pipeline for clonify.
//!
//! This crate drives a headless browser to fully render a target page,
//! intercepts sub-resource traffic through the content-addressed asset
//! cache, and reassembles the result into a self-contained bundle:
//!
//! - [`engine`] — narrow browser-engine abstraction plus the Chromium
//!   implementation (feature `chromium`, on by default)
//! - [`intercept`] — cache-backed request interception per session
//! - [`scrape`] — the retrying capture orchestrator
//! - [`bundle`] — reference rewriting for preview/export

pub mod bundle;
pub mod engine;
pub mod intercept;
pub mod retry;
pub mod scrape;

pub use engine::{
    BrowserEngine, BrowserSession, EngineError, EngineOptions, InterceptAction, RequestMediator, ResourceKind,
    SubresourceRequest,
};
pub use intercept::{AssetInterceptor, CapturedAsset};
pub use retry::RetryPolicy;
pub use scrape::{PageCapture, PageScraper};

#[cfg(feature = "chromium")]
pub use engine::chromium::ChromiumEngine;
