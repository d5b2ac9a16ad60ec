//! Chromium-backed browser engine using chromiumoxide (CDP).
//!
//! Request interception rides on the CDP Fetch domain with two pause
//! points per request: the Request stage, where the mediator can fulfill
//! from cache, and the Response stage, where passed-through asset bodies
//! are read back for storage. Interception is best-effort; a CDP error on
//! one resource falls back to continuing that request.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FulfillRequestParams, GetResponseBodyParams, HeaderEntry,
    RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::ResourceType as CdpResourceType;
use chromiumoxide::handler::viewport::Viewport;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use url::Url;

use super::{BrowserEngine, BrowserSession, EngineError, EngineOptions, InterceptAction, RequestMediator, ResourceKind, SubresourceRequest};

/// Chromium launch flags for containerized/CI environments.
const CHROMIUM_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
];

/// Headless Chromium engine.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    options: EngineOptions,
}

impl ChromiumEngine {
    /// Create an engine with the given session options.
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// Create an engine from the application configuration.
    pub fn from_config(config: &clonify_core::AppConfig) -> Self {
        Self::new(EngineOptions::from_config(config))
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, EngineError> {
        let mut builder = BrowserConfig::builder()
            .viewport(Some(Viewport {
                width: self.options.viewport.0,
                height: self.options.viewport.1,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .arg(format!("--user-agent={}", self.options.user_agent));

        for arg in CHROMIUM_ARGS {
            builder = builder.arg(*arg);
        }

        let config = builder.build().map_err(EngineError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            handler_task,
            options: self.options.clone(),
        }))
    }
}

/// One live Chromium process driven over CDP.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler_task: tokio::task::JoinHandle<()>,
    options: EngineOptions,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn render(&self, url: &Url, mediator: Arc<dyn RequestMediator>) -> Result<String, EngineError> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard.as_ref().ok_or(EngineError::Closed)?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| EngineError::Navigation(e.to_string()))?
        };

        install_interception(&page, mediator).await?;

        let timeout_ms = self.options.navigation_timeout.as_millis() as u64;
        let settle = self.options.settle;
        let navigate = async {
            page.goto(url.as_str())
                .await
                .map_err(|e| EngineError::Navigation(e.to_string()))?;
            let _ = page.wait_for_navigation().await;
            // chromiumoxide has no networkidle primitive; a bounded settle
            // window lets in-flight sub-resource requests drain.
            tokio::time::sleep(settle).await;
            Ok::<(), EngineError>(())
        };

        tokio::time::timeout(self.options.navigation_timeout, navigate)
            .await
            .map_err(|_| EngineError::Timeout(timeout_ms))??;

        let html = page
            .content()
            .await
            .map_err(|e| EngineError::ContentRetrieval(e.to_string()))?;

        page.close().await.ok();

        Ok(html)
    }

    async fn close(&self) -> Result<(), EngineError> {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "browser close error");
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }
}

/// Enable Fetch-domain interception on the page and pump paused requests
/// through the mediator on a background task.
async fn install_interception(page: &Page, mediator: Arc<dyn RequestMediator>) -> Result<(), EngineError> {
    let patterns = vec![
        RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: Some(RequestStage::Request),
        },
        RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: Some(RequestStage::Response),
        },
    ];

    page.execute(EnableParams { patterns: Some(patterns), handle_auth_requests: None })
        .await
        .map_err(|e| EngineError::Navigation(format!("failed to enable request interception: {e}")))?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| EngineError::Navigation(format!("failed to subscribe to paused requests: {e}")))?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(e) = handle_paused_request(&page, mediator.as_ref(), &event).await {
                tracing::debug!(url = %event.request.url, error = %e, "interception error, passing request through");
                let _ = page.execute(ContinueRequestParams::new(event.request_id.clone())).await;
            }
        }
    });

    Ok(())
}

async fn handle_paused_request(
    page: &Page, mediator: &dyn RequestMediator, event: &EventRequestPaused,
) -> Result<(), String> {
    let request = SubresourceRequest {
        url: event.request.url.clone(),
        kind: resource_kind(&event.resource_type),
    };

    // A paused event with a status code is the Response stage of a request
    // that went to the network: read the body back for the mediator.
    if event.response_status_code.is_some() {
        if request.kind.is_static_asset() {
            let response = page
                .execute(GetResponseBodyParams::new(event.request_id.clone()))
                .await
                .map_err(|e| e.to_string())?;

            let bytes = if response.result.base64_encoded {
                BASE64.decode(response.result.body.as_bytes()).map_err(|e| e.to_string())?
            } else {
                response.result.body.clone().into_bytes()
            };

            let content_type = header_value(event.response_headers.as_deref(), "content-type").unwrap_or_default();

            mediator.on_response(&request, &content_type, &bytes).await;
        }

        page.execute(ContinueRequestParams::new(event.request_id.clone()))
            .await
            .map_err(|e| e.to_string())?;
        return Ok(());
    }

    match mediator.on_request(&request).await {
        InterceptAction::Continue => {
            page.execute(ContinueRequestParams::new(event.request_id.clone()))
                .await
                .map_err(|e| e.to_string())?;
        }
        InterceptAction::Fulfill { status, content_type, body } => {
            let params = FulfillRequestParams::builder()
                .request_id(event.request_id.clone())
                .response_code(status as i64)
                .response_headers(vec![HeaderEntry { name: "content-type".to_string(), value: content_type }])
                .body(BASE64.encode(&body))
                .build()
                .map_err(|e| e.to_string())?;

            page.execute(params).await.map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}

fn resource_kind(cdp: &CdpResourceType) -> ResourceKind {
    match cdp {
        CdpResourceType::Document => ResourceKind::Document,
        CdpResourceType::Stylesheet => ResourceKind::Stylesheet,
        CdpResourceType::Image => ResourceKind::Image,
        CdpResourceType::Font => ResourceKind::Font,
        CdpResourceType::Script => ResourceKind::Script,
        CdpResourceType::Xhr => ResourceKind::Xhr,
        CdpResourceType::Fetch => ResourceKind::Fetch,
        CdpResourceType::Media => ResourceKind::Media,
        _ => ResourceKind::Other,
    }
}

fn header_value(headers: Option<&[HeaderEntry]>, name: &str) -> Option<String> {
    headers?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}
