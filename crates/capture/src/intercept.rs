//! Cache-backed request interception for a single capture session.
//!
//! Only static visual assets (images, stylesheets, fonts) flow through the
//! cache; everything else passes straight to the network untouched. A cache
//! hit is answered locally with no network round-trip; a miss continues to
//! the network and the response body is stored when it lands. Interception
//! is best-effort throughout: any cache failure degrades to pass-through so
//! a broken cache can never hang or fail the page load.

use std::sync::Mutex;

use clonify_core::AssetCache;
use clonify_core::cache::mime::extension_for_mime;
use serde::{Deserialize, Serialize};

use crate::engine::{InterceptAction, RequestMediator, SubresourceRequest};

/// A sub-resource recorded in a capture session's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedAsset {
    /// Original absolute URL observed during the capture.
    pub url: String,
    /// Cache key linking back to the stored payload.
    pub hash: String,
    /// Mime type as stored (or recovered) by the cache.
    pub mime_type: String,
}

impl CapturedAsset {
    /// Filename of the backing cache file, `{hash}{ext}`.
    pub fn local_filename(&self) -> String {
        format!("{}{}", self.hash, extension_for_mime(&self.mime_type))
    }

    /// Path this asset is served under once exported, e.g. `/cache/{hash}.png`.
    pub fn public_path(&self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.local_filename())
    }
}

/// Session-scoped interceptor mediating sub-resource traffic through the
/// asset cache.
///
/// One instance per capture attempt: the manifest it accumulates belongs to
/// that attempt alone and is discarded with it on retry.
pub struct AssetInterceptor {
    cache: AssetCache,
    manifest: Mutex<Vec<CapturedAsset>>,
}

impl AssetInterceptor {
    /// Create an interceptor over the given cache with an empty manifest.
    pub fn new(cache: AssetCache) -> Self {
        Self { cache, manifest: Mutex::new(Vec::new()) }
    }

    /// Take the accumulated manifest, ordered by first sighting, one entry
    /// per distinct URL.
    pub fn take_manifest(&self) -> Vec<CapturedAsset> {
        std::mem::take(&mut *self.lock_manifest())
    }

    fn lock_manifest(&self) -> std::sync::MutexGuard<'_, Vec<CapturedAsset>> {
        self.manifest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, asset: CapturedAsset) {
        let mut manifest = self.lock_manifest();
        if !manifest.iter().any(|a| a.hash == asset.hash) {
            manifest.push(asset);
        }
    }
}

#[async_trait::async_trait]
impl RequestMediator for AssetInterceptor {
    async fn on_request(&self, request: &SubresourceRequest) -> InterceptAction {
        if !request.kind.is_static_asset() {
            return InterceptAction::Continue;
        }

        match self.cache.retrieve(&request.url).await {
            Some(asset) => {
                tracing::debug!(url = %request.url, "serving sub-resource from cache");
                self.record(CapturedAsset {
                    url: request.url.clone(),
                    hash: asset.hash,
                    mime_type: asset.mime_type.clone(),
                });
                InterceptAction::Fulfill { status: 200, content_type: asset.mime_type, body: asset.data }
            }
            None => InterceptAction::Continue,
        }
    }

    async fn on_response(&self, request: &SubresourceRequest, content_type: &str, body: &[u8]) {
        if !request.kind.is_static_asset() {
            return;
        }

        match self.cache.store(&request.url, body, content_type).await {
            Ok(asset) => {
                self.record(CapturedAsset { url: request.url.clone(), hash: asset.hash, mime_type: asset.mime_type });
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "failed to cache sub-resource, continuing uncached");
            }
        }
    }
}
