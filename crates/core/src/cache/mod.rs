//! File-backed, content-addressed cache for captured sub-resources.
//!
//! Assets are keyed by a digest of their source URL and written as flat
//! files named `{hash}{ext}` under a single directory. It supports:
//!
//! - URL-addressed storage using SHA-256 hashing
//! - Mime-aware file extensions with extension-tolerant lookup
//! - Self-healing directory creation and permission fix-up
//! - Full clear and age-based sweep housekeeping
//!
//! Hashing only the URL (never content or validators like ETag) keeps
//! lookups O(1) without an index file, at the cost of unversioned entries:
//! a resource that changes at the same URL serves stale bytes until a clear
//! or sweep. The capture cache is short-lived, so the tradeoff favors speed.

pub mod hash;
pub mod mime;
pub mod store;

pub use crate::Error;

pub use store::{AssetCache, CacheConfig, CachedAsset};
