//! Core types and shared functionality for the clonify capture pipeline.
//!
//! This crate provides:
//! - File-backed, content-addressed asset cache
//! - Unified error types
//! - Layered application configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{AssetCache, CacheConfig, CachedAsset};
pub use config::AppConfig;
pub use error::Error;
