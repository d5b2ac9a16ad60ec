//! Bundle assembly: rewriting captured markup against local cache paths.
//!
//! After a capture, asset references in the serialized DOM still point at
//! their original origins. Rewriting swaps each captured URL for the path
//! its cache file is served under, producing a self-contained bundle for
//! preview or export. Stylesheet bodies get their relative `url(...)`
//! references resolved against the stylesheet's own URL first, so they
//! survive being served from a different origin.

use regex::Regex;
use url::Url;

use crate::intercept::CapturedAsset;
use crate::scrape::PageCapture;

/// Replace every captured asset's original URL in `html` with its public
/// cache path (`{prefix}/{hash}{ext}`).
///
/// Longer URLs are replaced first so an asset URL that is a prefix of
/// another (e.g. a versioned query-string variant) cannot clobber it.
pub fn rewrite_asset_references(html: &str, assets: &[CapturedAsset], public_prefix: &str) -> String {
    let mut ordered: Vec<&CapturedAsset> = assets.iter().collect();
    ordered.sort_by(|a, b| b.url.len().cmp(&a.url.len()));

    let mut out = html.to_string();
    for asset in ordered {
        out = out.replace(&asset.url, &asset.public_path(public_prefix));
    }
    out
}

/// Convenience over [`rewrite_asset_references`] for a whole capture.
pub fn assemble(capture: &PageCapture, public_prefix: &str) -> String {
    rewrite_asset_references(&capture.html, &capture.assets, public_prefix)
}

/// Resolve relative `url(...)` references inside a CSS body against the
/// stylesheet's own URL.
///
/// Absolute (`http:`, `https:`, `ftp:`), protocol-relative (`//`), `data:`
/// and fragment references are left untouched; a reference that fails to
/// resolve keeps its original text.
pub fn rewrite_css_urls(css: &str, css_base: &Url) -> String {
    let re = Regex::new(r#"url\(\s*(['"]?)([^)'"]+?)\s*['"]?\s*\)"#).expect("valid regex");

    re.replace_all(css, |caps: &regex::Captures<'_>| {
        let quote = &caps[1];
        let reference = caps[2].trim();

        let skip = reference.starts_with("http://")
            || reference.starts_with("https://")
            || reference.starts_with("ftp://")
            || reference.starts_with("data:")
            || reference.starts_with("//")
            || reference.starts_with('#');
        if skip {
            return caps[0].to_string();
        }

        match css_base.join(reference) {
            Ok(absolute) => format!("url({quote}{absolute}{quote})"),
            Err(_) => {
                tracing::debug!(reference, base = %css_base, "could not resolve css url reference");
                caps[0].to_string()
            }
        }
    })
    .into_owned()
}
