//! Mime-type to file-extension mapping for cached assets.
//!
//! Storage uses a fixed forward table; anything outside it is written with
//! no extension. Retrieval recovers the mime type from the extension with a
//! broader reverse table, falling back to `application/octet-stream`.

/// File extension (including the dot) used when storing a payload of the
/// given mime type. Unknown types get no extension.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "text/css" => ".css",
        "text/javascript" | "application/javascript" => ".js",
        _ => "",
    }
}

/// Mime type recovered from a stored file's extension (without the dot).
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "css" => "text/css",
        "js" => "application/javascript",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}
