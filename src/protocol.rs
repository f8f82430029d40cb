//! app:// protocol: serve pages from the embedded UI, CSP, no external URLs.

use include_dir::{Dir, File};
use std::borrow::Cow;

/// CSP for app://. Inline script is allowed because the two pages are
/// self-contained single files.
pub const CSP: &str =
    "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; connect-src 'none';";

fn mime(path: &str) -> &'static str {
    if path.ends_with(".html") || path.ends_with('/') || path.is_empty() {
        "text/html"
    } else if path.ends_with(".js") {
        "application/javascript"
    } else if path.ends_with(".css") {
        "text/css"
    } else if path.ends_with(".json") {
        "application/json"
    } else if path.ends_with(".svg") {
        "image/svg+xml"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".glb") {
        "model/gltf-binary"
    } else if path.ends_with(".gltf") {
        "model/gltf+json"
    } else if path.ends_with(".woff2") {
        "font/woff2"
    } else {
        "application/octet-stream"
    }
}

pub enum ServeResult {
    Found {
        body: Cow<'static, [u8]>,
        mime_type: &'static str,
    },
    NotFound,
}

/// Serves one request from the embedded UI dir. `uri_path` is the URI path
/// (e.g. "/" or "/config.html"). Rejects path traversal; the dir is embedded
/// so ".." has no meaning, but reject anyway.
#[must_use]
pub fn serve(ui: &'static Dir, uri_path: &str) -> ServeResult {
    let path = uri_path.trim_start_matches('/').trim_end_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };
    if path.contains("..") {
        return ServeResult::NotFound;
    }
    let Some(file): Option<&File> = ui.get_file(path) else {
        return ServeResult::NotFound;
    };
    ServeResult::Found {
        body: Cow::Borrowed(file.contents()),
        mime_type: mime(path),
    }
}

/// Response helper with CSP and Content-Type.
pub fn response(
    status: u16,
    body: Cow<'static, [u8]>,
    mime_type: &'static str,
) -> http::Response<Cow<'static, [u8]>> {
    http::Response::builder()
        .status(status)
        .header("Content-Type", mime_type)
        .header("Content-Security-Policy", CSP)
        .header("X-Content-Type-Options", "nosniff")
        .body(body)
        .unwrap_or_else(|e| {
            log::error!("Protocol response build failed: {e}");
            http::Response::builder()
                .status(500)
                .body(Cow::Borrowed(b"Internal Server Error".as_slice()))
                .expect("static 500 response")
        })
}
