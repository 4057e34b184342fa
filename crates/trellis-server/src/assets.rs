//! Static file serving using rust-embed

use axum::{
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Embed the client directory at compile time
#[derive(RustEmbed)]
#[folder = "../../client"]
struct ClientAssets;

/// Serve static files from the embedded client directory
pub async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    // Default to index.html for root path
    let path = if path.is_empty() { "index.html" } else { path };

    match ClientAssets::get(path) {
        Some(content) => {
            let mime_type = mime_guess::from_path(path).first_or_text_plain();
            ([(header::CONTENT_TYPE, mime_type.to_string())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

/// Serve the index.html file
pub async fn index_handler() -> Html<String> {
    match ClientAssets::get("index.html") {
        Some(content) => Html(String::from_utf8_lossy(&content.data).into_owned()),
        None => Html("<html><body><h1>Trellis</h1><p>Client files not found.</p></body></html>".to_string()),
    }
}
