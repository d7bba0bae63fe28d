//! MIME type detection from file extensions.

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guesses the media type of `path` from its extension.
///
/// The query string, if any, is ignored and the extension is matched
/// case-insensitively. Unknown extensions yield `application/octet-stream`.
///
/// ```
/// # use lodge::http::mime::mime_for_path;
/// assert_eq!(mime_for_path("/index.html"), "text/html");
/// assert_eq!(mime_for_path("/app.js?v=3"), "application/javascript");
/// assert_eq!(mime_for_path("/blob"), "application/octet-stream");
/// ```
pub fn mime_for_path(path: &str) -> &'static str {
    let path = path.split('?').next().unwrap_or(path);
    let file = path.rsplit('/').next().unwrap_or(path);

    let Some((_, ext)) = file.rsplit_once('.') else {
        return OCTET_STREAM;
    };

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/vnd.microsoft.icon",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "js" | "mjs" => "application/javascript",
        "crt" | "cer" | "der" | "pem" => "application/x-x509-ca-cert",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        _ => OCTET_STREAM,
    }
}
