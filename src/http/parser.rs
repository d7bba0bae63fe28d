use std::collections::HashMap;

use crate::http::request::{Headers, Method, Request};
use crate::http::router::Router;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Everything except a broken request line is recovered with a permissive
/// default, so this is the only way parsing can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line: {0:?}")]
    MalformedRequest(String),
}

/// The three tokens of the first line, with the path already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub path: String,
    pub version: String,
}

/// Parses a complete request message.
///
/// The router is consulted with the normalized path; a miss leaves
/// `Request::hook` empty.
pub fn parse_http_request(raw: &[u8], router: &Router) -> Result<Request, ParseError> {
    let (head, body) = split_head_body(raw);

    let line = extract_request_line(&head)?;
    let headers = parse_headers(&head);

    let cookies = headers
        .get("Cookie")
        .map(parse_cookies)
        .unwrap_or_default();

    let body = slice_body(body, headers.content_length()).to_vec();

    let hook = router.lookup(&line.method, &line.path);

    Ok(Request {
        method: line.method,
        path: line.path,
        version: line.version,
        headers,
        cookies,
        body,
        hook,
    })
}

/// Splits a raw message at the first CRLFCRLF.
///
/// The header block is decoded lossily; the body bytes are returned as-is.
/// Without a terminator the whole input is treated as the header block.
pub fn split_head_body(raw: &[u8]) -> (String, &[u8]) {
    match find_headers_end(raw) {
        Some(end) => (
            String::from_utf8_lossy(&raw[..end]).into_owned(),
            &raw[end + HEADER_TERMINATOR.len()..],
        ),
        None => (String::from_utf8_lossy(raw).into_owned(), &raw[raw.len()..]),
    }
}

pub fn extract_request_line(head: &str) -> Result<RequestLine, ParseError> {
    let first = head.lines().next().unwrap_or_default();
    let tokens: Vec<&str> = first.split_whitespace().collect();

    let &[method, path, version] = tokens.as_slice() else {
        return Err(ParseError::MalformedRequest(first.to_string()));
    };

    let path = if path == "/" { "/index.html" } else { path };

    Ok(RequestLine {
        method: Method::parse(method),
        path: path.to_string(),
        version: version.to_string(),
    })
}

/// Collects `Key: Value` lines after the request line. Lines without the
/// `": "` separator are skipped.
pub fn parse_headers(head: &str) -> Headers {
    let mut headers = Headers::new();

    for line in head.split("\r\n").skip(1) {
        if let Some((key, value)) = line.split_once(": ") {
            headers.insert(key, value);
        }
    }

    headers
}

pub fn parse_cookies(header_value: &str) -> HashMap<String, String> {
    header_value
        .split("; ")
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Truncates `body` to the declared length when enough bytes were captured.
/// A short body is passed through untouched.
pub fn slice_body(body: &[u8], declared: Option<usize>) -> &[u8] {
    match declared {
        Some(len) if body.len() >= len => &body[..len],
        _ => body,
    }
}

pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(body)
        .split('&')
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Total number of bytes the message in `buf` is expected to occupy.
///
/// `None` until the header terminator has arrived. An absent or unparseable
/// `Content-Length` counts as an empty body. A length too large to add up
/// saturates at `usize::MAX`, which no size limit admits.
pub fn expected_length(buf: &[u8]) -> Option<usize> {
    let end = find_headers_end(buf)?;
    let head = String::from_utf8_lossy(&buf[..end]);

    let declared = parse_headers(&head).content_length().unwrap_or(0);

    Some((end + HEADER_TERMINATOR.len()).saturating_add(declared))
}

pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}
