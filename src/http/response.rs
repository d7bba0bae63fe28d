/// HTTP status codes produced by the daemon.
///
/// - `Ok` (200): Request successful
/// - `BadRequest` (400): Malformed request
/// - `Unauthorized` (401): Login gate failed
/// - `NotFound` (404): Resource not found or media type not served
/// - `InternalServerError` (500): Content could not be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lodge::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Unauthorized.as_u16(), 401);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// A complete HTTP response ready to be sent to a client.
///
/// Headers keep their insertion order, since several responses have a fixed
/// header layout. `Content-Length` always reflects `body.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers in emission order
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "text/plain")
///     .body(b"hi".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header, or replaces the value of an existing one in place.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// Appends several headers in order.
    pub fn headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in headers {
            set_header(&mut self.headers, k, v);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    ///
    /// `Content-Length` is overwritten with the real body size even when the
    /// caller supplied one.
    pub fn build(mut self) -> Response {
        let len = self.body.len().to_string();
        set_header(&mut self.headers, "Content-Length".to_string(), len);

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

fn set_header(headers: &mut Vec<(String, String)>, key: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
        Some(entry) => entry.1 = value,
        None => headers.push((key, value)),
    }
}

impl Response {
    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// The canonical 404 page.
    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NotFound)
            .header("Accept-Ranges", "bytes")
            .header("Content-Type", "text/html")
            .header("Content-Length", "")
            .header("Cache-Control", "max-age=86000")
            .header("Connection", "close")
            .body(b"404 Not Found".to_vec())
            .build()
    }

    /// Fallback for a request line that could not be parsed.
    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BadRequest)
            .header("Content-Type", "text/plain")
            .header("Connection", "close")
            .body(b"400 Bad Request".to_vec())
            .build()
    }

    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::InternalServerError)
            .header("Content-Type", "text/plain")
            .header("Connection", "close")
            .body(b"500 Internal Server Error".to_vec())
            .build()
    }

    /// Looks up a header value, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Header lines as `Key: Value` joined by CRLF, without the status line
    /// and without the blank line that ends the head.
    pub fn header_bytes(&self) -> Vec<u8> {
        self.headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\r\n")
            .into_bytes()
    }
}
