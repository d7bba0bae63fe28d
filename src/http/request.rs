use std::collections::HashMap;
use std::fmt;

use crate::http::parser;
use crate::http::router::Hook;

/// HTTP request methods.
///
/// The well-known verbs get their own variant. Anything else that appears in
/// a request line is kept verbatim in `Other`, since the request line only
/// has to carry three tokens to be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other token found in the method position
    Other(String),
}

impl Method {
    /// Parses one of the well-known HTTP methods.
    ///
    /// # Example
    ///
    /// ```
    /// # use lodge::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    /// Like [`Method::from_str`], but never fails: unknown tokens become `Other`.
    pub fn parse(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|| Method::Other(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header map.
///
/// Lookups ignore ASCII case; the name as first seen on the wire is kept for
/// iteration. Inserting a name that already exists replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let folded = key.to_ascii_lowercase();
        match self.entries.get_mut(&folded) {
            Some(entry) => entry.1 = value.into(),
            None => {
                self.entries.insert(folded, (key, value.into()));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    /// The `Content-Length` value, if present and a valid number.
    pub fn content_length(&self) -> Option<usize> {
        self.get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries
            .remove(&key.to_ascii_lowercase())
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Represents a parsed HTTP request from a client.
///
/// `path` is already normalized (`/` becomes `/index.html`) and `body` never
/// holds more bytes than the declared `Content-Length`. `hook` is set when
/// the router had an exact `(method, path)` match.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path/URL (e.g., "/index.html")
    pub path: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers, case-insensitive
    pub headers: Headers,
    /// Cookies sent in the `Cookie` header
    pub cookies: HashMap<String, String>,
    /// Raw request body
    pub body: Vec<u8>,
    /// Handler registered for this exact method and path, if any
    pub hook: Option<Hook>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: Headers,
    cookies: HashMap<String, String>,
    body: Vec<u8>,
    hook: Option<Hook>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: None,
            headers: Headers::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
            hook: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            cookies: self.cookies,
            body: self.body,
            hook: self.hook,
        })
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// The declared `Content-Length`, if present and a valid number.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.content_length()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|v| v.as_str())
    }

    /// Decodes the body as `application/x-www-form-urlencoded` fields.
    ///
    /// Values are trimmed but not percent-decoded; see
    /// [`Request::form_decoded`] for that.
    pub fn form(&self) -> HashMap<String, String> {
        parser::parse_form(&self.body)
    }

    /// Decodes the body as form fields, resolving `+` and `%XX` escapes.
    pub fn form_decoded(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.body)
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }
}
