//! The concrete outbound request that modifiers operate on.

use bytes::Bytes;
use http::{HeaderMap, Method};
use std::time::Duration;
use url::Url;

/// A concrete HTTP request, built up in place by a chain of [`Modifier`]s.
///
/// Every call starts from `GET <base url>` and lets the default, call-site and
/// authentication modifiers shape it before it is handed to the transport.
///
/// [`Modifier`]: crate::Modifier
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,

    /// The absolute request URL, including query parameters.
    pub url: Url,

    /// Request headers.
    pub headers: HeaderMap,

    /// The request body, if any.
    pub body: Option<Bytes>,

    /// Per-request timeout enforced by the transport.
    pub timeout: Option<Duration>,
}

impl Request {
    /// Creates a request with no headers, body or timeout.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Returns a header value by name, if present and valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::Request;
    /// use http::{HeaderValue, Method};
    ///
    /// let mut request = Request::new(Method::GET, "https://api.example.com".parse().unwrap());
    /// request.headers.insert("accept", HeaderValue::from_static("application/json"));
    ///
    /// assert_eq!(request.header("accept"), Some("application/json"));
    /// assert_eq!(request.header("authorization"), None);
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the body bytes, or an empty slice when there is no body.
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }
}
