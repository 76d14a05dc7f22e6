//! Response wrapper that pairs a body with HTTP response metadata.
//!
//! The [`Response`] type carries the raw or decoded body along with the status
//! code, headers, effective URL and transport latency of the exchange.

use crate::transport::EffectiveUrl;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use url::Url;

/// A received HTTP response.
///
/// `Response<Bytes>` is the raw form that validators inspect; `perform_json`
/// returns `Response<T>` for a decoded body and `download` returns
/// `Response<PathBuf>` pointing at the destination file.
///
/// # Type Parameters
///
/// * `T` - The type of the body
///
/// # Examples
///
/// ```no_run
/// use callwright::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), callwright::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get("/users/123").perform_json::<User>().await?;
///
/// println!("User: {}", response.data.name);
/// println!("Request took {:?}", response.latency);
/// println!("Status: {}", response.status);
/// println!("Served from: {}", response.url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The response body.
    pub data: T,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The URL that produced the response, after any redirects.
    pub url: Url,

    /// Time spent in the transport for this exchange.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(data: T, status: StatusCode, headers: HeaderMap, url: Url, latency: Duration) -> Self {
        Self {
            data,
            status,
            headers,
            url,
            latency,
        }
    }

    /// Builds a `Response` from an `http::Response`.
    ///
    /// The effective URL is read from an [`EffectiveUrl`] extension when the
    /// transport recorded one, and falls back to `request_url` otherwise.
    pub fn from_http(response: http::Response<T>, request_url: &Url, latency: Duration) -> Self {
        let (parts, data) = response.into_parts();
        let url = parts
            .extensions
            .get::<EffectiveUrl>()
            .map(|effective| effective.0.clone())
            .unwrap_or_else(|| request_url.clone());
        Self::new(data, parts.status, parts.headers, url, latency)
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// This is useful when you want to transform the response data while
    /// preserving the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use callwright::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     "https://api.example.com/answer".parse().unwrap(),
    ///     Duration::from_millis(100),
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            url: self.url,
            latency: self.latency,
        }
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use callwright::Response;
    /// # use http::{HeaderMap, StatusCode, HeaderValue};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new(
    ///     (),
    ///     StatusCode::OK,
    ///     headers,
    ///     "https://api.example.com".parse().unwrap(),
    ///     Duration::from_millis(100),
    /// );
    ///
    /// assert_eq!(
    ///     response.header("content-type").unwrap(),
    ///     "application/json"
    /// );
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_from_http_prefers_effective_url() {
        let request_url: Url = "https://api.example.com/old".parse().unwrap();
        let mut response = http::Response::new(Bytes::from_static(b"{}"));
        *response.status_mut() = StatusCode::CREATED;
        response
            .extensions_mut()
            .insert(EffectiveUrl("https://api.example.com/new".parse().unwrap()));

        let response = Response::from_http(response, &request_url, Duration::from_millis(5));
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.url.path(), "/new");
        assert_eq!(response.latency, Duration::from_millis(5));
    }

    #[test]
    fn test_from_http_falls_back_to_request_url() {
        let request_url: Url = "https://api.example.com/items".parse().unwrap();
        let response = Response::from_http(http::Response::new(()), &request_url, Duration::ZERO);
        assert_eq!(response.url, request_url);
        assert_eq!(response.status, StatusCode::OK);
    }
}
