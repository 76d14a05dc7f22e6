//! The catalog of leaf modifiers.
//!
//! Each constructor returns a single-unit [`Modifier`]. Inputs that need
//! validating (header names and values, URL manipulation) are checked when
//! the modifier is applied, so a bad value surfaces as a
//! [`Error::Modify`](crate::Error::Modify) for the call that used it.

use crate::{BoxError, JsonEncoder, Modifier, Request};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::Method;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// `Content-Type` value set by JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Errors raised by the leaf modifiers.
#[derive(thiserror::Error, Debug)]
pub enum ModifierError {
    /// A header name could not be parsed.
    #[error("Invalid header name {name:?}: {source}")]
    InvalidHeaderName {
        /// The rejected name.
        name: String,
        /// The parse error.
        #[source]
        source: header::InvalidHeaderName,
    },

    /// A header value could not be parsed.
    #[error("Invalid value for header {name}: {source}")]
    InvalidHeaderValue {
        /// The header name.
        name: String,
        /// The parse error.
        #[source]
        source: header::InvalidHeaderValue,
    },

    /// The request URL cannot have path segments (e.g. `mailto:`).
    #[error("Cannot append path {path:?} to {url}")]
    CannotBeABase {
        /// The path that was being appended.
        path: String,
        /// The request URL.
        url: url::Url,
    },
}

/// Authorization schemes for [`Modifier::authorization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationScheme {
    /// `Basic`
    Basic,
    /// `Bearer`
    Bearer,
    /// `Digest`
    Digest,
    /// `HOBA`
    Hoba,
    /// `Mutual`
    Mutual,
    /// `AWS4-HMAC-SHA256`
    Aws4HmacSha256,
}

impl AuthorizationScheme {
    /// The scheme token as it appears in the header.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationScheme::Basic => "Basic",
            AuthorizationScheme::Bearer => "Bearer",
            AuthorizationScheme::Digest => "Digest",
            AuthorizationScheme::Hoba => "HOBA",
            AuthorizationScheme::Mutual => "Mutual",
            AuthorizationScheme::Aws4HmacSha256 => "AWS4-HMAC-SHA256",
        }
    }
}

/// Cache behaviour requested from intermediaries and the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Leave cache headers alone.
    #[default]
    Protocol,
    /// Revalidate with the origin (`Cache-Control: no-cache`, `Pragma: no-cache`).
    NoCache,
    /// Do not store the response (`Cache-Control: no-store`).
    NoStore,
    /// Only accept a cached response (`Cache-Control: only-if-cached`).
    OnlyIfCached,
    /// Accept cached responses up to the given age.
    MaxAge(Duration),
}

impl Modifier {
    /// Sets the HTTP method.
    pub fn method(method: Method) -> Modifier {
        Modifier::new(move |request: &mut Request| {
            request.method = method.clone();
            Ok::<_, BoxError>(())
        })
    }

    /// Appends `path` to the current URL path.
    ///
    /// Empty segments are skipped, so `"/users/"`, `"users"` and
    /// `"users/"` all append a single `users` segment. Segments are
    /// percent-encoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::{Modifier, Request};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), callwright::BoxError> {
    /// let mut request = Request::new(Method::GET, "https://api.example.com/v1".parse()?);
    /// Modifier::path("/users/42").apply(&mut request).await?;
    /// assert_eq!(request.url.as_str(), "https://api.example.com/v1/users/42");
    /// # Ok(())
    /// # }
    /// ```
    pub fn path(path: impl Into<String>) -> Modifier {
        let path = path.into();
        Modifier::new(move |request: &mut Request| append_path(request, &path))
    }

    /// Appends query items, keeping any already on the URL.
    ///
    /// Entries whose value is `None` are dropped. Keys are not
    /// de-duplicated, so applying this twice with the same key yields two
    /// pairs.
    pub fn query_items<I, K, V>(items: I) -> Modifier
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let items = present_items(items);
        Modifier::new(move |request: &mut Request| {
            if !items.is_empty() {
                request.url.query_pairs_mut().extend_pairs(items.iter());
            }
            Ok::<_, BoxError>(())
        })
    }

    /// Replaces query items by key.
    ///
    /// Existing pairs whose key matches one of the non-`None` entries are
    /// removed before the new pairs are appended. Other pairs are kept in
    /// their original order.
    pub fn set_query_items<I, K, V>(items: I) -> Modifier
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let items = present_items(items);
        Modifier::new(move |request: &mut Request| {
            if items.is_empty() {
                return Ok::<_, BoxError>(());
            }
            let kept: Vec<(String, String)> = request
                .url
                .query_pairs()
                .filter(|(key, _)| !items.iter().any(|(name, _)| name == key))
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            request
                .url
                .query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter())
                .extend_pairs(items.iter());
            Ok(())
        })
    }

    /// Sets a header, replacing any existing values.
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Modifier {
        let name = name.into();
        let value = value.into();
        Modifier::new(move |request: &mut Request| {
            let (name, value) = parse_header(&name, &value)?;
            request.headers.insert(name, value);
            Ok::<_, ModifierError>(())
        })
    }

    /// Removes a header.
    pub fn remove_header(name: impl Into<String>) -> Modifier {
        let name = name.into();
        Modifier::new(move |request: &mut Request| {
            request.headers.remove(name.as_str());
            Ok::<_, BoxError>(())
        })
    }

    /// Sets the `Accept` header.
    pub fn accept(value: impl Into<String>) -> Modifier {
        Modifier::header(header::ACCEPT.as_str(), value)
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(value: impl Into<String>) -> Modifier {
        Modifier::header(header::USER_AGENT.as_str(), value)
    }

    /// Sets `Authorization: <scheme> <credentials>`.
    pub fn authorization(scheme: AuthorizationScheme, credentials: impl Into<String>) -> Modifier {
        Modifier::header(
            header::AUTHORIZATION.as_str(),
            format!("{} {}", scheme.as_str(), credentials.into()),
        )
    }

    /// Sets `Authorization: Bearer <token>`.
    pub fn bearer(token: impl Into<String>) -> Modifier {
        Modifier::authorization(AuthorizationScheme::Bearer, token)
    }

    /// Sets `Authorization: Basic <base64(user_id:password)>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::{Modifier, Request};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), callwright::BoxError> {
    /// let mut request = Request::new(Method::GET, "https://api.example.com".parse()?);
    /// Modifier::basic("aladdin", "opensesame").apply(&mut request).await?;
    /// assert_eq!(request.header("authorization"), Some("Basic YWxhZGRpbjpvcGVuc2VzYW1l"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn basic(user_id: impl Into<String>, password: impl Into<String>) -> Modifier {
        let credentials = STANDARD.encode(format!("{}:{}", user_id.into(), password.into()));
        Modifier::authorization(AuthorizationScheme::Basic, credentials)
    }

    /// Sets the raw request body.
    pub fn body(body: impl Into<Bytes>) -> Modifier {
        let body = body.into();
        Modifier::new(move |request: &mut Request| {
            request.body = Some(body.clone());
            Ok::<_, BoxError>(())
        })
    }

    /// Encodes `body` as JSON and sets it along with
    /// `Content-Type: application/json`.
    ///
    /// Encoding happens immediately; if it fails, the returned modifier
    /// fails with the encoder's error whenever it is applied.
    pub fn json_body<T: Serialize + ?Sized>(body: &T, encoder: &JsonEncoder) -> Modifier {
        match encoder.encode(body) {
            Ok(bytes) => {
                let body = Bytes::from(bytes);
                Modifier::new(move |request: &mut Request| {
                    request.body = Some(body.clone());
                    request.headers.insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static(APPLICATION_JSON),
                    );
                    Ok::<_, BoxError>(())
                })
            }
            Err(err) => {
                let err = Arc::new(err);
                Modifier::new(move |_: &mut Request| Err::<(), BoxError>(Box::new(err.clone())))
            }
        }
    }

    /// Sets the per-request transport timeout.
    pub fn timeout(timeout: Duration) -> Modifier {
        Modifier::new(move |request: &mut Request| {
            request.timeout = Some(timeout);
            Ok::<_, BoxError>(())
        })
    }

    /// Writes the cache headers for `policy`.
    pub fn cache_policy(policy: CachePolicy) -> Modifier {
        Modifier::new(move |request: &mut Request| {
            let directive = match policy {
                CachePolicy::Protocol => return Ok::<_, BoxError>(()),
                CachePolicy::NoCache => {
                    request
                        .headers
                        .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
                    "no-cache".to_string()
                }
                CachePolicy::NoStore => "no-store".to_string(),
                CachePolicy::OnlyIfCached => "only-if-cached".to_string(),
                CachePolicy::MaxAge(age) => format!("max-age={}", age.as_secs()),
            };
            request
                .headers
                .insert(header::CACHE_CONTROL, HeaderValue::try_from(directive)?);
            Ok(())
        })
    }

    /// Sets `If-Modified-Since` to the HTTP-date form of `time`.
    pub fn if_modified_since(time: SystemTime) -> Modifier {
        Modifier::header(header::IF_MODIFIED_SINCE.as_str(), httpdate::fmt_http_date(time))
    }
}

fn present_items<I, K, V>(items: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: Into<String>,
    V: Into<String>,
{
    items
        .into_iter()
        .filter_map(|(key, value)| Some((key.into(), value?.into())))
        .collect()
}

fn append_path(request: &mut Request, path: &str) -> Result<(), ModifierError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(());
    }
    let url = request.url.clone();
    let mut existing = request
        .url
        .path_segments_mut()
        .map_err(|()| ModifierError::CannotBeABase {
            path: path.to_string(),
            url,
        })?;
    existing.pop_if_empty().extend(segments);
    Ok(())
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ModifierError> {
    let header_name =
        HeaderName::try_from(name).map_err(|source| ModifierError::InvalidHeaderName {
            name: name.to_string(),
            source,
        })?;
    let header_value =
        HeaderValue::try_from(value).map_err(|source| ModifierError::InvalidHeaderValue {
            name: name.to_string(),
            source,
        })?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn request(url: &str) -> Request {
        Request::new(Method::GET, url.parse().unwrap())
    }

    #[tokio::test]
    async fn test_path_appends_segments() {
        let mut req = request("https://api.example.com/v1/");
        Modifier::path("users/")
            .compose(&Modifier::path("/42"))
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.url.path(), "/v1/users/42");

        let mut req = request("https://api.example.com");
        Modifier::path("").apply(&mut req).await.unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.com/");
    }

    #[tokio::test]
    async fn test_path_on_cannot_be_a_base_url_fails() {
        let mut req = request("mailto:someone@example.com");
        let err = Modifier::path("inbox").apply(&mut req).await.unwrap_err();
        assert!(err.to_string().contains("Cannot append path"));
    }

    #[tokio::test]
    async fn test_query_items_append_and_drop_none() {
        let mut req = request("https://api.example.com/search?page=1");
        Modifier::query_items([("page", Some("2")), ("q", Some("rust")), ("skip", None)])
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.url.query(), Some("page=1&page=2&q=rust"));
    }

    #[tokio::test]
    async fn test_set_query_items_replaces_by_key() {
        let mut req = request("https://api.example.com/search?page=1&sort=asc&page=3");
        Modifier::set_query_items([("page", Some("2")), ("sort", None::<&str>)])
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.url.query(), Some("sort=asc&page=2"));
    }

    #[tokio::test]
    async fn test_query_items_encode_values() {
        let mut req = request("https://api.example.com/search");
        Modifier::query_items([("q", Some("a b&c"))])
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.url.query(), Some("q=a+b%26c"));
    }

    #[tokio::test]
    async fn test_header_set_replace_and_remove() {
        let mut req = request("https://api.example.com");
        Modifier::header("X-Trace", "one")
            .compose(&Modifier::header("x-trace", "two"))
            .compose(&Modifier::accept("text/plain"))
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.header("x-trace"), Some("two"));
        assert_eq!(req.headers.get_all("x-trace").iter().count(), 1);
        assert_eq!(req.header("accept"), Some("text/plain"));

        Modifier::remove_header("X-Trace")
            .apply(&mut req)
            .await
            .unwrap();
        assert!(req.header("x-trace").is_none());
    }

    #[tokio::test]
    async fn test_invalid_header_fails_on_apply() {
        let modifier = Modifier::header("bad header", "value");
        let mut req = request("https://api.example.com");
        let err = modifier.apply(&mut req).await.unwrap_err();
        assert!(err.to_string().contains("Invalid header name"));

        let modifier = Modifier::header("x-ok", "line\nbreak");
        let err = modifier.apply(&mut req).await.unwrap_err();
        assert!(err.to_string().contains("Invalid value for header x-ok"));
    }

    #[tokio::test]
    async fn test_authorization_helpers() {
        let mut req = request("https://api.example.com");
        Modifier::bearer("abc").apply(&mut req).await.unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));

        Modifier::authorization(AuthorizationScheme::Aws4HmacSha256, "Credential=x")
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(
            req.header("authorization"),
            Some("AWS4-HMAC-SHA256 Credential=x")
        );
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        #[derive(Serialize)]
        struct Payload {
            id: u32,
        }

        let mut req = request("https://api.example.com");
        Modifier::json_body(&Payload { id: 7 }, &JsonEncoder::default())
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.body_bytes(), br#"{"id":7}"#);
        assert_eq!(req.header("content-type"), Some(APPLICATION_JSON));
    }

    #[tokio::test]
    async fn test_json_body_encoding_failure_surfaces_on_apply() {
        use std::collections::HashMap;

        let mut body = HashMap::new();
        body.insert(vec![1u8], "non-string keys are not JSON");

        let modifier = Modifier::json_body(&body, &JsonEncoder::default());
        let mut req = request("https://api.example.com");
        assert!(modifier.apply(&mut req).await.is_err());
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn test_timeout_and_cache_headers() {
        let mut req = request("https://api.example.com");
        Modifier::timeout(Duration::from_secs(3))
            .compose(&Modifier::cache_policy(CachePolicy::NoCache))
            .compose(&Modifier::if_modified_since(UNIX_EPOCH))
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.timeout, Some(Duration::from_secs(3)));
        assert_eq!(req.header("cache-control"), Some("no-cache"));
        assert_eq!(req.header("pragma"), Some("no-cache"));
        assert_eq!(
            req.header("if-modified-since"),
            Some("Thu, 01 Jan 1970 00:00:00 GMT")
        );

        Modifier::cache_policy(CachePolicy::MaxAge(Duration::from_secs(60)))
            .apply(&mut req)
            .await
            .unwrap();
        assert_eq!(req.header("cache-control"), Some("max-age=60"));
    }
}
