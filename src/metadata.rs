//! Immutable request descriptions.

use crate::modifiers::APPLICATION_JSON;
use crate::{BoxError, JsonEncoder, Modifiable, Modifier, Request};
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use url::Url;

/// A reusable description of a request relative to some base URL.
///
/// Method, path, query items and body are kept as plain data; anything else
/// is carried as extra modifiers that run after them. Every `with_*` method
/// returns a new description.
///
/// # Examples
///
/// ```
/// use callwright::metadata::RequestMetadata;
/// use callwright::Modifiable;
///
/// # async fn example() -> Result<(), callwright::BoxError> {
/// let search = RequestMetadata::get("/search")
///     .with_query_item("q", Some("rust"))
///     .with_query_item("lang", None::<String>)
///     .header("accept", "application/json");
///
/// let request = search.build(&"https://api.example.com".parse()?).await?;
/// assert_eq!(request.url.as_str(), "https://api.example.com/search?q=rust");
/// assert_eq!(search.path(), "/search");
/// assert_eq!(search.query_pairs().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    method: Method,
    path: String,
    query_items: Vec<(String, String)>,
    body: Option<Bytes>,
    modifier: Modifier,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_items: Vec::new(),
            body: None,
            modifier: Modifier::empty(),
        }
    }

    /// A GET request to `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A POST request to `path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A PUT request to `path`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A PATCH request to `path`.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// A DELETE request to `path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// A HEAD request to `path`.
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// An OPTIONS request to `path`.
    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, appended to the base URL's path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query items appended to the URL, in order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query_items
    }

    /// The encoded request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Adds a query item; a `None` value adds nothing.
    pub fn with_query_item(&self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.with_query_items([(key, value)])
    }

    /// Adds query items, dropping entries whose value is `None`.
    pub fn with_query_items<I, K, V>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        next.query_items.extend(
            items
                .into_iter()
                .filter_map(|(key, value)| Some((key.into(), value?.into()))),
        );
        next
    }

    /// Sets the raw request body.
    pub fn with_body(&self, body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            ..self.clone()
        }
    }

    /// Encodes `body` as JSON and sets `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns the encoder's error if `body` cannot be serialized.
    pub fn with_json_body<T: Serialize + ?Sized>(
        &self,
        body: &T,
        encoder: &JsonEncoder,
    ) -> serde_json::Result<Self> {
        let body = encoder.encode(body)?;
        Ok(self
            .with_body(body)
            .header(http::header::CONTENT_TYPE.as_str(), APPLICATION_JSON))
    }

    /// Returns the single modifier equivalent to this description.
    pub fn to_modifier(&self) -> Modifier {
        let mut modifier = Modifier::method(self.method.clone()).compose(&Modifier::path(self.path.clone()));
        if !self.query_items.is_empty() {
            modifier = modifier.compose(&Modifier::query_items(
                self.query_items
                    .iter()
                    .map(|(key, value)| (key.clone(), Some(value.clone()))),
            ));
        }
        if let Some(body) = &self.body {
            modifier = modifier.compose(&Modifier::body(body.clone()));
        }
        modifier.compose(&self.modifier)
    }

    /// Builds a concrete request against `base_url`.
    pub async fn build(&self, base_url: &Url) -> Result<Request, BoxError> {
        let mut request = Request::new(Method::GET, base_url.clone());
        self.to_modifier().apply(&mut request).await?;
        Ok(request)
    }
}

impl Modifiable for RequestMetadata {
    fn modifier(&self, modifier: Modifier) -> Self {
        Self {
            modifier: self.modifier.compose(&modifier),
            ..self.clone()
        }
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::get("")
    }
}
