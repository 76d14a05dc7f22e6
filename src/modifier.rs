//! Composable, asynchronous request modifiers.
//!
//! A [`Modifier`] is an ordered list of units that each get a chance to
//! mutate an in-progress [`Request`]. Composing two modifiers concatenates
//! their units, so composition is associative, never reorders anything and
//! never touches the operands.

use crate::{BoxError, Request};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A single unit of request modification.
///
/// Implement this for modifiers that need their own state; for one-off
/// logic use [`Modifier::new`], [`Modifier::from_async`] or
/// [`Modifier::deferred`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use callwright::{BoxError, Modifier, Modify, Request};
///
/// struct RequestId(&'static str);
///
/// #[async_trait]
/// impl Modify for RequestId {
///     async fn modify(&self, request: &mut Request) -> Result<(), BoxError> {
///         request.headers.insert("x-request-id", self.0.parse()?);
///         Ok(())
///     }
/// }
///
/// let modifier = Modifier::from_modify(RequestId("abc-123"));
/// assert_eq!(modifier.len(), 1);
/// ```
#[async_trait]
pub trait Modify: Send + Sync {
    /// Mutates the request in place.
    async fn modify(&self, request: &mut Request) -> Result<(), BoxError>;
}

/// An ordered, immutable chain of request modification units.
///
/// Cloning is cheap: units are shared behind `Arc`s.
#[derive(Clone, Default)]
pub struct Modifier {
    units: Vec<Arc<dyn Modify>>,
}

impl Modifier {
    /// The identity modifier; applying it leaves the request untouched.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a modifier from a synchronous closure.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::{Modifier, Request};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), callwright::BoxError> {
    /// let modifier = Modifier::new(|request: &mut Request| {
    ///     request.method = Method::DELETE;
    ///     Ok::<_, std::convert::Infallible>(())
    /// });
    ///
    /// let mut request = Request::new(Method::GET, "https://api.example.com".parse()?);
    /// modifier.apply(&mut request).await?;
    /// assert_eq!(request.method, Method::DELETE);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<F, E>(f: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_modify(FnModify(f))
    }

    /// Creates a modifier from an async function that takes the request by
    /// value and returns the modified request.
    ///
    /// If the function fails, the request keeps the state it had before
    /// this unit ran.
    pub fn from_async<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Request, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_modify(AsyncModify(f))
    }

    /// Creates a modifier that asynchronously produces another modifier and
    /// applies it.
    ///
    /// This is the natural shape for authentication that first needs to
    /// fetch or refresh a token:
    ///
    /// ```
    /// use callwright::Modifier;
    ///
    /// async fn fetch_token() -> Result<String, std::io::Error> {
    ///     Ok("secret".to_string())
    /// }
    ///
    /// let auth = Modifier::deferred(|| async {
    ///     let token = fetch_token().await?;
    ///     Ok::<_, std::io::Error>(Modifier::bearer(token))
    /// });
    /// ```
    pub fn deferred<F, Fut, E>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Modifier, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_modify(DeferredModify(f))
    }

    /// Wraps a [`Modify`] implementation.
    pub fn from_modify(unit: impl Modify + 'static) -> Self {
        Self {
            units: vec![Arc::new(unit)],
        }
    }

    /// Returns a modifier that applies `self` and then `other`.
    ///
    /// Neither operand is changed.
    pub fn compose(&self, other: &Modifier) -> Modifier {
        let mut units = Vec::with_capacity(self.units.len() + other.units.len());
        units.extend(self.units.iter().cloned());
        units.extend(other.units.iter().cloned());
        Modifier { units }
    }

    /// Applies every unit in order, stopping at the first failure.
    ///
    /// Changes made by units that ran before the failing one are kept.
    pub async fn apply(&self, request: &mut Request) -> Result<(), BoxError> {
        for unit in &self.units {
            unit.modify(request).await?;
        }
        Ok(())
    }

    /// Returns the number of units in the chain.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` for the identity modifier.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Free-function form of [`Modifier::compose`].
pub fn compose(first: &Modifier, second: &Modifier) -> Modifier {
    first.compose(second)
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier")
            .field("units", &self.units.len())
            .finish()
    }
}

impl FromIterator<Modifier> for Modifier {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Modifier::empty(), |acc, next| acc.compose(&next))
    }
}

struct FnModify<F>(F);

#[async_trait]
impl<F, E> Modify for FnModify<F>
where
    F: Fn(&mut Request) -> Result<(), E> + Send + Sync,
    E: Into<BoxError>,
{
    async fn modify(&self, request: &mut Request) -> Result<(), BoxError> {
        (self.0)(request).map_err(Into::into)
    }
}

struct AsyncModify<F>(F);

#[async_trait]
impl<F, Fut, E> Modify for AsyncModify<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Request, E>> + Send,
    E: Into<BoxError>,
{
    async fn modify(&self, request: &mut Request) -> Result<(), BoxError> {
        *request = (self.0)(request.clone()).await.map_err(Into::into)?;
        Ok(())
    }
}

struct DeferredModify<F>(F);

#[async_trait]
impl<F, Fut, E> Modify for DeferredModify<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Modifier, E>> + Send,
    E: Into<BoxError>,
{
    async fn modify(&self, request: &mut Request) -> Result<(), BoxError> {
        let modifier = (self.0)().await.map_err(Into::into)?;
        modifier.apply(request).await
    }
}

/// Types that can be specialized with extra request modifiers.
///
/// Every method returns a new value and leaves `self` untouched, so a shared
/// client or builder can be forked freely. The provided methods are thin
/// shorthands over the [`Modifier`] catalog.
pub trait Modifiable: Sized {
    /// Returns a copy of `self` with `modifier` composed onto its chain.
    fn modifier(&self, modifier: Modifier) -> Self;

    /// Composes a synchronous closure onto the chain.
    fn modify_with<F, E>(&self, f: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.modifier(Modifier::new(f))
    }

    /// Sets a header, replacing any existing value.
    fn header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.modifier(Modifier::header(name, value))
    }

    /// Removes a header.
    fn remove_header(&self, name: impl Into<String>) -> Self {
        self.modifier(Modifier::remove_header(name))
    }

    /// Sets the `Accept` header.
    fn accept(&self, value: impl Into<String>) -> Self {
        self.modifier(Modifier::accept(value))
    }

    /// Sets the `User-Agent` header.
    fn user_agent(&self, value: impl Into<String>) -> Self {
        self.modifier(Modifier::user_agent(value))
    }

    /// Sets `Authorization: Bearer <token>`.
    fn bearer(&self, token: impl Into<String>) -> Self {
        self.modifier(Modifier::bearer(token))
    }

    /// Sets HTTP basic authorization.
    fn basic(&self, user_id: impl Into<String>, password: impl Into<String>) -> Self {
        self.modifier(Modifier::basic(user_id, password))
    }

    /// Appends one query item; `None` values are dropped.
    fn query_item(&self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.modifier(Modifier::query_items([(name, value)]))
    }

    /// Appends query items; entries with `None` values are dropped.
    fn query_items<I, K, V>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.modifier(Modifier::query_items(items))
    }

    /// Replaces query items that share a key with one of `items`.
    fn set_query_items<I, K, V>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.modifier(Modifier::set_query_items(items))
    }

    /// Sets the transport timeout for the request.
    fn timeout(&self, timeout: Duration) -> Self {
        self.modifier(Modifier::timeout(timeout))
    }

    /// Sets cache-control headers.
    fn cache_policy(&self, policy: crate::CachePolicy) -> Self {
        self.modifier(Modifier::cache_policy(policy))
    }

    /// Sets the `If-Modified-Since` header.
    fn if_modified_since(&self, time: SystemTime) -> Self {
        self.modifier(Modifier::if_modified_since(time))
    }

    /// Sets a `multipart/form-data` body.
    fn multipart_form_data(&self, fields: Vec<crate::FormField>) -> Self {
        self.modifier(Modifier::multipart_form_data(fields))
    }
}

impl Modifiable for Modifier {
    fn modifier(&self, modifier: Modifier) -> Self {
        self.compose(&modifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn request() -> Request {
        Request::new(Method::GET, "https://api.example.com".parse().unwrap())
    }

    fn set_method(method: Method) -> Modifier {
        Modifier::new(move |request: &mut Request| {
            request.method = method.clone();
            Ok::<_, BoxError>(())
        })
    }

    fn record(log: &Arc<Mutex<Vec<usize>>>, id: usize) -> Modifier {
        let log = log.clone();
        Modifier::new(move |_: &mut Request| {
            log.lock().unwrap().push(id);
            Ok::<_, BoxError>(())
        })
    }

    #[tokio::test]
    async fn test_compose_applies_in_order() {
        let modifier = set_method(Method::GET).compose(&set_method(Method::POST));

        let mut req = request();
        modifier.apply(&mut req).await.unwrap();
        assert_eq!(req.method, Method::POST);
    }

    #[tokio::test]
    async fn test_compose_is_associative() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (record(&log, 1), record(&log, 2), record(&log, 3));

        let left = a.compose(&b).compose(&c);
        let right = a.compose(&b.compose(&c));

        left.apply(&mut request()).await.unwrap();
        right.apply(&mut request()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_compose_leaves_operands_untouched() {
        let a = set_method(Method::PUT);
        let b = set_method(Method::PATCH);
        let composed = compose(&a, &b);

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(composed.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_short_circuits_and_keeps_earlier_changes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let modifier = set_method(Method::DELETE)
            .compose(&Modifier::new(|_: &mut Request| Err::<(), _>("first failure")))
            .compose(&Modifier::new(move |request: &mut Request| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                request
                    .headers
                    .insert("x-after", HeaderValue::from_static("1"));
                Ok::<_, BoxError>(())
            }));

        let mut req = request();
        let err = modifier.apply(&mut req).await.unwrap_err();

        assert_eq!(err.to_string(), "first failure");
        assert_eq!(req.method, Method::DELETE);
        assert!(req.headers.get("x-after").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_and_collected_modifiers() {
        let mut req = request();
        Modifier::empty().apply(&mut req).await.unwrap();
        assert_eq!(req.method, Method::GET);

        let none: Modifier = Vec::<Modifier>::new().into_iter().collect();
        assert!(none.is_empty());

        let chain: Modifier = vec![set_method(Method::HEAD), set_method(Method::OPTIONS)]
            .into_iter()
            .collect();
        chain.apply(&mut req).await.unwrap();
        assert_eq!(req.method, Method::OPTIONS);
    }

    #[tokio::test]
    async fn test_async_modifiers() {
        let from_async = Modifier::from_async(|mut request: Request| async move {
            tokio::task::yield_now().await;
            request.method = Method::PUT;
            Ok::<_, BoxError>(request)
        });
        let deferred = Modifier::deferred(|| async {
            tokio::task::yield_now().await;
            Ok::<_, BoxError>(Modifier::bearer("token"))
        });

        let mut req = request();
        from_async.compose(&deferred).apply(&mut req).await.unwrap();
        assert_eq!(req.method, Method::PUT);
        assert_eq!(req.header("authorization"), Some("Bearer token"));
    }

    #[tokio::test]
    async fn test_failed_async_modifier_keeps_previous_state() {
        let modifier = Modifier::from_async(|_request: Request| async move {
            Err::<Request, _>("token endpoint unavailable")
        });

        let mut req = request();
        req.method = Method::PATCH;
        assert!(modifier.apply(&mut req).await.is_err());
        assert_eq!(req.method, Method::PATCH);
    }
}
