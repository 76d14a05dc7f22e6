//! HTTP client orchestration.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.
//!
//! Every call runs the same pipeline: apply modifiers to a fresh request,
//! execute it through the transport, validate the response and, for typed
//! calls, decode the body. A failure in any step is reported as the
//! [`Error`] variant for that step.

use crate::transport::{RawResponse, TransferOutcome};
use crate::{
    metadata::RequestMetadata, BoxError, Error, FatalError, JsonDecoder, JsonEncoder, Modifiable, Modifier,
    ReqwestTransport, Request, RequestBuilder, Response, Result, Transport, Validatable, Validator,
};
use bytes::Bytes;
use http::Method;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};
use url::Url;

/// Produces the response for a request in place of a live transport.
pub(crate) type Provider = dyn Fn(&Request) -> Result<Response<Bytes>> + Send + Sync;

/// An HTTP client holding shared policy for many calls.
///
/// A client is an immutable value: the "adding" methods ([`modifier`],
/// [`validator`], [`authentication`], ...) return a new client and leave the
/// original untouched, so a root client can be shared across tasks and
/// specialized per call site without locking.
///
/// [`modifier`]: Modifiable::modifier
/// [`validator`]: Validatable::validator
/// [`authentication`]: Client::authentication
///
/// # Examples
///
/// ```no_run
/// use callwright::{Client, Modifiable, Modifier, Response};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
///     email: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), callwright::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .authentication(Modifier::bearer("secret"))
///     .build()?;
///
/// // GET request
/// let user: Response<User> = client.get("/users/123").perform_json().await?;
/// println!("User: {}", user.data.name);
///
/// // POST request
/// let new_user = CreateUser {
///     name: "Alice".to_string(),
///     email: "alice@example.com".to_string(),
/// };
/// let created: Response<User> = client.post("/users").json(&new_user).perform_json().await?;
/// println!("Created user with ID: {}", created.data.id);
///
/// // A derived client; `client` itself is unchanged.
/// let admin = client.header("x-role", "admin");
/// admin.delete("/users/123").send().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    backend: Backend,
    base_url: Url,
    modifier: Modifier,
    validator: Validator,
    authentication: Modifier,
    encoder: JsonEncoder,
    decoder: JsonDecoder,
}

#[derive(Clone)]
pub(crate) enum Backend {
    Transport(Arc<dyn Transport>),
    Mock { provider: Arc<Provider>, validate: bool },
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use callwright::Client;
    ///
    /// # async fn example() -> Result<(), callwright::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The URL every request starts from.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The default JSON encoder for request bodies.
    pub fn encoder(&self) -> JsonEncoder {
        self.inner.encoder
    }

    /// The default JSON decoder for response bodies.
    pub fn decoder(&self) -> JsonDecoder {
        self.inner.decoder
    }

    fn derive(&self, update: impl FnOnce(&mut ClientInner)) -> Client {
        let mut inner = (*self.inner).clone();
        update(&mut inner);
        Client {
            inner: Arc::new(inner),
        }
    }

    /// Returns a client that additionally applies `modifier` as
    /// authentication.
    ///
    /// Authentication runs after every other modifier and is skipped
    /// entirely for calls marked [`anonymous`](RequestBuilder::anonymous).
    pub fn authentication(&self, modifier: Modifier) -> Client {
        self.derive(|inner| inner.authentication = inner.authentication.compose(&modifier))
    }

    /// Like [`authentication`](Client::authentication), but the modifier is
    /// produced asynchronously on every call (e.g. after refreshing a
    /// token).
    pub fn authentication_with<F, Fut, E>(&self, f: F) -> Client
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Modifier, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.authentication(Modifier::deferred(f))
    }

    /// Returns a client with an empty default validator chain.
    ///
    /// Validators added afterwards, on the client or per call, still run.
    pub fn without_default_validators(&self) -> Client {
        self.derive(|inner| inner.validator = Validator::empty())
    }

    /// Starts a request with the given method and relative path.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        self.prepare(RequestMetadata::new(method, path))
    }

    /// Starts a request from a [`RequestMetadata`] description.
    pub fn prepare(&self, metadata: RequestMetadata) -> RequestBuilder {
        RequestBuilder::new(self.clone(), None).modifier(metadata.to_modifier())
    }

    /// Starts a call from a prebuilt request instead of the base URL.
    ///
    /// The client's modifiers, authentication and validators still apply.
    pub fn send_request(&self, request: Request) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Some(request))
    }

    /// Starts a GET request to `path`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use callwright::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), callwright::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user = client.get("/users/123").json_body::<User>().await?;
    /// println!("User: {}", user.name);
    /// # Ok(())
    /// # }
    /// ```
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Starts a POST request to `path`.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request to `path`.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request to `path`.
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE request to `path`.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Starts a HEAD request to `path`.
    pub fn head(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::HEAD, path)
    }

    /// Starts an OPTIONS request to `path`.
    pub fn options(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::OPTIONS, path)
    }

    /// Builds the concrete request for one call.
    ///
    /// Modifiers run as default chain, then `extra`, then authentication
    /// unless the call is anonymous.
    pub(crate) async fn build_request(
        &self,
        seed: Option<Request>,
        extra: &Modifier,
        anonymous: bool,
    ) -> Result<Request> {
        let mut request = seed.unwrap_or_else(|| Request::new(Method::GET, self.inner.base_url.clone()));

        let mut chain = self.inner.modifier.compose(extra);
        if !anonymous {
            chain = chain.compose(&self.inner.authentication);
        }

        match chain.apply(&mut request).await {
            Ok(()) => Ok(request),
            Err(source) => {
                tracing::warn!(
                    error = %source,
                    method = %request.method,
                    url = %request.url,
                    "Request modifier failed"
                );
                Err(Error::Modify {
                    request: Box::new(request),
                    source,
                })
            }
        }
    }

    /// Executes `request` and validates the buffered response.
    pub(crate) async fn execute(&self, request: &Request, extra: &Validator) -> Result<Response<Bytes>> {
        let transport = match &self.inner.backend {
            Backend::Transport(transport) => transport,
            Backend::Mock { provider, validate } => {
                let response = provider(request)?;
                return if *validate {
                    self.validate(request, response, extra)
                } else {
                    Ok(response)
                };
            }
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            "Executing HTTP request"
        );

        let start_time = Instant::now();
        let raw = transport.execute(request).await.map_err(|source| {
            tracing::warn!(error = %source, url = %request.url, "Transport failed");
            Error::Transport {
                request: Box::new(request.clone()),
                source,
            }
        })?;
        let latency = start_time.elapsed();

        let response = http_response(request, raw, latency)?;
        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = latency.as_millis(),
            url = %response.url,
            "Received HTTP response"
        );

        self.validate(request, response, extra)
    }

    /// Downloads the response body for `request` to `destination`.
    ///
    /// If the returned future is dropped before the transfer finishes, the
    /// transfer is cancelled.
    pub(crate) async fn download(
        &self,
        request: &Request,
        extra: &Validator,
        destination: &Path,
    ) -> Result<Response<PathBuf>> {
        let transport = match &self.inner.backend {
            Backend::Transport(transport) => transport,
            Backend::Mock { provider, validate } => {
                let response = provider(request)?;
                let body = response.data.clone();
                // Same empty-body snapshot a live download validates.
                let mut snapshot = response.map(|_| Bytes::new());
                if *validate {
                    snapshot = self.validate(request, snapshot, extra)?;
                }
                copy_into_place(&mut &body[..], destination)
                    .await
                    .map_err(|source| move_failure(request, destination, source))?;
                return Ok(snapshot.map(|_| destination.to_path_buf()));
            }
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            destination = %destination.display(),
            "Starting download"
        );

        let start_time = Instant::now();
        let (completion, cancel) = transport.download(request).into_parts();
        let guard = cancel.drop_guard();
        let outcome = completion.await;
        guard.disarm();
        let latency = start_time.elapsed();

        let Some(TransferOutcome { file, response, error }) = outcome else {
            tracing::error!(url = %request.url, "Transfer ended without reporting an outcome");
            return Err(FatalError::ClientDeallocated {
                request: Box::new(request.clone()),
            }
            .into());
        };

        if let Some(source) = error {
            tracing::warn!(error = %source, url = %request.url, "Download failed");
            return Err(Error::Transport {
                request: Box::new(request.clone()),
                source,
            });
        }

        let head = match response {
            Some(raw) => http_response(request, raw, latency)?,
            None => {
                return Err(FatalError::NotHttpResponse {
                    request: Box::new(request.clone()),
                    response: None,
                }
                .into())
            }
        };
        tracing::info!(
            status = head.status.as_u16(),
            latency_ms = latency.as_millis(),
            url = %head.url,
            "Received download response"
        );

        // Only status and headers are available to validators here.
        let snapshot = self.validate(request, head.map(|()| Bytes::new()), extra)?;

        let Some(file) = file else {
            tracing::error!(url = %request.url, "Transfer reported neither a file nor an error");
            return Err(FatalError::Unknown {
                request: Some(Box::new(request.clone())),
                source: Some("transfer completed without a file".into()),
            }
            .into());
        };

        move_into_place(file, destination)
            .await
            .map_err(|source| move_failure(request, destination, source))?;

        Ok(snapshot.map(|_| destination.to_path_buf()))
    }

    fn validate(&self, request: &Request, response: Response<Bytes>, extra: &Validator) -> Result<Response<Bytes>> {
        let chain = self.inner.validator.compose(extra);
        match chain.validate(request, &response) {
            Ok(()) => Ok(response),
            Err(source) => {
                tracing::warn!(
                    error = %source,
                    status = response.status.as_u16(),
                    url = %request.url,
                    "Response rejected by validator"
                );
                Err(Error::Validate {
                    request: Box::new(request.clone()),
                    response: Box::new(response),
                    source,
                })
            }
        }
    }
}

fn http_response<B>(request: &Request, raw: RawResponse<B>, latency: Duration) -> Result<Response<B>> {
    match raw {
        RawResponse::Http(response) => Ok(Response::from_http(response, &request.url, latency)),
        RawResponse::Other(description) => {
            tracing::error!(response = %description, url = %request.url, "Transport returned a non-HTTP response");
            Err(FatalError::NotHttpResponse {
                request: Box::new(request.clone()),
                response: Some(description),
            }
            .into())
        }
    }
}

fn move_failure(request: &Request, destination: &Path, source: std::io::Error) -> Error {
    tracing::error!(
        error = %source,
        destination = %destination.display(),
        "Couldn't move downloaded file"
    );
    FatalError::DownloadedFileMoveFailure {
        request: Box::new(request.clone()),
        source,
    }
    .into()
}

/// Moves a finished transfer to `destination`, never overwriting an
/// existing file.
///
/// When a rename is not possible (e.g. across filesystems) the data is
/// copied next to `destination` first, see [`copy_into_place`]. The
/// transfer's temp file is removed either way.
async fn move_into_place(file: TempPath, destination: &Path) -> io::Result<()> {
    let failed = match file.persist_noclobber(destination) {
        Ok(()) => return Ok(()),
        Err(failed) => failed,
    };
    if tokio::fs::try_exists(destination).await? {
        return Err(failed.error);
    }

    let mut source = tokio::fs::File::open(&failed.path).await?;
    copy_into_place(&mut source, destination).await
}

/// Writes `source` to a staging file in `destination`'s directory and
/// persists it under `destination` without overwriting.
///
/// `destination` only ever appears complete. If the copy fails or the
/// future is dropped, the staging file is deleted and `destination` is
/// never created.
async fn copy_into_place<R>(source: &mut R, destination: &Path) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let (file, staged) = tempfile::NamedTempFile::new_in(staging_dir(destination))?.into_parts();
    let mut target = tokio::fs::File::from_std(file);
    tokio::io::copy(source, &mut target).await?;
    target.flush().await?;
    drop(target);

    staged
        .persist_noclobber(destination)
        .map_err(|failed| failed.error)
}

fn staging_dir(destination: &Path) -> &Path {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

impl Modifiable for Client {
    fn modifier(&self, modifier: Modifier) -> Self {
        self.derive(|inner| inner.modifier = inner.modifier.compose(&modifier))
    }
}

impl Validatable for Client {
    fn validator(&self, validator: Validator) -> Self {
        self.derive(|inner| inner.validator = inner.validator.compose(&validator))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("modifier", &self.inner.modifier)
            .field("validator", &self.inner.validator)
            .field("authentication", &self.inner.authentication)
            .field("mock", &matches!(self.inner.backend, Backend::Mock { .. }))
            .finish()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use callwright::{ClientBuilder, JsonDecoder, Modifier, Validator};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), callwright::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com/v2")?
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")
///     .default_validator(Validator::status_range(200..400))
///     .decoder(JsonDecoder::new().empty_body_as_null(true))
///     .authentication(Modifier::basic("user", "password"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    backend: Option<Backend>,
    modifier: Modifier,
    validator: Validator,
    authentication: Modifier,
    encoder: JsonEncoder,
    decoder: JsonDecoder,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    ///
    /// The default validator accepts 2xx statuses and the default transport
    /// is a fresh [`ReqwestTransport`].
    pub fn new() -> Self {
        Self {
            base_url: None,
            backend: None,
            modifier: Modifier::empty(),
            validator: Validator::success(),
            authentication: Modifier::empty(),
            encoder: JsonEncoder::default(),
            decoder: JsonDecoder::default(),
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref()).map_err(configuration_error)?;
        self.base_url = Some(url);
        Ok(self)
    }

    pub(crate) fn has_base_url(&self) -> bool {
        self.base_url.is_some()
    }

    /// Sets the transport used to execute requests.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.backend = Some(Backend::Transport(Arc::new(transport)));
        self
    }

    /// Uses an existing `reqwest::Client` as the transport.
    pub fn reqwest_client(self, client: reqwest::Client) -> Self {
        self.transport(ReqwestTransport::with_client(client))
    }

    pub(crate) fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Composes a modifier onto the default chain.
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = self.modifier.compose(&modifier);
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// An invalid name or value makes every call fail in the modify phase.
    pub fn default_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.modifier(Modifier::header(name, value))
    }

    /// Sets the default request timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.modifier(Modifier::timeout(timeout))
    }

    /// Replaces the default validator chain, which otherwise accepts
    /// `200..300`.
    ///
    /// Unlike [`Validatable::validator`], this does not compose: the
    /// given chain is the whole default.
    pub fn default_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Composes a modifier onto the authentication chain.
    pub fn authentication(mut self, modifier: Modifier) -> Self {
        self.authentication = self.authentication.compose(&modifier);
        self
    }

    /// Sets the default JSON encoder.
    pub fn encoder(mut self, encoder: JsonEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Sets the default JSON decoder.
    pub fn decoder(mut self, decoder: JsonDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| configuration_error("Base URL is required"))?;

        let backend = self
            .backend
            .unwrap_or_else(|| Backend::Transport(Arc::new(ReqwestTransport::new())));

        Ok(Client {
            inner: Arc::new(ClientInner {
                backend,
                base_url,
                modifier: self.modifier,
                validator: self.validator,
                authentication: self.authentication,
                encoder: self.encoder,
                decoder: self.decoder,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration mistakes happen before any request exists, so they have
/// no phase of their own.
fn configuration_error(source: impl Into<BoxError>) -> Error {
    FatalError::Unknown {
        request: None,
        source: Some(source.into()),
    }
    .into()
}
