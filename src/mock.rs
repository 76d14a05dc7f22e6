//! A test double for [`Client`].
//!
//! A mock client runs the real modifier pipeline, authentication included,
//! and then asks a caller-supplied provider for the result instead of
//! touching the network. This makes header and auth injection observable in
//! tests without a server.

use crate::client::{Backend, Provider};
use crate::{Client, ClientBuilder, Error, JsonDecoder, JsonEncoder, Modifier, Request, Response, Result, Validator};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost/";

/// Builds a [`Client`] whose execution step is a provider function.
///
/// Responses from the provider are returned as-is unless
/// [`validate_responses`](MockClient::validate_responses) is enabled, in
/// which case the client's validators run against them like a live
/// response. Mock downloads write the provided body to the destination.
///
/// # Examples
///
/// ```
/// use callwright::mock::{respond, MockClient};
/// use callwright::Modifier;
/// use http::StatusCode;
///
/// # async fn example() -> Result<(), callwright::Error> {
/// let client = MockClient::new(|request| {
///     assert_eq!(request.header("authorization"), Some("Bearer test-token"));
///     Ok(respond(request, StatusCode::OK, "pong"))
/// })
/// .authentication(Modifier::bearer("test-token"))
/// .build()?;
///
/// let response = client.get("/ping").perform().await?;
/// assert_eq!(&response.data[..], b"pong");
/// # Ok(())
/// # }
/// ```
pub struct MockClient {
    builder: ClientBuilder,
    provider: Arc<Provider>,
    validate: bool,
}

impl MockClient {
    /// Creates a mock client that answers every call with `provider`.
    pub fn new<F>(provider: F) -> Self
    where
        F: Fn(&Request) -> Result<Response<Bytes>> + Send + Sync + 'static,
    {
        Self {
            builder: ClientBuilder::new(),
            provider: Arc::new(provider),
            validate: false,
        }
    }

    /// Sets the base URL. Defaults to `http://localhost/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.builder = self.builder.base_url(url)?;
        Ok(self)
    }

    /// Runs the client's validators against provided responses.
    pub fn validate_responses(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Composes a modifier onto the default chain.
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.builder = self.builder.modifier(modifier);
        self
    }

    /// Replaces the default validator chain. Only consulted when
    /// [`validate_responses`](MockClient::validate_responses) is on.
    pub fn default_validator(mut self, validator: Validator) -> Self {
        self.builder = self.builder.default_validator(validator);
        self
    }

    /// Composes a modifier onto the authentication chain.
    pub fn authentication(mut self, modifier: Modifier) -> Self {
        self.builder = self.builder.authentication(modifier);
        self
    }

    /// Sets the default JSON encoder.
    pub fn encoder(mut self, encoder: JsonEncoder) -> Self {
        self.builder = self.builder.encoder(encoder);
        self
    }

    /// Sets the default JSON decoder.
    pub fn decoder(mut self, decoder: JsonDecoder) -> Self {
        self.builder = self.builder.decoder(decoder);
        self
    }

    /// Builds the mock [`Client`].
    pub fn build(self) -> Result<Client> {
        let mut builder = self.builder;
        if !builder.has_base_url() {
            builder = builder.base_url(DEFAULT_BASE_URL)?;
        }
        builder
            .backend(Backend::Mock {
                provider: self.provider,
                validate: self.validate,
            })
            .build()
    }
}

/// A response to `request` with the given status and body.
pub fn respond(request: &Request, status: StatusCode, body: impl Into<Bytes>) -> Response<Bytes> {
    Response::new(body.into(), status, HeaderMap::new(), request.url.clone(), Duration::ZERO)
}

/// A JSON response to `request` with `Content-Type: application/json`.
///
/// # Errors
///
/// Returns [`FatalError::Unknown`](crate::FatalError::Unknown) if `body`
/// cannot be serialized.
pub fn respond_json<T: Serialize + ?Sized>(request: &Request, status: StatusCode, body: &T) -> Result<Response<Bytes>> {
    let bytes = JsonEncoder::new()
        .encode(body)
        .map_err(|err| Error::from_boxed(Box::new(err)))?;
    let mut response = respond(request, status, bytes);
    response.headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(crate::modifiers::APPLICATION_JSON),
    );
    Ok(response)
}
