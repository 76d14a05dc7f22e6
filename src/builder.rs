//! Per-call request builder.

use crate::{
    Client, Error, FatalError, JsonDecoder, JsonEncoder, Modifiable, Modifier, Request, Response, Result,
    Validatable, Validator,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// An immutable, fluent description of one call through a [`Client`].
///
/// Every combinator returns a new builder; nothing is sent until one of the
/// terminal operations ([`send`], [`perform`], [`perform_json`],
/// [`json_body`], [`download`]) is awaited. Terminal operations borrow the
/// builder, so the same call can be issued more than once.
///
/// [`send`]: RequestBuilder::send
/// [`perform`]: RequestBuilder::perform
/// [`perform_json`]: RequestBuilder::perform_json
/// [`json_body`]: RequestBuilder::json_body
/// [`download`]: RequestBuilder::download
///
/// # Examples
///
/// ```no_run
/// use callwright::{Client, Modifiable, Validatable};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Page { items: Vec<String> }
///
/// # async fn example() -> Result<(), callwright::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let page = client
///     .get("/items")
///     .query_item("page", Some("2"))
///     .header("x-trace", "on")
///     .status_range(200..201)
///     .json_body::<Page>()
///     .await?;
/// println!("{} items", page.items.len());
///
/// // Public endpoint: skip the client's authentication.
/// client.get("/health").anonymous().send().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: Client,
    seed: Option<Request>,
    modifier: Modifier,
    validator: Validator,
    body: Option<Modifier>,
    anonymous: bool,
    decoder: Option<JsonDecoder>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, seed: Option<Request>) -> Self {
        Self {
            client,
            seed,
            modifier: Modifier::empty(),
            validator: Validator::empty(),
            body: None,
            anonymous: false,
            decoder: None,
        }
    }

    /// Skips the client's authentication modifiers for this call.
    pub fn anonymous(&self) -> Self {
        self.with_anonymous(true)
    }

    /// Sets whether the client's authentication modifiers are skipped.
    pub fn with_anonymous(&self, anonymous: bool) -> Self {
        Self {
            anonymous,
            ..self.clone()
        }
    }

    /// Sets a JSON body encoded with the client's encoder.
    ///
    /// The body is encoded immediately; `Content-Type: application/json` is
    /// set on the request. Setting a body again replaces the previous one.
    pub fn json<T: Serialize + ?Sized>(&self, body: &T) -> Self {
        self.json_with(body, &self.client.encoder())
    }

    /// Sets a JSON body encoded with `encoder`.
    pub fn json_with<T: Serialize + ?Sized>(&self, body: &T, encoder: &JsonEncoder) -> Self {
        Self {
            body: Some(Modifier::json_body(body, encoder)),
            ..self.clone()
        }
    }

    /// Overrides the client's decoder for [`perform_json`](Self::perform_json)
    /// and [`json_body`](Self::json_body).
    pub fn decoder(&self, decoder: JsonDecoder) -> Self {
        Self {
            decoder: Some(decoder),
            ..self.clone()
        }
    }

    /// Builds the request this call would send, without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Modify`] if a modifier fails.
    pub async fn build(&self) -> Result<Request> {
        let extra = match &self.body {
            Some(body) => self.modifier.compose(body),
            None => self.modifier.clone(),
        };
        self.client
            .build_request(self.seed.clone(), &extra, self.anonymous)
            .await
    }

    async fn execute(&self) -> Result<(Request, Response<Bytes>)> {
        let request = self.build().await?;
        let response = self.client.execute(&request, &self.validator).await?;
        Ok((request, response))
    }

    /// Sends the request and discards the response body.
    pub async fn send(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }

    /// Sends the request and returns the raw response body.
    pub async fn perform(&self) -> Result<Response<Bytes>> {
        let (_, response) = self.execute().await?;
        Ok(response)
    }

    /// Sends the request and decodes the response body from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::Decode`] if the validated body is not a valid
    /// `T`, in addition to the errors of [`perform`](Self::perform).
    pub async fn perform_json<T: DeserializeOwned>(&self) -> Result<Response<T>> {
        let (request, response) = self.execute().await?;
        let decoder = self.decoder.unwrap_or_else(|| self.client.decoder());

        let data = match decoder.decode::<T>(&response.data) {
            Ok(data) => data,
            Err(source) => {
                let expected_type = std::any::type_name::<T>();
                tracing::error!(
                    error = %source,
                    expected_type,
                    status = response.status.as_u16(),
                    raw_response = %String::from_utf8_lossy(&response.data),
                    "Failed to decode response"
                );
                return Err(Error::Fatal(FatalError::Decode {
                    request: Box::new(request),
                    response: Box::new(response),
                    source,
                    expected_type,
                }));
            }
        };
        Ok(response.map(|_| data))
    }

    /// Sends the request and returns only the decoded body.
    pub async fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        self.perform_json().await.map(|response| response.data)
    }

    /// Streams the response body to `destination`.
    ///
    /// Validators see the real status and headers with an empty body. The
    /// file is only moved into place once validation passes, and an existing
    /// file at `destination` is never overwritten. Dropping the returned
    /// future cancels the transfer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(client: callwright::Client) -> Result<(), callwright::Error> {
    /// let response = client.get("/exports/latest.csv").download("latest.csv").await?;
    /// println!("Saved to {}", response.data.display());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download(&self, destination: impl AsRef<Path>) -> Result<Response<PathBuf>> {
        let request = self.build().await?;
        self.client
            .download(&request, &self.validator, destination.as_ref())
            .await
    }
}

impl Modifiable for RequestBuilder {
    fn modifier(&self, modifier: Modifier) -> Self {
        Self {
            modifier: self.modifier.compose(&modifier),
            ..self.clone()
        }
    }
}

impl Validatable for RequestBuilder {
    fn validator(&self, validator: Validator) -> Self {
        Self {
            validator: self.validator.compose(&validator),
            ..self.clone()
        }
    }
}
