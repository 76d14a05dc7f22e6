//! The transport capability: sending requests and running file transfers.
//!
//! The client never talks to the network directly. It hands a finished
//! [`Request`] to a [`Transport`], which is [`ReqwestTransport`] unless the
//! caller supplies another one.

use crate::{BoxError, Request};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::path::Path;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a transport got back for a request.
#[derive(Debug)]
pub enum RawResponse<B> {
    /// A well-formed HTTP response.
    Http(http::Response<B>),
    /// Something that is not an HTTP response, described for diagnostics.
    Other(String),
}

/// Response extension recording the URL that actually served a response,
/// after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveUrl(pub Url);

/// The transfer was cancelled before it completed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Transfer cancelled")]
pub struct Cancelled;

/// Sends requests over the network.
///
/// Implementations own connection management, TLS and redirects. Status
/// codes are never errors at this level; a transport only fails when no
/// response could be obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes `request` and buffers the whole response body.
    async fn execute(&self, request: &Request) -> Result<RawResponse<Bytes>, BoxError>;

    /// Starts streaming the response body for `request` into a temporary
    /// file.
    ///
    /// The returned [`Transfer`] must stop the transfer and discard any
    /// partial file once its cancellation token fires.
    fn download(&self, request: &Request) -> Transfer;
}

/// The result of a finished transfer.
///
/// All three parts are optional because transports report them
/// independently: a failed transfer may still carry the response head, and
/// a broken transport may report neither a file nor an error.
#[derive(Debug, Default)]
pub struct TransferOutcome {
    /// The temporary file holding the body. Deleted when dropped.
    pub file: Option<TempPath>,
    /// The response head.
    pub response: Option<RawResponse<()>>,
    /// The error that ended the transfer, if any.
    pub error: Option<BoxError>,
}

impl TransferOutcome {
    /// A transfer that completed with a body in `file`.
    pub fn completed(file: TempPath, response: http::Response<()>) -> Self {
        Self {
            file: Some(file),
            response: Some(RawResponse::Http(response)),
            error: None,
        }
    }

    /// A transfer that failed.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// An in-flight download.
pub struct Transfer {
    completion: BoxFuture<'static, Option<TransferOutcome>>,
    cancel: CancellationToken,
}

impl Transfer {
    /// Wraps a completion future and the token that cancels it.
    ///
    /// The future resolves to `None` if the transfer was torn down without
    /// reporting an outcome.
    pub fn new(completion: BoxFuture<'static, Option<TransferOutcome>>, cancel: CancellationToken) -> Self {
        Self { completion, cancel }
    }

    /// Splits the transfer into its completion future and cancel handle.
    pub fn into_parts(self) -> (BoxFuture<'static, Option<TransferOutcome>>, CancellationToken) {
        (self.completion, self.cancel)
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// The default transport, backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport around an existing `reqwest::Client`, e.g. one
    /// configured with proxies or custom TLS roots.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn to_reqwest(&self, request: &Request) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

fn response_head(response: &reqwest::Response) -> http::Response<()> {
    let mut head = http::Response::new(());
    *head.status_mut() = response.status();
    *head.version_mut() = response.version();
    *head.headers_mut() = response.headers().clone();
    head.extensions_mut()
        .insert(EffectiveUrl(response.url().clone()));
    head
}

async fn stream_to_file(response: &mut reqwest::Response, path: &Path) -> Result<(), BoxError> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

async fn run_download(request: reqwest::RequestBuilder) -> TransferOutcome {
    let mut response = match request.send().await {
        Ok(response) => response,
        Err(err) => return TransferOutcome::failed(err),
    };
    let head = response_head(&response);

    let file = match tempfile::NamedTempFile::new() {
        Ok(file) => file.into_temp_path(),
        Err(err) => {
            return TransferOutcome {
                response: Some(RawResponse::Http(head)),
                ..TransferOutcome::failed(err)
            }
        }
    };

    match stream_to_file(&mut response, &file).await {
        Ok(()) => TransferOutcome::completed(file, head),
        Err(err) => TransferOutcome {
            response: Some(RawResponse::Http(head)),
            ..TransferOutcome::failed(err)
        },
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &Request) -> Result<RawResponse<Bytes>, BoxError> {
        let response = self.to_reqwest(request).send().await?;
        let head = response_head(&response);
        let body = response.bytes().await?;
        Ok(RawResponse::Http(head.map(|()| body)))
    }

    fn download(&self, request: &Request) -> Transfer {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let builder = self.to_reqwest(request);

        // Dropping the `run_download` future on cancellation drops the
        // temp path with it, which deletes the partial file.
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => TransferOutcome::failed(Cancelled),
                outcome = run_download(builder) => outcome,
            }
        });

        let completion = async move {
            match task.await {
                Ok(outcome) => Some(outcome),
                Err(err) if err.is_cancelled() => None,
                Err(err) => Some(TransferOutcome::failed(err)),
            }
        }
        .boxed();

        Transfer::new(completion, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let failed = TransferOutcome::failed(Cancelled);
        assert!(failed.file.is_none());
        assert!(failed.response.is_none());
        assert_eq!(failed.error.unwrap().to_string(), "Transfer cancelled");
    }

    #[test]
    fn test_reqwest_transport_can_be_created() {
        let _transport = ReqwestTransport::new();
        let _cloned = ReqwestTransport::with_client(reqwest::Client::new()).clone();
    }

    #[tokio::test]
    async fn test_transfer_parts_share_the_token() {
        let token = CancellationToken::new();
        let transfer = Transfer::new(async { None }.boxed(), token.clone());

        let (completion, cancel) = transfer.into_parts();
        cancel.cancel();
        assert!(token.is_cancelled());
        assert!(completion.await.is_none());
    }
}
