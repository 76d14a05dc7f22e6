//! Error types for HTTP API calls.
//!
//! Errors are partitioned by the pipeline phase that failed rather than by
//! cause, so calling code can branch on *where* a call broke down. Every
//! variant keeps the originating [`Request`] (and the response, where one was
//! received) for diagnostics.

use crate::{Request, Response};
use bytes::Bytes;
use http::StatusCode;

/// A type-erased error produced by a modifier, validator or transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for HTTP API calls.
///
/// # Examples
///
/// ```no_run
/// use callwright::{Client, Error, FatalError};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get("/users/1").perform_json::<serde_json::Value>().await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Validate { response, source, .. }) => {
///         eprintln!("Rejected response {}: {}", response.status, source);
///     }
///     Err(Error::Fatal(FatalError::Decode { expected_type, source, .. })) => {
///         eprintln!("Body was not a {}: {}", expected_type, source);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A modifier in the request chain failed.
    ///
    /// The request is captured in whatever state the chain left it in: units
    /// that ran before the failing one keep their effect.
    #[error("Error thrown by a modifier: {source} (request URL: {})", .request.url)]
    Modify {
        /// The partially modified request.
        request: Box<Request>,
        /// The modifier's error.
        #[source]
        source: BoxError,
    },

    /// The transport failed to execute the request (DNS, connection refused,
    /// transport-level timeout, cancelled transfer, ...).
    #[error("Error thrown when performing the request: {source} (request URL: {})", .request.url)]
    Transport {
        /// The request handed to the transport.
        request: Box<Request>,
        /// The transport's error.
        #[source]
        source: BoxError,
    },

    /// A validator rejected the response.
    ///
    /// For downloads the response body is empty; only status and headers
    /// were available to the validators.
    #[error("Validation error: {source} (status {}, request URL: {})", .response.status, .request.url)]
    Validate {
        /// The request that produced the response.
        request: Box<Request>,
        /// The rejected response.
        response: Box<Response<Bytes>>,
        /// The validator's error.
        #[source]
        source: BoxError,
    },

    /// A failure outside the modify/transport/validate phases.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

/// Failures that are not attributable to a user-supplied modifier,
/// validator or to the network itself.
#[derive(thiserror::Error, Debug)]
pub enum FatalError {
    /// The transport returned something that is not an HTTP response.
    #[error("The response {} of the request is not an HTTP response (request URL: {})", .response.as_deref().unwrap_or("(none)"), .request.url)]
    NotHttpResponse {
        /// The request.
        request: Box<Request>,
        /// A description of what the transport returned, if anything.
        response: Option<String>,
    },

    /// The response passed validation, but its body failed to decode.
    #[error("The response (status {}) passed validation, but its body failed to decode as {expected_type}: {source}", .response.status)]
    Decode {
        /// The request.
        request: Box<Request>,
        /// The response whose body failed to decode.
        response: Box<Response<Bytes>>,
        /// The decoder's error.
        #[source]
        source: serde_json::Error,
        /// Name of the type the body was decoded into.
        expected_type: &'static str,
    },

    /// A validated download could not be moved to its destination.
    #[error("Couldn't move the downloaded file to its destination: {source} (request URL: {})", .request.url)]
    DownloadedFileMoveFailure {
        /// The request.
        request: Box<Request>,
        /// The I/O error from the move.
        #[source]
        source: std::io::Error,
    },

    /// An inconsistency that should never happen, or a foreign error that
    /// entered the pipeline without a phase.
    #[error("Unexpected inconsistency: {}", .source.as_ref().map(|e| e.to_string()).unwrap_or_default())]
    Unknown {
        /// The request, if it had been constructed.
        request: Option<Box<Request>>,
        /// The underlying error, if any.
        source: Option<BoxError>,
    },

    /// The transport was torn down before the transfer reported completion.
    #[error("The transport went away during a download (request URL: {})", .request.url)]
    ClientDeallocated {
        /// The request.
        request: Box<Request>,
    },
}

/// The pipeline stage in which an [`Error`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Applying modifiers to the request.
    Modify,
    /// Executing the request through the transport.
    Transport,
    /// Running validators against the response.
    Validate,
    /// Anything else: decoding, file moves, invariant violations.
    Fatal,
}

impl Error {
    /// Converts a type-erased error into an [`Error`].
    ///
    /// An `Error` that was boxed along the way is recovered as-is; anything
    /// else is wrapped as [`FatalError::Unknown`] so the phase taxonomy holds
    /// at every boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::{BoxError, Error, FatalError, Phase};
    ///
    /// let foreign: BoxError = "something odd".into();
    /// let err = Error::from_boxed(foreign);
    /// assert_eq!(err.phase(), Phase::Fatal);
    /// assert!(matches!(err, Error::Fatal(FatalError::Unknown { request: None, .. })));
    /// ```
    pub fn from_boxed(error: BoxError) -> Self {
        match error.downcast::<Error>() {
            Ok(error) => *error,
            Err(error) => FatalError::Unknown {
                request: None,
                source: Some(error),
            }
            .into(),
        }
    }

    /// Returns the phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Error::Modify { .. } => Phase::Modify,
            Error::Transport { .. } => Phase::Transport,
            Error::Validate { .. } => Phase::Validate,
            Error::Fatal(_) => Phase::Fatal,
        }
    }

    /// Returns the originating request.
    ///
    /// This is `Some` for every failure that happened after the request was
    /// constructed.
    pub fn request(&self) -> Option<&Request> {
        match self {
            Error::Modify { request, .. }
            | Error::Transport { request, .. }
            | Error::Validate { request, .. } => Some(request),
            Error::Fatal(fatal) => fatal.request(),
        }
    }

    /// Returns the response, for validation and decode failures.
    pub fn response(&self) -> Option<&Response<Bytes>> {
        match self {
            Error::Validate { response, .. }
            | Error::Fatal(FatalError::Decode { response, .. }) => Some(response),
            _ => None,
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|response| response.status)
    }

    /// Returns the validator's error if this is a validation failure.
    pub fn validation_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Validate { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Returns `true` if the transport gave up because of a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport { source, .. } => source
                .downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout),
            _ => false,
        }
    }
}

impl FatalError {
    /// Returns the originating request, if it had been constructed.
    pub fn request(&self) -> Option<&Request> {
        match self {
            FatalError::NotHttpResponse { request, .. }
            | FatalError::Decode { request, .. }
            | FatalError::DownloadedFileMoveFailure { request, .. }
            | FatalError::ClientDeallocated { request } => Some(request),
            FatalError::Unknown { request, .. } => request.as_deref(),
        }
    }
}

/// A specialized `Result` type for HTTP API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};
    use std::time::Duration;

    fn request() -> Request {
        Request::new(Method::GET, "https://api.example.com/items".parse().unwrap())
    }

    fn response(status: u16) -> Response<Bytes> {
        Response::new(
            Bytes::from_static(b"nope"),
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            "https://api.example.com/items".parse().unwrap(),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_every_constructed_request_is_reported() {
        let errors = vec![
            Error::Modify {
                request: Box::new(request()),
                source: "bad".into(),
            },
            Error::Transport {
                request: Box::new(request()),
                source: "refused".into(),
            },
            Error::Validate {
                request: Box::new(request()),
                response: Box::new(response(404)),
                source: "rejected".into(),
            },
            FatalError::NotHttpResponse {
                request: Box::new(request()),
                response: None,
            }
            .into(),
            FatalError::DownloadedFileMoveFailure {
                request: Box::new(request()),
                source: std::io::Error::other("exists"),
            }
            .into(),
            FatalError::ClientDeallocated {
                request: Box::new(request()),
            }
            .into(),
        ];

        for error in errors {
            let request = error.request().expect("request should be retained");
            assert_eq!(request.url.path(), "/items");
        }
    }

    #[test]
    fn test_phase_and_status() {
        let err = Error::Validate {
            request: Box::new(request()),
            response: Box::new(response(404)),
            source: "rejected".into(),
        };
        assert_eq!(err.phase(), Phase::Validate);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.validation_error().unwrap().to_string(), "rejected");

        let err = Error::Modify {
            request: Box::new(request()),
            source: "bad".into(),
        };
        assert_eq!(err.phase(), Phase::Modify);
        assert_eq!(err.status(), None);
        assert!(err.validation_error().is_none());
    }

    #[test]
    fn test_display_mentions_request_url() {
        let err = Error::Transport {
            request: Box::new(request()),
            source: "connection refused".into(),
        };
        let message = err.to_string();
        assert!(message.contains("connection refused"));
        assert!(message.contains("https://api.example.com/items"));
    }

    #[test]
    fn test_from_boxed_recovers_pipeline_errors() {
        let original = Error::Transport {
            request: Box::new(request()),
            source: "timeout".into(),
        };
        let boxed: BoxError = Box::new(original);

        let recovered = Error::from_boxed(boxed);
        assert_eq!(recovered.phase(), Phase::Transport);
        assert!(recovered.request().is_some());
    }
}
