//! Composable response validators.
//!
//! A [`Validator`] checks a received `Response<Bytes>`, together with the
//! [`Request`] that produced it, and fails if it violates policy. Chains run
//! in order and stop at the first failure.

use crate::{BoxError, Request, Response};
use bytes::Bytes;
use http::StatusCode;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A single response check.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use callwright::{BoxError, Request, Response, Validate, Validator};
/// use http::Method;
///
/// struct RequireJson;
///
/// impl Validate for RequireJson {
///     fn validate(&self, request: &Request, response: &Response<Bytes>) -> Result<(), BoxError> {
///         if request.method == Method::HEAD {
///             return Ok(());
///         }
///         match response.header("content-type") {
///             Some(value) if value.starts_with("application/json") => Ok(()),
///             other => Err(format!("unexpected content type {:?}", other).into()),
///         }
///     }
/// }
///
/// let validator = Validator::success().compose(&Validator::from_validate(RequireJson));
/// assert_eq!(validator.len(), 2);
/// ```
pub trait Validate: Send + Sync {
    /// Returns an error if `response` is not an acceptable answer to
    /// `request`.
    fn validate(&self, request: &Request, response: &Response<Bytes>) -> Result<(), BoxError>;
}

/// An ordered, immutable chain of response checks.
#[derive(Clone, Default)]
pub struct Validator {
    units: Vec<Arc<dyn Validate>>,
}

/// The response status fell outside the accepted range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Response status code {status} not in range {}-{}", .range.start, .range.end.saturating_sub(1))]
pub struct StatusCodeRangeError {
    /// The accepted half-open range.
    pub range: Range<u16>,
    /// The status that was received.
    pub status: StatusCode,
}

impl Validator {
    /// The identity validator; always succeeds.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a validator from a closure.
    pub fn new<F, E>(f: F) -> Self
    where
        F: Fn(&Request, &Response<Bytes>) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_validate(FnValidate(f))
    }

    /// Wraps a [`Validate`] implementation.
    pub fn from_validate(unit: impl Validate + 'static) -> Self {
        Self {
            units: vec![Arc::new(unit)],
        }
    }

    /// Accepts statuses in the half-open `range`.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwright::Validator;
    ///
    /// let not_found_is_fine = Validator::status_range(200..405);
    /// ```
    pub fn status_range(range: Range<u16>) -> Self {
        Self::new(move |_: &Request, response: &Response<Bytes>| {
            if range.contains(&response.status.as_u16()) {
                Ok(())
            } else {
                Err(StatusCodeRangeError {
                    range: range.clone(),
                    status: response.status,
                })
            }
        })
    }

    /// Accepts 2xx statuses. This is the client's default validator.
    pub fn success() -> Self {
        Self::status_range(200..300)
    }

    /// Returns a validator that runs `self` and then `other`.
    pub fn compose(&self, other: &Validator) -> Validator {
        let mut units = Vec::with_capacity(self.units.len() + other.units.len());
        units.extend(self.units.iter().cloned());
        units.extend(other.units.iter().cloned());
        Validator { units }
    }

    /// Runs every check in order, stopping at the first failure.
    pub fn validate(&self, request: &Request, response: &Response<Bytes>) -> Result<(), BoxError> {
        self.units
            .iter()
            .try_for_each(|unit| unit.validate(request, response))
    }

    /// Returns the number of checks in the chain.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` for the identity validator.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("units", &self.units.len())
            .finish()
    }
}

impl FromIterator<Validator> for Validator {
    fn from_iter<I: IntoIterator<Item = Validator>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Validator::empty(), |acc, next| acc.compose(&next))
    }
}

struct FnValidate<F>(F);

impl<F, E> Validate for FnValidate<F>
where
    F: Fn(&Request, &Response<Bytes>) -> Result<(), E> + Send + Sync,
    E: Into<BoxError>,
{
    fn validate(&self, request: &Request, response: &Response<Bytes>) -> Result<(), BoxError> {
        (self.0)(request, response).map_err(Into::into)
    }
}

/// Types that can be specialized with extra response validators.
///
/// Like [`Modifiable`](crate::Modifiable), every method returns a new value.
pub trait Validatable: Sized {
    /// Returns a copy of `self` with `validator` composed onto its chain.
    fn validator(&self, validator: Validator) -> Self;

    /// Composes a closure onto the validator chain.
    fn validate_with<F, E>(&self, f: F) -> Self
    where
        F: Fn(&Request, &Response<Bytes>) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.validator(Validator::new(f))
    }

    /// Additionally requires the status to fall in `range`.
    fn status_range(&self, range: Range<u16>) -> Self {
        self.validator(Validator::status_range(range))
    }
}

impl Validatable for Validator {
    fn validator(&self, validator: Validator) -> Self {
        self.compose(&validator)
    }
}
