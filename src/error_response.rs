//! Structured short-circuit errors for handler bodies.
//!
//! A handler body returns `Result<T, ErrorResponse>`. The first `Err` raised
//! with `?` ends the body and becomes the response. Each constructor fixes the
//! HTTP status for its category and records the call site in a [`Cause`] so
//! the access log can point at the line that gave up.
//!
//! ```rust
//! use restkit::{ErrorResponse, bad_user_input, check_input, OptionExt};
//!
//! fn find(id: u32) -> Option<&'static str> { (id == 1).then_some("alice") }
//!
//! fn body(id: u32, limit: u32) -> Result<&'static str, ErrorResponse> {
//!     check_input(limit <= 100, || "limit must be at most 100")?;
//!     let name = find(id).or_not_found()?;
//!     Ok(name)
//! }
//!
//! assert_eq!(body(1, 10).unwrap(), "alice");
//! assert_eq!(body(2, 10).unwrap_err().status().as_u16(), 404);
//! assert_eq!(body(1, 500).unwrap_err().status().as_u16(), 400);
//! ```

use std::error::Error as StdError;

use http::StatusCode;
use serde::Serialize;

use crate::cause::Cause;
use crate::response::{IntoResponse, Response};

/// The failure categories with a fixed status.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    BadUserInput,
    NotAuthenticated,
    Forbidden,
    NotFound,
    Conflict,
    InternalServiceError,
    ServiceUnavailable,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        Self::BadUserInput,
        Self::NotAuthenticated,
        Self::Forbidden,
        Self::NotFound,
        Self::Conflict,
        Self::InternalServiceError,
        Self::ServiceUnavailable,
    ];

    pub fn status(self) -> StatusCode {
        match self {
            Self::BadUserInput         => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated     => StatusCode::UNAUTHORIZED,
            Self::Forbidden            => StatusCode::FORBIDDEN,
            Self::NotFound             => StatusCode::NOT_FOUND,
            Self::Conflict             => StatusCode::CONFLICT,
            Self::InternalServiceError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable   => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Wire shape of an error body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// A terminal response paired with an optional diagnostic [`Cause`].
///
/// Immutable once built: the `with_*`/`caused_by` methods consume and return.
#[derive(Debug)]
pub struct ErrorResponse {
    response: Response,
    cause: Option<Cause>,
}

impl ErrorResponse {
    /// Pairs an already-built response with a cause.
    pub fn new(response: Response, cause: Option<Cause>) -> Self {
        Self { response, cause }
    }

    /// Turns `response` into an error response, recording the call site.
    #[track_caller]
    pub fn from_response(response: Response) -> Self {
        Self { response, cause: Some(Cause::here()) }
    }

    /// An empty-bodied error response for `kind`, recording the call site.
    #[track_caller]
    pub fn of(kind: ErrorKind) -> Self {
        Self::from_response(Response::status(kind.status()))
    }

    /// Sets the user-facing message, rendered as `{"message": "..."}`.
    pub fn with_message(mut self, message: impl AsRef<str>) -> Self {
        let body = ErrorBody { message: message.as_ref() };
        // A struct with one string field always serializes.
        if let Ok(bytes) = serde_json::to_vec(&body) {
            self.response.set_json_body(bytes);
        }
        self
    }

    /// Attaches the underlying error. The call site of this method is recorded.
    #[track_caller]
    pub fn caused_by<E>(mut self, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Cause::wrap(error));
        self
    }

    pub fn status(&self) -> StatusCode { self.response.status }
    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }
    pub fn cause(&self) -> Option<&Cause> { self.cause.as_ref() }

    pub fn into_parts(self) -> (Response, Option<Cause>) {
        (self.response, self.cause)
    }
}

/// Top-level conversion: the cause rides along in the response extensions
/// where the error-handler stage picks it up for the access log.
impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let (mut response, cause) = self.into_parts();
        if let Some(cause) = cause {
            attach_cause(&mut response, cause);
        }
        response
    }
}

impl<R: IntoResponse> IntoResponse for Result<R, ErrorResponse> {
    fn into_response(self) -> Response {
        match self {
            Ok(r) => r.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// Stores `cause` on `response` for the error-handler stage to collect.
pub fn attach_cause(response: &mut Response, cause: Cause) {
    response.extensions_mut().insert(cause);
}

// ── Constructors ──────────────────────────────────────────────────────────────

/// `400 Bad Request` with a message for the caller.
#[track_caller]
pub fn bad_user_input(message: impl AsRef<str>) -> ErrorResponse {
    ErrorResponse::of(ErrorKind::BadUserInput).with_message(message)
}

/// `401 Unauthorized`: no principal for a route that needs one.
#[track_caller]
pub fn not_authenticated() -> ErrorResponse {
    ErrorResponse::of(ErrorKind::NotAuthenticated)
}

/// `403 Forbidden`: the principal may not do this.
#[track_caller]
pub fn forbidden() -> ErrorResponse {
    ErrorResponse::of(ErrorKind::Forbidden)
}

/// `404 Not Found`.
#[track_caller]
pub fn not_found() -> ErrorResponse {
    ErrorResponse::of(ErrorKind::NotFound)
}

/// `409 Conflict`.
#[track_caller]
pub fn conflict() -> ErrorResponse {
    ErrorResponse::of(ErrorKind::Conflict)
}

/// `500 Internal Server Error`: unrecoverable.
#[track_caller]
pub fn internal_service_error() -> ErrorResponse {
    ErrorResponse::of(ErrorKind::InternalServiceError)
}

/// `503 Service Unavailable`.
#[track_caller]
pub fn service_unavailable() -> ErrorResponse {
    ErrorResponse::of(ErrorKind::ServiceUnavailable)
}

/// Fails with `400` and the message from `message` unless `condition` holds.
#[track_caller]
pub fn check_input<M, F>(condition: bool, message: F) -> Result<(), ErrorResponse>
where
    F: FnOnce() -> M,
    M: AsRef<str>,
{
    if condition {
        Ok(())
    } else {
        Err(bad_user_input(message()))
    }
}

// ── Absence helpers ───────────────────────────────────────────────────────────

/// Lifts a plain `Option` into the error model.
pub trait OptionExt<T> {
    /// Absent → `404`.
    fn or_not_found(self) -> Result<T, ErrorResponse>;
}

impl<T> OptionExt<T> for Option<T> {
    #[track_caller]
    fn or_not_found(self) -> Result<T, ErrorResponse> {
        match self {
            Some(v) => Ok(v),
            None => Err(not_found()),
        }
    }
}

/// Lifts a fallible lookup returning `Option` into the error model.
pub trait LookupExt<T> {
    /// Absent → `404`. Use only for the resource the URL points at.
    fn map_not_found_as_404(self) -> Result<T, ErrorResponse>;

    /// Absent → `400`. Use for resources the caller referenced in the input.
    fn map_not_found_as_400(self) -> Result<T, ErrorResponse>;

    /// Absent → `500`. The value must exist by now.
    fn expect_value(self) -> Result<T, ErrorResponse>;
}

#[derive(Debug, thiserror::Error)]
#[error("Resource not found")]
struct ResourceNotFound;

impl<T> LookupExt<T> for Result<Option<T>, ErrorResponse> {
    #[track_caller]
    fn map_not_found_as_404(self) -> Result<T, ErrorResponse> {
        match self {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(not_found().caused_by(ResourceNotFound)),
            Err(e) => Err(e),
        }
    }

    #[track_caller]
    fn map_not_found_as_400(self) -> Result<T, ErrorResponse> {
        match self {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(bad_user_input("A referenced resource was not found.")),
            Err(e) => Err(e),
        }
    }

    #[track_caller]
    fn expect_value(self) -> Result<T, ErrorResponse> {
        match self {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(internal_service_error()),
            Err(e) => Err(e),
        }
    }
}
