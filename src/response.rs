//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it, or return a [`Json`]
//! value and let the encoder build it for you.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Extensions, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Html,        // text/html; charset=utf-8
    Json,        // application/json
    OctetStream, // application/octet-stream
    Text,        // text/plain; charset=utf-8
}

impl ContentType {
    fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        })
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// Besides status, headers and body a response carries typed extensions.
/// The chain uses them to hand diagnostics (a captured
/// [`Cause`](crate::Cause), a [`LensFailure`](crate::LensFailure)) from the
/// handler back up to the logging stages. Extensions never reach the wire.
///
/// ```rust
/// use restkit::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(http::header::LOCATION, http::HeaderValue::from_static("/users/42"))
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) extensions: Extensions,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Replaces the body, keeping status, headers and extensions.
    pub(crate) fn set_json_body(&mut self, body: Vec<u8>) {
        self.headers.insert(header::CONTENT_TYPE, ContentType::Json.header_value());
        self.body = Bytes::from(body);
    }

    /// Converts into the `http` type hyper writes to the wire. Extensions are dropped.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json, body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, Bytes::from(body.into()))
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: Bytes::new(),
            extensions: Extensions::new(),
        }
    }

    fn finish(mut self, content_type: ContentType, body: Bytes) -> Response {
        self.headers.insert(header::CONTENT_TYPE, content_type.header_value());
        Response { status: self.status, headers: self.headers, body, extensions: Extensions::new() }
    }
}

// ── Json ──────────────────────────────────────────────────────────────────────

/// Success body encoder: serializes `T` with serde as `application/json`.
///
/// ```rust
/// use restkit::{IntoResponse, Json};
/// use http::StatusCode;
///
/// #[derive(serde::Serialize)]
/// struct User { id: u64 }
///
/// let res = Json(User { id: 1 }).with_status(StatusCode::CREATED).into_response();
/// assert_eq!(res.status_code(), StatusCode::CREATED);
/// ```
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> Json<T> {
    /// Encode with a status other than `200 OK`.
    pub fn with_status(self, status: StatusCode) -> WithStatus<T> {
        WithStatus { status, body: self }
    }
}

/// A [`Json`] body paired with a non-default status. See [`Json::with_status`].
#[derive(Debug, Clone)]
pub struct WithStatus<T> {
    status: StatusCode,
    body: Json<T>,
}

fn encode_json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => Response::builder().status(status).json(bytes),
        Err(e) => {
            error!("response body encoding failed: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response { encode_json(StatusCode::OK, &self.0) }
}

impl<T: Serialize> IntoResponse for WithStatus<T> {
    fn into_response(self) -> Response { encode_json(self.status, &self.body.0) }
}
