//! Per-route entry points for handler bodies.
//!
//! A body is an async closure returning `Result<R, ErrorResponse>`. The first
//! `Err` raised with `?` ends it and becomes the response; `Ok(r)` is encoded
//! with `r`'s [`IntoResponse`] impl (typically [`Json`](crate::Json)).
//!
//! Each body runs in its own tokio task, inside a `restkit.handler` span
//! that carries the request id, and the endpoint waits for it to finish. A
//! panic in the body is re-raised in the calling stage so the chain's error
//! handler reports it as a `500`.
//!
//! ```rust
//! use restkit::{ApiHandler, ErrorResponse, Json, OptionExt, Request};
//!
//! #[derive(Clone)]
//! struct User { name: String }
//!
//! fn routes(api: &ApiHandler<User>) {
//!     let _me = api.authed(|_req: Request, user: User| async move {
//!         Ok::<_, ErrorResponse>(Json(user.name))
//!     });
//!     let _greeting = api.auth_not_checked(|_req: Request, user: Option<User>| async move {
//!         let user = user.or_not_found()?;
//!         Ok::<_, ErrorResponse>(format!("hello {}", user.name))
//!     });
//! }
//! ```

use std::marker::PhantomData;
use std::panic;
use std::sync::Arc;

use tracing::{Instrument, Span, info_span};

use crate::cause::Cause;
use crate::context::RequestIdChain;
use crate::error_response::{ErrorResponse, attach_cause, internal_service_error, not_authenticated};
use crate::middleware::BoxFuture;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Receives the cause of an error response before the response is returned.
pub type ErrorObserver = Arc<dyn Fn(&mut Response, Cause) + Send + Sync>;

/// The default observer: attaches the cause to the response, where the
/// error-handler stage moves it into the request context for the access log.
pub fn attach_to_response() -> ErrorObserver {
    Arc::new(attach_cause)
}

/// Builds endpoints for principal type `P`.
pub struct ApiHandler<P> {
    error_observer: ErrorObserver,
    _principal: PhantomData<fn() -> P>,
}

impl<P> Clone for ApiHandler<P> {
    fn clone(&self) -> Self {
        Self { error_observer: Arc::clone(&self.error_observer), _principal: PhantomData }
    }
}

impl<P> ApiHandler<P>
where
    P: Clone + Send + Sync + 'static,
{
    pub fn new(error_observer: ErrorObserver) -> Self {
        Self { error_observer, _principal: PhantomData }
    }

    /// An endpoint that does not require a principal but receives it if resolved.
    pub fn auth_not_checked<F, Fut, R>(
        &self,
        body: F,
    ) -> impl Fn(Request) -> BoxFuture<'static, Response> + Send + Sync + 'static
    where
        F: Fn(Request, Option<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ErrorResponse>> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let observer = Arc::clone(&self.error_observer);
        move |request: Request| -> BoxFuture<'static, Response> {
            let observer = Arc::clone(&observer);
            let span = handler_span(&request);
            let principal = request.principal::<P>().cloned();
            let fut = body(request, principal);
            Box::pin(async move { finish(run_isolated(span, fut).await, &observer) })
        }
    }

    /// An endpoint that requires a principal. Without one the request ends
    /// with `401` and the body never runs.
    pub fn authed<F, Fut, R>(
        &self,
        body: F,
    ) -> impl Fn(Request) -> BoxFuture<'static, Response> + Send + Sync + 'static
    where
        F: Fn(Request, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ErrorResponse>> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let observer = Arc::clone(&self.error_observer);
        move |request: Request| -> BoxFuture<'static, Response> {
            let observer = Arc::clone(&observer);
            match request.principal::<P>().cloned() {
                None => {
                    let outcome: Result<R, ErrorResponse> = Err(not_authenticated());
                    Box::pin(async move { finish(outcome, &observer) })
                }
                Some(principal) => {
                    let span = handler_span(&request);
                    let fut = body(request, principal);
                    Box::pin(async move { finish(run_isolated(span, fut).await, &observer) })
                }
            }
        }
    }
}

fn handler_span(request: &Request) -> Span {
    let request_id = request
        .request_id_chain()
        .and_then(RequestIdChain::current)
        .map(|id| id.to_string())
        .unwrap_or_default();
    info_span!("restkit.handler", request_id = %request_id)
}

/// Runs `fut` on its own task inside `span` and waits for it.
async fn run_isolated<Fut, R>(span: Span, fut: Fut) -> Result<R, ErrorResponse>
where
    Fut: Future<Output = Result<R, ErrorResponse>> + Send + 'static,
    R: Send + 'static,
{
    match tokio::spawn(fut.instrument(span)).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
        Err(e) => Err(internal_service_error().caused_by(e)),
    }
}

fn finish<R: IntoResponse>(outcome: Result<R, ErrorResponse>, observer: &ErrorObserver) -> Response {
    match outcome {
        Ok(r) => r.into_response(),
        Err(e) => {
            let (mut response, cause) = e.into_parts();
            if let Some(cause) = cause {
                observer(&mut response, cause);
            }
            response
        }
    }
}
