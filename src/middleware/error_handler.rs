//! Error rendering and capture, just inside the access log.
//!
//! - A panic anywhere further in becomes a `500` with the panic as its cause.
//! - A [`Cause`] attached to the response by an
//!   [`ErrorResponse`](crate::ErrorResponse) is moved into the context.
//! - Error statuses (4xx/5xx) are recorded as the normalized status.
//!
//! The access log reads all three once this stage returns.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use super::{BoxFuture, Middleware, Next};
use crate::cause::Cause;
use crate::context::RequestContext;
use crate::error_response::{ErrorResponse, internal_service_error};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[derive(Debug, Default)]
pub struct ErrorHandlerStage;

impl<P: Send + 'static> Middleware<P> for ErrorHandlerStage {
    fn name(&self) -> &'static str { "error_handler" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => {
                    let (response, _) = internal_service_error().into_parts();
                    ErrorResponse::new(response, Some(Cause::from_panic(payload))).into_response()
                }
            };

            if let Some(cause) = response.extensions_mut().remove::<Cause>() {
                ctx.record_error(cause);
            }
            let status = response.status_code();
            if status.is_client_error() || status.is_server_error() {
                ctx.set_normalized_status(status);
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_response::{bad_user_input, conflict};
    use crate::middleware::BoxedMiddleware;
    use crate::middleware::test_support::*;
    use http::{Method, StatusCode};
    use std::sync::Arc;

    async fn run(routes: crate::router::Router) -> (RequestContext<()>, Response) {
        let stages: Vec<BoxedMiddleware<()>> = vec![Arc::new(ErrorHandlerStage)];
        let mut ctx = RequestContext::new();
        let res = Next::new(&stages, &routes).run(&mut ctx, request(Method::GET, "/")).await;
        (ctx, res)
    }

    fn fail() -> Response {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn moves_cause_into_context() {
        let (ctx, res) = run(routes_with("/", |_req: Request| async { conflict() })).await;
        assert_eq!(res.status_code(), StatusCode::CONFLICT);
        assert!(res.extensions().get::<Cause>().is_none());
        assert!(ctx.error_log().is_some());
        assert_eq!(ctx.normalized_status(), Some(StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn keeps_error_body() {
        let (_, res) =
            run(routes_with("/", |_req: Request| async { bad_user_input("x is required") })).await;
        assert_eq!(res.body().as_ref(), br#"{"message":"x is required"}"#);
    }

    #[tokio::test]
    async fn panics_become_500_with_cause() {
        let (ctx, res) = run(routes_with("/", |_req: Request| async { fail() })).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
        assert_eq!(ctx.error_log().unwrap().message(), "panic: handler blew up");
        assert_eq!(ctx.normalized_status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn success_leaves_context_alone() {
        let (ctx, res) = run(routes_with("/", |_req: Request| async { "fine" })).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(ctx.error_log().is_none());
        assert!(ctx.normalized_status().is_none());
    }
}
