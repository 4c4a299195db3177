//! Last-resort panic barrier.
//!
//! The error-handler stage already turns handler panics into `500`s that the
//! access log records. This stage sits outside the access log and catches
//! what that cannot: a panic in the access log itself or in the log sink.
//! It logs the panic and answers `500` so the connection is never left
//! without a response.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::error;

use super::{BoxFuture, Middleware, Next};
use crate::cause::Cause;
use crate::context::RequestContext;
use crate::error_response::{ErrorResponse, internal_service_error};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[derive(Debug, Default)]
pub struct CatchAllStage;

impl<P: Send + 'static> Middleware<P> for CatchAllStage {
    fn name(&self) -> &'static str { "catch_all" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => {
                    let cause = Cause::from_panic(payload);
                    error!(
                        request_id_chain = %ctx.request_id_chain(),
                        error = %cause,
                        "uncaught panic outside the error handler"
                    );
                    ctx.record_error(cause.clone());
                    let (response, _) = internal_service_error().into_parts();
                    ErrorResponse::new(response, Some(cause)).into_response()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::BoxedMiddleware;
    use crate::middleware::test_support::*;
    use http::{Method, StatusCode};
    use std::sync::Arc;

    struct Explode;

    fn explode() -> Response {
        panic!("sink exploded")
    }

    impl Middleware<()> for Explode {
        fn name(&self) -> &'static str { "explode" }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut RequestContext<()>,
            _request: Request,
            _next: Next<'a, ()>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async { explode() })
        }
    }

    #[tokio::test]
    async fn panics_become_500() {
        let stages: Vec<BoxedMiddleware<()>> = vec![Arc::new(CatchAllStage), Arc::new(Explode)];
        let routes = routes_with("/", |_req: Request| async { "unreachable" });
        let mut ctx = RequestContext::new();

        let res = Next::new(&stages, &routes).run(&mut ctx, request(Method::GET, "/")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
        assert_eq!(ctx.error_log().unwrap().message(), "panic: sink exploded");
    }
}
