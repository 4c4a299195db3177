//! The filter chain.
//!
//! Every stage implements [`Middleware`]: it receives the per-request
//! [`RequestContext`], the request and a [`Next`] to call the rest of the
//! chain. A stage may short-circuit by returning without calling `next`.
//!
//! The built-in stages, outermost first, as assembled by
//! [`ServiceRouter`](crate::ServiceRouter):
//!
//! ```text
//! request → RequestId → CatchAll → AccessLog → [Cors] → ErrorHandler
//!         → LensFailure → Principal → (additional middleware) → route table
//! ```
//!
//! The order is fixed. The access log wraps the error handler and the lens
//! failure renderer so it sees the status and captured error they settle on.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

mod access_log;
mod catch_all;
mod cors;
mod error_handler;
mod lens_failure;
mod principal;
mod request_id;

pub use access_log::AccessLogStage;
pub(crate) use access_log::PrincipalToLog;
pub use catch_all::CatchAllStage;
pub use cors::{AllowedOrigins, CorsPolicy, CorsStage};
pub use error_handler::ErrorHandlerStage;
pub use lens_failure::LensFailureStage;
pub use principal::{DeviationToResponse, PrincipalStage};
pub use request_id::{REQUEST_ID_CHAIN_HEADER, RequestIdStage};

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A shared, type-erased stage.
pub type BoxedMiddleware<P> = Arc<dyn Middleware<P>>;

/// One stage of the chain.
///
/// A stage must call `next.run` at most once. Stages are shared by every
/// request and are called concurrently from any worker thread.
pub trait Middleware<P>: Send + Sync + 'static {
    /// Stable name, used in logs.
    fn name(&self) -> &'static str;

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response>;
}

/// The rest of the chain after the current stage.
pub struct Next<'a, P> {
    stages: &'a [BoxedMiddleware<P>],
    routes: &'a Router,
}

impl<'a, P: Send + 'static> Next<'a, P> {
    pub(crate) fn new(stages: &'a [BoxedMiddleware<P>], routes: &'a Router) -> Self {
        Self { stages, routes }
    }

    /// Runs the remaining stages, then the route table.
    pub async fn run(self, ctx: &mut RequestContext<P>, request: Request) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage.process(ctx, request, Next::new(rest, self.routes)).await
            }
            None => self.routes.dispatch(request).await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use http::{Method, StatusCode};

    struct Tag(&'static str);

    impl Middleware<()> for Tag {
        fn name(&self) -> &'static str { self.0 }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext<()>,
            request: Request,
            next: Next<'a, ()>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut res = next.run(ctx, request).await;
                let seen = res.headers().get("x-order").map(|v| v.to_str().unwrap().to_owned());
                let order = match seen {
                    Some(s) => format!("{s},{}", self.0),
                    None => self.0.to_owned(),
                };
                res.headers_mut().insert("x-order", order.parse().unwrap());
                res
            })
        }
    }

    #[tokio::test]
    async fn stages_wrap_in_order() {
        let stages: Vec<BoxedMiddleware<()>> = vec![Arc::new(Tag("outer")), Arc::new(Tag("inner"))];
        let routes = routes_with("/", |_req: Request| async { "ok" });
        let mut ctx = RequestContext::new();

        let res = Next::new(&stages, &routes).run(&mut ctx, request(Method::GET, "/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        // Responses unwind inner-first.
        assert_eq!(res.headers()["x-order"], "inner,outer");
    }
}
