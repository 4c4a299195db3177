//! Renders request-extraction failures as structured `400`s.
//!
//! A handler that fails extraction with `?` returns a `400` carrying the
//! [`LensFailure`] unrendered. This stage writes the body listing every
//! missing or invalid field, before the error handler records the status.

use http::StatusCode;
use tracing::debug;

use super::{BoxFuture, Middleware, Next};
use crate::context::RequestContext;
use crate::lens::LensFailure;
use crate::request::Request;
use crate::response::Response;

#[derive(Debug, Default)]
pub struct LensFailureStage;

impl<P: Send + 'static> Middleware<P> for LensFailureStage {
    fn name(&self) -> &'static str { "lens_failure" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = next.run(ctx, request).await;
            if let Some(failure) = response.extensions_mut().remove::<LensFailure>() {
                debug!(%failure, "rejecting request data");
                response.status = StatusCode::BAD_REQUEST;
                match serde_json::to_vec(&failure.body()) {
                    Ok(body) => response.set_json_body(body),
                    Err(e) => debug!("lens failure body encoding failed: {e}"),
                }
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_response::ErrorResponse;
    use crate::middleware::BoxedMiddleware;
    use crate::middleware::test_support::*;
    use http::Method;
    use std::sync::Arc;

    async fn needs_limit(req: Request) -> Result<String, ErrorResponse> {
        let limit: u32 = req.required_query("limit")?;
        Ok(limit.to_string())
    }

    async fn run(uri: &str) -> Response {
        let stages: Vec<BoxedMiddleware<()>> = vec![Arc::new(LensFailureStage)];
        let routes = routes_with("/", needs_limit);
        let mut ctx = RequestContext::new();
        Next::new(&stages, &routes).run(&mut ctx, request(Method::GET, uri)).await
    }

    #[tokio::test]
    async fn renders_missing_query() {
        let res = run("/").await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["message"], "Missing/invalid parameters");
        assert_eq!(body["params"][0]["name"], "limit");
        assert_eq!(body["params"][0]["type"], "query");
        assert_eq!(body["params"][0]["reason"], "Missing");
        assert!(res.extensions().get::<LensFailure>().is_none());
    }

    #[tokio::test]
    async fn leaves_valid_requests_alone() {
        let res = run("/?limit=5").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"5");
    }
}
