//! Request-id chain propagation.
//!
//! The caller may send `x-request-id-chain: <uuid>,<uuid>,…`. This service
//! appends one fresh id and never replaces what it received. The extended
//! chain is stored in the context and the request extensions, echoed on the
//! response, and recorded on a `request` span that wraps the rest of the
//! chain so every log line for the request carries it.

use http::HeaderValue;
use tracing::{Instrument, debug, info_span};

use super::{BoxFuture, Middleware, Next};
use crate::context::{RequestContext, RequestIdChain};
use crate::request::Request;
use crate::response::Response;

/// Header carrying the comma-separated request-id chain.
pub const REQUEST_ID_CHAIN_HEADER: &str = "x-request-id-chain";

#[derive(Debug, Default)]
pub struct RequestIdStage;

impl RequestIdStage {
    fn incoming(request: &Request) -> RequestIdChain {
        let Some(raw) = request.header(REQUEST_ID_CHAIN_HEADER) else {
            return RequestIdChain::default();
        };
        RequestIdChain::parse(raw).unwrap_or_else(|| {
            debug!(header = raw, "ignoring malformed request-id chain");
            RequestIdChain::default()
        })
    }
}

impl<P: Send + 'static> Middleware<P> for RequestIdStage {
    fn name(&self) -> &'static str { "request_id" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        mut request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let chain = Self::incoming(&request).extend();
            let span = info_span!(
                "request",
                request_id = %chain.current().unwrap_or_default(),
                request_id_chain = %chain,
            );

            ctx.set_request_id_chain(chain.clone());
            request.extensions_mut().insert(chain.clone());

            let mut response = next.run(ctx, request).instrument(span).await;

            if let Ok(value) = HeaderValue::from_str(&chain.to_string()) {
                response.headers_mut().insert(REQUEST_ID_CHAIN_HEADER, value);
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::BoxedMiddleware;
    use crate::middleware::test_support::*;
    use http::Method;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn run(req: Request) -> (RequestContext<()>, Response) {
        let stages: Vec<BoxedMiddleware<()>> = vec![Arc::new(RequestIdStage)];
        let routes = routes_with("/", |req: Request| async move {
            req.request_id_chain().map(|c| c.to_string()).unwrap_or_default()
        });
        let mut ctx = RequestContext::new();
        let res = Next::new(&stages, &routes).run(&mut ctx, req).await;
        (ctx, res)
    }

    #[tokio::test]
    async fn starts_a_chain_when_none_given() {
        let (ctx, res) = run(request(Method::GET, "/")).await;
        assert_eq!(ctx.request_id_chain().ids().len(), 1);
        assert_eq!(
            res.headers()[REQUEST_ID_CHAIN_HEADER].to_str().unwrap(),
            ctx.request_id_chain().to_string()
        );
        // The handler sees the same chain.
        assert_eq!(res.body().as_ref(), ctx.request_id_chain().to_string().as_bytes());
    }

    #[tokio::test]
    async fn appends_to_an_incoming_chain() {
        let prior = [Uuid::new_v4(), Uuid::new_v4()];
        let mut req = request(Method::GET, "/");
        req.headers_mut().insert(
            REQUEST_ID_CHAIN_HEADER,
            format!("{},{}", prior[0], prior[1]).parse().unwrap(),
        );

        let (ctx, _) = run(req).await;
        let ids = ctx.request_id_chain().ids();
        assert_eq!(ids.len(), 3);
        assert_eq!(&ids[..2], &prior);
    }

    #[tokio::test]
    async fn malformed_chain_starts_over() {
        let mut req = request(Method::GET, "/");
        req.headers_mut().insert(REQUEST_ID_CHAIN_HEADER, "garbage".parse().unwrap());
        let (ctx, _) = run(req).await;
        assert_eq!(ctx.request_id_chain().ids().len(), 1);
    }
}
