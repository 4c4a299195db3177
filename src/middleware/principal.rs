//! Principal resolution, once per request, ahead of routing.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use super::{BoxFuture, Middleware, Next};
use crate::context::RequestContext;
use crate::principal::{AuthService, GetPrincipalDeviation};
use crate::request::{Request, ResolvedPrincipal};
use crate::response::Response;

/// Maps an auth-infrastructure failure to the response sent instead of routing.
pub type DeviationToResponse = Arc<dyn Fn(GetPrincipalDeviation) -> Response + Send + Sync>;

/// Calls the [`AuthService`] and stores the outcome.
///
/// On a deviation the request ends with the configured response and nothing
/// downstream runs. Otherwise the principal, or its absence, is stored in the
/// context and the request extensions; whether a route needs one is decided
/// later by [`ApiHandler`](crate::ApiHandler).
pub struct PrincipalStage<P, A> {
    auth_service: A,
    deviation_to_response: DeviationToResponse,
    _principal: PhantomData<fn() -> P>,
}

impl<P, A> PrincipalStage<P, A> {
    pub fn new(auth_service: A, deviation_to_response: DeviationToResponse) -> Self {
        Self { auth_service, deviation_to_response, _principal: PhantomData }
    }
}

impl<P, A> Middleware<P> for PrincipalStage<P, A>
where
    P: Clone + Send + Sync + 'static,
    A: AuthService<P>,
{
    fn name(&self) -> &'static str { "principal" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        mut request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let resolved = self.auth_service.get_principal(&request).await;
            match resolved {
                Err(deviation) => {
                    warn!(error = %deviation, "principal resolution failed");
                    (self.deviation_to_response)(deviation)
                }
                Ok(principal) => {
                    request.extensions_mut().insert(ResolvedPrincipal(principal.clone()));
                    ctx.set_principal(principal);
                    next.run(ctx, request).await
                }
            }
        })
    }
}
