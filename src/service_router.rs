//! Assembly of the fixed filter chain.
//!
//! ```rust,no_run
//! use http::{Method, StatusCode};
//! use restkit::{
//!     AuthService, ErrorResponse, GetPrincipalDeviation, Json, Request, Response,
//!     Server, ServiceRouter,
//! };
//!
//! #[derive(Clone)]
//! struct User { name: String }
//!
//! struct HeaderAuth;
//!
//! impl AuthService<User> for HeaderAuth {
//!     async fn get_principal(&self, req: &Request) -> Result<Option<User>, GetPrincipalDeviation> {
//!         Ok(req.header("x-user").map(|name| User { name: name.to_owned() }))
//!     }
//! }
//!
//! # async fn run() -> Result<(), restkit::Error> {
//! let service = ServiceRouter::builder(
//!     HeaderAuth,
//!     |user: &User| user.name.clone(),
//!     |_| Response::status(StatusCode::SERVICE_UNAVAILABLE),
//! )
//! .build();
//!
//! let api = service.api_handler();
//! let app = service.routing_handler(|routes| {
//!     routes.route(Method::GET, "/me", api.authed(|_req, user: User| async move {
//!         Ok::<_, ErrorResponse>(Json(user.name))
//!     }));
//! });
//!
//! Server::from_env(8080)?.serve(app).await
//! # }
//! ```

use std::sync::Arc;

use http::Method;

use crate::api_handler::{ApiHandler, ErrorObserver, attach_to_response};
use crate::cause::Cause;
use crate::context::RequestContext;
use crate::handler::Handler;
use crate::health::{self, HEALTH_PATH, HealthService};
use crate::log::{LogHandler, RequestResponseLog, tracing_log_handler};
use crate::middleware::{
    AccessLogStage, BoxedMiddleware, CatchAllStage, CorsPolicy, CorsStage, DeviationToResponse,
    ErrorHandlerStage, LensFailureStage, Middleware, Next, PrincipalStage, PrincipalToLog,
    RequestIdStage,
};
use crate::principal::{AuthService, GetPrincipalDeviation, Principal, PrincipalLog};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// A configured chain, ready to take routes.
pub struct ServiceRouter<P> {
    stages: Vec<BoxedMiddleware<P>>,
    health: Option<Arc<dyn HealthService>>,
    api_handler: ApiHandler<P>,
}

impl<P> ServiceRouter<P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Starts a builder from the three required collaborators.
    pub fn builder<A, PL>(
        auth_service: A,
        principal_to_log: impl Fn(&P) -> PL + Send + Sync + 'static,
        deviation_to_response: impl Fn(GetPrincipalDeviation) -> Response + Send + Sync + 'static,
    ) -> ServiceRouterBuilder<P, PL>
    where
        A: AuthService<P>,
        PL: PrincipalLog,
    {
        let deviation_to_response: DeviationToResponse = Arc::new(deviation_to_response);
        ServiceRouterBuilder {
            principal_stage: Arc::new(PrincipalStage::new(auth_service, deviation_to_response)),
            principal_to_log: Arc::new(principal_to_log),
            log_handler: None,
            cors: None,
            health: None,
            error_observer: attach_to_response(),
        }
    }

    /// Handler factory sharing this router's error observer.
    pub fn api_handler(&self) -> ApiHandler<P> {
        self.api_handler.clone()
    }

    /// Collects routes and additional middleware, and produces the
    /// dispatchable [`App`].
    ///
    /// # Panics
    ///
    /// Panics on a malformed or conflicting route, including one at
    /// `/health` when a health service is configured.
    pub fn routing_handler(&self, configure: impl FnOnce(&mut RoutingBuilder<P>)) -> App<P> {
        let mut routing = RoutingBuilder { middleware: Vec::new(), routes: Router::new() };
        configure(&mut routing);

        let RoutingBuilder { middleware, mut routes } = routing;
        if let Some(service) = &self.health {
            routes.add(Method::GET, HEALTH_PATH, health::handler(Arc::clone(service)).into_boxed_handler());
        }

        let mut stages = self.stages.clone();
        stages.extend(middleware);
        App { stages, routes }
    }
}

impl<P: Principal> ServiceRouter<P> {
    /// [`builder`](Self::builder) with the projection taken from [`Principal::to_log`].
    pub fn for_principal<A>(
        auth_service: A,
        deviation_to_response: impl Fn(GetPrincipalDeviation) -> Response + Send + Sync + 'static,
    ) -> ServiceRouterBuilder<P, P::Log>
    where
        A: AuthService<P>,
    {
        Self::builder(auth_service, P::to_log, deviation_to_response)
    }
}

/// Optional configuration for a [`ServiceRouter`].
pub struct ServiceRouterBuilder<P, PL> {
    principal_stage: BoxedMiddleware<P>,
    principal_to_log: PrincipalToLog<P, PL>,
    log_handler: Option<LogHandler<PL>>,
    cors: Option<CorsPolicy>,
    health: Option<Arc<dyn HealthService>>,
    error_observer: ErrorObserver,
}

impl<P, PL> ServiceRouterBuilder<P, PL>
where
    P: Clone + Send + Sync + 'static,
    PL: PrincipalLog,
{
    /// Access-log sink. Defaults to [`tracing_log_handler`].
    pub fn log_handler(mut self, handler: impl Fn(RequestResponseLog<PL>) + Send + Sync + 'static) -> Self {
        self.log_handler = Some(Arc::new(handler));
        self
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Serves `GET /health` from `service`.
    pub fn health(mut self, service: impl HealthService) -> Self {
        self.health = Some(Arc::new(service));
        self
    }

    /// Replaces the observer that receives error causes from [`ApiHandler`]
    /// endpoints. The access log only sees causes that reach the response
    /// through [`attach_cause`](crate::attach_cause).
    pub fn error_observer(mut self, observer: impl Fn(&mut Response, Cause) + Send + Sync + 'static) -> Self {
        self.error_observer = Arc::new(observer);
        self
    }

    pub fn build(self) -> ServiceRouter<P> {
        let log_handler = self.log_handler.unwrap_or_else(tracing_log_handler);

        let mut stages: Vec<BoxedMiddleware<P>> = vec![
            Arc::new(RequestIdStage),
            Arc::new(CatchAllStage),
            Arc::new(AccessLogStage::from_shared(self.principal_to_log, log_handler)),
        ];
        if let Some(policy) = self.cors {
            stages.push(Arc::new(CorsStage::new(policy)));
        }
        stages.push(Arc::new(ErrorHandlerStage));
        stages.push(Arc::new(LensFailureStage));
        stages.push(self.principal_stage);

        ServiceRouter {
            stages,
            health: self.health,
            api_handler: ApiHandler::new(self.error_observer),
        }
    }
}

/// Route and middleware registration, see [`ServiceRouter::routing_handler`].
pub struct RoutingBuilder<P> {
    middleware: Vec<BoxedMiddleware<P>>,
    routes: Router,
}

impl<P> RoutingBuilder<P> {
    /// Appends a stage after principal resolution. Stages run in registration order.
    pub fn middleware(&mut self, stage: impl Middleware<P>) -> &mut Self {
        self.middleware.push(Arc::new(stage));
        self
    }

    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) -> &mut Self {
        self.routes.add(method, path, handler.into_boxed_handler());
        self
    }
}

/// The assembled chain and route table.
pub struct App<P> {
    stages: Vec<BoxedMiddleware<P>>,
    routes: Router,
}

impl<P: Send + 'static> App<P> {
    /// Runs one request through the chain with a fresh [`RequestContext`].
    pub async fn handle(&self, request: Request) -> Response {
        let mut ctx = RequestContext::new();
        Next::new(&self.stages, &self.routes).run(&mut ctx, request).await
    }

    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}
