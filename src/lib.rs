//! # restkit
//!
//! A fixed filter chain for JSON REST services on hyper.
//!
//! Every request passes through the same stages, outermost first:
//!
//! ```text
//! request-id chain → catch-all → access log → [CORS] → error rendering
//!   → lens failures → principal resolution → (your middleware) → routes
//! ```
//!
//! What's left for the service is the part that changes between applications:
//!
//! - An [`AuthService`] that turns a request into an optional principal
//! - Routes whose bodies return `Result<T, ErrorResponse>` and use `?`
//! - A log sink, if `tracing` output is not where access logs belong
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{Method, StatusCode};
//! use restkit::{
//!     AuthService, ErrorResponse, GetPrincipalDeviation, HealthBuildInfo, Json, OptionExt,
//!     Request, Response, Server, ServiceRouter, StaticHealthService, check_input,
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
//! #[tokio::main]
//! async fn main() -> Result<(), restkit::Error> {
//!     let service = ServiceRouter::builder(
//!         HeaderAuth,
//!         |user: &User| user.name.clone(),
//!         |_| Response::status(StatusCode::SERVICE_UNAVAILABLE),
//!     )
//!     .health(StaticHealthService::new("users", chrono::Utc::now(), HealthBuildInfo::from_env()))
//!     .build();
//!
//!     let api = service.api_handler();
//!     let app = service.routing_handler(|routes| {
//!         routes.route(Method::GET, "/users/{id}", api.authed(|req: Request, _user: User| async move {
//!             let id: u32 = req.path("id")?;
//!             check_input(id > 0, || "id must be positive")?;
//!             let name = (id == 1).then_some("alice").or_not_found()?;
//!             Ok::<_, ErrorResponse>(Json(name))
//!         }));
//!     });
//!
//!     Server::from_env(8080)?.serve(app).await
//! }
//! ```

mod api_handler;
mod cause;
mod context;
mod error;
mod error_response;
mod handler;
mod health;
mod lens;
mod log;
mod principal;
mod request;
mod response;
mod router;
mod server;
mod service_router;

pub mod middleware;

pub use api_handler::{ApiHandler, ErrorObserver, attach_to_response};
pub use cause::Cause;
pub use context::{RequestContext, RequestIdChain};
pub use error::Error;
pub use error_response::{
    ErrorKind, ErrorResponse, LookupExt, OptionExt, attach_cause, bad_user_input, check_input,
    conflict, forbidden, internal_service_error, not_authenticated, not_found, service_unavailable,
};
pub use handler::Handler;
pub use health::{HEALTH_PATH, HealthBuildInfo, HealthService, HealthStatus, StaticHealthService};
pub use lens::{Failure, LensFailure, Location, Reason};
pub use log::{LogHandler, RequestLog, RequestResponseLog, ResponseLog, tracing_log_handler};
pub use principal::{AuthService, GetPrincipalDeviation, Principal, PrincipalLog};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder, WithStatus};
pub use server::Server;
pub use service_router::{App, RoutingBuilder, ServiceRouter, ServiceRouterBuilder};
