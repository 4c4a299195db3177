//! The authenticated caller and how it is resolved.

use std::error::Error as StdError;
use std::future::Future;

use serde::Serialize;

use crate::request::Request;

/// A reduced, loggable view of a principal. Written into access-log entries.
pub trait PrincipalLog: Serialize + Send + Sync + 'static {}

impl<T: Serialize + Send + Sync + 'static> PrincipalLog for T {}

/// An application principal that knows its own log projection.
///
/// Implementing this lets [`ServiceRouter::for_principal`](crate::ServiceRouter::for_principal)
/// derive the projection instead of taking a closure.
pub trait Principal: Clone + Send + Sync + 'static {
    type Log: PrincipalLog;

    fn to_log(&self) -> Self::Log;
}

/// Infrastructure failure while resolving a principal.
///
/// Distinct from "no credentials": an anonymous request resolves to
/// `Ok(None)`, while an unreachable identity provider is a deviation.
#[derive(Debug, thiserror::Error)]
#[error("principal resolution failed: {message}")]
pub struct GetPrincipalDeviation {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl GetPrincipalDeviation {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn message(&self) -> &str { &self.message }
}

/// Resolves the principal for an inbound request.
///
/// Called once per request, from any worker thread, before routing.
///
/// ```rust
/// use restkit::{AuthService, GetPrincipalDeviation, Request};
///
/// #[derive(Clone)]
/// struct User { name: String }
///
/// struct HeaderAuth;
///
/// impl AuthService<User> for HeaderAuth {
///     async fn get_principal(&self, req: &Request) -> Result<Option<User>, GetPrincipalDeviation> {
///         Ok(req.header("x-user").map(|name| User { name: name.to_owned() }))
///     }
/// }
/// ```
pub trait AuthService<P>: Send + Sync + 'static {
    fn get_principal(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Option<P>, GetPrincipalDeviation>> + Send;
}
