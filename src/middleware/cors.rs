//! CORS policy application.
//!
//! Placed outside the error handler so error responses carry CORS headers
//! too. Preflight `OPTIONS` requests are answered here and never routed.

use std::time::Duration;

use http::header::{self, HeaderValue};
use http::{Method, StatusCode};

use super::{BoxFuture, Middleware, Next};
use crate::context::RequestContext;
use crate::request::Request;
use crate::response::Response;

/// Which origins may call the service.
#[derive(Clone, Debug)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.iter().any(|o| o == origin),
        }
    }
}

/// A CORS policy.
///
/// ```rust
/// use restkit::middleware::{AllowedOrigins, CorsPolicy};
/// use http::Method;
///
/// let policy = CorsPolicy::new(AllowedOrigins::List(vec!["https://app.example.com".into()]))
///     .allow_methods([Method::GET, Method::POST])
///     .allow_headers(["content-type", "authorization"])
///     .allow_credentials(true);
/// ```
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    methods: Vec<Method>,
    headers: Vec<String>,
    credentials: bool,
    max_age: Option<Duration>,
}

impl CorsPolicy {
    pub fn new(origins: AllowedOrigins) -> Self {
        Self { origins, methods: Vec::new(), headers: Vec::new(), credentials: false, max_age: None }
    }

    /// Any origin, any common method, no credentials.
    pub fn unsafe_global_permissive() -> Self {
        Self::new(AllowedOrigins::Any)
            .allow_methods([
                Method::GET, Method::POST, Method::PUT, Method::PATCH,
                Method::DELETE, Method::OPTIONS, Method::HEAD,
            ])
            .allow_headers(["content-type"])
    }

    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    pub fn allow_headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.headers.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    fn apply(&self, origin: Option<&str>, response: &mut Response) {
        let headers = response.headers_mut();
        // An opaque `null` origin is never echoed.
        let allowed_origin = match (&self.origins, origin) {
            (AllowedOrigins::Any, _) if !self.credentials => Some("*"),
            (_, Some(origin)) if origin != "null" && self.origins.allows(origin) => Some(origin),
            _ => None,
        };
        let allow_origin = allowed_origin.and_then(|o| HeaderValue::from_str(o).ok());
        let echoed = allow_origin.is_some();
        if let Some(value) = allow_origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }

        if matches!(self.origins, AllowedOrigins::List(_)) || self.credentials {
            headers.append(header::VARY, HeaderValue::from_static("origin"));
        }
        if let Ok(v) = HeaderValue::from_str(&join(self.methods.iter().map(Method::as_str))) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, v);
        }
        if let Ok(v) = HeaderValue::from_str(&join(self.headers.iter().map(String::as_str))) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, v);
        }
        if self.credentials && echoed {
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if let Some(max_age) = self.max_age {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Applies a [`CorsPolicy`] to every response.
#[derive(Clone, Debug)]
pub struct CorsStage {
    policy: CorsPolicy,
}

impl CorsStage {
    pub fn new(policy: CorsPolicy) -> Self { Self { policy } }
}

impl<P: Send + 'static> Middleware<P> for CorsStage {
    fn name(&self) -> &'static str { "cors" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let origin = request.header(header::ORIGIN.as_str()).map(str::to_owned);
            let mut response = if *request.method() == Method::OPTIONS {
                Response::status(StatusCode::OK)
            } else {
                next.run(ctx, request).await
            };
            self.policy.apply(origin.as_deref(), &mut response);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_response::forbidden;
    use crate::middleware::BoxedMiddleware;
    use crate::middleware::test_support::*;
    use std::sync::Arc;

    async fn run(policy: CorsPolicy, method: Method, origin: &str) -> Response {
        let stages: Vec<BoxedMiddleware<()>> = vec![Arc::new(CorsStage::new(policy))];
        let routes = routes_with("/", |_req: Request| async { forbidden() });
        let mut req = request(method, "/");
        req.headers_mut().insert(header::ORIGIN, origin.parse().unwrap());
        let mut ctx = RequestContext::new();
        Next::new(&stages, &routes).run(&mut ctx, req).await
    }

    fn listed() -> CorsPolicy {
        CorsPolicy::new(AllowedOrigins::List(vec!["https://app.example.com".into()]))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(["content-type"])
            .allow_credentials(true)
    }

    #[tokio::test]
    async fn error_responses_get_cors_headers() {
        let res = run(listed(), Method::GET, "https://app.example.com").await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example.com");
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST");
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_allow_origin() {
        let res = run(listed(), Method::GET, "https://evil.example.com").await;
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[tokio::test]
    async fn null_origin_is_not_granted_credentials() {
        let res = run(listed(), Method::GET, "null").await;
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());

        let any = CorsPolicy::new(AllowedOrigins::Any).allow_credentials(true);
        let res = run(any, Method::GET, "null").await;
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[tokio::test]
    async fn any_origin_with_credentials_echoes_the_caller() {
        let any = CorsPolicy::new(AllowedOrigins::Any).allow_credentials(true);
        let res = run(any, Method::GET, "https://x.dev").await;
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://x.dev");
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn preflight_is_answered_without_routing() {
        let res = run(CorsPolicy::unsafe_global_permissive(), Method::OPTIONS, "https://x.dev").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
