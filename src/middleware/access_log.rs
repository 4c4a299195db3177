//! One access-log entry per request.

use std::sync::Arc;

use chrono::Utc;

use super::{BoxFuture, Middleware, Next};
use crate::context::RequestContext;
use crate::log::{LogHandler, RequestLog, RequestResponseLog, ResponseLog, loggable_headers};
use crate::request::Request;
use crate::response::Response;

/// Projects a principal into its loggable form.
pub(crate) type PrincipalToLog<P, PL> = Arc<dyn Fn(&P) -> PL + Send + Sync>;

/// Emits a [`RequestResponseLog`] once the inner stages have settled on a
/// response, with the principal, captured error and normalized status they
/// left in the context.
pub struct AccessLogStage<P, PL> {
    principal_to_log: PrincipalToLog<P, PL>,
    log_handler: LogHandler<PL>,
}

impl<P, PL> AccessLogStage<P, PL> {
    pub fn new(
        principal_to_log: impl Fn(&P) -> PL + Send + Sync + 'static,
        log_handler: LogHandler<PL>,
    ) -> Self {
        Self::from_shared(Arc::new(principal_to_log), log_handler)
    }

    pub(crate) fn from_shared(principal_to_log: PrincipalToLog<P, PL>, log_handler: LogHandler<PL>) -> Self {
        Self { principal_to_log, log_handler }
    }
}

impl<P, PL> Middleware<P> for AccessLogStage<P, PL>
where
    P: Send + 'static,
    PL: 'static,
{
    fn name(&self) -> &'static str { "access_log" }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext<P>,
        request: Request,
        next: Next<'a, P>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_log = RequestLog {
                method: request.method().to_string(),
                uri: request.uri().to_string(),
                path: request.uri_path().to_owned(),
                headers: loggable_headers(request.headers()),
                body_size: request.body().len(),
            };

            let response = next.run(ctx, request).await;

            let status = response.status_code();
            let entry = RequestResponseLog {
                timestamp: Utc::now(),
                request_id_chain: ctx.request_id_chain().clone(),
                principal: ctx.principal().map(|p| (self.principal_to_log)(p)),
                request: request_log,
                response: ResponseLog {
                    status: status.as_u16(),
                    headers: loggable_headers(response.headers()),
                    body_size: response.body().len(),
                },
                status: ctx.normalized_status().unwrap_or(status).as_u16(),
                duration_ms: u64::try_from(ctx.started_at().elapsed().as_millis()).unwrap_or(u64::MAX),
                error: ctx.error_log().cloned(),
            };
            (self.log_handler)(entry);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_response::bad_user_input;
    use crate::middleware::test_support::*;
    use crate::middleware::{BoxedMiddleware, ErrorHandlerStage};
    use http::Method;
    use std::sync::Mutex;

    #[tokio::test]
    async fn logs_status_and_error_from_inner_stages() {
        let entries: Arc<Mutex<Vec<RequestResponseLog<String>>>> = Arc::default();
        let sink = Arc::clone(&entries);
        let handler: LogHandler<String> = Arc::new(move |e: RequestResponseLog<String>| sink.lock().unwrap().push(e));

        let stages: Vec<BoxedMiddleware<String>> = vec![
            Arc::new(AccessLogStage::new(|p: &String| p.to_uppercase(), handler)),
            Arc::new(ErrorHandlerStage),
        ];
        let routes = routes_with("/items", |_req: Request| async { bad_user_input("nope") });
        let mut ctx = RequestContext::new();
        ctx.set_principal(Some("alice".to_owned()));

        let mut req = request(Method::GET, "/items?x=1");
        req.headers_mut().insert("authorization", "Bearer t".parse().unwrap());
        Next::new(&stages, &routes).run(&mut ctx, req).await;

        let entries = entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.status, 400);
        assert_eq!(entry.response.status, 400);
        assert_eq!(entry.principal.as_deref(), Some("ALICE"));
        assert_eq!(entry.request.uri, "/items?x=1");
        assert!(entry.error.is_some());
        assert!(entry.request.headers.contains(&("authorization".into(), "*REDACTED*".into())));
    }
}
