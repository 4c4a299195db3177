//! Route handler trait and type erasure.
//!
//! The route table holds handlers of different concrete types, so each one is
//! hidden behind `dyn ErasedHandler` and stored as an `Arc`:
//!
//! ```text
//! async fn get_user(req: Request) -> impl IntoResponse   ← plain handler
//! api.authed(|req, user| async { … })                    ← ApiHandler endpoint
//!        ↓ routes.route(Method::GET, "/users/{id}", h)
//! h.into_boxed_handler()                                 ← Handler blanket impl
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time                     ← one vtable dispatch
//! ```

use std::sync::Arc;

use crate::middleware::BoxFuture;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Response>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any `Fn(Request) -> impl Future<Output = impl IntoResponse>`,
/// which includes `async fn` items and the endpoints built by
/// [`ApiHandler`](crate::ApiHandler). Sealed: only the blanket impl below exists.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
