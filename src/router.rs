//! Radix-tree route table.
//!
//! One tree per HTTP method. O(path-length) lookup. The route table is the
//! innermost stage of the chain: everything in front of it is fixed by
//! [`ServiceRouter`](crate::ServiceRouter).

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::error_response::not_found;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Method + path bindings.
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `handler` for a method + path pair. Path parameters use
    /// `{name}` syntax.
    ///
    /// # Panics
    ///
    /// Panics on a malformed or conflicting path. Routes are registered at
    /// startup, so this surfaces before the listener opens.
    pub(crate) fn add(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Routes one request. Unmatched requests get an empty `404`.
    pub(crate) async fn dispatch(&self, mut request: Request) -> Response {
        match self.lookup(&request.method, request.uri.path()) {
            Some((handler, params)) => {
                request.params = params;
                handler.call(request).await
            }
            None => not_found().into_response(),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
