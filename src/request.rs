//! Incoming HTTP request type.

use std::collections::HashMap;
use std::str::FromStr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use url::form_urlencoded;
use uuid::Uuid;

use crate::context::RequestIdChain;
use crate::lens::{Failure, LensFailure, Location};

/// Principal resolved by the principal stage, `None` for anonymous callers.
#[derive(Clone)]
pub(crate) struct ResolvedPrincipal<P>(pub(crate) Option<P>);

/// An incoming HTTP request with its body fully read.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) extensions: Extensions,
}

impl Request {
    /// Wraps an `http` request whose body has already been collected.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            extensions: parts.extensions,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn uri_path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Header lookup; `None` if absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a raw named path parameter, still percent-encoded.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    /// Use [`path`](Self::path) for the decoded value.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The principal resolved for this request, if any.
    pub fn principal<P>(&self) -> Option<&P>
    where
        P: Clone + Send + Sync + 'static,
    {
        self.extensions.get::<ResolvedPrincipal<P>>().and_then(|p| p.0.as_ref())
    }

    /// The request-id chain established for this request.
    pub fn request_id_chain(&self) -> Option<&RequestIdChain> {
        self.extensions.get::<RequestIdChain>()
    }

    // ── Typed extraction ──────────────────────────────────────────────────────

    /// A path parameter, percent-decoded and parsed as `T`.
    ///
    /// A segment that does not decode to UTF-8 is invalid. Malformed escapes
    /// such as `%zz` are kept literally.
    pub fn path<T: FromStr>(&self, name: &str) -> Result<T, LensFailure> {
        let raw = self
            .param(name)
            .ok_or_else(|| LensFailure::single(Failure::missing(name, Location::Path)))?;
        let invalid = || LensFailure::single(Failure::invalid(name, Location::Path));
        let decoded = urlencoding::decode(raw).map_err(|_| invalid())?;
        decoded.parse().map_err(|_| invalid())
    }

    /// A UUID path parameter mapped into a typed identifier.
    ///
    /// ```rust,ignore
    /// struct UserId(Uuid);
    /// let id = req.path_id("id", UserId)?;
    /// ```
    pub fn path_id<T>(&self, name: &str, factory: impl FnOnce(Uuid) -> T) -> Result<T, LensFailure> {
        self.path::<Uuid>(name).map(factory)
    }

    /// An optional query parameter. Present but unparsable is a failure.
    pub fn query<T: FromStr>(&self, name: &str) -> Result<Option<T>, LensFailure> {
        match query_value(&self.uri, name) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| LensFailure::single(Failure::invalid(name, Location::Query))),
        }
    }

    /// A required query parameter.
    pub fn required_query<T: FromStr>(&self, name: &str) -> Result<T, LensFailure> {
        self.query(name)?
            .ok_or_else(|| LensFailure::single(Failure::missing(name, Location::Query)))
    }

    /// A required header value.
    pub fn required_header(&self, name: &str) -> Result<&str, LensFailure> {
        match self.headers.get(name) {
            None => Err(LensFailure::single(Failure::missing(name, Location::Header))),
            Some(v) => v
                .to_str()
                .map_err(|_| LensFailure::single(Failure::invalid(name, Location::Header))),
        }
    }

    /// Decodes the JSON body. Unknown fields are ignored.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, LensFailure> {
        if self.body.is_empty() {
            return Err(LensFailure::single(Failure::missing("body", Location::Body)));
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            LensFailure::single(Failure::invalid("body", Location::Body)).caused_by(e)
        })
    }
}

/// First decoded value of `name` in the query string.
fn query_value(uri: &Uri, name: &str) -> Option<String> {
    form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::Reason;

    fn request(uri: &str, body: &'static str) -> Request {
        let req = http::Request::builder()
            .uri(uri)
            .header("x-tenant", "acme")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        Request::from_http(req)
    }

    #[test]
    fn typed_path_params() {
        let mut req = request("/users/42", "");
        req.params.insert("id".into(), "42".into());
        assert_eq!(req.path::<u64>("id").unwrap(), 42);

        let failure = req.path::<u64>("other").unwrap_err();
        assert_eq!(failure.failures()[0].reason, Reason::Missing);

        req.params.insert("bad".into(), "x".into());
        let failure = req.path::<u64>("bad").unwrap_err();
        assert_eq!(failure.failures()[0].reason, Reason::Invalid);
        assert_eq!(failure.failures()[0].location, Location::Path);
    }

    #[test]
    fn uuid_path_ids() {
        #[derive(Debug, PartialEq)]
        struct UserId(Uuid);

        let id = Uuid::new_v4();
        let mut req = request("/", "");
        req.params.insert("id".into(), id.to_string());
        assert_eq!(req.path_id("id", UserId).unwrap(), UserId(id));
    }

    #[test]
    fn query_params() {
        let req = request("/search?limit=10&q=a+b", "");
        assert_eq!(req.query::<u32>("limit").unwrap(), Some(10));
        assert_eq!(req.query::<String>("q").unwrap().as_deref(), Some("a b"));
        assert_eq!(req.query::<u32>("offset").unwrap(), None);
        assert!(req.required_query::<u32>("offset").is_err());
        assert!(req.query::<u32>("q").is_err());
    }

    #[test]
    fn query_params_are_percent_decoded() {
        let req = request("/search?email=a%40b.com&q=a%20b&raw=100%zz", "");
        assert_eq!(req.query::<String>("email").unwrap().as_deref(), Some("a@b.com"));
        assert_eq!(req.required_query::<String>("q").unwrap(), "a b");
        assert_eq!(req.query::<String>("raw").unwrap().as_deref(), Some("100%zz"));
    }

    #[test]
    fn path_params_are_percent_decoded() {
        let mut req = request("/users/john%20doe", "");
        req.params.insert("name".into(), "john%20doe".into());
        req.params.insert("email".into(), "a%40b.com".into());
        req.params.insert("odd".into(), "50%zz".into());
        req.params.insert("bytes".into(), "%FF%FE".into());

        assert_eq!(req.param("name"), Some("john%20doe"));
        assert_eq!(req.path::<String>("name").unwrap(), "john doe");
        assert_eq!(req.path::<String>("email").unwrap(), "a@b.com");
        assert_eq!(req.path::<String>("odd").unwrap(), "50%zz");

        let failure = req.path::<String>("bytes").unwrap_err();
        assert_eq!(failure.failures()[0].reason, Reason::Invalid);
        assert_eq!(failure.failures()[0].location, Location::Path);
    }

    #[test]
    fn headers() {
        let req = request("/", "");
        assert_eq!(req.required_header("x-tenant").unwrap(), "acme");
        assert_eq!(
            req.required_header("x-missing").unwrap_err().failures()[0].location,
            Location::Header
        );
    }

    #[test]
    fn json_body() {
        #[derive(Debug, serde::Deserialize)]
        struct Input { name: String }

        let req = request("/", r#"{"name":"a","extra":1}"#);
        assert_eq!(req.json::<Input>().unwrap().name, "a");

        let req = request("/", "");
        assert_eq!(req.json::<Input>().unwrap_err().failures()[0].reason, Reason::Missing);

        let req = request("/", "{");
        let failure = req.json::<Input>().unwrap_err();
        assert_eq!(failure.failures()[0].reason, Reason::Invalid);
        assert!(failure.cause().is_some());
    }
}
