//! Per-request state carried through the filter chain.
//!
//! One [`RequestContext`] is created for every request and handed down the
//! chain by `&mut`. Stages record what they learn (the id chain, the
//! principal, the captured error, the final status) and the access-log stage
//! reads it back after the inner stages return. Nothing here outlives the
//! request.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::cause::Cause;

/// Correlation ids accumulated across service hops, oldest first.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestIdChain(Vec<Uuid>);

impl RequestIdChain {
    pub fn new(ids: Vec<Uuid>) -> Self { Self(ids) }

    /// Parses a comma-separated header value. `None` if any entry is not a UUID.
    pub fn parse(header: &str) -> Option<Self> {
        header
            .split(',')
            .map(|s| Uuid::parse_str(s.trim()).ok())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// This chain with one freshly generated id appended.
    pub fn extend(&self) -> Self {
        let mut ids = self.0.clone();
        ids.push(Uuid::new_v4());
        Self(ids)
    }

    pub fn ids(&self) -> &[Uuid] { &self.0 }

    /// The id assigned by this service.
    pub fn current(&self) -> Option<Uuid> { self.0.last().copied() }
}

/// Comma-separated ids; the value to forward in `x-request-id-chain` downstream.
impl fmt::Display for RequestIdChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// State for one request, generic over the application principal `P`.
pub struct RequestContext<P> {
    request_id_chain: RequestIdChain,
    principal: Option<P>,
    error_log: Option<Cause>,
    normalized_status: Option<StatusCode>,
    started_at: Instant,
    received_at: DateTime<Utc>,
}

impl<P> RequestContext<P> {
    pub fn new() -> Self {
        Self {
            request_id_chain: RequestIdChain::default(),
            principal: None,
            error_log: None,
            normalized_status: None,
            started_at: Instant::now(),
            received_at: Utc::now(),
        }
    }

    pub fn request_id_chain(&self) -> &RequestIdChain { &self.request_id_chain }
    pub fn set_request_id_chain(&mut self, chain: RequestIdChain) { self.request_id_chain = chain; }

    pub fn principal(&self) -> Option<&P> { self.principal.as_ref() }
    pub fn set_principal(&mut self, principal: Option<P>) { self.principal = principal; }

    pub fn error_log(&self) -> Option<&Cause> { self.error_log.as_ref() }

    /// Records a captured error. The first one recorded wins.
    pub fn record_error(&mut self, cause: Cause) {
        if self.error_log.is_none() {
            self.error_log = Some(cause);
        }
    }

    pub fn normalized_status(&self) -> Option<StatusCode> { self.normalized_status }
    pub fn set_normalized_status(&mut self, status: StatusCode) { self.normalized_status = Some(status); }

    pub fn started_at(&self) -> Instant { self.started_at }
    pub fn received_at(&self) -> DateTime<Utc> { self.received_at }
}

impl<P> Default for RequestContext<P> {
    fn default() -> Self { Self::new() }
}
