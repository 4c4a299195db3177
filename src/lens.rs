//! Failures from typed request extraction.
//!
//! Extraction helpers on [`Request`](crate::Request) return [`LensFailure`]
//! when required data is missing or cannot be parsed. `?` converts it into a
//! `400` [`ErrorResponse`]; the lens-failure stage then renders the structured
//! body:
//!
//! ```json
//! {"message":"Missing/invalid parameters","params":[{"name":"id","type":"path","required":true,"reason":"Invalid"}]}
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cause::Cause;
use crate::error_response::{ErrorKind, ErrorResponse};

/// Where in the request the value was looked for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Path,
    Query,
    Header,
    Body,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Reason {
    Missing,
    Invalid,
}

/// One field that failed extraction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Failure {
    pub name: String,
    #[serde(rename = "type")]
    pub location: Location,
    pub required: bool,
    pub reason: Reason,
}

impl Failure {
    pub fn missing(name: &str, location: Location) -> Self {
        Self { name: name.to_owned(), location, required: true, reason: Reason::Missing }
    }

    pub fn invalid(name: &str, location: Location) -> Self {
        Self { name: name.to_owned(), location, required: true, reason: Reason::Invalid }
    }
}

/// Missing or invalid request data.
#[derive(Clone, Debug)]
pub struct LensFailure {
    failures: Vec<Failure>,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl LensFailure {
    pub fn new(failures: Vec<Failure>) -> Self {
        Self { failures, cause: None }
    }

    pub fn single(failure: Failure) -> Self {
        Self::new(vec![failure])
    }

    /// Records the parse error behind the failure, for the access log.
    pub fn caused_by<E>(mut self, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(error));
        self
    }

    /// Merges failures from several extractions into one.
    pub fn combine(mut self, other: LensFailure) -> Self {
        self.failures.extend(other.failures);
        self.cause = self.cause.or(other.cause);
        self
    }

    pub fn failures(&self) -> &[Failure] { &self.failures }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// The rendered JSON body for this failure.
    pub(crate) fn body(&self) -> serde_json::Value {
        serde_json::json!({
            "message": "Missing/invalid parameters",
            "params": self.failures,
        })
    }
}

impl fmt::Display for LensFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("missing/invalid request data:")?;
        for failure in &self.failures {
            write!(f, " {} ({:?} {:?})", failure.name, failure.location, failure.reason)?;
        }
        Ok(())
    }
}

impl StdError for LensFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// A `400` carrying the failure unrendered; the lens-failure stage renders it.
impl From<LensFailure> for ErrorResponse {
    #[track_caller]
    fn from(failure: LensFailure) -> Self {
        let mut e = ErrorResponse::of(ErrorKind::BadUserInput);
        e.response_mut().extensions_mut().insert(failure.clone());
        ErrorResponse::new(e.into_parts().0, Some(Cause::wrap(failure)))
    }
}
