//! Captured diagnostic attached to an [`ErrorResponse`](crate::ErrorResponse).
//!
//! A [`Cause`] never reaches the client. It travels with the error response
//! up through the chain so the access log can point at the code location the
//! failure was raised from, and at the underlying error if there was one.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

const CALL_SITE_ONLY: &str = "recorded for the call site only, no error was raised";

/// The diagnostic half of an error response.
///
/// Cheap to clone: the underlying error is shared.
#[derive(Clone)]
pub struct Cause {
    message: String,
    location: &'static Location<'static>,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Cause {
    /// A cause with no underlying error, recording only where it was created.
    #[track_caller]
    pub fn here() -> Self {
        Self {
            message: CALL_SITE_ONLY.to_owned(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Wraps `error`, copying its message so the log line reads on its own.
    #[track_caller]
    pub fn wrap<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            location: Location::caller(),
            source: Some(Arc::new(error)),
        }
    }

    /// Builds a cause from the payload of a caught panic.
    #[track_caller]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with a non-string payload".to_owned()
        };
        Self { message: format!("panic: {message}"), location: Location::caller(), source: None }
    }

    pub fn message(&self) -> &str { &self.message }
    pub fn location(&self) -> &'static Location<'static> { self.location }

    /// The wrapped error, if the cause was created from one.
    pub fn source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Messages of the wrapped error and everything it was caused by, outermost first.
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn StdError + 'static)> =
            self.source.as_deref().map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cause")
            .field("message", &self.message)
            .field("location", &format_args!("{}", self.location))
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.location)
    }
}

impl Serialize for Cause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Cause", 3)?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("location", &self.location.to_string())?;
        s.serialize_field("sources", &self.source_chain())?;
        s.end()
    }
}
