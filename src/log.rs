//! Access-log entries and sinks.
//!
//! The access-log stage emits exactly one [`RequestResponseLog`] per request
//! through a [`LogHandler`]. The default handler writes the entry as JSON
//! through `tracing`; services that ship logs elsewhere pass their own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::Serialize;
use tracing::{error, info};

use crate::cause::Cause;
use crate::context::RequestIdChain;

/// Headers whose values never reach the log.
const REDACTED_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization", "x-api-key"];

/// One logged request/response pair. `PL` is the principal log projection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponseLog<PL> {
    pub timestamp: DateTime<Utc>,
    pub request_id_chain: RequestIdChain,
    pub principal: Option<PL>,
    pub request: RequestLog,
    pub response: ResponseLog,
    /// Final status after error rendering. Equals `response.status` unless a
    /// stage outside the error handler changed the response afterwards.
    pub status: u16,
    pub duration_ms: u64,
    pub error: Option<Cause>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLog {
    pub method: String,
    pub uri: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body_size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseLog {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body_size: usize,
}

/// Receives every access-log entry. Called concurrently from any worker.
pub type LogHandler<PL> = Arc<dyn Fn(RequestResponseLog<PL>) + Send + Sync>;

/// Writes entries as JSON to `tracing` under the `restkit::access` target.
///
/// Server errors are logged at `error`, everything else at `info`.
pub fn tracing_log_handler<PL: Serialize + 'static>() -> LogHandler<PL> {
    Arc::new(|entry: RequestResponseLog<PL>| {
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                error!(target: "restkit::access", "access log encoding failed: {e}");
                return;
            }
        };
        if entry.status >= 500 {
            error!(target: "restkit::access", status = entry.status, "{json}");
        } else {
            info!(target: "restkit::access", status = entry.status, "{json}");
        }
    })
}

/// Header pairs for the log, sensitive values replaced.
pub(crate) fn loggable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                "*REDACTED*".to_owned()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_owned(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_headers_are_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());

        let logged = loggable_headers(&headers);
        assert!(logged.contains(&("authorization".into(), "*REDACTED*".into())));
        assert!(logged.contains(&("accept".into(), "application/json".into())));
    }

    #[test]
    fn entry_serializes_camel_case() {
        let entry: RequestResponseLog<String> = RequestResponseLog {
            timestamp: Utc::now(),
            request_id_chain: RequestIdChain::default(),
            principal: Some("alice".into()),
            request: RequestLog {
                method: "GET".into(),
                uri: "/x?y=1".into(),
                path: "/x".into(),
                headers: Vec::new(),
                body_size: 0,
            },
            response: ResponseLog { status: 200, headers: Vec::new(), body_size: 2 },
            status: 200,
            duration_ms: 3,
            error: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["requestIdChain"], serde_json::json!([]));
        assert_eq!(json["durationMs"], 3);
        assert_eq!(json["principal"], "alice");
        assert_eq!(json["response"]["bodySize"], 2);
    }
}
