//! Built-in health-check endpoint.
//!
//! | Path | Method | Body |
//! |---|---|---|
//! | `/health` | `GET` | [`HealthStatus`] as JSON, always `200` |
//!
//! Supply a [`HealthService`] to
//! [`ServiceRouterBuilder::health`](crate::ServiceRouterBuilder::health) and
//! the route is appended to the route table:
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use restkit::{HealthBuildInfo, StaticHealthService};
//!
//! let health = StaticHealthService::new("orders", Utc::now(), HealthBuildInfo::from_env());
//! ```
//!
//! There is no failure path. If the process answers HTTP at all it reports
//! itself, with a timestamp taken at the moment of the call.

use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};

pub const HEALTH_PATH: &str = "/health";

/// The health endpoint's response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub running_since: DateTime<Utc>,
    pub build: HealthBuildInfo,
}

/// Build metadata, injected by the build pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthBuildInfo {
    pub timestamp: Option<DateTime<Utc>>,
    pub commit: String,
    pub branch: String,
    pub number: i32,
}

impl HealthBuildInfo {
    /// Metadata for a local build: no timestamp, `unknown` commit and branch.
    pub fn local() -> Self {
        Self { timestamp: None, commit: "unknown".into(), branch: "unknown".into(), number: 0 }
    }

    /// Reads `BUILD_TIMESTAMP` (RFC 3339), `BUILD_COMMIT`, `BUILD_BRANCH` and
    /// `BUILD_NUMBER`. Missing or unparsable values fall back to [`local`](Self::local).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let local = Self::local();
        Self {
            timestamp: lookup("BUILD_TIMESTAMP")
                .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
                .map(|t| t.with_timezone(&Utc)),
            commit: lookup("BUILD_COMMIT").unwrap_or(local.commit),
            branch: lookup("BUILD_BRANCH").unwrap_or(local.branch),
            number: lookup("BUILD_NUMBER").and_then(|v| v.parse().ok()).unwrap_or(local.number),
        }
    }
}

/// Reports the service's health. Called from any worker on every `GET /health`.
pub trait HealthService: Send + Sync + 'static {
    fn health_status(&self) -> HealthStatus;
}

/// Fixed name, start time and build info; `timestamp` is the time of the call.
#[derive(Clone, Debug)]
pub struct StaticHealthService {
    name: String,
    running_since: DateTime<Utc>,
    build: HealthBuildInfo,
}

impl StaticHealthService {
    pub fn new(name: impl Into<String>, running_since: DateTime<Utc>, build: HealthBuildInfo) -> Self {
        Self { name: name.into(), running_since, build }
    }
}

impl HealthService for StaticHealthService {
    fn health_status(&self) -> HealthStatus {
        HealthStatus {
            name: self.name.clone(),
            timestamp: Utc::now(),
            running_since: self.running_since,
            build: self.build.clone(),
        }
    }
}

/// The `/health` route handler for `service`.
pub(crate) fn handler(
    service: Arc<dyn HealthService>,
) -> impl Fn(Request) -> std::future::Ready<Response> + Send + Sync + 'static {
    move |_req: Request| std::future::ready(Json(service.health_status()).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use http::StatusCode;
    use std::collections::HashMap;

    #[test]
    fn build_info_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BUILD_TIMESTAMP", "2024-03-01T12:00:00Z"),
            ("BUILD_COMMIT", "abc123"),
            ("BUILD_BRANCH", "main"),
            ("BUILD_NUMBER", "42"),
        ]);
        let info = HealthBuildInfo::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(info.timestamp, Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        assert_eq!(info.commit, "abc123");
        assert_eq!(info.branch, "main");
        assert_eq!(info.number, 42);
    }

    #[test]
    fn build_info_defaults_for_local_builds() {
        let info = HealthBuildInfo::from_lookup(|k| (k == "BUILD_NUMBER").then(|| "nope".to_owned()));
        assert_eq!(info, HealthBuildInfo::local());
    }

    #[test]
    fn static_service_stamps_each_call() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let service = StaticHealthService::new("svc", since, HealthBuildInfo::local());
        let status = service.health_status();
        assert_eq!(status.running_since, since);
        assert!(status.timestamp >= since);
    }

    #[tokio::test]
    async fn handler_renders_json() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let handle = handler(Arc::new(StaticHealthService::new("svc", since, HealthBuildInfo::local())));
        let req = Request::from_http(http::Request::get(HEALTH_PATH).body(Bytes::new()).unwrap());

        let res = handle(req).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["name"], "svc");
        assert_eq!(body["runningSince"], "2024-01-01T00:00:00Z");
        assert_eq!(body["build"]["timestamp"], serde_json::Value::Null);
        assert_eq!(body["build"]["number"], 0);
    }
}
