//! JSON health report.

use jiff::Timestamp;
use serde::Serialize;

/// Health of a single datasource or of the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Unhealthy,
}

/// Outcome of probing one datasource.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Datasource name.
    pub name: String,
    /// Datasource kind: cache, events, database or rest.
    pub kind: &'static str,
    pub status: Status,
    /// Time spent connecting and checking.
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health report for every configured datasource.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub service: String,
    pub environment: String,
    pub request_id: String,
    pub timestamp: Timestamp,
    pub status: Status,
    pub checks: Vec<CheckReport>,
}

impl ProbeReport {
    /// Builds a report; it is healthy only if every check is.
    pub fn new(
        service: impl Into<String>,
        environment: impl Into<String>,
        request_id: impl Into<String>,
        checks: Vec<CheckReport>,
    ) -> Self {
        let status = if checks.iter().all(|c| c.status == Status::Healthy) {
            Status::Healthy
        } else {
            Status::Unhealthy
        };

        Self {
            service: service.into(),
            environment: environment.into(),
            request_id: request_id.into(),
            timestamp: Timestamp::now(),
            status,
            checks,
        }
    }

    /// Returns whether every check passed.
    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.status == Status::Healthy
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn check(status: Status, error: Option<&str>) -> CheckReport {
        CheckReport {
            name: "billing-cache".to_owned(),
            kind: "cache",
            status,
            latency_ms: 3,
            error: error.map(str::to_owned),
        }
    }

    #[test]
    fn test_any_failure_makes_report_unhealthy() {
        let report = ProbeReport::new("billing", "dev", "req", vec![
            check(Status::Healthy, None),
            check(Status::Unhealthy, Some("refused")),
        ]);
        assert!(!report.is_healthy());

        let report = ProbeReport::new("billing", "dev", "req", vec![]);
        assert!(report.is_healthy());
    }

    #[test]
    fn test_check_serialization_omits_missing_error() {
        let value = serde_json::to_value(check(Status::Healthy, None)).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "billing-cache",
                "kind": "cache",
                "status": "healthy",
                "latency_ms": 3,
            })
        );
    }
}
