//! Idempotent provisioning of dashboard resources.
//!
//! Every creation call tolerates the resource already existing: a conflict
//! detected by the step's `ExistenceMatcher` is a success path, not an
//! error. Anything else is retried a few times with a short fixed delay
//! (the dashboard service keeps initialising internally for a while after
//! its readiness probe first passes), then reported as a failed step.
//! Failed steps never abort their siblings.
//!
//! Running the whole sequence twice leaves the service in the same state
//! and reports zero duplication errors.

use crate::errors::DeployError;
use crate::kibana::{ApiResponse, DashboardApi};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Index pattern the log pipeline writes into.
pub const LOG_INDEX_PATTERN: &str = "friendbot-logs-*";
/// Time field of the indexed log records.
pub const LOG_TIME_FIELD: &str = "@timestamp";
/// Stable object id of the error saved search; makes reruns conflict
/// instead of piling up duplicates.
pub const ERROR_SEARCH_ID: &str = "friendbot-errors";
/// Display title of the error saved search.
pub const ERROR_SEARCH_TITLE: &str = "FriendBot errors";
/// Query of the error saved search.
pub const ERROR_SEARCH_QUERY: &str = "level:error";

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Outcome of applying one provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    /// The resource was already present; a success path
    AlreadyExists,
    Failed(String),
}

impl ProvisionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyExists => "already exists",
            Self::Failed(_) => "failed",
        }
    }
}

/// One named step's result within a provisioning sequence.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: String,
    pub outcome: ProvisionOutcome,
}

/// Distinguishes "already exists" from a genuine failure in a creation
/// response. Matching is typed (status code plus decoded error message),
/// kept out of the call sites so it can be tested without a network.
#[derive(Debug, Clone)]
pub struct ExistenceMatcher {
    conflict_statuses: Vec<u16>,
    duplicate_markers: Vec<String>,
}

impl ExistenceMatcher {
    pub fn new(conflict_statuses: Vec<u16>, duplicate_markers: Vec<&str>) -> Self {
        Self {
            conflict_statuses,
            duplicate_markers: duplicate_markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Matcher for Kibana-style duplicates: HTTP 409, or a 400 whose error
    /// message carries a duplicate marker.
    pub fn kibana_duplicate() -> Self {
        Self::new(vec![409], vec!["Duplicate data view", "already exists"])
    }

    pub fn matches(&self, response: &ApiResponse) -> bool {
        if self.conflict_statuses.contains(&response.status) {
            return true;
        }
        let message = response
            .body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("");
        self.duplicate_markers
            .iter()
            .any(|marker| message.contains(marker.as_str()))
    }
}

/// Applies provisioning steps with bounded retries.
pub struct Provisioner {
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for Provisioner {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl Provisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one creation call: success, tolerated conflict, or bounded
    /// retries ending in a failed step.
    pub async fn apply<F, Fut>(
        &self,
        step: &str,
        matcher: &ExistenceMatcher,
        mut call: F,
    ) -> ProvisionOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse, DeployError>>,
    {
        let mut last_reason = String::new();

        for attempt in 1..=self.attempts {
            match call().await {
                Ok(response) if response.is_success() => {
                    info!("[PROVISION] {}: created", step);
                    return ProvisionOutcome::Created;
                }
                Ok(response) if matcher.matches(&response) => {
                    info!("[PROVISION] {}: already exists", step);
                    return ProvisionOutcome::AlreadyExists;
                }
                Ok(response) => {
                    last_reason = format!("HTTP {}: {}", response.status, response.body);
                }
                Err(e) => {
                    last_reason = e.to_string();
                }
            }

            if attempt < self.attempts {
                warn!(
                    "[PROVISION] {} attempt {}/{} failed: {}",
                    step, attempt, self.attempts, last_reason
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!("[PROVISION] {} failed: {}", step, last_reason);
        ProvisionOutcome::Failed(last_reason)
    }

    /// The full dashboard provisioning sequence.
    ///
    /// Steps needing the data view id re-query it rather than trusting the
    /// creation response, since the already-exists path returns no id. An
    /// unresolved id fails those steps individually; it aborts nothing.
    pub async fn provision_dashboard(&self, api: &dyn DashboardApi) -> Vec<StepOutcome> {
        let matcher = ExistenceMatcher::kibana_duplicate();
        let mut outcomes = Vec::new();

        let data_view = self
            .apply("data view", &matcher, || {
                api.create_data_view(LOG_INDEX_PATTERN, LOG_TIME_FIELD)
            })
            .await;
        outcomes.push(StepOutcome {
            step: "data view".to_string(),
            outcome: data_view,
        });

        let view_id = match api.find_data_view_id(LOG_INDEX_PATTERN).await {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                warn!("[PROVISION] data view id not found after create");
                None
            }
            Err(e) => {
                warn!("[PROVISION] data view lookup failed: {}", e);
                None
            }
        };

        let field_format = match &view_id {
            Some(id) => {
                self.apply("level field format", &matcher, || {
                    api.set_field_format(
                        id,
                        "level",
                        json!({
                            "id": "color",
                            "params": {
                                "fieldType": "string",
                                "colors": [
                                    { "regex": "error", "text": "#FFFFFF", "background": "#BD271E" },
                                    { "regex": "warn", "text": "#000000", "background": "#F5A700" },
                                    { "regex": "info", "text": "#000000", "background": "#6DCCB1" }
                                ]
                            }
                        }),
                    )
                })
                .await
            }
            None => ProvisionOutcome::Failed("data view id could not be resolved".to_string()),
        };
        outcomes.push(StepOutcome {
            step: "level field format".to_string(),
            outcome: field_format,
        });

        let saved_search = match &view_id {
            Some(id) => {
                self.apply("error saved search", &matcher, || {
                    api.create_saved_search(
                        ERROR_SEARCH_ID,
                        ERROR_SEARCH_TITLE,
                        ERROR_SEARCH_QUERY,
                        id,
                    )
                })
                .await
            }
            None => ProvisionOutcome::Failed("data view id could not be resolved".to_string()),
        };
        outcomes.push(StepOutcome {
            step: "error saved search".to_string(),
            outcome: saved_search,
        });

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse { status, body }
    }

    #[test]
    fn test_matcher_accepts_conflict_status() {
        let matcher = ExistenceMatcher::kibana_duplicate();
        assert!(matcher.matches(&response(409, Value::Null)));
    }

    #[test]
    fn test_matcher_accepts_duplicate_message() {
        let matcher = ExistenceMatcher::kibana_duplicate();
        let body = json!({
            "statusCode": 400,
            "message": "Duplicate data view: friendbot-logs-*"
        });
        assert!(matcher.matches(&response(400, body)));
    }

    #[test]
    fn test_matcher_rejects_unrelated_errors() {
        let matcher = ExistenceMatcher::kibana_duplicate();
        let body = json!({ "statusCode": 400, "message": "Invalid time field" });
        assert!(!matcher.matches(&response(400, body)));
        assert!(!matcher.matches(&response(500, Value::Null)));
    }

    #[tokio::test]
    async fn test_apply_returns_created_on_success() {
        let provisioner = Provisioner {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
        };
        let matcher = ExistenceMatcher::kibana_duplicate();

        let outcome = provisioner
            .apply("step", &matcher, || async {
                Ok(response(200, Value::Null))
            })
            .await;
        assert_eq!(outcome, ProvisionOutcome::Created);
    }

    #[tokio::test]
    async fn test_apply_conflict_is_not_an_error() {
        let provisioner = Provisioner {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
        };
        let matcher = ExistenceMatcher::kibana_duplicate();

        let outcome = provisioner
            .apply("step", &matcher, || async {
                Ok(response(409, Value::Null))
            })
            .await;
        assert_eq!(outcome, ProvisionOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_apply_exhausts_retries_then_fails() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = AtomicU32::new(0);
        let provisioner = Provisioner {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
        };
        let matcher = ExistenceMatcher::kibana_duplicate();

        let outcome = provisioner
            .apply("step", &matcher, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(response(500, Value::Null)) }
            })
            .await;
        assert!(outcome.is_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_apply_recovers_mid_retry() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = AtomicU32::new(0);
        let provisioner = Provisioner {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
        };
        let matcher = ExistenceMatcher::kibana_duplicate();

        let outcome = provisioner
            .apply("step", &matcher, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(response(503, Value::Null))
                    } else {
                        Ok(response(200, Value::Null))
                    }
                }
            })
            .await;
        assert_eq!(outcome, ProvisionOutcome::Created);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
