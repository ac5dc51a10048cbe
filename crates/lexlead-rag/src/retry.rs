use std::future::Future;
use std::time::Duration;

use crate::config::WorkflowLimits;
use crate::error::{AdvisorError, Result};

/// Deadline and retry budget for one capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub backoff: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_limits(limits: &WorkflowLimits) -> Self {
        Self {
            timeout: limits.node_timeout(),
            backoff: limits.retry_backoff(),
            max_attempts: 2,
        }
    }
}

/// Run `call` under the policy's deadline. Retryable failures (schema
/// mismatch, timeout) are retried with linear backoff until attempts run out;
/// anything else is returned immediately.
pub async fn call_with_retry<T, F, Fut>(label: &str, policy: RetryPolicy, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(AdvisorError::CapabilityTimeout {
                node: label.to_string(),
                timeout_ms: policy.timeout.as_millis() as u64,
            }),
        };

        match result {
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(node = label, attempt, error = %err, "Retrying after transient failure");
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
            max_attempts: 2,
        }
    }

    #[tokio::test]
    async fn test_schema_error_retried_once() {
        let calls = &AtomicU32::new(0);
        let result = call_with_retry("grade_documents", policy(), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AdvisorError::schema("grade_document", "bad", "x"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_schema_error_propagates() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = call_with_retry("route", policy(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AdvisorError::schema("route_question", "bad", "x"))
        })
        .await;
        assert!(matches!(result, Err(AdvisorError::SchemaValidation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_becomes_capability_timeout() {
        let result: Result<()> = call_with_retry("generate", policy(), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        match result {
            Err(AdvisorError::CapabilityTimeout { node, timeout_ms }) => {
                assert_eq!(node, "generate");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retrieval_failure_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = call_with_retry("retrieve", policy(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AdvisorError::retrieval("corpus", "index missing"))
        })
        .await;
        assert!(matches!(result, Err(AdvisorError::RetrievalUnavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
