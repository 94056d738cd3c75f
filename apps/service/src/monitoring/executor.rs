use anyhow::Result;
use tokio::time::{Instant, timeout};

use super::checker::{CheckOutcome, CheckType, Checker, HttpChecker, TcpChecker, UnexpectedStatus};
use super::types::CheckResult;
use crate::clock::Clock;
use crate::database::models::Service;

/// Monitoring executor - routes a service to the checker for its check type
pub struct MonitoringExecutor {
    http_checker: HttpChecker,
    tcp_checker: TcpChecker,
}

impl MonitoringExecutor {
    pub fn new(user_agent: &str) -> Result<Self> {
        Ok(Self { http_checker: HttpChecker::new(user_agent)?, tcp_checker: TcpChecker })
    }
}

#[async_trait::async_trait]
impl Checker for MonitoringExecutor {
    async fn check(&self, service: &Service) -> Result<CheckOutcome> {
        let checker: &dyn Checker = match service.check_type {
            CheckType::Http => &self.http_checker,
            CheckType::Tcp => &self.tcp_checker,
        };
        checker.check(service).await
    }
}

/// Run one check for `service`, bounded by the service's timeout
///
/// Never fails: errors and timeouts come back as a `Down` result.
pub async fn execute_check(checker: &dyn Checker, service: &Service, clock: &Clock) -> CheckResult {
    let result = CheckResult::new(service.id, clock.now());
    let started = Instant::now();

    match timeout(service.timeout(), checker.check(service)).await {
        Ok(Ok(outcome)) => result.success(outcome.latency, outcome.status_code, outcome.body),
        Ok(Err(e)) => {
            let status_code = e.downcast_ref::<UnexpectedStatus>().map(|s| s.status);
            result.failure(started.elapsed(), format!("{e:#}"), status_code)
        }
        Err(_) => result.failure(
            service.timeout(),
            format!("Check timed out after {} seconds", service.timeout_seconds),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::MonitorStatus;
    use crate::testing::{StubChecker, service_fixture};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_slow_check_is_a_timeout_failure() {
        let checker = StubChecker::passing().with_delay(Duration::from_secs(60));
        let mut service = service_fixture(1);
        service.timeout_seconds = 5;

        let result = execute_check(&checker, &service, &Clock::new()).await;

        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.latency, Duration::from_secs(5));
        assert!(result.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_is_kept_as_error_code() {
        let checker = StubChecker::failing_with_status(503);
        let service = service_fixture(1);

        let result = execute_check(&checker, &service, &Clock::new()).await;

        assert!(!result.is_up());
        assert_eq!(result.status_code, Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_passing_check_keeps_body() {
        let checker = StubChecker::passing();
        let service = service_fixture(1);

        let result = execute_check(&checker, &service, &Clock::new()).await;

        assert!(result.is_up());
        assert_eq!(result.body, "ok");
        assert_eq!(result.status_code, Some(200));
    }
}
