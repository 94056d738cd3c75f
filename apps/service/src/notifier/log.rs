use tracing::{info, warn};

use super::{Notifier, TransitionEvent};

/// Writes transitions to the application log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn method(&self) -> &str {
        "log"
    }

    async fn on_failure(&self, event: &TransitionEvent) -> anyhow::Result<()> {
        let service = &event.service.service;
        let issue = event.failure.as_ref().map(|f| f.issue.as_str()).unwrap_or("unknown issue");
        warn!(
            service_id = service.id,
            checkin = event.checkin.as_ref().map(|c| c.name.as_str()),
            "Service '{}' is failing: {}",
            service.name,
            issue
        );
        Ok(())
    }

    async fn on_success(&self, event: &TransitionEvent) -> anyhow::Result<()> {
        let service = &event.service.service;
        info!(
            service_id = service.id,
            latency_us = event.service.health.latency,
            "Service '{}' is back online",
            service.name
        );
        Ok(())
    }
}
