use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::checker::Checker;
use super::executor::execute_check;
use super::types::CheckResult;
use crate::clock::Clock;
use crate::database::models::{NewFailure, Service};
use crate::engine::registry::ServiceEntry;
use crate::failures::FailureRecorder;
use crate::notifier::{Dispatcher, Transition, TransitionEvent};

/// Health check scheduler - runs one independent loop per service
#[derive(Clone)]
pub struct MonitoringScheduler {
    checker: Arc<dyn Checker>,
    recorder: FailureRecorder,
    dispatcher: Arc<Dispatcher>,
    clock: Clock,
}

impl MonitoringScheduler {
    pub fn new(
        checker: Arc<dyn Checker>,
        recorder: FailureRecorder,
        dispatcher: Arc<Dispatcher>,
        clock: Clock,
    ) -> Self {
        Self { checker, recorder, dispatcher, clock }
    }

    /// Start the service's loop; a no-op while one is already running
    pub fn start(&self, entry: &Arc<ServiceEntry>) -> bool {
        let scheduler = self.clone();
        let loop_entry = entry.clone();
        entry.task.start(move |token| scheduler.run(loop_entry, token))
    }

    /// Stop the service's loop and wait for it to exit
    pub async fn stop(&self, entry: &ServiceEntry) {
        entry.task.stop().await;
    }

    async fn run(self, entry: Arc<ServiceEntry>, token: CancellationToken) {
        info!(service_id = entry.id(), "Starting health check loop");

        // First check runs right away
        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }

            let service = entry.snapshot().service;
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = execute_check(self.checker.as_ref(), &service, &self.clock) => result,
            };
            if token.is_cancelled() {
                break;
            }

            self.apply(&entry, &service, result).await;

            // Re-read so configuration changes apply from the next cycle
            delay = entry.interval();
        }

        info!(service_id = entry.id(), "Stopped health check loop");
    }

    /// Fold a result into the service, record a failure and notify on edges
    async fn apply(&self, entry: &ServiceEntry, service: &Service, result: CheckResult) {
        let (transition, snapshot) = entry.update(|state| {
            let was_online = state.health.online;
            state.health.apply_check(&result);
            let transition = match (was_online, state.health.online) {
                (true, false) => Some(Transition::Failing),
                (false, true) => Some(Transition::Recovered),
                _ => None,
            };
            (transition, state.clone())
        });

        debug!(
            service_id = service.id,
            status = %result.status,
            latency_us = snapshot.health.latency,
            "Check completed"
        );

        let failure = if result.is_up() {
            None
        } else {
            self.recorder.record_logged(NewFailure::from_check(service, &result)).await
        };

        match transition {
            Some(Transition::Failing) => {
                info!(service_id = service.id, "Service '{}' went offline", service.name);
                self.dispatcher.dispatch(TransitionEvent::failing(snapshot, failure)).await;
            }
            Some(Transition::Recovered) => {
                info!(service_id = service.id, "Service '{}' is back online", service.name);
                self.dispatcher.dispatch(TransitionEvent::recovered(snapshot)).await;
            }
            None => {}
        }
    }
}
