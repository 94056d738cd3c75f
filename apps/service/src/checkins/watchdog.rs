use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::database::Store;
use crate::database::models::NewFailure;
use crate::engine::registry::{CheckinEntry, ServiceEntry};
use crate::failures::FailureRecorder;
use crate::notifier::{Dispatcher, TransitionEvent};

/// Enforces the reporting deadline of every active checkin
///
/// Each checkin gets its own loop. A checkin is late once the time since its
/// last hit (or since the loop started, before the first hit) reaches its
/// period plus the owning service's timeout.
#[derive(Clone)]
pub struct CheckinWatchdog {
    store: Arc<dyn Store>,
    recorder: FailureRecorder,
    dispatcher: Arc<Dispatcher>,
    clock: Clock,
}

impl CheckinWatchdog {
    pub fn new(
        store: Arc<dyn Store>,
        recorder: FailureRecorder,
        dispatcher: Arc<Dispatcher>,
        clock: Clock,
    ) -> Self {
        Self { store, recorder, dispatcher, clock }
    }

    /// Start watching `checkin`; a no-op while its watchdog is already running
    pub fn start(&self, checkin: &Arc<CheckinEntry>, service: &Arc<ServiceEntry>) -> bool {
        let watchdog = self.clone();
        let checkin_entry = checkin.clone();
        let service_entry = service.clone();
        checkin
            .watchdog
            .start(move |token| watchdog.run(checkin_entry, service_entry, token))
    }

    /// Stop watching `checkin` and wait for its loop to exit
    pub async fn stop(&self, checkin: &CheckinEntry) {
        checkin.watchdog.stop().await;
    }

    async fn run(self, checkin: Arc<CheckinEntry>, service: Arc<ServiceEntry>, token: CancellationToken) {
        let started = self.clock.now();
        info!(checkin_id = checkin.id(), "Starting checkin watchdog");

        let mut delay = checkin.period();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }

            // Both may have changed since the last wake
            let window = checkin.period() + service.timeout();

            let last_hit = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                last_hit = self.store.last_hit(checkin.id()) => last_hit,
            };
            let reference = match last_hit {
                Ok(Some(hit)) => hit.created_at,
                Ok(None) => started,
                Err(e) => {
                    warn!(checkin_id = checkin.id(), "Could not load last hit: {}", e);
                    delay = window;
                    continue;
                }
            };

            let now = self.clock.now();
            let elapsed = (now - reference).to_std().unwrap_or(Duration::ZERO);
            debug!(
                checkin_id = checkin.id(),
                elapsed_ms = elapsed.as_millis() as u64,
                window_ms = window.as_millis() as u64,
                "Checked last hit"
            );

            if elapsed < window {
                delay = window - elapsed;
                continue;
            }
            if token.is_cancelled() {
                break;
            }

            self.raise(&checkin, &service, elapsed, now).await;
            delay = window;
        }

        checkin.update(|c| c.failing = false);
        info!(checkin_id = checkin.id(), "Stopped checkin watchdog");
    }

    async fn raise(&self, checkin: &CheckinEntry, service: &ServiceEntry, elapsed: Duration, now: DateTime<Utc>) {
        let snapshot = checkin.snapshot();
        let failure = NewFailure::from_checkin(&snapshot, elapsed, now);
        warn!(checkin_id = snapshot.id, service_id = snapshot.service_id, "{}", failure.issue);

        let failure = self.recorder.record_logged(failure).await;
        let was_failing = checkin.update(|c| std::mem::replace(&mut c.failing, true));
        if !was_failing {
            let event = TransitionEvent::failing(service.snapshot(), failure).with_checkin(checkin.snapshot());
            self.dispatcher.dispatch(event).await;
        }
    }
}
