use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::{Notifier, Transition, TransitionEvent};
use crate::database::models::NotifierConfig;

struct Attached {
    notifier: Arc<dyn Notifier>,
    enabled: AtomicBool,
}

/// Fans transition events out to every enabled notifier
///
/// Each notifier runs in its own task, so an error or a panic in one of them
/// never reaches the others or the caller. The caller waits at most
/// `allowance`; slower notifiers finish in the background.
pub struct Dispatcher {
    notifiers: RwLock<Vec<Arc<Attached>>>,
    allowance: Duration,
}

impl Dispatcher {
    pub fn new(allowance: Duration) -> Self {
        Self { notifiers: RwLock::new(Vec::new()), allowance }
    }

    /// Attach a notifier; it starts out enabled
    pub fn attach(&self, notifier: Arc<dyn Notifier>) {
        debug!(method = notifier.method(), "Attaching notifier");
        self.notifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(Attached { notifier, enabled: AtomicBool::new(true) }));
    }

    /// Enable or disable attached notifiers from stored settings.
    /// Methods without a stored setting keep their current state.
    pub fn apply_configs(&self, configs: &[NotifierConfig]) {
        let notifiers = self.notifiers.read().unwrap_or_else(PoisonError::into_inner);
        for attached in notifiers.iter() {
            if let Some(config) = configs.iter().find(|c| c.method == attached.notifier.method()) {
                attached.enabled.store(config.enabled, Ordering::SeqCst);
            }
        }
    }

    /// Attached methods and whether each is enabled
    pub fn methods(&self) -> Vec<(String, bool)> {
        self.notifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|a| (a.notifier.method().to_string(), a.enabled.load(Ordering::SeqCst)))
            .collect()
    }

    pub async fn dispatch(&self, event: TransitionEvent) {
        let targets: Vec<Arc<Attached>> = self
            .notifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.enabled.load(Ordering::SeqCst))
            .cloned()
            .collect();
        if targets.is_empty() {
            return;
        }

        debug!(
            service_id = event.service.service.id,
            kind = ?event.kind,
            notifiers = targets.len(),
            "Dispatching transition"
        );

        let event = Arc::new(event);
        let mut methods = Vec::with_capacity(targets.len());
        let mut calls = Vec::with_capacity(targets.len());
        for attached in targets {
            let event = event.clone();
            methods.push(attached.notifier.method().to_string());
            calls.push(tokio::spawn(async move {
                let notifier = &attached.notifier;
                let outcome = match event.kind {
                    Transition::Failing => notifier.on_failure(&event).await,
                    Transition::Recovered => notifier.on_success(&event).await,
                };
                if let Err(e) = outcome {
                    warn!(
                        method = notifier.method(),
                        service_id = event.service.service.id,
                        "Notifier failed: {e:#}"
                    );
                }
            }));
        }

        match timeout(self.allowance, futures::future::join_all(calls)).await {
            Ok(results) => {
                for (method, result) in methods.iter().zip(results) {
                    if let Err(e) = result {
                        error!(method = %method, "Notifier panicked: {}", e);
                    }
                }
            }
            Err(_) => warn!(
                allowance_ms = self.allowance.as_millis() as u64,
                "Notifiers still running after the dispatch allowance, leaving them in the background"
            ),
        }
    }
}
