//! Health transition notifications.
//!
//! A [`Notifier`] is told about every edge a service crosses: `on_failure`
//! when it goes from healthy to failing, `on_success` when it recovers.
//! Consecutive results in the same state never reach a notifier.

pub mod dispatcher;
pub mod log;

pub use dispatcher::Dispatcher;
pub use log::LogNotifier;

use serde::Serialize;

use crate::database::models::{Checkin, Failure, ServiceSnapshot};

/// Direction of a health transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Failing,
    Recovered,
}

/// Everything a notifier gets to see about one transition
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub kind: Transition,
    pub service: ServiceSnapshot,
    /// Present when a checkin caused the transition
    pub checkin: Option<Checkin>,
    /// The failure that tipped a healthy service over, if it was recorded
    pub failure: Option<Failure>,
}

impl TransitionEvent {
    pub fn failing(service: ServiceSnapshot, failure: Option<Failure>) -> Self {
        Self { kind: Transition::Failing, service, checkin: None, failure }
    }

    pub fn recovered(service: ServiceSnapshot) -> Self {
        Self { kind: Transition::Recovered, service, checkin: None, failure: None }
    }

    pub fn with_checkin(mut self, checkin: Checkin) -> Self {
        self.checkin = Some(checkin);
        self
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Stable method name, matched against stored notifier settings
    fn method(&self) -> &str;

    async fn on_failure(&self, event: &TransitionEvent) -> anyhow::Result<()>;

    async fn on_success(&self, event: &TransitionEvent) -> anyhow::Result<()>;
}
