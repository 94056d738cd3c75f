use std::sync::Arc;

use tracing::{debug, error};

use crate::database::models::{Failure, NewFailure};
use crate::database::{Store, StoreResult};

/// Append-only sink for detected failures
#[derive(Clone)]
pub struct FailureRecorder {
    store: Arc<dyn Store>,
}

impl FailureRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, failure: NewFailure) -> StoreResult<Failure> {
        let recorded = self.store.insert_failure(&failure).await?;
        debug!(
            failure_id = recorded.id,
            method = %recorded.method,
            service_id = recorded.service_id,
            checkin_id = recorded.checkin_id,
            "Recorded failure"
        );
        Ok(recorded)
    }

    /// Variant for monitoring loops: a store error is logged and swallowed
    pub async fn record_logged(&self, failure: NewFailure) -> Option<Failure> {
        let method = failure.method.clone();
        let service_id = failure.service_id;
        match self.record(failure).await {
            Ok(recorded) => Some(recorded),
            Err(e) => {
                error!(method = %method, service_id, "Failed to record failure: {}", e);
                None
            }
        }
    }
}
