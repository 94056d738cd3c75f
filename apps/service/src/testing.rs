//! Fixtures and doubles shared by the unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;

use crate::database::models::{
    Checkin, CheckinHit, Failure, NewCheckin, NewCheckinHit, NewFailure, NewService,
    NotifierConfig, Service,
};
use crate::database::{MemoryStore, Store, StoreError, StoreResult};
use crate::monitoring::checker::{CheckOutcome, CheckType, Checker, UnexpectedStatus};
use crate::notifier::{Notifier, TransitionEvent};

pub fn service_fixture(id: i64) -> Service {
    let now = Utc::now();
    Service {
        id,
        name: format!("service-{id}"),
        check_type: CheckType::Http,
        target: "https://example.com".into(),
        interval_seconds: 60,
        timeout_seconds: 30,
        expected_status: None,
        order: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn checkin_fixture(id: i64, service_id: i64) -> Checkin {
    let now = Utc::now();
    Checkin {
        id,
        service_id,
        name: format!("checkin-{id}"),
        api_key: format!("key-{id}"),
        interval_seconds: 300,
        failing: false,
        last_hit_time: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Clone, Copy)]
enum Verdict {
    Pass,
    Fail(Option<u16>),
}

/// Checker answering from a script; the last verdict repeats once it runs out
pub struct StubChecker {
    script: Mutex<VecDeque<Verdict>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubChecker {
    fn with_script(script: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn passing() -> Self {
        Self::with_script([Verdict::Pass])
    }

    pub fn failing() -> Self {
        Self::with_script([Verdict::Fail(None)])
    }

    pub fn failing_with_status(status: u16) -> Self {
        Self::with_script([Verdict::Fail(Some(status))])
    }

    /// `true` passes, `false` fails, one entry per check
    pub fn script(passes: impl IntoIterator<Item = bool>) -> Self {
        Self::with_script(
            passes.into_iter().map(|up| if up { Verdict::Pass } else { Verdict::Fail(None) }),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Counter of checks started so far
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn next_verdict(&self) -> Verdict {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        if script.len() > 1 {
            script.pop_front().unwrap_or(Verdict::Pass)
        } else {
            script.front().copied().unwrap_or(Verdict::Pass)
        }
    }
}

#[async_trait]
impl Checker for StubChecker {
    async fn check(&self, _service: &Service) -> Result<CheckOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let verdict = self.next_verdict();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match verdict {
            Verdict::Pass => Ok(CheckOutcome {
                latency: Duration::from_millis(5),
                status_code: Some(200),
                body: "ok".into(),
            }),
            Verdict::Fail(Some(status)) => Err(UnexpectedStatus { status }.into()),
            Verdict::Fail(None) => Err(anyhow!("connection refused")),
        }
    }
}

/// Notifier that counts the calls it receives
pub struct RecordingNotifier {
    method: String,
    failures: AtomicUsize,
    successes: AtomicUsize,
    erroring: bool,
    panicking: bool,
    delay: Duration,
}

impl RecordingNotifier {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            failures: AtomicUsize::new(0),
            successes: AtomicUsize::new(0),
            erroring: false,
            panicking: false,
            delay: Duration::ZERO,
        }
    }

    pub fn erroring(mut self) -> Self {
        self.erroring = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panicking = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    async fn record(&self, counter: &AtomicUsize) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panicking {
            panic!("notifier {} blew up", self.method);
        }
        counter.fetch_add(1, Ordering::SeqCst);
        if self.erroring {
            return Err(anyhow!("notifier {} is misconfigured", self.method));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn method(&self) -> &str {
        &self.method
    }

    async fn on_failure(&self, _event: &TransitionEvent) -> Result<()> {
        self.record(&self.failures).await
    }

    async fn on_success(&self, _event: &TransitionEvent) -> Result<()> {
        self.record(&self.successes).await
    }
}

/// Memory store that can be switched into an outage
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    last_hit_delay: Mutex<Option<Duration>>,
    delete_delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Make the next `last_hit` read wait before touching the data
    pub fn delay_next_last_hit(&self, delay: Duration) {
        *self.last_hit_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Make deletes linger after the rows are gone
    pub fn delay_deletes(&self, delay: Duration) {
        *self.delete_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    async fn linger_after_delete(&self) {
        let delay = *self.delete_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store switched off".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn services(&self) -> StoreResult<Vec<Service>> {
        self.available()?;
        self.inner.services().await
    }

    async fn service(&self, id: i64) -> StoreResult<Option<Service>> {
        self.available()?;
        self.inner.service(id).await
    }

    async fn insert_service(&self, service: &NewService) -> StoreResult<Service> {
        self.available()?;
        self.inner.insert_service(service).await
    }

    async fn update_service(&self, service: &Service) -> StoreResult<()> {
        self.available()?;
        self.inner.update_service(service).await
    }

    async fn delete_service(&self, id: i64) -> StoreResult<()> {
        self.available()?;
        self.inner.delete_service(id).await?;
        self.linger_after_delete().await;
        Ok(())
    }

    async fn checkins(&self) -> StoreResult<Vec<Checkin>> {
        self.available()?;
        self.inner.checkins().await
    }

    async fn insert_checkin(&self, checkin: &NewCheckin, api_key: &str) -> StoreResult<Checkin> {
        self.available()?;
        self.inner.insert_checkin(checkin, api_key).await
    }

    async fn delete_checkin(&self, id: i64) -> StoreResult<()> {
        self.available()?;
        self.inner.delete_checkin(id).await?;
        self.linger_after_delete().await;
        Ok(())
    }

    async fn insert_hit(&self, hit: &NewCheckinHit) -> StoreResult<CheckinHit> {
        self.available()?;
        self.inner.insert_hit(hit).await
    }

    async fn last_hit(&self, checkin_id: i64) -> StoreResult<Option<CheckinHit>> {
        self.available()?;
        let delay = self.last_hit_delay.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.last_hit(checkin_id).await
    }

    async fn hits(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<CheckinHit>> {
        self.available()?;
        self.inner.hits(checkin_id, limit).await
    }

    async fn insert_failure(&self, failure: &NewFailure) -> StoreResult<Failure> {
        self.available()?;
        self.inner.insert_failure(failure).await
    }

    async fn service_failures(&self, service_id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        self.available()?;
        self.inner.service_failures(service_id, limit).await
    }

    async fn checkin_failures(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        self.available()?;
        self.inner.checkin_failures(checkin_id, limit).await
    }

    async fn notifier_configs(&self) -> StoreResult<Vec<NotifierConfig>> {
        self.available()?;
        self.inner.notifier_configs().await
    }

    async fn save_notifier_config(&self, config: &NotifierConfig) -> StoreResult<()> {
        self.available()?;
        self.inner.save_notifier_config(config).await
    }
}
