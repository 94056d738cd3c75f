//! The monitoring core: owns the registry and drives every run-loop.

pub mod registry;
pub mod tasks;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info, warn};

use crate::checkins::{CheckinWatchdog, hit_latency};
use crate::clock::Clock;
use crate::database::models::{
    Checkin, CheckinHit, Failure, NewCheckin, NewCheckinHit, NewService, NotifierConfig,
    ServiceSnapshot, ServiceUpdate,
};
use crate::database::{Store, StoreError};
use crate::error::{CoreError, CoreResult};
use crate::failures::FailureRecorder;
use crate::monitoring::{Checker, MonitoringScheduler};
use crate::notifier::{Dispatcher, Notifier, TransitionEvent};
use crate::validation::{validate_new_checkin, validate_new_service, validate_service};
use registry::{CheckinEntry, Registry, ServiceEntry};

const API_KEY_LENGTH: usize = 32;

/// Startup settings of a [`Core`]
#[derive(Debug, Clone)]
pub struct CoreOptions {
    pub name: String,
    pub timezone: FixedOffset,
    pub use_cdn: bool,
    /// How long a loop waits for notifiers before moving on
    pub notifier_timeout: Duration,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            name: "Vigil".into(),
            timezone: Utc.fix(),
            use_cdn: false,
            notifier_timeout: Duration::from_secs(5),
        }
    }
}

/// Process-wide monitoring state, built once at startup and shared by reference
pub struct Core {
    options: CoreOptions,
    started: DateTime<Utc>,
    clock: Clock,
    store: Arc<dyn Store>,
    registry: Registry,
    dispatcher: Arc<Dispatcher>,
    scheduler: MonitoringScheduler,
    watchdog: CheckinWatchdog,
    /// Serializes reloads against creations and deletions
    mutations: tokio::sync::Mutex<()>,
}

fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

impl Core {
    pub fn new(options: CoreOptions, store: Arc<dyn Store>, checker: Arc<dyn Checker>) -> Self {
        Self::with_clock(options, store, checker, Clock::new())
    }

    pub fn with_clock(
        options: CoreOptions,
        store: Arc<dyn Store>,
        checker: Arc<dyn Checker>,
        clock: Clock,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(options.notifier_timeout));
        let recorder = FailureRecorder::new(store.clone());
        let scheduler =
            MonitoringScheduler::new(checker, recorder.clone(), dispatcher.clone(), clock);
        let watchdog = CheckinWatchdog::new(store.clone(), recorder, dispatcher.clone(), clock);

        Self {
            options,
            started: clock.now(),
            clock,
            store,
            registry: Registry::new(),
            dispatcher,
            scheduler,
            watchdog,
            mutations: tokio::sync::Mutex::new(()),
        }
    }

    pub fn attach_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.dispatcher.attach(notifier);
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn timezone(&self) -> FixedOffset {
        self.options.timezone
    }

    pub fn use_cdn(&self) -> bool {
        self.options.use_cdn
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current time in the configured timezone, e.g. `Monday 02:00:00 PM`
    pub fn current_time(&self) -> String {
        self.now().with_timezone(&self.options.timezone).format("%A %I:%M:%S %p").to_string()
    }

    /// Populate the registry from the store and start every loop.
    ///
    /// Calling it again stops the loops of the previous registry and swaps
    /// the freshly loaded maps in as one step.
    pub async fn load(&self) -> CoreResult<()> {
        let _mutations = self.mutations.lock().await;

        // Hits on the current checkins wait out the reload and then resolve
        // against the fresh entries.
        let mut hit_gates = Vec::new();
        for entry in self.registry.checkins() {
            hit_gates.push(entry.hit_gate.clone().lock_owned().await);
        }

        let services = self.store.services().await?;
        let checkins = self.store.checkins().await?;
        let configs = self.store.notifier_configs().await?;

        let service_map: HashMap<i64, Arc<ServiceEntry>> = services
            .into_iter()
            .map(|service| (service.id, Arc::new(ServiceEntry::new(service))))
            .collect();

        let mut checkin_map = HashMap::new();
        let mut watched = Vec::new();
        for mut checkin in checkins {
            let Some(service) = service_map.get(&checkin.service_id) else {
                warn!(
                    checkin_id = checkin.id,
                    service_id = checkin.service_id,
                    "Skipping checkin of unknown service"
                );
                continue;
            };
            let last_hit = self.store.last_hit(checkin.id).await?;
            checkin.last_hit_time = last_hit.as_ref().map(|hit| hit.created_at);
            let entry = Arc::new(CheckinEntry::new(checkin));
            if last_hit.is_some() {
                watched.push((entry.clone(), service.clone()));
            }
            checkin_map.insert(entry.id(), entry);
        }

        self.dispatcher.apply_configs(&configs);

        for entry in self.registry.checkins() {
            entry.watchdog.close().await;
        }
        for entry in self.registry.services() {
            entry.task.close().await;
        }

        let fresh_services: Vec<Arc<ServiceEntry>> = service_map.values().cloned().collect();
        let checkin_count = checkin_map.len();
        self.registry.replace(service_map, checkin_map);

        for entry in &fresh_services {
            self.scheduler.start(entry);
        }
        for (checkin, service) in &watched {
            self.watchdog.start(checkin, service);
        }

        info!(
            services = fresh_services.len(),
            checkins = checkin_count,
            watchdogs = watched.len(),
            "Loaded monitoring state"
        );
        Ok(())
    }

    /// Stop every loop; the registry keeps its last state for readers
    pub async fn shutdown(&self) {
        let _mutations = self.mutations.lock().await;
        for entry in self.registry.checkins() {
            entry.watchdog.close().await;
        }
        for entry in self.registry.services() {
            entry.task.close().await;
        }
        info!("Monitoring stopped");
    }

    /// Services in display order
    pub fn services(&self) -> Vec<ServiceSnapshot> {
        self.registry.service_order()
    }

    pub fn service(&self, id: i64) -> CoreResult<ServiceSnapshot> {
        Ok(self.service_entry(id)?.snapshot())
    }

    fn service_entry(&self, id: i64) -> CoreResult<Arc<ServiceEntry>> {
        self.registry.service(id).ok_or_else(|| CoreError::not_found("service", id))
    }

    pub async fn create_service(&self, new_service: NewService) -> CoreResult<ServiceSnapshot> {
        validate_new_service(&new_service)?;
        let _mutations = self.mutations.lock().await;

        let service = self.store.insert_service(&new_service).await?;
        info!(service_id = service.id, "Created service '{}'", service.name);

        let entry = Arc::new(ServiceEntry::new(service));
        self.registry.insert_service(entry.clone());
        self.scheduler.start(&entry);
        Ok(entry.snapshot())
    }

    /// Change a service's configuration; its loop picks it up on the next cycle
    pub async fn update_service(&self, id: i64, update: ServiceUpdate) -> CoreResult<ServiceSnapshot> {
        let _mutations = self.mutations.lock().await;
        let entry = self.service_entry(id)?;

        let mut service = entry.snapshot().service;
        update.apply(&mut service);
        service.updated_at = self.now();
        validate_service(&service)?;

        match self.store.update_service(&service).await {
            Err(StoreError::NotFound) => return Err(CoreError::not_found("service", id)),
            result => result?,
        }
        debug!(service_id = id, "Updated service");
        Ok(entry.update(|state| {
            state.service = service;
            state.clone()
        }))
    }

    /// Delete a service, its checkins and their history.
    ///
    /// Loops stop before the rows go, and come back if the store refuses.
    pub async fn delete_service(&self, id: i64) -> CoreResult<()> {
        let _mutations = self.mutations.lock().await;
        let entry = self.service_entry(id)?;
        let checkins = self.registry.checkins_for_service(id);

        let mut hit_gates = Vec::with_capacity(checkins.len());
        for checkin in &checkins {
            hit_gates.push(checkin.hit_gate.clone().lock_owned().await);
        }

        let scheduled = entry.task.is_running();
        entry.task.close().await;
        let mut watched = Vec::with_capacity(checkins.len());
        for checkin in &checkins {
            watched.push(checkin.watchdog.is_running());
            checkin.watchdog.close().await;
        }

        if let Err(err) = self.store.delete_service(id).await {
            entry.task.reopen();
            if scheduled {
                self.scheduler.start(&entry);
            }
            for (checkin, was_watched) in checkins.iter().zip(watched) {
                checkin.watchdog.reopen();
                if was_watched {
                    self.watchdog.start(checkin, &entry);
                }
            }
            return Err(err.into());
        }

        for checkin in &checkins {
            self.registry.remove_checkin(checkin.id());
        }
        self.registry.remove_service(id);

        info!(service_id = id, "Deleted service");
        Ok(())
    }

    pub async fn service_failures(&self, id: i64, limit: usize) -> CoreResult<Vec<Failure>> {
        self.service_entry(id)?;
        Ok(self.store.service_failures(id, limit).await?)
    }

    pub fn checkins(&self) -> Vec<Checkin> {
        self.registry.checkins().iter().map(|entry| entry.snapshot()).collect()
    }

    pub fn checkin(&self, api_key: &str) -> CoreResult<Checkin> {
        Ok(self.checkin_entry(api_key)?.snapshot())
    }

    fn checkin_entry(&self, api_key: &str) -> CoreResult<Arc<CheckinEntry>> {
        if api_key.trim().is_empty() {
            return Err(CoreError::Validation("Checkin api key is required".to_string()));
        }
        self.registry
            .checkin_by_api(api_key)
            .ok_or_else(|| CoreError::not_found("checkin", api_key))
    }

    /// Create a checkin under an existing service.
    ///
    /// Its watchdog starts with the first hit.
    pub async fn create_checkin(&self, new_checkin: NewCheckin) -> CoreResult<Checkin> {
        validate_new_checkin(&new_checkin)?;
        let _mutations = self.mutations.lock().await;
        self.service_entry(new_checkin.service_id)?;

        let checkin = self.store.insert_checkin(&new_checkin, &generate_api_key()).await?;
        info!(
            checkin_id = checkin.id,
            service_id = checkin.service_id,
            "Created checkin '{}'",
            checkin.name
        );

        let entry = Arc::new(CheckinEntry::new(checkin));
        self.registry.insert_checkin(entry.clone());
        Ok(entry.snapshot())
    }

    /// Record a heartbeat from `source` on the checkin with `api_key`
    pub async fn record_hit(
        &self,
        api_key: &str,
        source: impl Into<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<CheckinHit> {
        // A delete or reload may swap the entry out while we wait on its gate
        let (checkin, service, _gate) = loop {
            let checkin = self.checkin_entry(api_key)?;
            let gate = checkin.hit_gate.clone().lock_owned().await;
            if !self.registry.is_current_checkin(&checkin) {
                continue;
            }
            let service = self.service_entry(checkin.service_id())?;
            break (checkin, service, gate);
        };

        let previous = self.store.last_hit(checkin.id()).await?;
        let hit = self
            .store
            .insert_hit(&NewCheckinHit { checkin_id: checkin.id(), from: source.into(), created_at: at })
            .await?;

        if previous.is_none() {
            self.watchdog.start(&checkin, &service);
        }

        let was_failing = checkin.update(|c| {
            c.last_hit_time = Some(hit.created_at);
            std::mem::replace(&mut c.failing, false)
        });
        let latency = hit_latency(previous.map(|h| h.created_at), hit.created_at, checkin.period());
        let (was_online, snapshot) = service.update(|state| {
            let was_online = state.health.online;
            state.health.apply_hit(latency, hit.created_at);
            (was_online, state.clone())
        });
        debug!(checkin_id = checkin.id(), hit_id = hit.id, latency_us = latency, "Recorded checkin hit");

        if was_failing || !was_online {
            info!(checkin_id = checkin.id(), service_id = service.id(), "Checkin recovered");
            let event = TransitionEvent::recovered(snapshot).with_checkin(checkin.snapshot());
            self.dispatcher.dispatch(event).await;
        }
        Ok(hit)
    }

    /// Delete a checkin and its hits, stopping its watchdog
    pub async fn delete_checkin(&self, api_key: &str) -> CoreResult<Checkin> {
        let _mutations = self.mutations.lock().await;
        let entry = self.checkin_entry(api_key)?;
        let _gate = entry.hit_gate.lock().await;

        let watched = entry.watchdog.is_running();
        entry.watchdog.close().await;

        if let Err(err) = self.store.delete_checkin(entry.id()).await {
            entry.watchdog.reopen();
            if watched {
                if let Some(service) = self.registry.service(entry.service_id()) {
                    self.watchdog.start(&entry, &service);
                }
            }
            return Err(err.into());
        }
        self.registry.remove_checkin(entry.id());

        info!(checkin_id = entry.id(), "Deleted checkin");
        Ok(entry.snapshot())
    }

    pub async fn checkin_hits(&self, api_key: &str, limit: usize) -> CoreResult<Vec<CheckinHit>> {
        let entry = self.checkin_entry(api_key)?;
        Ok(self.store.hits(entry.id(), limit).await?)
    }

    pub async fn checkin_failures(&self, api_key: &str, limit: usize) -> CoreResult<Vec<Failure>> {
        let entry = self.checkin_entry(api_key)?;
        Ok(self.store.checkin_failures(entry.id(), limit).await?)
    }

    /// Attached notifier methods and whether each is enabled
    pub fn notifiers(&self) -> Vec<(String, bool)> {
        self.dispatcher.methods()
    }

    /// Persist a notifier's settings and apply them right away
    pub async fn save_notifier(&self, config: NotifierConfig) -> CoreResult<()> {
        self.store.save_notifier_config(&config).await?;
        self.dispatcher.apply_configs(std::slice::from_ref(&config));
        Ok(())
    }
}
