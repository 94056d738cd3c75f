use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use super::tasks::LoopSlot;
use crate::database::models::{Checkin, Service, ServiceHealth, ServiceSnapshot};

/// Live state of one service plus the slot of its health check loop
pub struct ServiceEntry {
    id: i64,
    state: Mutex<ServiceSnapshot>,
    retired: AtomicBool,
    pub(crate) task: LoopSlot,
}

impl ServiceEntry {
    pub fn new(service: Service) -> Self {
        Self {
            id: service.id,
            state: Mutex::new(ServiceSnapshot { service, health: ServiceHealth::default() }),
            retired: AtomicBool::new(false),
            task: LoopSlot::default(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot, or `None` once the entry has left the registry
    pub fn live_snapshot(&self) -> Option<ServiceSnapshot> {
        (!self.is_retired()).then(|| self.snapshot())
    }

    /// Mutate the service under its lock
    pub fn update<R>(&self, f: impl FnOnce(&mut ServiceSnapshot) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *state)
    }

    pub fn interval(&self) -> Duration {
        self.update(|s| s.service.interval())
    }

    pub fn timeout(&self) -> Duration {
        self.update(|s| s.service.timeout())
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(AtomicOrdering::SeqCst)
    }
}

/// Live state of one checkin plus the slot of its watchdog
pub struct CheckinEntry {
    id: i64,
    service_id: i64,
    api_key: String,
    state: Mutex<Checkin>,
    /// Serializes hits against each other and against deletes and reloads
    pub(crate) hit_gate: Arc<tokio::sync::Mutex<()>>,
    pub(crate) watchdog: LoopSlot,
}

impl CheckinEntry {
    pub fn new(checkin: Checkin) -> Self {
        Self {
            id: checkin.id,
            service_id: checkin.service_id,
            api_key: checkin.api_key.clone(),
            state: Mutex::new(checkin),
            hit_gate: Arc::new(tokio::sync::Mutex::new(())),
            watchdog: LoopSlot::default(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn service_id(&self) -> i64 {
        self.service_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn snapshot(&self) -> Checkin {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Mutate the checkin under its lock
    pub fn update<R>(&self, f: impl FnOnce(&mut Checkin) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *state)
    }

    pub fn period(&self) -> Duration {
        self.update(|c| c.period())
    }
}

/// Orders two possibly absent services by order index, then id.
/// Absent entries sort after every present one.
pub fn compare_order(a: Option<&ServiceSnapshot>, b: Option<&ServiceSnapshot>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            a.service.order.cmp(&b.service.order).then(a.service.id.cmp(&b.service.id))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

type ServiceMap = HashMap<i64, Arc<ServiceEntry>>;
type CheckinMap = HashMap<i64, Arc<CheckinEntry>>;

/// In-memory index of every known service and checkin
#[derive(Default)]
pub struct Registry {
    services: RwLock<ServiceMap>,
    checkins: RwLock<CheckinMap>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(&self, id: i64) -> Option<Arc<ServiceEntry>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    pub fn services(&self) -> Vec<Arc<ServiceEntry>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    pub fn insert_service(&self, entry: Arc<ServiceEntry>) {
        self.services.write().unwrap_or_else(PoisonError::into_inner).insert(entry.id(), entry);
    }

    pub fn remove_service(&self, id: i64) -> Option<Arc<ServiceEntry>> {
        let removed = self.services.write().unwrap_or_else(PoisonError::into_inner).remove(&id);
        if let Some(entry) = &removed {
            entry.retire();
        }
        removed
    }

    pub fn checkin(&self, id: i64) -> Option<Arc<CheckinEntry>> {
        self.checkins.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    pub fn checkin_by_api(&self, api_key: &str) -> Option<Arc<CheckinEntry>> {
        self.checkins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|entry| entry.api_key() == api_key)
            .cloned()
    }

    pub fn checkins(&self) -> Vec<Arc<CheckinEntry>> {
        let mut checkins: Vec<Arc<CheckinEntry>> =
            self.checkins.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect();
        checkins.sort_by_key(|entry| entry.id());
        checkins
    }

    pub fn checkins_for_service(&self, service_id: i64) -> Vec<Arc<CheckinEntry>> {
        self.checkins()
            .into_iter()
            .filter(|entry| entry.service_id() == service_id)
            .collect()
    }

    pub fn insert_checkin(&self, entry: Arc<CheckinEntry>) {
        self.checkins.write().unwrap_or_else(PoisonError::into_inner).insert(entry.id(), entry);
    }

    pub fn remove_checkin(&self, id: i64) -> Option<Arc<CheckinEntry>> {
        self.checkins.write().unwrap_or_else(PoisonError::into_inner).remove(&id)
    }

    /// Whether `entry` is still the registered checkin for its id
    pub fn is_current_checkin(&self, entry: &Arc<CheckinEntry>) -> bool {
        self.checkins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entry.id())
            .is_some_and(|current| Arc::ptr_eq(current, entry))
    }

    /// Swap in new maps as one step; previous services are retired
    pub fn replace(&self, services: ServiceMap, checkins: CheckinMap) {
        let mut service_guard = self.services.write().unwrap_or_else(PoisonError::into_inner);
        let mut checkin_guard = self.checkins.write().unwrap_or_else(PoisonError::into_inner);
        let old_services = std::mem::replace(&mut *service_guard, services);
        *checkin_guard = checkins;
        drop(checkin_guard);
        drop(service_guard);

        for entry in old_services.values() {
            entry.retire();
        }
    }

    /// Services sorted for display
    pub fn service_order(&self) -> Vec<ServiceSnapshot> {
        let mut snapshots: Vec<Option<ServiceSnapshot>> =
            self.services().iter().map(|entry| entry.live_snapshot()).collect();
        snapshots.sort_by(|a, b| compare_order(a.as_ref(), b.as_ref()));
        snapshots.into_iter().flatten().collect()
    }
}
