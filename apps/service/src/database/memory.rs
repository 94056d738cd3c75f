use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::models::{
    Checkin, CheckinHit, Failure, NewCheckin, NewCheckinHit, NewFailure, NewService,
    NotifierConfig, Service,
};
use super::repository::Store;
use super::{StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    next_id: i64,
    services: Vec<Service>,
    checkins: Vec<Checkin>,
    hits: Vec<CheckinHit>,
    failures: Vec<Failure>,
    notifiers: Vec<NotifierConfig>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store; contents are lost when it is dropped
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> (i64, i64), limit: usize) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items.truncate(limit);
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn services(&self) -> StoreResult<Vec<Service>> {
        Ok(self.tables().services.clone())
    }

    async fn service(&self, id: i64) -> StoreResult<Option<Service>> {
        Ok(self.tables().services.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_service(&self, service: &NewService) -> StoreResult<Service> {
        let mut tables = self.tables();
        let now = Utc::now();
        let created = Service {
            id: tables.next_id(),
            name: service.name.clone(),
            check_type: service.check_type,
            target: service.target.clone(),
            interval_seconds: service.interval_seconds,
            timeout_seconds: service.timeout_seconds,
            expected_status: service.expected_status,
            order: service.order,
            created_at: now,
            updated_at: now,
        };
        tables.services.push(created.clone());
        Ok(created)
    }

    async fn update_service(&self, service: &Service) -> StoreResult<()> {
        let mut tables = self.tables();
        let slot = tables
            .services
            .iter_mut()
            .find(|s| s.id == service.id)
            .ok_or(StoreError::NotFound)?;
        *slot = service.clone();
        Ok(())
    }

    async fn delete_service(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables();
        let checkin_ids: Vec<i64> =
            tables.checkins.iter().filter(|c| c.service_id == id).map(|c| c.id).collect();
        tables.hits.retain(|h| !checkin_ids.contains(&h.checkin_id));
        tables.checkins.retain(|c| c.service_id != id);
        tables.failures.retain(|f| f.service_id != Some(id));
        tables.services.retain(|s| s.id != id);
        Ok(())
    }

    async fn checkins(&self) -> StoreResult<Vec<Checkin>> {
        Ok(self.tables().checkins.clone())
    }

    async fn insert_checkin(&self, checkin: &NewCheckin, api_key: &str) -> StoreResult<Checkin> {
        let mut tables = self.tables();
        let now = Utc::now();
        let created = Checkin {
            id: tables.next_id(),
            service_id: checkin.service_id,
            name: checkin.name.clone(),
            api_key: api_key.to_string(),
            interval_seconds: checkin.interval_seconds,
            failing: false,
            last_hit_time: None,
            created_at: now,
            updated_at: now,
        };
        tables.checkins.push(created.clone());
        Ok(created)
    }

    async fn delete_checkin(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables();
        tables.hits.retain(|h| h.checkin_id != id);
        tables.checkins.retain(|c| c.id != id);
        Ok(())
    }

    async fn insert_hit(&self, hit: &NewCheckinHit) -> StoreResult<CheckinHit> {
        let mut tables = self.tables();
        let created = CheckinHit {
            id: tables.next_id(),
            checkin_id: hit.checkin_id,
            from: hit.from.clone(),
            created_at: hit.created_at,
        };
        tables.hits.push(created.clone());
        Ok(created)
    }

    async fn last_hit(&self, checkin_id: i64) -> StoreResult<Option<CheckinHit>> {
        Ok(self.hits(checkin_id, 1).await?.into_iter().next())
    }

    async fn hits(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<CheckinHit>> {
        let hits: Vec<CheckinHit> =
            self.tables().hits.iter().filter(|h| h.checkin_id == checkin_id).cloned().collect();
        Ok(newest_first(hits, |h| (h.created_at.timestamp_micros(), h.id), limit))
    }

    async fn insert_failure(&self, failure: &NewFailure) -> StoreResult<Failure> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let created = failure.clone().into_failure(id);
        tables.failures.push(created.clone());
        Ok(created)
    }

    async fn service_failures(&self, service_id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        let failures: Vec<Failure> = self
            .tables()
            .failures
            .iter()
            .filter(|f| f.service_id == Some(service_id))
            .cloned()
            .collect();
        Ok(newest_first(failures, |f| (f.created_at.timestamp_micros(), f.id), limit))
    }

    async fn checkin_failures(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        let failures: Vec<Failure> = self
            .tables()
            .failures
            .iter()
            .filter(|f| f.checkin_id == Some(checkin_id))
            .cloned()
            .collect();
        Ok(newest_first(failures, |f| (f.created_at.timestamp_micros(), f.id), limit))
    }

    async fn notifier_configs(&self) -> StoreResult<Vec<NotifierConfig>> {
        Ok(self.tables().notifiers.clone())
    }

    async fn save_notifier_config(&self, config: &NotifierConfig) -> StoreResult<()> {
        let mut tables = self.tables();
        match tables.notifiers.iter_mut().find(|n| n.method == config.method) {
            Some(existing) => *existing = config.clone(),
            None => tables.notifiers.push(config.clone()),
        }
        Ok(())
    }
}
