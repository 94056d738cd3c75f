use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, params};

use super::models::{
    Checkin, CheckinHit, Failure, NewCheckin, NewCheckinHit, NewFailure, NewService,
    NotifierConfig, Service, from_millis, to_millis,
};
use super::{StoreError, StoreResult};
use crate::monitoring::checker::CheckType;
use super::{ConnectionManager, ConnectionPool};

/// Entity store used by the engine
///
/// Every call is one logical operation; callers never rely on transactions
/// spanning several calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// All services, ordered by id
    async fn services(&self) -> StoreResult<Vec<Service>>;

    async fn service(&self, id: i64) -> StoreResult<Option<Service>>;

    async fn insert_service(&self, service: &NewService) -> StoreResult<Service>;

    async fn update_service(&self, service: &Service) -> StoreResult<()>;

    /// Delete a service together with its checkins, their hits, and its failures
    async fn delete_service(&self, id: i64) -> StoreResult<()>;

    /// All checkins, ordered by id
    async fn checkins(&self) -> StoreResult<Vec<Checkin>>;

    async fn insert_checkin(&self, checkin: &NewCheckin, api_key: &str) -> StoreResult<Checkin>;

    /// Delete a checkin and all of its hits
    async fn delete_checkin(&self, id: i64) -> StoreResult<()>;

    async fn insert_hit(&self, hit: &NewCheckinHit) -> StoreResult<CheckinHit>;

    /// Most recent hit of a checkin
    async fn last_hit(&self, checkin_id: i64) -> StoreResult<Option<CheckinHit>>;

    /// Latest hits of a checkin, newest first
    async fn hits(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<CheckinHit>>;

    async fn insert_failure(&self, failure: &NewFailure) -> StoreResult<Failure>;

    /// Latest failures of a service, newest first
    async fn service_failures(&self, service_id: i64, limit: usize) -> StoreResult<Vec<Failure>>;

    /// Latest failures raised by a checkin, newest first
    async fn checkin_failures(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<Failure>>;

    async fn notifier_configs(&self) -> StoreResult<Vec<NotifierConfig>>;

    async fn save_notifier_config(&self, config: &NotifierConfig) -> StoreResult<()>;
}

const SERVICE_COLUMNS: &str = "id, name, check_type, target, interval_seconds, timeout_seconds, expected_status, order_id, created_at, updated_at";
const CHECKIN_COLUMNS: &str = "id, service_id, name, api_key, interval_seconds, created_at, updated_at";
const HIT_COLUMNS: &str = "id, checkin_id, source, created_at";
const FAILURE_COLUMNS: &str = "id, issue, method, service_id, checkin_id, ping_time, error_code, created_at";

/// LibSQL store implementation
pub struct LibsqlStore {
    pool: ConnectionPool,
}

impl LibsqlStore {
    /// Create a new store from a pool
    pub fn new_from_pool(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> StoreResult<deadpool::managed::Object<ConnectionManager>> {
        Ok(self.pool.get().await?)
    }

    async fn query_failures(&self, column: &str, id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {FAILURE_COLUMNS} FROM failures WHERE {column} = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut rows = conn.query(&sql, params![id, limit as i64]).await?;

        let mut failures = Vec::new();
        while let Some(row) = rows.next().await? {
            failures.push(failure_from_row(&row)?);
        }
        Ok(failures)
    }
}

fn service_from_row(row: &Row) -> StoreResult<Service> {
    let check_type: String = row.get(2)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        check_type: check_type.parse::<CheckType>().map_err(StoreError::Corrupt)?,
        target: row.get(3)?,
        interval_seconds: row.get::<i64>(4)?.max(0) as u64,
        timeout_seconds: row.get::<i64>(5)?.max(0) as u64,
        expected_status: row.get::<Option<i64>>(6)?.map(|v| v as u16),
        order: row.get::<i64>(7)? as i32,
        created_at: from_millis(row.get(8)?),
        updated_at: from_millis(row.get(9)?),
    })
}

fn checkin_from_row(row: &Row) -> StoreResult<Checkin> {
    Ok(Checkin {
        id: row.get(0)?,
        service_id: row.get(1)?,
        name: row.get(2)?,
        api_key: row.get(3)?,
        interval_seconds: row.get::<i64>(4)?.max(0) as u64,
        failing: false,
        last_hit_time: None,
        created_at: from_millis(row.get(5)?),
        updated_at: from_millis(row.get(6)?),
    })
}

fn hit_from_row(row: &Row) -> StoreResult<CheckinHit> {
    Ok(CheckinHit {
        id: row.get(0)?,
        checkin_id: row.get(1)?,
        from: row.get(2)?,
        created_at: from_millis(row.get(3)?),
    })
}

fn failure_from_row(row: &Row) -> StoreResult<Failure> {
    Ok(Failure {
        id: row.get(0)?,
        issue: row.get(1)?,
        method: row.get(2)?,
        service_id: row.get(3)?,
        checkin_id: row.get(4)?,
        ping_time: row.get(5)?,
        error_code: row.get::<Option<i64>>(6)?.map(|v| v as u16),
        created_at: from_millis(row.get(7)?),
    })
}

#[async_trait]
impl Store for LibsqlStore {
    async fn services(&self) -> StoreResult<Vec<Service>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY id");
        let mut rows = conn.query(&sql, ()).await?;

        let mut services = Vec::new();
        while let Some(row) = rows.next().await? {
            services.push(service_from_row(&row)?);
        }
        Ok(services)
    }

    async fn service(&self, id: i64) -> StoreResult<Option<Service>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?");
        let mut rows = conn.query(&sql, params![id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(service_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_service(&self, service: &NewService) -> StoreResult<Service> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO services (name, check_type, target, interval_seconds, timeout_seconds, expected_status, order_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                service.name.clone(),
                service.check_type.to_string(),
                service.target.clone(),
                service.interval_seconds as i64,
                service.timeout_seconds as i64,
                service.expected_status.map(|v| v as i64),
                service.order as i64,
                to_millis(now),
                to_millis(now)
            ],
        )
        .await?;

        Ok(Service {
            id: conn.last_insert_rowid(),
            name: service.name.clone(),
            check_type: service.check_type,
            target: service.target.clone(),
            interval_seconds: service.interval_seconds,
            timeout_seconds: service.timeout_seconds,
            expected_status: service.expected_status,
            order: service.order,
            created_at: from_millis(to_millis(now)),
            updated_at: from_millis(to_millis(now)),
        })
    }

    async fn update_service(&self, service: &Service) -> StoreResult<()> {
        let conn = self.get_conn().await?;

        let changed = conn
            .execute(
                "UPDATE services SET name = ?, check_type = ?, target = ?, interval_seconds = ?, timeout_seconds = ?, expected_status = ?, order_id = ?, updated_at = ? WHERE id = ?",
                params![
                    service.name.clone(),
                    service.check_type.to_string(),
                    service.target.clone(),
                    service.interval_seconds as i64,
                    service.timeout_seconds as i64,
                    service.expected_status.map(|v| v as i64),
                    service.order as i64,
                    to_millis(service.updated_at),
                    service.id
                ],
            )
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_service(&self, id: i64) -> StoreResult<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "DELETE FROM checkin_hits WHERE checkin_id IN (SELECT id FROM checkins WHERE service_id = ?)",
            params![id],
        )
        .await?;
        conn.execute("DELETE FROM checkins WHERE service_id = ?", params![id]).await?;
        conn.execute("DELETE FROM failures WHERE service_id = ?", params![id]).await?;
        conn.execute("DELETE FROM services WHERE id = ?", params![id]).await?;
        Ok(())
    }

    async fn checkins(&self) -> StoreResult<Vec<Checkin>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {CHECKIN_COLUMNS} FROM checkins ORDER BY id");
        let mut rows = conn.query(&sql, ()).await?;

        let mut checkins = Vec::new();
        while let Some(row) = rows.next().await? {
            checkins.push(checkin_from_row(&row)?);
        }
        Ok(checkins)
    }

    async fn insert_checkin(&self, checkin: &NewCheckin, api_key: &str) -> StoreResult<Checkin> {
        let conn = self.get_conn().await?;
        let now = from_millis(to_millis(Utc::now()));

        conn.execute(
            "INSERT INTO checkins (service_id, name, api_key, interval_seconds, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                checkin.service_id,
                checkin.name.clone(),
                api_key,
                checkin.interval_seconds as i64,
                to_millis(now),
                to_millis(now)
            ],
        )
        .await?;

        Ok(Checkin {
            id: conn.last_insert_rowid(),
            service_id: checkin.service_id,
            name: checkin.name.clone(),
            api_key: api_key.to_string(),
            interval_seconds: checkin.interval_seconds,
            failing: false,
            last_hit_time: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn delete_checkin(&self, id: i64) -> StoreResult<()> {
        let conn = self.get_conn().await?;

        conn.execute("DELETE FROM checkin_hits WHERE checkin_id = ?", params![id]).await?;
        conn.execute("DELETE FROM checkins WHERE id = ?", params![id]).await?;
        Ok(())
    }

    async fn insert_hit(&self, hit: &NewCheckinHit) -> StoreResult<CheckinHit> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO checkin_hits (checkin_id, source, created_at) VALUES (?, ?, ?)",
            params![hit.checkin_id, hit.from.clone(), to_millis(hit.created_at)],
        )
        .await?;

        Ok(CheckinHit {
            id: conn.last_insert_rowid(),
            checkin_id: hit.checkin_id,
            from: hit.from.clone(),
            created_at: from_millis(to_millis(hit.created_at)),
        })
    }

    async fn last_hit(&self, checkin_id: i64) -> StoreResult<Option<CheckinHit>> {
        Ok(self.hits(checkin_id, 1).await?.into_iter().next())
    }

    async fn hits(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<CheckinHit>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {HIT_COLUMNS} FROM checkin_hits WHERE checkin_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut rows = conn.query(&sql, params![checkin_id, limit as i64]).await?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await? {
            hits.push(hit_from_row(&row)?);
        }
        Ok(hits)
    }

    async fn insert_failure(&self, failure: &NewFailure) -> StoreResult<Failure> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO failures (issue, method, service_id, checkin_id, ping_time, error_code, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                failure.issue.clone(),
                failure.method.clone(),
                failure.service_id,
                failure.checkin_id,
                failure.ping_time,
                failure.error_code.map(|v| v as i64),
                to_millis(failure.created_at)
            ],
        )
        .await?;

        Ok(failure.clone().into_failure(conn.last_insert_rowid()))
    }

    async fn service_failures(&self, service_id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        self.query_failures("service_id", service_id, limit).await
    }

    async fn checkin_failures(&self, checkin_id: i64, limit: usize) -> StoreResult<Vec<Failure>> {
        self.query_failures("checkin_id", checkin_id, limit).await
    }

    async fn notifier_configs(&self) -> StoreResult<Vec<NotifierConfig>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT method, enabled, settings FROM notifiers ORDER BY method", ())
            .await?;

        let mut configs = Vec::new();
        while let Some(row) = rows.next().await? {
            let settings: String = row.get(2)?;
            configs.push(NotifierConfig {
                method: row.get(0)?,
                enabled: row.get::<i64>(1)? != 0,
                settings: serde_json::from_str(&settings)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            });
        }
        Ok(configs)
    }

    async fn save_notifier_config(&self, config: &NotifierConfig) -> StoreResult<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO notifiers (method, enabled, settings, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(method) DO UPDATE SET enabled = excluded.enabled, settings = excluded.settings, updated_at = excluded.updated_at",
            params![
                config.method.clone(),
                if config.enabled { 1 } else { 0 },
                config.settings.to_string(),
                to_millis(Utc::now())
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_pool;
    use tempfile::TempDir;

    async fn create_test_store() -> (LibsqlStore, TempDir) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db_path = temp_dir.path().join("test.db");
        let pool = open_pool(&db_path.to_string_lossy(), 4).await.expect("pool");
        (LibsqlStore::new_from_pool(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_service_roundtrip_and_update() {
        let (store, _dir) = create_test_store().await;

        let mut created = store
            .insert_service(&NewService::new("api", CheckType::Http, "https://example.com"))
            .await
            .unwrap();
        assert!(created.id > 0);

        created.interval_seconds = 15;
        created.order = 3;
        store.update_service(&created).await.unwrap();

        let loaded = store.service(created.id).await.unwrap().expect("service exists");
        assert_eq!(loaded.interval_seconds, 15);
        assert_eq!(loaded.order, 3);
        assert_eq!(loaded.check_type, CheckType::Http);
        assert_eq!(store.services().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_service_is_not_found() {
        let (store, _dir) = create_test_store().await;

        let mut ghost = store
            .insert_service(&NewService::new("ghost", CheckType::Tcp, "localhost:1"))
            .await
            .unwrap();
        store.delete_service(ghost.id).await.unwrap();
        ghost.name = "still ghost".to_string();

        assert!(matches!(store.update_service(&ghost).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_last_hit_is_newest() {
        let (store, _dir) = create_test_store().await;
        let service = store
            .insert_service(&NewService::new("cron", CheckType::Http, "https://example.com"))
            .await
            .unwrap();
        let checkin = store
            .insert_checkin(
                &NewCheckin { name: "nightly".into(), service_id: service.id, interval_seconds: 300 },
                "key-1",
            )
            .await
            .unwrap();

        assert!(store.last_hit(checkin.id).await.unwrap().is_none());

        let base = from_millis(1_700_000_000_000);
        for offset in [0, 60_000, 30_000] {
            store
                .insert_hit(&NewCheckinHit {
                    checkin_id: checkin.id,
                    from: "10.0.0.1".into(),
                    created_at: base + chrono::Duration::milliseconds(offset),
                })
                .await
                .unwrap();
        }

        let last = store.last_hit(checkin.id).await.unwrap().expect("hit");
        assert_eq!(last.created_at, base + chrono::Duration::milliseconds(60_000));
        assert_eq!(store.hits(checkin.id, 10).await.unwrap().len(), 3);
        let stored: Vec<String> = store.checkins().await.unwrap().into_iter().map(|c| c.api_key).collect();
        assert_eq!(stored, vec!["key-1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_checkin_removes_hits_but_keeps_failures() {
        let (store, _dir) = create_test_store().await;
        let service = store
            .insert_service(&NewService::new("cron", CheckType::Http, "https://example.com"))
            .await
            .unwrap();
        let checkin = store
            .insert_checkin(
                &NewCheckin { name: "hourly".into(), service_id: service.id, interval_seconds: 3600 },
                "key-2",
            )
            .await
            .unwrap();
        let now = from_millis(to_millis(Utc::now()));
        store
            .insert_hit(&NewCheckinHit { checkin_id: checkin.id, from: "::1".into(), created_at: now })
            .await
            .unwrap();
        store
            .insert_failure(&NewFailure::from_checkin(&checkin, std::time::Duration::from_secs(4000), now))
            .await
            .unwrap();

        store.delete_checkin(checkin.id).await.unwrap();

        assert!(store.checkins().await.unwrap().is_empty());
        assert!(store.hits(checkin.id, 10).await.unwrap().is_empty());
        let failures = store.checkin_failures(checkin.id, 10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].method, "checkin");
        assert_eq!(failures[0].ping_time, 4_000_000);
    }

    #[tokio::test]
    async fn test_notifier_config_upsert() {
        let (store, _dir) = create_test_store().await;

        let mut config = NotifierConfig {
            method: "log".into(),
            enabled: true,
            settings: serde_json::json!({ "level": "warn" }),
        };
        store.save_notifier_config(&config).await.unwrap();
        config.enabled = false;
        store.save_notifier_config(&config).await.unwrap();

        let configs = store.notifier_configs().await.unwrap();
        assert_eq!(configs, vec![config]);
    }
}
