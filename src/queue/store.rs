//! Persistence adapter for queued requests.
//!
//! [`RequestStore`] is the async contract the queue manager depends on;
//! [`SqliteStore`] implements it on top of the local `SQLite` database.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::request::{Headers, HttpMethod, NewRequest, QueuedRequest};
use crate::error::QueueError;
use crate::storage::Database;

/// Durable, ordered storage for queued requests.
///
/// Several managers, possibly in different processes, may share one store.
/// The flush lease serializes their flushes.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persist a new request and return its id. Ids are unique and ascending.
    async fn insert(&self, request: NewRequest) -> Result<i64, QueueError>;

    /// All pending requests in ascending enqueue order.
    async fn list_ordered(&self) -> Result<Vec<QueuedRequest>, QueueError>;

    /// Delete a request. Removing a missing id is not an error.
    async fn remove(&self, id: i64) -> Result<(), QueueError>;

    /// Overwrite the mutable fields of a request, identified by its id, if
    /// its stored retry count is still `expected_retry_count`.
    ///
    /// Returns `false` when the request is gone or was updated by someone else.
    async fn update(
        &self,
        request: &QueuedRequest,
        expected_retry_count: u32,
    ) -> Result<bool, QueueError>;

    /// Number of pending requests.
    async fn count(&self) -> Result<u64, QueueError>;

    /// Drop every pending request.
    async fn clear(&self) -> Result<(), QueueError>;

    /// Enqueue time of the oldest pending request.
    async fn oldest(&self) -> Result<Option<DateTime<Utc>>, QueueError>;

    /// Take or renew the store-wide flush lease for `owner`, valid for `ttl`.
    ///
    /// Returns `false` when another owner holds a lease that has not expired.
    async fn acquire_flush_lease(&self, owner: &str, ttl: Duration) -> Result<bool, QueueError>;

    /// Give up the flush lease if `owner` still holds it.
    async fn release_flush_lease(&self, owner: &str) -> Result<(), QueueError>;
}

/// `SQLite`-backed request store.
///
/// Each call runs on tokio's blocking pool so `SQLite` I/O never stalls the
/// async executor.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    /// Wrap an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (or create) the store at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_at(path: &std::path::Path) -> Result<Self, QueueError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    /// Open an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self, QueueError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    async fn with_db<R, F>(&self, f: F) -> Result<R, QueueError>
    where
        F: FnOnce(&mut Database) -> Result<R, QueueError> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| QueueError::Database("Queue store lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| QueueError::Database(format!("Queue store task failed: {e}")))?
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn insert(&self, request: NewRequest) -> Result<i64, QueueError> {
        self.with_db(move |db| insert_request(db, &request)).await
    }

    async fn list_ordered(&self) -> Result<Vec<QueuedRequest>, QueueError> {
        self.with_db(|db| {
            let conn = db.connection();
            let mut stmt = conn
                .prepare(
                    r"SELECT id, method, url, payload, headers, enqueued_at,
                             retry_count, max_retries, last_attempt, last_error
                      FROM request_queue
                      ORDER BY enqueued_at ASC, id ASC",
                )
                .map_err(|e| QueueError::Database(format!("Failed to prepare query: {e}")))?;

            let rows = stmt
                .query_map([], row_to_request)
                .map_err(|e| QueueError::Database(format!("Failed to query queue: {e}")))?;

            let mut requests = Vec::new();
            for row in rows {
                requests.push(
                    row.map_err(|e| QueueError::Database(format!("Corrupt queue entry: {e}")))?,
                );
            }

            Ok(requests)
        })
        .await
    }

    async fn remove(&self, id: i64) -> Result<(), QueueError> {
        self.with_db(move |db| {
            db.connection()
                .execute("DELETE FROM request_queue WHERE id = ?1", [id])
                .map_err(|e| QueueError::Database(format!("Failed to remove request {id}: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn update(
        &self,
        request: &QueuedRequest,
        expected_retry_count: u32,
    ) -> Result<bool, QueueError> {
        let id = request.id;
        let retry_count = request.retry_count;
        let last_attempt = request.last_attempt.map(|t| t.to_rfc3339());
        let last_error = request.last_error.clone();

        self.with_db(move |db| {
            let changed = db
                .connection()
                .execute(
                    r"UPDATE request_queue SET
                      retry_count = ?1,
                      last_attempt = ?2,
                      last_error = ?3
                      WHERE id = ?4 AND retry_count = ?5",
                    params![retry_count, last_attempt, last_error, id, expected_retry_count],
                )
                .map_err(|e| QueueError::Database(format!("Failed to update request {id}: {e}")))?;
            Ok(changed == 1)
        })
        .await
    }

    async fn count(&self) -> Result<u64, QueueError> {
        self.with_db(|db| {
            let count: i64 = db
                .connection()
                .query_row("SELECT COUNT(*) FROM request_queue", [], |row| row.get(0))
                .map_err(|e| QueueError::Database(format!("Failed to count queue: {e}")))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn clear(&self) -> Result<(), QueueError> {
        self.with_db(|db| {
            db.connection()
                .execute("DELETE FROM request_queue", [])
                .map_err(|e| QueueError::Database(format!("Failed to clear queue: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn oldest(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        self.with_db(|db| {
            let millis: Option<i64> = db
                .connection()
                .query_row(
                    "SELECT enqueued_at FROM request_queue ORDER BY enqueued_at ASC, id ASC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| QueueError::Database(format!("Failed to get oldest request: {e}")))?;
            Ok(millis.and_then(DateTime::from_timestamp_millis))
        })
        .await
    }

    async fn acquire_flush_lease(&self, owner: &str, ttl: Duration) -> Result<bool, QueueError> {
        let owner = owner.to_string();
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.with_db(move |db| acquire_lease(db, &owner, ttl_millis)).await
    }

    async fn release_flush_lease(&self, owner: &str) -> Result<(), QueueError> {
        let owner = owner.to_string();
        self.with_db(move |db| {
            db.connection()
                .execute("DELETE FROM flush_lease WHERE id = 1 AND owner = ?1", [&owner])
                .map_err(|e| QueueError::Database(format!("Failed to release flush lease: {e}")))?;
            Ok(())
        })
        .await
    }
}

/// Check and claim the lease inside one write transaction, so two processes
/// cannot both see it free.
fn acquire_lease(db: &mut Database, owner: &str, ttl_millis: i64) -> Result<bool, QueueError> {
    let now = Utc::now().timestamp_millis();

    let tx = db
        .connection_mut()
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| QueueError::Database(format!("Failed to lock flush lease: {e}")))?;

    let holder: Option<(String, i64)> = tx
        .query_row(
            "SELECT owner, expires_at FROM flush_lease WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| QueueError::Database(format!("Failed to read flush lease: {e}")))?;

    if let Some((current, expires_at)) = holder {
        if current != owner && expires_at > now {
            return Ok(false);
        }
    }

    tx.execute(
        r"INSERT INTO flush_lease (id, owner, expires_at) VALUES (1, ?1, ?2)
          ON CONFLICT(id) DO UPDATE SET owner = excluded.owner, expires_at = excluded.expires_at",
        params![owner, now.saturating_add(ttl_millis)],
    )
    .map_err(|e| QueueError::Database(format!("Failed to write flush lease: {e}")))?;

    tx.commit()
        .map_err(|e| QueueError::Database(format!("Failed to commit flush lease: {e}")))?;

    Ok(true)
}

/// Insert inside a transaction so `enqueued_at` can be clamped to the newest
/// stored value: replay order by time must never disagree with id order.
fn insert_request(db: &mut Database, request: &NewRequest) -> Result<i64, QueueError> {
    request.validate()?;

    let payload = request
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let headers = serde_json::to_string(&request.headers)?;

    let tx = db
        .connection_mut()
        .transaction()
        .map_err(|e| QueueError::Database(format!("Failed to begin transaction: {e}")))?;

    let newest: Option<i64> = tx
        .query_row("SELECT MAX(enqueued_at) FROM request_queue", [], |row| row.get(0))
        .map_err(|e| QueueError::Database(format!("Failed to read queue tail: {e}")))?;
    let enqueued_at = newest.map_or_else(
        || request.enqueued_at.timestamp_millis(),
        |n| request.enqueued_at.timestamp_millis().max(n),
    );

    tx.execute(
        r"INSERT INTO request_queue (method, url, payload, headers, enqueued_at, retry_count, max_retries)
          VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            request.method.as_str(),
            request.url,
            payload,
            headers,
            enqueued_at,
            request.max_retries,
        ],
    )
    .map_err(|e| QueueError::Database(format!("Failed to enqueue request: {e}")))?;

    let id = tx.last_insert_rowid();
    tx.commit()
        .map_err(|e| QueueError::Database(format!("Failed to commit enqueue: {e}")))?;

    Ok(id)
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn row_to_request(row: &Row<'_>) -> Result<QueuedRequest, rusqlite::Error> {
    let method_str: String = row.get(1)?;
    let payload_str: Option<String> = row.get(3)?;
    let headers_str: String = row.get(4)?;
    let enqueued_millis: i64 = row.get(5)?;
    let last_attempt_str: Option<String> = row.get(8)?;

    let method = method_str
        .parse::<HttpMethod>()
        .map_err(|e| conversion_error(1, e))?;

    let payload = payload_str
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| conversion_error(3, e))?;

    let headers: Headers = serde_json::from_str(&headers_str).map_err(|e| conversion_error(4, e))?;

    let enqueued_at = DateTime::from_timestamp_millis(enqueued_millis).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(5, enqueued_millis)
    })?;

    let last_attempt = last_attempt_str.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
    });

    Ok(QueuedRequest {
        id: row.get(0)?,
        method,
        url: row.get(2)?,
        payload,
        headers,
        enqueued_at,
        retry_count: row.get(6)?,
        max_retries: row.get(7)?,
        last_attempt,
        last_error: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = create_test_store();

        let request = NewRequest::new(HttpMethod::Post, "/api/logs")
            .with_payload(json!({"a": 1}))
            .with_header("X-Client", "cli");
        let id = store.insert(request).await.unwrap();

        let pending = store.list_ordered().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].method, HttpMethod::Post);
        assert_eq!(pending[0].payload, Some(json!({"a": 1})));
        assert_eq!(pending[0].headers.get("X-Client").map(String::as_str), Some("cli"));
        assert_eq!(pending[0].retry_count, 0);
        assert_eq!(pending[0].max_retries, 3);
    }

    #[tokio::test]
    async fn test_ids_ascend_in_enqueue_order() {
        let store = create_test_store();

        let mut ids = Vec::new();
        for n in 0..5 {
            let id = store
                .insert(NewRequest::new(HttpMethod::Put, format!("/api/logs/{n}")))
                .await
                .unwrap();
            ids.push(id);
        }

        let listed: Vec<i64> = store.list_ordered().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, ids);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_clock_going_backwards_keeps_order() {
        let store = create_test_store();

        let first = NewRequest::new(HttpMethod::Post, "/api/first");
        let mut second = NewRequest::new(HttpMethod::Post, "/api/second");
        second.enqueued_at = first.enqueued_at - Duration::hours(1);

        store.insert(first).await.unwrap();
        store.insert(second).await.unwrap();

        let pending = store.list_ordered().await.unwrap();
        assert_eq!(pending[0].url, "/api/first");
        assert_eq!(pending[1].url, "/api/second");
        assert!(pending[0].enqueued_at <= pending[1].enqueued_at);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = create_test_store();

        let id = store
            .insert(NewRequest::new(HttpMethod::Delete, "/api/logs/5"))
            .await
            .unwrap();

        store.remove(id).await.unwrap();
        store.remove(id).await.unwrap();
        store.remove(9999).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_retry_count() {
        let store = create_test_store();

        store
            .insert(NewRequest::new(HttpMethod::Patch, "/api/profile"))
            .await
            .unwrap();

        let mut request = store.list_ordered().await.unwrap().remove(0);
        request.record_failure("HTTP 503: Service Unavailable");
        assert!(store.update(&request, 0).await.unwrap());

        let loaded = store.list_ordered().await.unwrap().remove(0);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(
            loaded.last_error.as_deref(),
            Some("HTTP 503: Service Unavailable")
        );
        assert!(loaded.last_attempt.is_some());

        // Updating a removed entry is a no-op
        store.remove(request.id).await.unwrap();
        assert!(!store.update(&request, 0).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_with_stale_retry_count() {
        let store = create_test_store();
        store
            .insert(NewRequest::new(HttpMethod::Post, "/api/logs"))
            .await
            .unwrap();

        // Two flushers read the same entry at retry_count 0.
        let mut first = store.list_ordered().await.unwrap().remove(0);
        let mut second = first.clone();

        first.record_failure("HTTP 500");
        assert!(store.update(&first, 0).await.unwrap());

        second.record_failure("connection reset");
        assert!(!store.update(&second, 0).await.unwrap());

        let loaded = store.list_ordered().await.unwrap().remove(0);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(loaded.last_error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_flush_lease_across_connections() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");
        let a = SqliteStore::open_at(&path).unwrap();
        let b = SqliteStore::open_at(&path).unwrap();
        let ttl = std::time::Duration::from_secs(60);

        assert!(a.acquire_flush_lease("a", ttl).await.unwrap());
        assert!(!b.acquire_flush_lease("b", ttl).await.unwrap());
        // Renewal by the holder
        assert!(a.acquire_flush_lease("a", ttl).await.unwrap());

        // Only the holder can release it.
        b.release_flush_lease("b").await.unwrap();
        assert!(!b.acquire_flush_lease("b", ttl).await.unwrap());

        a.release_flush_lease("a").await.unwrap();
        assert!(b.acquire_flush_lease("b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_flush_lease_can_be_taken() {
        let store = create_test_store();

        assert!(store
            .acquire_flush_lease("crashed", std::time::Duration::ZERO)
            .await
            .unwrap());
        assert!(store
            .acquire_flush_lease("next", std::time::Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_count_clear_and_oldest() {
        let store = create_test_store();
        assert!(store.oldest().await.unwrap().is_none());

        let first = store
            .insert(NewRequest::new(HttpMethod::Post, "/api/a"))
            .await
            .unwrap();
        store
            .insert(NewRequest::new(HttpMethod::Post, "/api/b"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.oldest().await.unwrap().is_some());

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        // Ids are never reused after a clear
        let next = store
            .insert(NewRequest::new(HttpMethod::Post, "/api/c"))
            .await
            .unwrap();
        assert!(next > first + 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_request() {
        let store = create_test_store();

        let err = store
            .insert(NewRequest::new(HttpMethod::Post, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidRequest(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO request_queue (method, url, headers, enqueued_at, max_retries)
                 VALUES ('GET', '/api/logs', '{}', 1, 3)",
                [],
            )
            .unwrap();
        let store = SqliteStore::new(db);

        let err = store.list_ordered().await.unwrap_err();
        assert!(matches!(err, QueueError::Database(_)));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        {
            let store = SqliteStore::open_at(&path).unwrap();
            store
                .insert(NewRequest::new(HttpMethod::Post, "/api/logs").with_payload(json!({"a": 1})))
                .await
                .unwrap();
        }

        let store = SqliteStore::open_at(&path).unwrap();
        let pending = store.list_ordered().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "/api/logs");
    }
}
