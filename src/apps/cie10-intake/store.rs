// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Durable storage of session records.
//!
//! Records are written once, keyed by `sessionId`, and never read back by the
//! service. The backend connection is established on first use and shared by
//! every request for the rest of the process lifetime.

use super::types::SessionRecord;
use crate::IntakeError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info};

/// Single-item, upsert-style record store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write `record` under its `sessionId`, replacing any previous item.
    async fn put_record(&self, record: &SessionRecord) -> Result<(), IntakeError>;
}

/// UTC now, second precision, literal `Z` suffix.
pub fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================
// Redis
// ============================================

/// Redis-backed store. Each record is a JSON string at `{key_prefix}:{sessionId}`.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisSessionStore {
    /// Connect to `redis_url`. `timeout` bounds both connecting and every
    /// command's response; the initial connection is retried once.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the client cannot be created or the
    /// connection fails.
    pub async fn new(
        redis_url: &str,
        key_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IntakeError> {
        let client = Client::open(redis_url).map_err(|e| {
            IntakeError::PersistenceError(format!("Failed to create Redis client: {e}"))
        })?;

        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout)
            .set_number_of_retries(1);

        let conn_manager = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(|e| {
                IntakeError::PersistenceError(format!(
                    "Failed to create Redis connection manager: {e}"
                ))
            })?;

        Ok(Self {
            conn_manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn record_key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put_record(&self, record: &SessionRecord) -> Result<(), IntakeError> {
        let mut conn = self.conn_manager.clone();
        let key = self.record_key(&record.session_id);
        let payload = serde_json::to_string(record).map_err(|e| {
            IntakeError::PersistenceError(format!("Failed to serialize session record: {e}"))
        })?;

        let _: () = conn.set(&key, payload).await.map_err(|e| {
            IntakeError::PersistenceError(format!("Failed to write {key}: {e}"))
        })?;

        Ok(())
    }
}

// ============================================
// In-memory
// ============================================

/// Process-local store. Records do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.records.read().await.get(session_id).cloned()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put_record(&self, record: &SessionRecord) -> Result<(), IntakeError> {
        self.records
            .write()
            .await
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }
}

// ============================================
// Lazy process-wide handle
// ============================================

/// Which store `LazySessionStore` connects to on first use.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Redis {
        url: String,
        key_prefix: String,
        timeout: Duration,
    },
    Memory,
}

impl StoreBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreBackend::Redis { .. } => "redis",
            StoreBackend::Memory => "memory",
        }
    }

    pub async fn connect(&self) -> Result<Arc<dyn SessionStore>, IntakeError> {
        match self {
            StoreBackend::Redis {
                url,
                key_prefix,
                timeout,
            } => {
                let store = RedisSessionStore::new(url, key_prefix.clone(), *timeout).await?;
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => Ok(Arc::new(InMemorySessionStore::new())),
        }
    }
}

/// Get-or-create accessor for the shared store handle.
///
/// The first caller connects; concurrent first callers wait for that same
/// connection instead of racing their own. A failed connection is not cached, so
/// the next write tries again.
pub struct LazySessionStore {
    backend: StoreBackend,
    handle: OnceCell<Arc<dyn SessionStore>>,
}

impl LazySessionStore {
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend,
            handle: OnceCell::new(),
        }
    }

    /// Wrap an already connected store.
    pub fn with_store(store: Arc<dyn SessionStore>) -> Self {
        Self {
            backend: StoreBackend::Memory,
            handle: OnceCell::new_with(Some(store)),
        }
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.handle.initialized()
    }

    /// Shared handle, connecting on the first call.
    pub async fn handle(&self) -> Result<Arc<dyn SessionStore>, IntakeError> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                info!("Connecting {} session store", self.backend.kind());
                self.backend.connect().await
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Stamp `record` with the current time and write it.
    ///
    /// Failures are logged here and reported only as `false`; callers keep going.
    pub async fn save(&self, mut record: SessionRecord) -> bool {
        let store = match self.handle().await {
            Ok(store) => store,
            Err(e) => {
                error!(
                    session_id = %record.session_id,
                    ip_cliente = %record.ip_cliente,
                    "Session record not saved: {e}"
                );
                return false;
            }
        };

        record.timestamp = utc_timestamp();
        match store.put_record(&record).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    session_id = %record.session_id,
                    ip_cliente = %record.ip_cliente,
                    "Session record not saved: {e}"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(session_id: &str) -> SessionRecord {
        SessionRecord {
            session_id: session_id.to_string(),
            texto: "fiebre".to_string(),
            candidatos_gpt: vec![],
            ip_cliente: "unknown".to_string(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_timestamp_format() {
        let ts = utc_timestamp();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%dT%H:%M:%SZ").is_ok());
    }

    #[tokio::test]
    async fn test_lazy_handle_is_shared() {
        let lazy = LazySessionStore::new(StoreBackend::Memory);
        assert!(!lazy.is_initialized());

        let (a, b) = tokio::join!(lazy.handle(), lazy.handle());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));

        let c = lazy.handle().await.unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert!(lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_save_stamps_timestamp_and_upserts() {
        let memory = Arc::new(InMemorySessionStore::new());
        let lazy = LazySessionStore::with_store(memory.clone());

        assert!(lazy.save(record("s-1")).await);
        let saved = memory.get("s-1").await.unwrap();
        assert!(saved.timestamp.ends_with('Z'));

        let mut second = record("s-1");
        second.texto = "tos".to_string();
        assert!(lazy.save(second).await);
        assert_eq!(memory.len().await, 1);
        assert_eq!(memory.get("s-1").await.unwrap().texto, "tos");
    }

    #[tokio::test]
    async fn test_failed_connection_is_logged_not_raised() {
        let lazy = LazySessionStore::new(StoreBackend::Redis {
            url: "not-a-redis-url".to_string(),
            key_prefix: "sesiones".to_string(),
            timeout: Duration::from_millis(300),
        });
        assert!(!lazy.save(record("s-2")).await);
        assert!(!lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_silent_redis_does_not_hang_writes() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let lazy = LazySessionStore::new(StoreBackend::Redis {
            url: format!("redis://{addr}"),
            key_prefix: "sesiones".to_string(),
            timeout: Duration::from_millis(300),
        });
        let saved = tokio::time::timeout(Duration::from_secs(10), lazy.save(record("s-3")))
            .await
            .expect("write was not bounded by the store timeout");
        assert!(!saved);
    }
}
