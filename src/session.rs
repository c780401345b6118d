//! Session memory: an in-process ring of recent turns per session, backed
//! by a durable append-only history persisted off the request path
//! (spec §4.7).

use crate::config::SessionConfig;
use crate::error::Result;
use crate::generator::HistoryTurn;
use crate::llm::Role;
use crate::tenant::TenantId;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub session_id: String,
    pub tenant_id: String,
    pub role: Role,
    pub content: String,
    pub ts: DateTime<Utc>,
}

/// Durable side of session memory: every turn recorded in the ring is
/// also queued here so history survives process restarts.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, message: ChatMessage) -> Result<()>;

    /// Deletes durable turns whose timestamp is older than `before`,
    /// returning the number of rows removed.
    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64>;
}

pub struct SqliteChatHistoryStore {
    pool: SqlitePool,
}

impl SqliteChatHistoryStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| crate::error::RaglineError::Config(format!("invalid database_url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            crate::error::RaglineError::Config(format!("failed to run migrations: {e}"))
        })?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ChatHistoryStore for SqliteChatHistoryStore {
    async fn append(&self, message: ChatMessage) -> Result<()> {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, tenant_id, role, content, ts) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&message.session_id)
        .bind(&message.tenant_id)
        .bind(role)
        .bind(&message.content)
        .bind(message.ts.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE ts < ?1")
            .bind(before.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

struct DurableAppendJob {
    message: ChatMessage,
}

/// Per-session in-process ring plus a background worker pool that mirrors
/// every turn to durable storage without delaying the response.
///
/// Ring entries are keyed by `(tenant_id, session_id)`, not `session_id`
/// alone — two tenants reusing the same `session_id` must never observe
/// or clear each other's turns (spec §1's tenant isolation invariant).
pub struct SessionMemory {
    ring: RwLock<HashMap<(String, String), VecDeque<ChatMessage>>>,
    ring_size: usize,
    ttl: ChronoDuration,
    durable: Arc<dyn ChatHistoryStore>,
    append_tx: flume::Sender<DurableAppendJob>,
}

impl SessionMemory {
    pub fn new(config: &SessionConfig, durable: Arc<dyn ChatHistoryStore>) -> Arc<Self> {
        let (append_tx, append_rx) = flume::unbounded::<DurableAppendJob>();

        let memory = Arc::new(Self {
            ring: RwLock::new(HashMap::new()),
            ring_size: config.ring_size,
            ttl: ChronoDuration::hours(config.ttl_hours),
            durable,
            append_tx,
        });

        for worker_id in 0..config.worker_count.max(1) {
            let rx = append_rx.clone();
            let durable = memory.durable.clone();
            tokio::spawn(async move {
                while let Ok(job) = rx.recv_async().await {
                    if let Err(e) = durable.append(job.message).await {
                        error!(worker_id, error = %e, "failed to persist chat turn, continuing");
                    }
                }
            });
        }

        memory
    }

    /// Records a turn in the in-process ring and enqueues a durable
    /// append. The durable append runs on a worker; this call never
    /// waits on it.
    pub async fn record_turn(&self, tenant_id: &TenantId, session_id: &str, role: Role, content: String) {
        let message = ChatMessage {
            session_id: session_id.to_string(),
            tenant_id: tenant_id.as_str().to_string(),
            role,
            content,
            ts: Utc::now(),
        };

        let key = (tenant_id.as_str().to_string(), session_id.to_string());
        {
            let mut ring = self.ring.write().await;
            let entries = ring.entry(key).or_insert_with(VecDeque::new);
            entries.push_back(message.clone());
            while entries.len() > self.ring_size {
                entries.pop_front();
            }
        }

        if self.append_tx.send(DurableAppendJob { message }).is_err() {
            warn!(session_id, "durable append channel closed, turn kept in-process only");
        }
    }

    /// Returns the most recent turns for a session, oldest first, capped
    /// at `limit` (the generator only ever asks for the last three).
    pub async fn recent_turns(&self, tenant_id: &TenantId, session_id: &str, limit: usize) -> Vec<HistoryTurn> {
        let ring = self.ring.read().await;
        let key = (tenant_id.as_str().to_string(), session_id.to_string());
        let Some(entries) = ring.get(&key) else {
            return Vec::new();
        };

        entries
            .iter()
            .rev()
            .take(limit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|m| HistoryTurn {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Deletes durable turns last active more than the configured TTL
    /// ago. Intended to be called periodically, not per-request.
    pub async fn purge_expired_durable(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.ttl;
        self.durable.purge_expired(cutoff).await
    }

    /// Drops a session's in-process ring. Durable history is left in
    /// place; it ages out via `purge_expired_durable` instead.
    pub async fn clear(&self, tenant_id: &TenantId, session_id: &str) {
        let key = (tenant_id.as_str().to_string(), session_id.to_string());
        self.ring.write().await.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        appended: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ChatHistoryStore for RecordingStore {
        async fn append(&self, message: ChatMessage) -> Result<()> {
            self.appended.lock().unwrap().push(message);
            Ok(())
        }

        async fn purge_expired(&self, _before: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    fn config(ring_size: usize) -> SessionConfig {
        SessionConfig {
            ring_size,
            worker_count: 1,
            ttl_hours: 24,
        }
    }

    #[tokio::test]
    async fn ring_caps_at_configured_size() {
        let memory = SessionMemory::new(&config(2), Arc::new(RecordingStore::default()));
        let tenant = TenantId::new("tenant-a");

        for i in 0..5 {
            memory.record_turn(&tenant, "session-1", Role::User, format!("turn {i}")).await;
        }

        let turns = memory.recent_turns(&tenant, "session-1", 10).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "turn 3");
        assert_eq!(turns[1].content, "turn 4");
    }

    #[tokio::test]
    async fn clear_drops_the_in_process_ring() {
        let memory = SessionMemory::new(&config(20), Arc::new(RecordingStore::default()));
        let tenant = TenantId::new("tenant-a");
        memory.record_turn(&tenant, "session-1", Role::User, "hello".to_string()).await;

        memory.clear(&tenant, "session-1").await;

        assert!(memory.recent_turns(&tenant, "session-1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn recent_turns_for_unknown_session_is_empty() {
        let memory = SessionMemory::new(&config(20), Arc::new(RecordingStore::default()));
        let tenant = TenantId::new("tenant-a");
        assert!(memory.recent_turns(&tenant, "nope", 3).await.is_empty());
    }

    #[tokio::test]
    async fn tenants_sharing_a_session_id_do_not_see_each_others_turns() {
        let memory = SessionMemory::new(&config(20), Arc::new(RecordingStore::default()));
        let tenant_a = TenantId::new("tenant-a");
        let tenant_b = TenantId::new("tenant-b");

        memory.record_turn(&tenant_a, "shared-session", Role::User, "tenant a's secret".to_string()).await;
        memory.record_turn(&tenant_b, "shared-session", Role::User, "tenant b's question".to_string()).await;

        let turns_a = memory.recent_turns(&tenant_a, "shared-session", 10).await;
        assert_eq!(turns_a.len(), 1);
        assert_eq!(turns_a[0].content, "tenant a's secret");

        let turns_b = memory.recent_turns(&tenant_b, "shared-session", 10).await;
        assert_eq!(turns_b.len(), 1);
        assert_eq!(turns_b[0].content, "tenant b's question");

        memory.clear(&tenant_b, "shared-session").await;

        assert!(memory.recent_turns(&tenant_b, "shared-session", 10).await.is_empty());
        assert_eq!(memory.recent_turns(&tenant_a, "shared-session", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn durable_append_eventually_observes_the_turn() {
        let store = Arc::new(RecordingStore::default());
        let memory = SessionMemory::new(&config(20), store.clone());
        let tenant = TenantId::new("tenant-a");

        memory.record_turn(&tenant, "session-1", Role::User, "hello".to_string()).await;

        for _ in 0..50 {
            if !store.appended.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let appended = store.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].content, "hello");
    }
}
