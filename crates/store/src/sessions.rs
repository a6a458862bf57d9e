use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Server-side state of a logged-in client, keyed by an opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(user_id: Uuid, username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username: username.into(),
            created_at: now,
            last_accessed: now,
        }
    }
}

/// 256 bits of randomness, hex encoded.
pub fn new_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

pub struct RedisSessionStore {
    client: Client,
    ttl: Duration,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let store = Self { client, ttl };
        store.get_connection().await?;
        tracing::info!("Session store connected to Redis (ttl {}s)", ttl.as_secs());

        Ok(store)
    }

    pub async fn create(&self, user_id: Uuid, username: &str) -> Result<(String, AuthSession)> {
        let token = new_session_token();
        let session = AuthSession::new(user_id, username);
        self.put(&token, &session).await?;
        Ok((token, session))
    }

    /// Loads the session and pushes its expiry forward.
    pub async fn get(&self, token: &str) -> Result<Option<AuthSession>> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = conn
            .get(session_key(token))
            .await
            .context("Failed to get session from Redis")?;

        let Some(json) = data else {
            return Ok(None);
        };

        let mut session: AuthSession =
            serde_json::from_str(&json).context("Failed to deserialize session data")?;
        session.last_accessed = Utc::now();
        self.put(token, &session).await?;

        Ok(Some(session))
    }

    pub async fn delete(&self, token: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.del::<_, ()>(session_key(token))
            .await
            .context("Failed to delete session from Redis")?;
        Ok(())
    }

    async fn put(&self, token: &str, session: &AuthSession) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(session).context("Failed to serialize session data")?;
        conn.set_ex::<_, _, ()>(session_key(token), json, self.ttl.as_secs())
            .await
            .context("Failed to store session in Redis")?;
        Ok(())
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to get Redis connection")
    }
}

/// Expiring sessions held in process memory.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, (AuthSession, tokio::time::Instant)>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self, user_id: Uuid, username: &str) -> Result<(String, AuthSession)> {
        let token = new_session_token();
        let session = AuthSession::new(user_id, username);
        self.sessions
            .write()
            .await
            .insert(token.clone(), (session.clone(), self.expiry()));
        Ok((token, session))
    }

    pub async fn get(&self, token: &str) -> Result<Option<AuthSession>> {
        let mut sessions = self.sessions.write().await;
        let now = tokio::time::Instant::now();

        let expired = match sessions.get(token) {
            Some((_, expires_at)) => *expires_at <= now,
            None => return Ok(None),
        };
        if expired {
            sessions.remove(token);
            return Ok(None);
        }

        Ok(sessions.get_mut(token).map(|(session, expires_at)| {
            session.last_accessed = Utc::now();
            *expires_at = now + self.ttl;
            session.clone()
        }))
    }

    pub async fn delete(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    /// Drops expired sessions, returning how many were removed.
    pub async fn gc(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = tokio::time::Instant::now();
        let before = sessions.len();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        before - sessions.len()
    }

    fn expiry(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.ttl
    }
}

pub enum AnySessionStore {
    Redis(RedisSessionStore),
    Memory(MemorySessionStore),
}

impl AnySessionStore {
    pub async fn create(&self, user_id: Uuid, username: &str) -> Result<(String, AuthSession)> {
        match self {
            AnySessionStore::Redis(store) => store.create(user_id, username).await,
            AnySessionStore::Memory(store) => store.create(user_id, username).await,
        }
    }

    pub async fn get(&self, token: &str) -> Result<Option<AuthSession>> {
        match self {
            AnySessionStore::Redis(store) => store.get(token).await,
            AnySessionStore::Memory(store) => store.get(token).await,
        }
    }

    pub async fn delete(&self, token: &str) -> Result<()> {
        match self {
            AnySessionStore::Redis(store) => store.delete(token).await,
            AnySessionStore::Memory(store) => store.delete(token).await,
        }
    }

    /// Redis expires keys itself, so only the memory store has work to do.
    pub async fn gc(&self) -> usize {
        match self {
            AnySessionStore::Redis(_) => 0,
            AnySessionStore::Memory(store) => store.gc().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_distinct_hex_tokens() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn should_create_and_read_memory_session() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let user_id = Uuid::new_v4();

        let (token, created) = store.create(user_id, "alice").await.unwrap();
        let loaded = store.get(&token).await.unwrap().unwrap();

        assert_eq!(loaded.user_id, user_id);
        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.created_at, created.created_at);
        assert!(store.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_expire_idle_memory_session() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let (token, _) = store.create(Uuid::new_v4(), "alice").await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(store.get(&token).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_refresh_ttl_on_read() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let (token, _) = store.create(Uuid::new_v4(), "alice").await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.get(&token).await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(store.get(&token).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn should_collect_expired_sessions() {
        let store = AnySessionStore::Memory(MemorySessionStore::new(Duration::from_secs(10)));
        store.create(Uuid::new_v4(), "old").await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let (fresh, _) = store.create(Uuid::new_v4(), "fresh").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.gc().await, 1);
        assert!(store.get(&fresh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_delete_memory_session() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let (token, _) = store.create(Uuid::new_v4(), "alice").await.unwrap();

        store.delete(&token).await.unwrap();
        store.delete(&token).await.unwrap();

        assert!(store.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_round_trip_redis_session() {
        let redis_url =
            std::env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let store = match RedisSessionStore::connect(&redis_url, Duration::from_secs(60)).await {
            Ok(store) => store,
            Err(_) => {
                println!("Redis not available, skipping session store test");
                return;
            }
        };
        let user_id = Uuid::new_v4();

        let (token, _) = store.create(user_id, "alice").await.unwrap();
        let loaded = store.get(&token).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, user_id);

        store.delete(&token).await.unwrap();
        assert!(store.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_fail_to_connect_to_invalid_redis() {
        let result = RedisSessionStore::connect("redis://invalid:6379", Duration::from_secs(60)).await;
        assert!(result.is_err());
    }
}
