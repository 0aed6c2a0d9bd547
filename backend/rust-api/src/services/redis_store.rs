use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use redis::{aio::ConnectionManager, RedisError, RedisResult};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use super::session_store::{new_session_id, take_hint, SessionStore, StoreError};
use crate::metrics::track_store_operation;
use crate::models::{
    stats::{AggregateStats, AttemptRecord, RecentSession, StatsAccumulator, RECENT_SESSIONS_LIMIT},
    Difficulty, InterviewSettings, Session,
};
use crate::utils::retry::{retry_async_when, RetryConfig};

const DEFAULT_PREFIX: &str = "interview";
const CAS_ATTEMPTS: usize = 3;

lazy_static! {
    // 1 = swapped, 0 = value changed since it was read, -1 = key is gone
    static ref COMPARE_AND_SET: redis::Script = redis::Script::new(
        r#"
        local current = redis.call('GET', KEYS[1])
        if current == false then
            return -1
        end
        if current ~= ARGV[1] then
            return 0
        end
        redis.call('SET', KEYS[1], ARGV[2])
        return 1
        "#
    );

    // ARGV: score, solved flag, difficulty, tags...
    static ref RECORD_ATTEMPT: redis::Script = redis::Script::new(
        r#"
        redis.call('HINCRBY', KEYS[1], 'total_attempts', 1)
        redis.call('HINCRBY', KEYS[1], 'score_sum', ARGV[1])
        redis.call('HINCRBY', KEYS[2], ARGV[3], 1)
        if ARGV[2] == '1' then
            redis.call('HINCRBY', KEYS[1], 'problems_solved', 1)
        else
            for i = 4, #ARGV do
                redis.call('HINCRBY', KEYS[3], ARGV[i], 1)
            end
        end
        return 1
        "#
    );
}

fn is_transient(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
}

fn backend(operation: &str, err: RedisError) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err).context(format!("redis {} failed", operation)))
}

fn decode(raw: &str) -> Result<Session, StoreError> {
    serde_json::from_str(raw)
        .context("stored session is not valid JSON")
        .map_err(StoreError::Backend)
}

/// Durable store keeping sessions and statistics in Redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self::with_prefix(redis, DEFAULT_PREFIX)
    }

    pub fn with_prefix(redis: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(uri: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(uri).context("Invalid REDIS_URI")?;

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let mut conn = redis.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self::new(redis))
    }

    fn session_key(&self, id: &str) -> String {
        format!("{}:session:{}", self.prefix, id)
    }

    fn sessions_key(&self) -> String {
        format!("{}:sessions", self.prefix)
    }

    fn stats_key(&self) -> String {
        format!("{}:stats", self.prefix)
    }

    fn difficulty_key(&self) -> String {
        format!("{}:stats:difficulty", self.prefix)
    }

    fn weak_tags_key(&self) -> String {
        format!("{}:stats:weak_tags", self.prefix)
    }

    /// Runs one Redis round trip, retrying connection hiccups with backoff.
    async fn run<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        track_store_operation(
            operation,
            retry_async_when(RetryConfig::default(), f, is_transient),
        )
        .await
        .map_err(|e| backend(operation, e))
    }

    async fn fetch_raw(&self, id: &str) -> Result<String, StoreError> {
        let key = self.session_key(id);
        let raw: Option<String> = self
            .run("get", || {
                let mut conn = self.redis.clone();
                let key = key.clone();
                async move {
                    redis::cmd("GET")
                        .arg(&key)
                        .query_async::<Option<String>>(&mut conn)
                        .await
                }
            })
            .await?;
        raw.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<Session>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.session_key(id)).collect();
        let raw: Vec<Option<String>> = self
            .run("mget", || {
                let mut conn = self.redis.clone();
                let keys = keys.clone();
                async move {
                    redis::cmd("MGET")
                        .arg(&keys)
                        .query_async::<Vec<Option<String>>>(&mut conn)
                        .await
                }
            })
            .await?;
        raw.iter().flatten().map(|json| decode(json)).collect()
    }

    async fn session_ids(&self, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let key = self.sessions_key();
        self.run("lrange", || {
            let mut conn = self.redis.clone();
            let key = key.clone();
            async move {
                redis::cmd("LRANGE")
                    .arg(&key)
                    .arg(start)
                    .arg(stop)
                    .query_async::<Vec<String>>(&mut conn)
                    .await
            }
        })
        .await
    }

    async fn hash(&self, key: String) -> Result<HashMap<String, u64>, StoreError> {
        self.run("hgetall", || {
            let mut conn = self.redis.clone();
            let key = key.clone();
            async move {
                redis::cmd("HGETALL")
                    .arg(&key)
                    .query_async::<HashMap<String, u64>>(&mut conn)
                    .await
            }
        })
        .await
    }

    /// One optimistic read-modify-write of a session. Returns the written
    /// session together with whatever `mutate` reported.
    async fn try_update<F, R>(&self, id: &str, mutate: &F) -> Result<(Session, R), StoreError>
    where
        F: Fn(&mut Session) -> Result<R, StoreError> + Sync,
        R: Send,
    {
        let before = self.fetch_raw(id).await?;
        let mut session = decode(&before)?;
        let outcome = mutate(&mut session)?;
        let after = serde_json::to_string(&session)
            .context("Failed to serialize session")
            .map_err(StoreError::Backend)?;
        // Nothing changed, skip the write
        if after == before {
            return Ok((session, outcome));
        }

        let key = self.session_key(id);
        let swapped: i32 = self
            .run("cas", || {
                let mut conn = self.redis.clone();
                let key = key.clone();
                let before = before.clone();
                let after = after.clone();
                async move {
                    COMPARE_AND_SET
                        .key(&key)
                        .arg(&before)
                        .arg(&after)
                        .invoke_async(&mut conn)
                        .await
                }
            })
            .await?;

        match swapped {
            1 => Ok((session, outcome)),
            -1 => Err(StoreError::NotFound(id.to_string())),
            _ => Err(StoreError::Conflict(id.to_string())),
        }
    }

    async fn update<F, R>(&self, id: &str, mutate: F) -> Result<(Session, R), StoreError>
    where
        F: Fn(&mut Session) -> Result<R, StoreError> + Sync,
        R: Send,
    {
        retry_async_when(
            RetryConfig::immediate(CAS_ATTEMPTS),
            || self.try_update(id, &mutate),
            |e| {
                let retry = matches!(e, StoreError::Conflict(_));
                if retry {
                    tracing::debug!("Session {} changed while updating, retrying", id);
                }
                retry
            },
        )
        .await
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(
        &self,
        settings: InterviewSettings,
        started_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session::start(new_session_id(), settings, started_at);
        let json = serde_json::to_string(&session)
            .context("Failed to serialize session")
            .map_err(StoreError::Backend)?;
        let key = self.session_key(&session.id);
        let list = self.sessions_key();

        self.run("create", || {
            let mut conn = self.redis.clone();
            let mut pipe = redis::pipe();
            pipe.atomic()
                .cmd("SET")
                .arg(&key)
                .arg(&json)
                .ignore()
                .cmd("RPUSH")
                .arg(&list)
                .arg(&session.id)
                .ignore();
            async move { pipe.query_async::<()>(&mut conn).await }
        })
        .await?;

        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        decode(&self.fetch_raw(id).await?)
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let ids = self.session_ids(0, -1).await?;
        self.fetch_many(&ids).await
    }

    async fn end(&self, id: &str, ended_at: DateTime<Utc>) -> Result<(Session, bool), StoreError> {
        // The CAS only lands for the caller whose read still saw it active
        self.update(id, |session| Ok(session.complete(ended_at))).await
    }

    async fn increment_attempts(&self, id: &str) -> Result<Session, StoreError> {
        let (session, ()) = self
            .update(id, |session| {
                session.questions_attempted += 1;
                Ok(())
            })
            .await?;
        Ok(session)
    }

    async fn consume_hint(
        &self,
        id: &str,
        question_id: &str,
        available: u32,
        limit: u32,
    ) -> Result<Session, StoreError> {
        let (session, ()) = self
            .update(id, |session| take_hint(session, question_id, available, limit))
            .await?;
        Ok(session)
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<AggregateStats, StoreError> {
        let keys = [self.stats_key(), self.difficulty_key(), self.weak_tags_key()];

        let _: i32 = self
            .run("record_attempt", || {
                let mut conn = self.redis.clone();
                let mut invocation = RECORD_ATTEMPT.prepare_invoke();
                for key in &keys {
                    invocation.key(key);
                }
                invocation
                    .arg(attempt.overall_score)
                    .arg(if attempt.solved() { "1" } else { "0" })
                    .arg(attempt.difficulty.as_str());
                for tag in &attempt.tags {
                    invocation.arg(tag);
                }
                async move { invocation.invoke_async(&mut conn).await }
            })
            .await?;

        self.stats().await
    }

    async fn stats(&self) -> Result<AggregateStats, StoreError> {
        let totals = self.hash(self.stats_key()).await?;
        let difficulty_counts = self
            .hash(self.difficulty_key())
            .await?
            .into_iter()
            .filter_map(|(name, count)| Some((name.parse::<Difficulty>().ok()?, count)))
            .collect();
        let weak_tag_counts = self.hash(self.weak_tags_key()).await?.into_iter().collect();

        let accumulator = StatsAccumulator {
            total_attempts: totals.get("total_attempts").copied().unwrap_or(0),
            score_sum: totals.get("score_sum").copied().unwrap_or(0),
            problems_solved: totals.get("problems_solved").copied().unwrap_or(0),
            difficulty_counts,
            weak_tag_counts,
        };

        let recent_ids = self
            .session_ids(-(RECENT_SESSIONS_LIMIT as isize), -1)
            .await?;
        let recent = self
            .fetch_many(&recent_ids)
            .await?
            .iter()
            .map(RecentSession::from)
            .collect();

        Ok(accumulator.snapshot(recent))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.run("ping", || {
            let mut conn = self.redis.clone();
            async move { redis::cmd("PING").query_async::<String>(&mut conn).await }
        })
        .await
        .map(|_| ())
    }
}
