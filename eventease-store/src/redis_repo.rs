use async_trait::async_trait;
use chrono::DateTime;
use eventease_core::{BucketStore, Revision, StoreError, StoreResult};
use eventease_shared::BucketState;
use redis::AsyncCommands;

// Compare-and-set over a bucket hash. ARGV[1] is the expected revision, or
// an empty string when the bucket must not exist yet.
const CAS_SCRIPT: &str = r#"
local rev = redis.call("HGET", KEYS[1], "rev")
if ARGV[1] == "" then
    if rev then
        return 0
    end
elseif rev ~= ARGV[1] then
    return 0
end
local current = 0
if rev then
    current = tonumber(rev)
end
redis.call("HSET", KEYS[1], "tokens", ARGV[2], "last_refill_ms", ARGV[3], "rev", current + 1)
redis.call("PEXPIRE", KEYS[1], ARGV[4])
return 1
"#;

/// Bucket store shared by every process instance pointing at the same Redis.
///
/// Each bucket is a hash `{tokens, last_refill_ms, rev}`. Idle buckets expire
/// after `ttl_ms`, which must cover a full refill from empty so an expired
/// bucket is never less full than the one it replaces.
#[derive(Clone)]
pub struct RedisBucketStore {
    client: redis::Client,
    key_prefix: String,
    ttl_ms: u64,
}

impl RedisBucketStore {
    pub fn new(connection_string: &str, ttl_ms: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            key_prefix: "ratelimit".to_string(),
            ttl_ms,
        })
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    fn bucket_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::backend)
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn load(&self, key: &str) -> StoreResult<Option<(BucketState, Revision)>> {
        let mut conn = self.connection().await?;
        let (tokens, last_refill_ms, rev): (Option<u32>, Option<i64>, Option<u64>) = conn
            .hmget(self.bucket_key(key), &["tokens", "last_refill_ms", "rev"])
            .await
            .map_err(StoreError::backend)?;

        match (tokens, last_refill_ms, rev) {
            (Some(tokens), Some(ms), Some(rev)) => {
                let last_refill = DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                    StoreError::Corrupt(format!("bucket {} has invalid timestamp {}", key, ms))
                })?;
                Ok(Some((BucketState { tokens, last_refill }, rev)))
            }
            (None, None, None) => Ok(None),
            _ => Err(StoreError::Corrupt(format!("bucket {} is missing fields", key))),
        }
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Revision>,
        next: BucketState,
    ) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let expected = expected.map(|rev| rev.to_string()).unwrap_or_default();

        let applied: i32 = redis::Script::new(CAS_SCRIPT)
            .key(self.bucket_key(key))
            .arg(expected)
            .arg(next.tokens)
            .arg(next.last_refill.timestamp_millis())
            .arg(self.ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        Ok(applied == 1)
    }
}
