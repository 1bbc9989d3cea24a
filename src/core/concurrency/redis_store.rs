use super::CounterStore;
use crate::{logging, utils, Result};
use lazy_static::lazy_static;
use r2d2::{NopErrorHandler, Pool};
use redis::{Client, Commands, Connection, Script};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Admission runs server-side so that the count check and the insert cannot
// interleave with another client. The hash expires once nothing has been
// admitted for a whole TTL, at which point every field in it is stale anyway.
const ADMIT_SCRIPT: &str = r#"
local key = KEYS[1]
local field = ARGV[1]
local timestamp = ARGV[2]
local limit = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

if redis.call('HLEN', key) >= limit then
  return 0
end

redis.call('HSET', key, field, timestamp)
redis.call('EXPIRE', key, ttl)
return 1
"#;

const IO_TIMEOUT: Duration = Duration::from_millis(500);
const POOL_SIZE: u32 = 16;
const RECONNECT_BACKOFF_MS: u64 = 1000;

lazy_static! {
    static ref ADMIT: Script = Script::new(ADMIT_SCRIPT);
}

/// A [`CounterStore`] backed by a Redis hash, shared by every process that
/// points at the same server.
///
/// Connections come from a pool, so concurrent callers never wait on each
/// other's round-trips. After a connectivity failure every operation fails
/// immediately until the reconnect backoff has elapsed.
pub struct RedisStore {
    pool: Pool<Client>,
    retry_at_millis: AtomicU64,
    reconnect_backoff_ms: u64,
}

impl RedisStore {
    /// Creates the store without connecting; connections are opened on demand.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .min_idle(Some(0))
            .connection_timeout(IO_TIMEOUT)
            .test_on_check_out(false)
            .error_handler(Box::new(NopErrorHandler))
            .build_unchecked(client);
        Ok(Self {
            pool,
            retry_at_millis: AtomicU64::new(0),
            reconnect_backoff_ms: RECONNECT_BACKOFF_MS,
        })
    }

    fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> redis::RedisResult<T>,
    {
        let now = utils::curr_time_millis();
        let retry_at = self.retry_at_millis.load(Ordering::Relaxed);
        if now < retry_at {
            return Err(crate::Error::msg(format!(
                "redis store unavailable, reconnecting in {}ms",
                retry_at - now
            )));
        }
        let mut conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                self.back_off(&err);
                return Err(err.into());
            }
        };
        let result = conn
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|_| conn.set_write_timeout(Some(IO_TIMEOUT)))
            .and_then(|_| op(&mut *conn));
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                // a broken connection is discarded by the pool on return
                if err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.is_io_error()
                    || err.is_timeout()
                {
                    self.back_off(&err);
                }
                Err(err.into())
            }
        }
    }

    fn back_off(&self, err: &dyn fmt::Display) {
        logging::debug!(
            "[RedisStore] Connection failed, retrying in {}ms, error {}",
            self.reconnect_backoff_ms,
            err
        );
        self.retry_at_millis.store(
            utils::curr_time_millis() + self.reconnect_backoff_ms,
            Ordering::Relaxed,
        );
    }
}

impl CounterStore for RedisStore {
    fn count(&self, key: &str) -> Result<u64> {
        self.with_conn(|conn| conn.hlen(key))
    }

    fn admit(
        &self,
        key: &str,
        field: &str,
        timestamp: i64,
        limit: u64,
        ttl_secs: u64,
    ) -> Result<bool> {
        let admitted: i64 = self.with_conn(|conn| {
            ADMIT
                .key(key)
                .arg(field)
                .arg(timestamp)
                .arg(limit)
                .arg(ttl_secs)
                .invoke(conn)
        })?;
        Ok(admitted == 1)
    }

    fn remove(&self, key: &str, field: &str) -> Result<()> {
        self.with_conn(|conn| conn.hdel::<_, _, ()>(key, field))
    }

    fn entries(&self, key: &str) -> Result<Vec<(String, String)>> {
        let entries: HashMap<String, String> = self.with_conn(|conn| conn.hgetall(key))?;
        Ok(entries.into_iter().collect())
    }

    fn remove_many(&self, key: &str, fields: &[String]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| conn.hdel(key, fields))
    }
}

#[cfg(test)]
mod test {
    use super::super::{Admission, DistributedCounter, DynamicLimitSettings};
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Instant;

    #[test]
    fn invalid_url() {
        assert!(RedisStore::open("not a url").is_err());
    }

    #[test]
    fn unreachable_server_is_an_error() {
        // nothing listens on the discard port
        let store = RedisStore::open("redis://127.0.0.1:9/").unwrap();
        assert!(store.count("k").is_err());
        assert!(store.admit("k", "f", 1, 1, 300).is_err());
        assert!(store.remove("k", "f").is_err());
    }

    #[test]
    fn outage_fails_fast_until_backoff_elapses() {
        let mut store = RedisStore::open("redis://127.0.0.1:9/").unwrap();
        store.reconnect_backoff_ms = 50;
        let err = store.count("k").unwrap_err();
        assert!(!err.to_string().contains("reconnecting"), "{}", err);

        let started = Instant::now();
        let err = store.count("k").unwrap_err();
        assert!(err.to_string().contains("reconnecting"), "{}", err);
        assert!(started.elapsed() < IO_TIMEOUT);

        utils::sleep_for_ms(60);
        let err = store.count("k").unwrap_err();
        assert!(!err.to_string().contains("reconnecting"), "{}", err);
    }

    // Run with `REDIS_URL=redis://127.0.0.1:6379/ cargo test -- --ignored`
    fn live_store() -> Option<(Arc<RedisStore>, String)> {
        let url = std::env::var("REDIS_URL").ok()?;
        let store = RedisStore::open(&url).unwrap();
        let key = format!(
            "topology-interceptors:test:{}:{:016x}",
            std::process::id(),
            rand::random::<u64>()
        );
        Some((Arc::new(store), key))
    }

    fn delete(store: &RedisStore, key: &str) {
        store.with_conn(|conn| conn.del::<_, ()>(key)).unwrap();
    }

    #[test]
    #[ignore]
    fn concurrent_admission_on_a_live_server() {
        let (store, key) = match live_store() {
            Some(live) => live,
            None => return,
        };
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = store.clone();
                let barrier = barrier.clone();
                let key = key.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .admit(&key, &format!("req-{}", i), utils::curr_time_secs(), 2, 300)
                        .unwrap()
                })
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 2);
        assert_eq!(store.count(&key).unwrap(), 2);

        let mut fields: Vec<String> = store
            .entries(&key)
            .unwrap()
            .into_iter()
            .map(|(field, _)| field)
            .collect();
        fields.sort();
        assert_eq!(fields.len(), 2);
        store.remove(&key, &fields[0]).unwrap();
        assert_eq!(store.count(&key).unwrap(), 1);
        assert_eq!(store.remove_many(&key, &fields).unwrap(), 1);
        assert_eq!(store.count(&key).unwrap(), 0);
        delete(&store, &key);
    }

    #[test]
    #[ignore]
    fn counter_on_a_live_server() {
        let (store, key) = match live_store() {
            Some(live) => live,
            None => return,
        };
        let counter = DistributedCounter::new(
            store.clone(),
            Arc::new(DynamicLimitSettings::new(1, true)),
        )
        .with_key(key.clone())
        .with_ttl_secs(300);

        let first = counter.try_admit(Some("BeginUpdate"));
        assert!(first.is_admitted());
        assert_eq!(counter.try_admit(Some("BeginUpdate")), Admission::Rejected);
        assert_eq!(counter.current_count(), 1);
        counter.track_request_end(first.request_id());
        assert_eq!(counter.current_count(), 0);

        // left behind by a process that died mid-call
        assert!(store
            .admit(&key, "stale", utils::curr_time_secs() - 1000, 10, 300)
            .unwrap());
        assert_eq!(counter.cleanup_stale_requests().removed_count, 1);
        assert!(counter.try_admit(Some("CommitUpdate")).is_admitted());
        delete(&store, &key);
    }
}
