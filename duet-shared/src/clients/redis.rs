use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Atomic multi-key compare-and-set.
///
/// KEYS: n document keys followed by their n collection index keys.
/// ARGV: one (expected, new, id) triple per document. An empty `expected`
/// means "must not exist"; an empty `new` means "read only, do not write".
/// Returns 1 when every expectation held and the writes were applied.
const CAS_SCRIPT: &str = r#"
local n = #KEYS / 2
for i = 1, n do
  local current = redis.call('GET', KEYS[i])
  local expected = ARGV[(i - 1) * 3 + 1]
  if expected == '' then
    if current then return 0 end
  elseif current ~= expected then
    return 0
  end
end
for i = 1, n do
  local value = ARGV[(i - 1) * 3 + 2]
  if value ~= '' then
    redis.call('SET', KEYS[i], value)
    redis.call('SADD', KEYS[n + i], ARGV[(i - 1) * 3 + 3])
  end
end
return 1
"#;

/// One document slot in a [`RedisClient::compare_and_set`] call.
#[derive(Debug, Clone)]
pub struct CasEntry {
    pub key: String,
    pub index_key: String,
    pub member: String,
    pub expected: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, redis::RedisError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        redis::cmd("MGET").arg(keys).query_async(&mut conn).await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await
    }

    /// Applies every write in `entries` only if each key still holds its
    /// expected value. Returns `false` when another writer got there first.
    pub async fn compare_and_set(&self, entries: &[CasEntry]) -> Result<bool, redis::RedisError> {
        if entries.is_empty() {
            return Ok(true);
        }
        let script = redis::Script::new(CAS_SCRIPT);
        let mut invocation = script.prepare_invoke();
        for entry in entries {
            invocation.key(&entry.key);
        }
        for entry in entries {
            invocation.key(&entry.index_key);
        }
        for entry in entries {
            invocation
                .arg(entry.expected.as_deref().unwrap_or(""))
                .arg(entry.new_value.as_deref().unwrap_or(""))
                .arg(&entry.member);
        }

        let mut conn = self.conn.clone();
        let applied: i32 = invocation.invoke_async(&mut conn).await?;
        Ok(applied == 1)
    }
}
