use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use taskman_core::{CoordinationStore, Result, TaskManError};

/// 比较并续期的 Lua 脚本：值匹配时在同一次往返内延长 TTL
const COMPARE_AND_EXPIRE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('EXPIRE', KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Redis 协调存储
///
/// 基于自动重连的多路复用连接，所有命令共享同一个连接管理器。
pub struct RedisStore {
    conn: ConnectionManager,
    renew_script: redis::Script,
}

impl RedisStore {
    /// 建立连接并执行 PING 验证可用性
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| TaskManError::store_error(format!("创建Redis客户端失败: {e}")))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| TaskManError::store_error(format!("连接Redis失败: {e}")))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::store_err)?;
        if pong != "PONG" {
            return Err(TaskManError::store_error(format!("Redis PING 响应异常: {pong}")));
        }
        debug!("Redis连接就绪");

        Ok(Self {
            conn,
            renew_script: redis::Script::new(COMPARE_AND_EXPIRE_SCRIPT),
        })
    }

    fn store_err(e: redis::RedisError) -> TaskManError {
        TaskManError::store_error(e.to_string())
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(Self::store_err)?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(Self::store_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex(key, value, ttl.as_secs().max(1))
                .await
                .map_err(Self::store_err),
            None => conn.set(key, value).await.map_err(Self::store_err),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del(key).await.map_err(Self::store_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: bool = conn
            .expire(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(Self::store_err)
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: i64 = self
            .renew_script
            .key(key)
            .arg(expected)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::store_err)?;
        Ok(reply == 1)
    }

    async fn push_left(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush(key, value).await.map_err(Self::store_err)
    }

    async fn pop_right(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.rpop(key, None).await.map_err(Self::store_err)
    }

    async fn list_len(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.llen(key).await.map_err(Self::store_err)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd(key, member).await.map_err(Self::store_err)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.srem(key, member).await.map_err(Self::store_err)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(Self::store_err)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("KEYS")
            .arg(format!("{prefix}*"))
            .query_async(&mut conn)
            .await
            .map_err(Self::store_err)
    }
}
