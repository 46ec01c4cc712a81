use async_trait::async_trait;
use std::time::Duration;

use crate::errors::Result;

/// 协调存储抽象接口
///
/// 领导者选举、队列与 Worker 注册表都建立在这组原语之上。
/// 实现方可以是 Redis，也可以是用于嵌入模式和测试的内存实现。
///
/// 约定：
/// - 所有列表操作遵循 LPUSH/RPOP 语义，即列表内部先进先出；
/// - `pop_right` 在队列为空时返回 `Ok(None)`，而不是错误；
/// - 存储本身不可用时统一返回 `TaskManError::StoreUnavailable`。
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// 键不存在时原子写入并设置过期时间，返回是否写入成功
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键值，`ttl` 为 None 时不设置过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// 重新设置键的过期时间
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// 原子比较并续期：仅当键的当前值等于 `expected` 时延长过期时间。
    /// 返回 false 表示键不存在或值不匹配。
    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool>;

    async fn push_left(&self, key: &str, value: &str) -> Result<()>;

    async fn pop_right(&self, key: &str) -> Result<Option<String>>;

    async fn list_len(&self, key: &str) -> Result<i64>;

    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// 按前缀枚举键（尽力而为，仅用于 Worker 全量列表）
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>>;
}
