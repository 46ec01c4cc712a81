use std::sync::Arc;
use std::time::Duration;

use taskman_core::{CoordinationStore, Result, TaskManError};

const LEADER_KEY: &str = "scheduler:leader";

/// Leader 选举
///
/// 单个租约键上的抢占式选举：`set_if_absent` 抢锁，持有期间周期性
/// 续约，续约失败即视为失去领导权。任一时刻最多只有一个副本自认
/// 为 Leader（续约与判定在存储端单次往返内原子完成）。
pub struct LeaderElection {
    store: Arc<dyn CoordinationStore>,
    scheduler_id: String,
    leader_ttl: Duration,
}

impl LeaderElection {
    pub fn new(store: Arc<dyn CoordinationStore>, scheduler_id: String, leader_ttl: Duration) -> Self {
        Self {
            store,
            scheduler_id,
            leader_ttl,
        }
    }

    pub fn scheduler_id(&self) -> &str {
        &self.scheduler_id
    }

    /// 尝试获取 Leader 锁，返回是否抢占成功
    pub async fn try_acquire(&self) -> Result<bool> {
        self.store
            .set_if_absent(LEADER_KEY, &self.scheduler_id, self.leader_ttl)
            .await
    }

    /// 续约 Leader 锁。值不匹配（锁已易主或过期）返回 `LeadershipLost`，
    /// 存储故障原样返回，调用方据此区分两种情况。
    pub async fn renew(&self) -> Result<()> {
        let renewed = self
            .store
            .compare_and_expire(LEADER_KEY, &self.scheduler_id, self.leader_ttl)
            .await?;
        if renewed {
            Ok(())
        } else {
            Err(TaskManError::LeadershipLost)
        }
    }

    /// 释放 Leader 锁，仅在锁仍属于自己时删除
    pub async fn release(&self) -> Result<()> {
        if let Some(current) = self.store.get(LEADER_KEY).await? {
            if current == self.scheduler_id {
                self.store.delete(LEADER_KEY).await?;
            }
        }
        Ok(())
    }

    /// 观察自己是否是当前 Leader，存储故障按否处理
    pub async fn is_leader(&self) -> bool {
        matches!(
            self.store.get(LEADER_KEY).await,
            Ok(Some(ref current)) if *current == self.scheduler_id
        )
    }

    /// 获取当前 Leader 的副本ID
    pub async fn current_leader(&self) -> Result<Option<String>> {
        self.store.get(LEADER_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn election(store: &Arc<MemoryStore>, id: &str, ttl: Duration) -> LeaderElection {
        LeaderElection::new(store.clone() as Arc<dyn CoordinationStore>, id.to_string(), ttl)
    }

    #[tokio::test]
    async fn test_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let a = election(&store, "replica-a", Duration::from_secs(10));
        let b = election(&store, "replica-b", Duration::from_secs(10));

        assert!(a.try_acquire().await.unwrap());
        assert!(!b.try_acquire().await.unwrap());
        assert!(a.is_leader().await);
        assert!(!b.is_leader().await);
        assert_eq!(
            a.current_leader().await.unwrap(),
            Some("replica-a".to_string())
        );
    }

    #[tokio::test]
    async fn test_renew_only_by_owner() {
        let store = Arc::new(MemoryStore::new());
        let a = election(&store, "replica-a", Duration::from_secs(10));
        let b = election(&store, "replica-b", Duration::from_secs(10));

        a.try_acquire().await.unwrap();
        assert!(a.renew().await.is_ok());
        assert!(matches!(
            b.renew().await.unwrap_err(),
            TaskManError::LeadershipLost
        ));
    }

    #[tokio::test]
    async fn test_release_then_reacquire() {
        let store = Arc::new(MemoryStore::new());
        let a = election(&store, "replica-a", Duration::from_secs(10));
        let b = election(&store, "replica-b", Duration::from_secs(10));

        a.try_acquire().await.unwrap();
        a.release().await.unwrap();
        assert!(b.try_acquire().await.unwrap());

        // 非持有者的 release 不会误删他人的锁
        a.release().await.unwrap();
        assert!(b.is_leader().await);
    }

    #[tokio::test]
    async fn test_takeover_after_ttl_expiry() {
        let store = Arc::new(MemoryStore::new());
        let a = election(&store, "replica-a", Duration::from_millis(30));
        let b = election(&store, "replica-b", Duration::from_secs(10));

        assert!(a.try_acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        // 租约过期后另一副本接管，原 Leader 续约失败
        assert!(b.try_acquire().await.unwrap());
        assert!(matches!(
            a.renew().await.unwrap_err(),
            TaskManError::LeadershipLost
        ));
    }
}
