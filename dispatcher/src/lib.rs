//! 调度层：只在持有 Leader 租约的副本上运行的调度循环，
//! 以及可插拔的负载均衡策略。

pub mod scheduler;
pub mod strategies;

pub use scheduler::{SchedulerService, SchedulerTiming};
pub use strategies::{
    make_load_balancer, ConsistentHashBalancer, LeastTaskBalancer, RoundRobinBalancer,
};
