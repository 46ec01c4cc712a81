//! 测试工具：领域实体构建器

mod builders;

pub use builders::{TaskBuilder, TaskConfigBuilder, WorkerBuilder};
