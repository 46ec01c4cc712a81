mod leader_election;
mod queue_manager;
mod worker_registry;

pub use leader_election::LeaderElection;
pub use queue_manager::QueueManager;
pub use worker_registry::StoreWorkerRegistry;
