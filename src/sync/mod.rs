//! Vault sync orchestration: the daily scheduler, the per-vault task
//! queue, and the service that turns share balances into valued
//! snapshots.

pub mod queue;
pub mod scheduler;
pub mod service;

pub use queue::{
    run_worker, CollectingQueue, InProcessQueue, QueueError, RetryPolicy, TaskQueue, VaultSyncJob,
};
pub use scheduler::Scheduler;
pub use service::{SyncError, VaultSyncService};
