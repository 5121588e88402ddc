//! Durable task queue surface for per-vault sync fan-out.
//!
//! The orchestrator only depends on the [`TaskQueue`] trait; the
//! in-process implementation here drives a worker loop with bounded
//! retries and exponential backoff. Retries re-run the queued message
//! itself, so a retried task always carries its original snapshot date
//! and can never resurrect data across a later purge.

use crate::domain::{Address, Chain, SnapshotDate};
use crate::sync::service::VaultSyncService;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

/// Work item for syncing one vault's positions at one snapshot date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSyncJob {
    /// Message id, for log correlation across retries.
    pub id: Uuid,
    pub chain: Chain,
    pub vault_address: Address,
    pub snapshot_date: SnapshotDate,
    /// Pre-resolved block; workers resolve from the date when absent.
    pub block_number: Option<u64>,
}

impl VaultSyncJob {
    pub fn new(chain: Chain, vault_address: Address, snapshot_date: SnapshotDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain,
            vault_address,
            snapshot_date,
            block_number: None,
        }
    }
}

/// Retry policy applied per queued message.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task queue closed")]
    Closed,
}

/// Task queue the orchestrator fans per-vault work out onto.
#[async_trait]
pub trait TaskQueue: Send + Sync + std::fmt::Debug {
    async fn enqueue(&self, job: VaultSyncJob) -> Result<(), QueueError>;
}

/// In-process queue over an unbounded channel, drained by
/// [`run_worker`].
#[derive(Debug, Clone)]
pub struct InProcessQueue {
    tx: mpsc::UnboundedSender<VaultSyncJob>,
}

impl InProcessQueue {
    /// Create the queue and the receiver its worker drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VaultSyncJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskQueue for InProcessQueue {
    async fn enqueue(&self, job: VaultSyncJob) -> Result<(), QueueError> {
        self.tx.send(job).map_err(|_| QueueError::Closed)
    }
}

/// Test queue that records enqueued jobs instead of running them.
#[derive(Debug, Default)]
pub struct CollectingQueue {
    jobs: Mutex<Vec<VaultSyncJob>>,
}

impl CollectingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs enqueued so far.
    pub fn jobs(&self) -> Vec<VaultSyncJob> {
        self.jobs.lock().expect("queue lock poisoned").clone()
    }
}

#[async_trait]
impl TaskQueue for CollectingQueue {
    async fn enqueue(&self, job: VaultSyncJob) -> Result<(), QueueError> {
        self.jobs.lock().expect("queue lock poisoned").push(job);
        Ok(())
    }
}

/// Drain the queue, processing each job with bounded retries.
///
/// An exhausted job is abandoned with an error log: that vault is simply
/// missing from the cycle's data, which is an accepted degradation and
/// never fatal to sibling tasks.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<VaultSyncJob>,
    service: Arc<VaultSyncService>,
    policy: RetryPolicy,
) {
    while let Some(job) = rx.recv().await {
        process_with_retries(&service, &job, policy).await;
    }
}

async fn process_with_retries(service: &VaultSyncService, job: &VaultSyncJob, policy: RetryPolicy) {
    let attempts = AtomicU32::new(0);
    let backoff = ExponentialBackoff {
        initial_interval: policy.base_delay,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    };

    let result = retry(backoff, || async {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match service.process_vault_sync(job).await {
            Ok(()) => Ok(()),
            Err(e) if attempt >= policy.attempts => Err(backoff::Error::permanent(e)),
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    vault = %job.vault_address,
                    chain = %job.chain,
                    attempt,
                    "vault sync attempt failed, will retry: {}",
                    e
                );
                Err(backoff::Error::transient(e))
            }
        }
    })
    .await;

    if let Err(e) = result {
        error!(
            job_id = %job.id,
            vault = %job.vault_address,
            chain = %job.chain,
            attempts = policy.attempts,
            "vault sync task abandoned: {}",
            e
        );
    }
}
