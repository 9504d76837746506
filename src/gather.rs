//! Gather orchestrator: one concurrent fetch per configured target.
//!
//! With no targets configured, a single local fetch runs in the caller's task
//! and its error is the cycle's error. With targets configured, one task per
//! target is spawned; each failure is reported to the sink independently and
//! cancels nothing, and the cycle returns only after every task has joined.

use std::sync::Arc;
use tokio::task::JoinSet;

use crate::fetcher::{FetchError, Fetcher};
use crate::sink::Accumulator;

/// Fatal poll-cycle errors. Per-target subprocess failures in multi-target
/// mode are reported through [`Accumulator::add_error`] instead.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("ipmitool not found: verify that ipmitool is installed and that ipmitool is in your PATH")]
    MissingExecutable,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Drives one poll cycle across all configured targets.
#[derive(Clone)]
pub struct Gatherer {
    fetcher: Fetcher,
    targets: Vec<String>,
}

impl Gatherer {
    pub fn new(fetcher: Fetcher, targets: Vec<String>) -> Self {
        Self { fetcher, targets }
    }

    /// Runs one complete gather cycle.
    ///
    /// Returns `Ok` in multi-target mode even when individual targets failed,
    /// provided each failure was handed to the sink. No subprocess is
    /// attempted when the executable path is unknown.
    pub async fn gather(&self, acc: Arc<dyn Accumulator>) -> Result<(), GatherError> {
        if self.fetcher.path.is_empty() {
            return Err(GatherError::MissingExecutable);
        }

        if self.targets.is_empty() {
            self.fetcher.fetch(acc.as_ref(), "").await?;
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for target in &self.targets {
            let fetcher = self.fetcher.clone();
            let acc = Arc::clone(&acc);
            let target = target.clone();
            tasks.spawn(async move {
                if let Err(err) = fetcher.fetch(acc.as_ref(), &target).await {
                    acc.add_error(&err);
                }
            });
        }

        // Wait for every fetch before the cycle completes.
        while tasks.join_next().await.is_some() {}

        Ok(())
    }
}
