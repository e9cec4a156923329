use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::processor::{CheckOutcome, UserProcessor};
use crate::config::Config;
use crate::db::{list_verified_users, Database};
use crate::hn::HnClient;
use crate::mailer::Mailer;

/// Per-cycle outcome counts, suitable for logging and metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    pub notified: usize,
    pub nothing_new: usize,
    pub transient_failures: usize,
    pub send_failures: usize,
    pub conflicts: usize,
    pub internal_errors: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Notified { .. } => self.notified += 1,
            CheckOutcome::NothingNew => self.nothing_new += 1,
            CheckOutcome::TransientFailure => self.transient_failures += 1,
            CheckOutcome::SendFailure => self.send_failures += 1,
            CheckOutcome::Conflict => self.conflicts += 1,
        }
    }
}

/// Batch runner: checks every verified subscriber once per cycle.
///
/// Holds no persistent state of its own; invoking it repeatedly is idempotent
/// because all per-user progress lives in the watermark.
pub struct AlertEngine {
    config: Config,
    db: Database,
    processor: UserProcessor,
    semaphore: Arc<Semaphore>,
}

impl AlertEngine {
    #[must_use]
    pub fn new(config: Config, db: Database, hn: HnClient, mailer: Arc<dyn Mailer>) -> Self {
        let processor = UserProcessor::new(&config, db.clone(), Arc::new(hn), mailer);
        let semaphore = Arc::new(Semaphore::new(config.worker_concurrency));
        Self {
            config,
            db,
            processor,
            semaphore,
        }
    }

    /// Run check cycles forever, sleeping `poll_interval` between them.
    pub async fn run_loop(&self) {
        loop {
            match self.run_cycle().await {
                Ok(summary) => {
                    info!(
                        users = summary.users,
                        notified = summary.notified,
                        nothing_new = summary.nothing_new,
                        transient_failures = summary.transient_failures,
                        send_failures = summary.send_failures,
                        conflicts = summary.conflicts,
                        internal_errors = summary.internal_errors,
                        "Alert cycle complete"
                    );
                }
                Err(e) => {
                    error!("Alert cycle error: {e:#}");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Run one cycle over all verified users.
    ///
    /// Users are processed in parallel under a bounded semaphore. One user's
    /// failure (or panic) never prevents the rest of the batch from running;
    /// it is tallied in the summary and retried naturally next cycle.
    ///
    /// # Errors
    ///
    /// Returns an error only if the user list itself cannot be loaded.
    pub async fn run_cycle(&self) -> Result<RunSummary> {
        let users = list_verified_users(self.db.pool()).await?;

        let mut summary = RunSummary {
            users: users.len(),
            ..RunSummary::default()
        };

        let mut handles = Vec::with_capacity(users.len());

        for user in users {
            let permit = self.semaphore.clone().acquire_owned().await?;
            let processor = self.processor.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                // The checkpoint is recorded before any fetch is issued; the
                // watermark never advances past it, so items created during
                // the fetch window cannot be skipped.
                let checkpoint = Utc::now();
                let username = user.hn_username.clone();
                (username, processor.process(&user, checkpoint).await)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((_, Ok(outcome))) => summary.record(outcome),
                Ok((username, Err(e))) => {
                    error!(user = %username, "Failed to process user: {e:#}");
                    summary.internal_errors += 1;
                }
                Err(e) => {
                    error!("User task panicked: {e}");
                    summary.internal_errors += 1;
                }
            }
        }

        Ok(summary)
    }
}
