use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};

use crate::executor::CheckExecutor;
use crate::model::{CheckDefinition, CheckId};
use crate::registry::{ScheduledTask, TaskRegistry};
use crate::store::DefinitionStore;

/// Checks firing more often than this are rejected outright.
pub const MIN_INTERVAL_SECONDS: u64 = 5;

// Grace period between scheduling a check and its first firing.
const INITIAL_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled,
    /// A task for this check already exists; scheduling is idempotent.
    AlreadyScheduled,
    /// The definition cannot be scheduled at all.
    Rejected(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnscheduleOutcome {
    Unscheduled,
    NotFound,
}

/// Owns the set of live periodic tasks, one per scheduled check.
pub struct CheckScheduler {
    store: Arc<dyn DefinitionStore>,
    executor: Arc<CheckExecutor>,
    registry: TaskRegistry,
    initial_delay: Duration,
}

impl CheckScheduler {
    pub fn new(store: Arc<dyn DefinitionStore>, executor: Arc<CheckExecutor>) -> Self {
        CheckScheduler {
            store,
            executor,
            registry: TaskRegistry::new(),
            initial_delay: INITIAL_DELAY,
        }
    }

    /// Shortens the fixed delay before a check's first firing.
    #[cfg(test)]
    fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Fetches every enabled target with its checks and schedules each one.
    /// Individual rejections are logged and skipped; the load never aborts
    /// as a whole. Returns the number of checks actually scheduled.
    pub async fn load_and_schedule_enabled(&self) -> usize {
        info!("Starting to schedule synthetic checks...");

        let targets = match self.store.list_enabled_targets_with_checks().await {
            Ok(targets) => targets,
            Err(e) => {
                error!("Failed to load check definitions: {}", e);
                return 0;
            }
        };
        info!("Found {} enabled targets to monitor.", targets.len());

        let mut scheduled = 0;
        for (target, checks) in targets {
            if checks.is_empty() {
                warn!("Target '{}' is enabled but has no checks.", target.name);
                continue;
            }
            for check in checks {
                if self.schedule(check) == ScheduleOutcome::Scheduled {
                    scheduled += 1;
                }
            }
        }
        info!("Successfully scheduled {} checks.", scheduled);
        scheduled
    }

    /// Begins periodic execution of the check: first firing after the fixed
    /// initial delay, then at the fixed rate of `interval_seconds`.
    pub fn schedule(&self, check: CheckDefinition) -> ScheduleOutcome {
        if check.interval_seconds < MIN_INTERVAL_SECONDS {
            warn!(
                "Check {} has an interval of {}s, below the minimum of {}s. Skipping.",
                check.id, check.interval_seconds, MIN_INTERVAL_SECONDS
            );
            return ScheduleOutcome::Rejected(format!(
                "interval of {}s is below the minimum of {}s",
                check.interval_seconds, MIN_INTERVAL_SECONDS
            ));
        }
        if self.registry.contains(check.id) {
            warn!("Check {} is already scheduled. Skipping.", check.id);
            return ScheduleOutcome::AlreadyScheduled;
        }

        let id = check.id;
        let target_name = check.target.name.clone();
        let interval = check.interval_seconds;
        if !self.registry.insert_if_absent(id, || self.spawn_task(check)) {
            // Lost a race with a concurrent schedule call for the same check.
            warn!("Check {} is already scheduled. Skipping.", id);
            return ScheduleOutcome::AlreadyScheduled;
        }

        info!(
            "Scheduled check {} for target '{}' to run every {} seconds.",
            id, target_name, interval
        );
        ScheduleOutcome::Scheduled
    }

    /// Cancels the check's periodic task. An in-flight probe is not
    /// interrupted and may still record one final result.
    pub fn unschedule(&self, check_id: CheckId) -> UnscheduleOutcome {
        match self.registry.remove(check_id) {
            Some(task) => {
                task.stop();
                info!("Unscheduled check {}.", check_id);
                UnscheduleOutcome::Unscheduled
            }
            None => {
                warn!(
                    "Could not unschedule check {}: it is not currently scheduled.",
                    check_id
                );
                UnscheduleOutcome::NotFound
            }
        }
    }

    /// Number of checks with a live periodic task.
    pub fn active_checks(&self) -> usize {
        self.registry.len()
    }

    /// Stops every scheduled task. Called once at process shutdown.
    pub fn shutdown(&self) {
        let tasks = self.registry.drain();
        let count = tasks.len();
        for (_, task) in tasks {
            task.stop();
        }
        info!("Stopped {} scheduled checks.", count);
    }

    fn spawn_task(&self, check: CheckDefinition) -> ScheduledTask {
        let executor = Arc::clone(&self.executor);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = Duration::from_secs(check.interval_seconds);
        let first_fire = Instant::now() + self.initial_delay;

        let handle = tokio::spawn(async move {
            // Fire times stay anchored at start + k * interval. The probe is
            // awaited inline, so firings of the same check never overlap; an
            // overrunning probe delays later firings, which then catch up
            // back to back.
            let mut ticks = time::interval_at(first_fire, period);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        debug!("Check {} timer stopped.", check.id);
                        break;
                    }
                    _ = ticks.tick() => {
                        executor.execute(&check).await;
                    }
                }
            }
        });
        ScheduledTask::new(handle, shutdown_tx)
    }
}
