use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::Semaphore;

use crate::model::{CheckDefinition, NewCheckResult};
use crate::probes::{self, ProbeOutcome};
use crate::store::ResultSink;

// Bounded timeout for the HTTP probe's full round trip.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs probes and records their outcomes. A firing can fail in many ways;
/// none of them escape this type as an error.
pub struct CheckExecutor {
    sink: Arc<dyn ResultSink>,
    client: reqwest::Client,
    // Fixed-size worker pool shared by all scheduled checks. Firings queue
    // here when more checks fire than there are slots.
    permits: Semaphore,
}

impl CheckExecutor {
    pub fn new(sink: Arc<dyn ResultSink>, pool_size: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(CheckExecutor {
            sink,
            client,
            permits: Semaphore::new(pool_size),
        })
    }

    /// Runs one probe for the check and hands the result to the sink.
    pub async fn execute(&self, check: &CheckDefinition) {
        let Ok(_permit) = self.permits.acquire().await else {
            // The semaphore is never closed.
            return;
        };
        info!(
            "Executing {} check {} for target '{}' ({})",
            check.check_type, check.id, check.target.name, check.target.address
        );

        let result = self.run_guarded(check).await;
        match self.sink.save(result).await {
            Ok(saved) => debug!(
                "Recorded result {} for check {} (success: {})",
                saved.id, check.id, saved.success
            ),
            Err(e) => error!("Failed to record result for check {}: {}", check.id, e),
        }
    }

    /// Runs the probe in its own task so nothing, not even a panic inside a
    /// probe, can escape into the caller's timer loop.
    async fn run_guarded(&self, check: &CheckDefinition) -> NewCheckResult {
        let timestamp = Utc::now();
        let started = Instant::now();

        let probe = {
            let client = self.client.clone();
            let check = check.clone();
            tokio::spawn(async move { probes::run(&client, &check).await })
        };
        let outcome = match probe.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Probe for check {} terminated abnormally: {}", check.id, e);
                ProbeOutcome::failed(format!("probe terminated abnormally: {}", e))
            }
        };

        NewCheckResult {
            check_id: check.id,
            timestamp,
            success: outcome.success,
            response_time_ms: started.elapsed().as_millis() as u64,
            status_code: outcome.status_code,
            error_message: outcome.error,
        }
    }
}
