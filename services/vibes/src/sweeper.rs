//! Periodic expiry of vibes whose timer has run out

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::lifecycle::VibeLifecycle;

/// Start the expiry job on `schedule` (six-field cron, seconds first)
///
/// The returned scheduler must be kept alive for the job to keep running.
pub async fn start_expiry_sweep(lifecycle: VibeLifecycle, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let lifecycle = lifecycle.clone();
        Box::pin(async move {
            match lifecycle.sweep(Utc::now()).await {
                Ok(0) => {}
                Ok(expired) => info!("Expiry sweep expired {} vibes", expired),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started vibe expiry sweep with schedule: {}", schedule);
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryVibeRepository;
    use std::sync::Arc;

    #[tokio::test]
    async fn rejects_malformed_schedules() {
        let lifecycle = VibeLifecycle::new(Arc::new(MemoryVibeRepository::new()));
        assert!(start_expiry_sweep(lifecycle, "not a cron").await.is_err());
    }
}
