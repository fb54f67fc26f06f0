use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::refresh_grant_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Clear refresh tokens whose stored expiry has passed
    async fn refresh_grant_sweep_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.token_sweep_interval_secs;
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;

            match tasks::sweep_expired_refresh_grants(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleared {} expired refresh tokens", count);
                    }
                }
                Err(e) => error!("Failed to sweep expired refresh tokens: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
