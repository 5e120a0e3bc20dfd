use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::services::subscriptions;

const CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Background job that renews or expires subscriptions past their end date.
pub fn start_subscription_expiry_checker(pool: PgPool) -> tokio::task::JoinHandle<()> {
    info!("Starting subscription expiry checker background job");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECK_INTERVAL);

        loop {
            interval.tick().await;

            match subscriptions::process_expired(&pool, Utc::now().date_naive()).await {
                Ok(summary) if summary.failed > 0 => error!(
                    renewed = summary.renewed,
                    expired = summary.expired,
                    failed = summary.failed,
                    "some due subscriptions could not be processed"
                ),
                Ok(summary) if summary.renewed + summary.expired > 0 => info!(
                    renewed = summary.renewed,
                    expired = summary.expired,
                    "processed due subscriptions"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "failed to process expired subscriptions"),
            }
        }
    })
}
