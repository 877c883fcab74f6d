//! Scheduled Jobs
//!
//! Background maintenance for the PostgreSQL backend.

use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;

// =========================================================================
// Expired Session Cleanup
// =========================================================================

/// Delete bearer sessions whose expiry has passed.
/// Expired sessions are already rejected on lookup; this only bounds growth.
pub async fn delete_expired_sessions(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE expires_at <= NOW()
        "#,
    )
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Deleted expired sessions");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for expired session cleanup (default: 5 minutes)
    pub session_cleanup_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            session_cleanup_interval: Duration::from_secs(300),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut session_interval = interval(self.config.session_cleanup_interval);

        loop {
            session_interval.tick().await;
            if let Err(e) = delete_expired_sessions(&self.pool).await {
                tracing::error!(error = %e, "Session cleanup failed");
            }
        }
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
