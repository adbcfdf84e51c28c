//! Outbound notification port

use async_trait::async_trait;

use crate::error::AppResult;

/// Fire-and-forget message delivery to a user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Sink that only writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!(to, subject, body, "Notification (email disabled)");
        Ok(())
    }
}
