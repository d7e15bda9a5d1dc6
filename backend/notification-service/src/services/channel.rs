/// Outbound delivery transports (push, email)
///
/// Real FCM/APNs/SMTP clients implement [`ChannelSender`]; the worker binary
/// ships with [`LoggingChannelSender`].
use crate::error::{AppError, AppResult};
use crate::models::{Channel, Notification};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Failures are reported, never fatal to the dispatch pipeline
    async fn send(
        &self,
        user_id: &str,
        channel: Channel,
        notification: &Notification,
    ) -> AppResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct LoggingChannelSender;

#[async_trait]
impl ChannelSender for LoggingChannelSender {
    async fn send(
        &self,
        user_id: &str,
        channel: Channel,
        notification: &Notification,
    ) -> AppResult<()> {
        if channel == Channel::InApp {
            return Err(AppError::invalid("in-app delivery is the stored record"));
        }
        info!(
            user_id = %user_id,
            channel = %channel,
            notification_id = %notification.id,
            title = %notification.title,
            "Notification sent"
        );
        Ok(())
    }
}
