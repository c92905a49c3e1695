use async_trait::async_trait;
use serenity::model::id::ChannelId;

use super::track::Track;

/// Mensajes de seguimiento que el controlador publica en el canal de texto
/// desde el que se pidió la música.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    NowPlaying(Track),
    PlaybackFailed { track: Track, reason: String },
    QueueFinished,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel_id: ChannelId, notification: Notification);
}
