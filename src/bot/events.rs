use serenity::{
    async_trait,
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::ChannelId,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    audio::notify::{Notification, Notifier},
    ui::embeds,
};

/// Publica los avisos del reproductor en el canal de texto de la guild
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn notification_embed(notification: &Notification) -> CreateEmbed {
    match notification {
        Notification::NowPlaying(track) => embeds::create_now_playing_embed(track),
        Notification::PlaybackFailed { track, reason } => embeds::create_playback_failed_embed(track, reason),
        Notification::QueueFinished => embeds::create_queue_finished_embed(),
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, channel_id: ChannelId, notification: Notification) {
        debug!("📨 Aviso para canal {}: {:?}", channel_id, notification);

        let message = CreateMessage::new().embed(notification_embed(&notification));
        if let Err(e) = channel_id.send_message(&self.http, message).await {
            // Sin permisos de escritura o canal borrado: la reproducción sigue igual
            warn!("No se pudo enviar aviso al canal {}: {:?}", channel_id, e);
        }
    }
}
