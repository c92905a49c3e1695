use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::{
    controller::{self, GuildCommand, PlayOutcome, PlayerContext, PlayerStatus, SkipOutcome, StopOutcome},
    queue::QueueRegistry,
    voice::VoiceSession,
};
use crate::{error::MusicError, sources::TrackResolver};

/// Punto de entrada de los comandos de música.
///
/// Resuelve las pistas fuera de los controladores (la búsqueda puede tardar
/// segundos y no debe frenar a nadie) y después entrega cada pedido al
/// buzón de su guild. Los controladores se crean al primer uso.
pub struct AudioPlayer<V: VoiceSession> {
    ctx: PlayerContext<V>,
    resolver: Arc<dyn TrackResolver>,
    queues: QueueRegistry,
    controllers: DashMap<GuildId, mpsc::UnboundedSender<GuildCommand>>,
}

impl<V: VoiceSession> AudioPlayer<V> {
    pub fn new(ctx: PlayerContext<V>, resolver: Arc<dyn TrackResolver>) -> Self {
        Self {
            ctx,
            resolver,
            queues: QueueRegistry::new(),
            controllers: DashMap::new(),
        }
    }

    /// Resuelve `query` y lo reproduce o lo encola en la guild
    pub async fn play(
        &self,
        guild_id: GuildId,
        requested_by: UserId,
        query: &str,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<PlayOutcome, MusicError> {
        // Si esto falla no se toca ni la conexión ni la cola
        let track = self.resolver.resolve(query, requested_by).await?;
        info!("🎶 Pista resuelta para guild {}: {}", guild_id, track.title());

        self.request(guild_id, |reply| GuildCommand::Play {
            track,
            voice_channel,
            text_channel,
            reply,
        })
        .await?
    }

    /// Salta la pista actual
    pub async fn skip(&self, guild_id: GuildId) -> Result<SkipOutcome, MusicError> {
        self.request(guild_id, |reply| GuildCommand::Skip { reply }).await
    }

    /// Detiene, limpia la cola y desconecta
    pub async fn stop(&self, guild_id: GuildId) -> Result<StopOutcome, MusicError> {
        self.request(guild_id, |reply| GuildCommand::Stop { reply }).await
    }

    /// Pista actual y pendientes
    pub async fn status(&self, guild_id: GuildId) -> Result<PlayerStatus, MusicError> {
        self.request(guild_id, |reply| GuildCommand::Status { reply }).await
    }

    /// Cambio de estado de voz del propio bot
    pub fn voice_state_changed(&self, guild_id: GuildId, in_channel: bool) {
        let command = if in_channel {
            GuildCommand::VoiceActive
        } else {
            GuildCommand::VoiceLost
        };
        if self.mailbox(guild_id).send(command).is_err() {
            debug!("Buzón de guild {} cerrado", guild_id);
        }
    }

    #[cfg(test)]
    pub fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    async fn request<T>(
        &self,
        guild_id: GuildId,
        build: impl FnOnce(oneshot::Sender<T>) -> GuildCommand,
    ) -> Result<T, MusicError> {
        let (reply, response) = oneshot::channel();
        self.mailbox(guild_id)
            .send(build(reply))
            .map_err(|_| MusicError::Unavailable)?;
        response.await.map_err(|_| MusicError::Unavailable)
    }

    fn mailbox(&self, guild_id: GuildId) -> mpsc::UnboundedSender<GuildCommand> {
        self.controllers
            .entry(guild_id)
            .or_insert_with(|| controller::spawn(guild_id, self.queues.get(guild_id), self.ctx.clone()))
            .clone()
    }
}
