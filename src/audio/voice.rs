use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;
use tracing::debug;

use super::{controller::GuildCommand, track::Track};
use crate::error::MusicError;

/// Primitiva de conexión de voz de la plataforma.
///
/// Solo el `PlaybackController` de cada guild llama a estos métodos; nada
/// más debe reproducir, detener o desconectar por su cuenta.
#[async_trait]
pub trait VoiceSession: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Self::Handle, MusicError>;

    async fn move_to(&self, handle: &Self::Handle, channel_id: ChannelId) -> Result<(), MusicError>;

    async fn current_channel(&self, handle: &Self::Handle) -> Option<ChannelId>;

    /// Entrega la pista al driver y vuelve sin esperar búsquedas de red ni
    /// la preparación del stream. `on_complete` debe dispararse una sola vez
    /// cuando la pista termina o se detiene. Un fallo posterior a la entrega
    /// llega por ahí con `Some(motivo)`.
    async fn play(
        &self,
        handle: &Self::Handle,
        track: &Track,
        on_complete: CompletionSignal,
    ) -> Result<(), MusicError>;

    async fn stop(&self, handle: &Self::Handle);

    async fn is_playing(&self, handle: &Self::Handle) -> bool;

    async fn is_paused(&self, handle: &Self::Handle) -> bool;

    async fn is_connected(&self, handle: &Self::Handle) -> bool;

    async fn disconnect(&self, handle: &Self::Handle) -> Result<(), MusicError>;
}

/// Aviso de fin de pista.
///
/// Se invoca desde el contexto del driver de audio, no desde la tarea del
/// controlador, así que lo único que hace es dejar un mensaje en el buzón
/// de la guild.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    mailbox: mpsc::UnboundedSender<GuildCommand>,
    playback_id: u64,
}

impl CompletionSignal {
    pub(crate) fn new(mailbox: mpsc::UnboundedSender<GuildCommand>, playback_id: u64) -> Self {
        Self {
            mailbox,
            playback_id,
        }
    }

    pub fn playback_id(&self) -> u64 {
        self.playback_id
    }

    /// `error` es `Some` si el stream murió por un fallo
    pub fn fire(&self, error: Option<String>) {
        let sent = self.mailbox.send(GuildCommand::PlaybackFinished {
            playback_id: self.playback_id,
            error,
        });
        if sent.is_err() {
            debug!("Buzón cerrado, se descarta fin de pista {}", self.playback_id);
        }
    }
}
