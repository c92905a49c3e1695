//! Per-guild playback state machine.
//!
//! Every guild gets one [`PlaybackController`] running in its own tokio task.
//! Commands, completion callbacks from the audio driver, voice-state signals
//! and timers all arrive as [`GuildCommand`] messages on the guild's mailbox,
//! so controller state is only ever touched from that task.
//!
//! The playback state (`Idle` / `Playing` / `Advancing`) is not stored. It is
//! derived from what the [`VoiceSession`] reports plus queue emptiness;
//! `Advancing` is simply the controller handling a `PlaybackFinished`
//! message. The only bookkeeping kept is the id of the playback that was
//! last started, used to discard completion messages for tracks the
//! controller already moved past.

use chrono::Utc;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{
    notify::{Notification, Notifier},
    queue::GuildQueue,
    track::Track,
    voice::{CompletionSignal, VoiceSession},
};
use crate::{
    error::MusicError,
    history::{HistoryAction, HistoryEntry, HistorySink},
};

/// Mensajes del buzón de una guild
#[derive(Debug)]
pub enum GuildCommand {
    Play {
        track: Track,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        reply: oneshot::Sender<Result<PlayOutcome, MusicError>>,
    },
    Skip {
        reply: oneshot::Sender<SkipOutcome>,
    },
    Stop {
        reply: oneshot::Sender<StopOutcome>,
    },
    Status {
        reply: oneshot::Sender<PlayerStatus>,
    },
    /// Enviado por el driver de audio al terminar una pista
    PlaybackFinished {
        playback_id: u64,
        error: Option<String>,
    },
    /// La conexión de voz del bot pasó a un canal activo
    VoiceActive,
    /// La plataforma informa que el bot salió del canal de voz
    VoiceLost,
    GraceElapsed {
        epoch: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    NowPlaying(Track),
    Queued { track: Track, position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Se detuvo la pista; el aviso de fin arranca la siguiente
    Skipped(Track),
    /// No sonaba nada pero había cola: se arrancó directamente
    Restarted(Track),
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    pub cleared: usize,
    pub was_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    pub now_playing: Option<Track>,
    pub pending: Vec<Track>,
    pub connected: bool,
}

/// Dependencias compartidas por todos los controladores
pub struct PlayerContext<V: VoiceSession> {
    pub voice: Arc<V>,
    pub notifier: Arc<dyn Notifier>,
    pub history: Arc<dyn HistorySink>,
    pub idle_grace: Duration,
}

impl<V: VoiceSession> Clone for PlayerContext<V> {
    fn clone(&self) -> Self {
        Self {
            voice: self.voice.clone(),
            notifier: self.notifier.clone(),
            history: self.history.clone(),
            idle_grace: self.idle_grace,
        }
    }
}

struct CurrentTrack {
    playback_id: u64,
    track: Track,
}

enum Advance {
    Started(Track),
    Drained { last_failure: Option<MusicError> },
}

pub struct PlaybackController<V: VoiceSession> {
    guild_id: GuildId,
    ctx: PlayerContext<V>,
    queue: Arc<GuildQueue>,
    mailbox: mpsc::WeakUnboundedSender<GuildCommand>,
    history: mpsc::UnboundedSender<HistoryEntry>,
    connection: Option<V::Handle>,
    text_channel: Option<ChannelId>,
    current: Option<CurrentTrack>,
    next_playback_id: u64,
    grace_epoch: u64,
}

/// Lanza el controlador de una guild y devuelve su buzón
pub fn spawn<V: VoiceSession>(
    guild_id: GuildId,
    queue: Arc<GuildQueue>,
    ctx: PlayerContext<V>,
) -> mpsc::UnboundedSender<GuildCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    let history = spawn_history_writer(guild_id, ctx.history.clone());
    let controller = PlaybackController {
        guild_id,
        ctx,
        queue,
        mailbox: tx.downgrade(),
        history,
        connection: None,
        text_channel: None,
        current: None,
        next_playback_id: 1,
        grace_epoch: 0,
    };
    tokio::spawn(controller.run(rx));
    tx
}

/// Escritor de historial de la guild. Un solo consumidor mantiene las
/// entradas en el orden en que se registraron.
fn spawn_history_writer(guild_id: GuildId, sink: Arc<dyn HistorySink>) -> mpsc::UnboundedSender<HistoryEntry> {
    let (tx, mut rx) = mpsc::unbounded_channel::<HistoryEntry>();
    tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            if let Err(e) = sink.append(entry).await {
                warn!("⚠️ No se pudo guardar el historial de guild {}: {:?}", guild_id, e);
            }
        }
    });
    tx
}

impl<V: VoiceSession> PlaybackController<V> {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<GuildCommand>) {
        info!("🎛️ Controlador de reproducción iniciado para guild {}", self.guild_id);

        while let Some(command) = inbox.recv().await {
            self.handle(command).await;
        }

        debug!("Buzón de guild {} cerrado", self.guild_id);
    }

    async fn handle(&mut self, command: GuildCommand) {
        match command {
            GuildCommand::Play {
                track,
                voice_channel,
                text_channel,
                reply,
            } => {
                let outcome = self.play(track, voice_channel, text_channel).await;
                let _ = reply.send(outcome);
            }
            GuildCommand::Skip { reply } => {
                let outcome = self.skip().await;
                let _ = reply.send(outcome);
            }
            GuildCommand::Stop { reply } => {
                let outcome = self.stop().await;
                let _ = reply.send(outcome);
            }
            GuildCommand::Status { reply } => {
                let status = self.status().await;
                let _ = reply.send(status);
            }
            GuildCommand::PlaybackFinished { playback_id, error } => {
                self.on_playback_finished(playback_id, error).await
            }
            GuildCommand::VoiceActive => self.on_voice_active().await,
            GuildCommand::VoiceLost => self.on_voice_lost().await,
            GuildCommand::GraceElapsed { epoch } => self.on_grace_elapsed(epoch).await,
        }
    }

    async fn play(
        &mut self,
        track: Track,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<PlayOutcome, MusicError> {
        // Sin conexión no se toca la cola
        let handle = self.ensure_connected(voice_channel).await?;
        self.text_channel = Some(text_channel);
        self.grace_epoch += 1;

        let position = self.queue.enqueue(track.clone());
        self.record(&track, HistoryAction::Queued);

        if self.is_active(&handle).await {
            info!("📋 En cola (posición {}) en guild {}: {}", position, self.guild_id, track.title());
            return Ok(PlayOutcome::Queued { track, position });
        }

        match self.advance(&handle).await {
            Advance::Started(started) => Ok(PlayOutcome::NowPlaying(started)),
            Advance::Drained { last_failure } => Err(last_failure.unwrap_or(MusicError::PlaybackStart {
                title: track.title().to_string(),
                reason: "la cola se vació antes de empezar".into(),
            })),
        }
    }

    async fn skip(&mut self) -> SkipOutcome {
        let Some(handle) = self.connection.clone() else {
            return SkipOutcome::Idle;
        };

        if self.is_active(&handle).await {
            if let Some(skipped) = self.current.as_ref().map(|c| c.track.clone()) {
                info!("⏭️ Saltando en guild {}: {}", self.guild_id, skipped.title());
                // El aviso de fin de esta pista es el que avanza la cola
                self.ctx.voice.stop(&handle).await;
                return SkipOutcome::Skipped(skipped);
            }
        }

        if self.queue.is_empty() {
            return SkipOutcome::Idle;
        }

        warn!(
            "⚠️ Nada sonando pero hay cola en guild {}, avanzando directamente",
            self.guild_id
        );
        match self.advance(&handle).await {
            Advance::Started(track) => {
                self.announce(Notification::NowPlaying(track.clone())).await;
                SkipOutcome::Restarted(track)
            }
            Advance::Drained { .. } => SkipOutcome::Idle,
        }
    }

    async fn stop(&mut self) -> StopOutcome {
        let cleared = self.queue.clear();
        // El aviso de fin que dispara `stop` queda obsoleto
        self.current = None;
        self.grace_epoch += 1;

        let was_connected = match self.connection.take() {
            Some(handle) => {
                self.ctx.voice.stop(&handle).await;
                if let Err(e) = self.ctx.voice.disconnect(&handle).await {
                    warn!("Error al desconectar en guild {}: {}", self.guild_id, e);
                }
                true
            }
            None => false,
        };

        info!("⏹️ Reproducción detenida en guild {} ({} pistas descartadas)", self.guild_id, cleared);
        StopOutcome {
            cleared,
            was_connected,
        }
    }

    async fn status(&self) -> PlayerStatus {
        let (connected, now_playing) = match &self.connection {
            Some(handle) => {
                let now_playing = if self.is_active(handle).await {
                    self.current.as_ref().map(|c| c.track.clone())
                } else {
                    None
                };
                (self.ctx.voice.is_connected(handle).await, now_playing)
            }
            None => (false, None),
        };

        PlayerStatus {
            now_playing,
            pending: self.queue.snapshot(),
            connected,
        }
    }

    async fn on_playback_finished(&mut self, playback_id: u64, error: Option<String>) {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|c| c.playback_id == playback_id);
        if !is_current {
            debug!(
                "Fin de reproducción {} obsoleto en guild {}, ignorado",
                playback_id, self.guild_id
            );
            return;
        }

        let Some(finished) = self.current.take() else {
            return;
        };
        debug!("🎵 Terminó en guild {}: {}", self.guild_id, finished.track.title());

        if let Some(reason) = error {
            error!(
                "❌ Stream falló en guild {} ({}): {}",
                self.guild_id,
                finished.track.title(),
                reason
            );
            self.announce(Notification::PlaybackFailed {
                track: finished.track,
                reason,
            })
            .await;
        }

        let Some(handle) = self.connection.clone() else {
            return;
        };
        if let Advance::Started(track) = self.advance(&handle).await {
            self.announce(Notification::NowPlaying(track)).await;
        }
    }

    async fn on_voice_active(&mut self) {
        let Some(handle) = self.connection.clone() else {
            debug!("Voz activa en guild {} sin conexión propia", self.guild_id);
            return;
        };
        if self.is_active(&handle).await {
            return;
        }

        if !self.queue.is_empty() {
            info!("🔄 Voz activa sin reproducción en guild {}, retomando cola", self.guild_id);
            if let Advance::Started(track) = self.advance(&handle).await {
                self.announce(Notification::NowPlaying(track)).await;
            }
            return;
        }

        self.grace_epoch += 1;
        let epoch = self.grace_epoch;
        let grace = self.ctx.idle_grace;
        if let Some(mailbox) = self.mailbox.upgrade() {
            debug!("⏳ Esperando {:?} antes de desconectar guild {}", grace, self.guild_id);
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                let _ = mailbox.send(GuildCommand::GraceElapsed { epoch });
            });
        }
    }

    async fn on_grace_elapsed(&mut self, epoch: u64) {
        if epoch != self.grace_epoch {
            debug!("Espera de inactividad {} superada en guild {}", epoch, self.guild_id);
            return;
        }
        let Some(handle) = self.connection.clone() else {
            return;
        };
        // Pudo volver a sonar mientras tanto
        if self.is_active(&handle).await {
            return;
        }
        if !self.queue.is_empty() {
            if let Advance::Started(track) = self.advance(&handle).await {
                self.announce(Notification::NowPlaying(track)).await;
            }
            return;
        }

        info!("💤 Sin actividad en guild {}, desconectando", self.guild_id);
        self.disconnect(&handle).await;
    }

    async fn on_voice_lost(&mut self) {
        let Some(handle) = self.connection.clone() else {
            return;
        };
        // Puede ser el eco de una desconexión anterior
        if self.ctx.voice.is_connected(&handle).await {
            debug!("Guild {} sigue conectada, se ignora la salida de voz", self.guild_id);
            return;
        }

        warn!("🔌 Bot desconectado del canal de voz en guild {}", self.guild_id);
        self.connection = None;
        self.current = None;
        self.ctx.voice.stop(&handle).await;
        self.queue.clear();
    }

    /// Saca pistas hasta que una arranque o la cola se vacíe. Cada intento
    /// fallido consume una pista, así que el bucle termina siempre.
    async fn advance(&mut self, handle: &V::Handle) -> Advance {
        self.current = None;
        let mut last_failure = None;

        let Some(mailbox) = self.mailbox.upgrade() else {
            warn!("Buzón de guild {} cerrado, no se puede avanzar", self.guild_id);
            return Advance::Drained { last_failure };
        };

        while let Some(track) = self.queue.dequeue_front() {
            let playback_id = self.next_playback_id;
            self.next_playback_id += 1;

            let signal = CompletionSignal::new(mailbox.clone(), playback_id);
            match self.ctx.voice.play(handle, &track, signal).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
                    self.record(&track, HistoryAction::Played);
                    self.current = Some(CurrentTrack {
                        playback_id,
                        track: track.clone(),
                    });
                    return Advance::Started(track);
                }
                Err(e) => {
                    error!(
                        "❌ No se pudo iniciar {} en guild {}: {}",
                        track.title(),
                        self.guild_id,
                        e
                    );
                    let reason = match &e {
                        MusicError::PlaybackStart { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    self.announce(Notification::PlaybackFailed { track, reason }).await;
                    last_failure = Some(e);
                }
            }
        }

        self.disconnect(handle).await;
        self.announce(Notification::QueueFinished).await;
        Advance::Drained { last_failure }
    }

    async fn ensure_connected(&mut self, channel_id: ChannelId) -> Result<V::Handle, MusicError> {
        if let Some(handle) = self.connection.clone() {
            if self.ctx.voice.is_connected(&handle).await {
                if self.ctx.voice.current_channel(&handle).await != Some(channel_id) {
                    info!("🔀 Moviendo conexión de guild {} al canal {}", self.guild_id, channel_id);
                    self.ctx.voice.move_to(&handle, channel_id).await?;
                }
                return Ok(handle);
            }

            warn!("🔌 Conexión de voz obsoleta en guild {}, reconectando", self.guild_id);
            self.connection = None;
            self.current = None;
        }

        let handle = self.ctx.voice.connect(self.guild_id, channel_id).await?;
        info!("🔊 Conectado al canal {} en guild {}", channel_id, self.guild_id);
        self.connection = Some(handle.clone());
        Ok(handle)
    }

    async fn disconnect(&mut self, handle: &V::Handle) {
        self.connection = None;
        self.current = None;
        match self.ctx.voice.disconnect(handle).await {
            Ok(()) => info!("👋 Desconectado del canal de voz en guild {}", self.guild_id),
            Err(e) => warn!("Error al desconectar en guild {}: {}", self.guild_id, e),
        }
    }

    /// Hay reproducción en curso según la plataforma
    async fn is_active(&self, handle: &V::Handle) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.ctx.voice.is_playing(handle).await || self.ctx.voice.is_paused(handle).await
    }

    async fn announce(&self, notification: Notification) {
        match self.text_channel {
            Some(channel_id) => self.ctx.notifier.notify(channel_id, notification).await,
            None => debug!("Guild {} sin canal de texto para avisos", self.guild_id),
        }
    }

    fn record(&self, track: &Track, action: HistoryAction) {
        let entry = HistoryEntry {
            guild_id: self.guild_id.get(),
            user_id: track.requested_by().get(),
            title: track.title().to_string(),
            stream_locator: track.stream_locator().to_string(),
            action,
            timestamp: Utc::now(),
        };
        if self.history.send(entry).is_err() {
            debug!("Escritor de historial de guild {} cerrado", self.guild_id);
        }
    }
}
