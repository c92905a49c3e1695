//! Fakes compartidos por los tests del reproductor.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;

use super::{
    notify::{Notification, Notifier},
    track::Track,
    voice::{CompletionSignal, VoiceSession},
};
use crate::{
    error::MusicError,
    history::{HistoryEntry, HistorySink},
};

#[derive(Default)]
pub struct FakeVoiceState {
    pub connects: usize,
    pub moves: Vec<ChannelId>,
    pub disconnects: usize,
    pub stops: usize,
    pub play_attempts: Vec<String>,
    pub channel: Option<ChannelId>,
    pub connected: bool,
    session: u64,
    playing: Option<(String, CompletionSignal)>,
}

/// Conexiones de voz en memoria, una por guild. Igual que songbird, `stop`
/// dispara el aviso de fin de la pista detenida.
///
/// Los helpers sin guild explícita operan sobre [`FakeVoice::GUILD`].
#[derive(Default)]
pub struct FakeVoice {
    guilds: Mutex<HashMap<GuildId, FakeVoiceState>>,
    failing: Mutex<HashSet<String>>,
    refuse_connect: Mutex<bool>,
    refuse_move: Mutex<bool>,
    preparation: Mutex<Option<Duration>>,
}

impl FakeVoice {
    pub const GUILD: GuildId = GuildId::new(1);

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, title: &str) {
        self.failing.lock().insert(title.to_string());
    }

    pub fn refuse_connections(&self) {
        *self.refuse_connect.lock() = true;
    }

    pub fn refuse_moves(&self) {
        *self.refuse_move.lock() = true;
    }

    /// Como el driver real: `play` vuelve enseguida y el stream se prepara
    /// en segundo plano durante `delay`. Las pistas de `fail_on` fallan al
    /// terminar la preparación y lo avisan por el fin de pista.
    pub fn prepare_slowly(&self, delay: Duration) {
        *self.preparation.lock() = Some(delay);
    }

    pub fn with<R>(&self, f: impl FnOnce(&FakeVoiceState) -> R) -> R {
        self.with_guild(Self::GUILD, f)
    }

    pub fn with_guild<R>(&self, guild_id: GuildId, f: impl FnOnce(&FakeVoiceState) -> R) -> R {
        f(self.guilds.lock().entry(guild_id).or_default())
    }

    fn update<R>(&self, guild_id: GuildId, f: impl FnOnce(&mut FakeVoiceState) -> R) -> R {
        f(self.guilds.lock().entry(guild_id).or_default())
    }

    pub fn playing_title(&self) -> Option<String> {
        self.with(|s| s.playing.as_ref().map(|(title, _)| title.clone()))
    }

    /// La pista actual termina normalmente
    pub fn finish_current(&self) {
        let playing = self.update(Self::GUILD, |s| s.playing.take());
        let (_, signal) = playing.expect("no hay pista sonando");
        signal.fire(None);
    }

    /// La pista actual muere con error del decoder
    pub fn crash_current(&self, reason: &str) {
        let playing = self.update(Self::GUILD, |s| s.playing.take());
        let (_, signal) = playing.expect("no hay pista sonando");
        signal.fire(Some(reason.to_string()));
    }

    /// La reproducción muere sin que llegue ningún aviso
    pub fn drop_silently(&self) {
        self.update(Self::GUILD, |s| s.playing = None);
    }

    /// La plataforma saca al bot del canal
    pub fn kick(&self) {
        self.update(Self::GUILD, |s| {
            s.connected = false;
            s.channel = None;
            s.playing = None;
        });
    }
}

#[async_trait]
impl VoiceSession for FakeVoice {
    type Handle = (GuildId, u64);

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(GuildId, u64), MusicError> {
        if *self.refuse_connect.lock() {
            return Err(MusicError::Connection("sin permisos".into()));
        }
        self.update(guild_id, |s| {
            s.connects += 1;
            s.session += 1;
            s.connected = true;
            s.channel = Some(channel_id);
            Ok((guild_id, s.session))
        })
    }

    async fn move_to(&self, handle: &(GuildId, u64), channel_id: ChannelId) -> Result<(), MusicError> {
        if *self.refuse_move.lock() {
            return Err(MusicError::Connection("canal lleno".into()));
        }
        self.update(handle.0, |s| {
            s.moves.push(channel_id);
            s.channel = Some(channel_id);
        });
        Ok(())
    }

    async fn current_channel(&self, handle: &(GuildId, u64)) -> Option<ChannelId> {
        self.with_guild(handle.0, |s| s.channel)
    }

    async fn play(
        &self,
        handle: &(GuildId, u64),
        track: &Track,
        on_complete: CompletionSignal,
    ) -> Result<(), MusicError> {
        let fails = self.failing.lock().contains(track.title());
        let preparation = *self.preparation.lock();
        if let Some(delay) = preparation {
            if fails {
                let signal = on_complete.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    signal.fire(Some("stream cerrado".into()));
                });
            }
        }
        let fails = fails && preparation.is_none();
        let replaced = self.update(handle.0, |s| {
            s.play_attempts.push(track.title().to_string());
            if fails {
                return Err(MusicError::PlaybackStart {
                    title: track.title().to_string(),
                    reason: "stream cerrado".into(),
                });
            }
            Ok(s.playing.replace((track.title().to_string(), on_complete)))
        })?;
        if let Some((_, signal)) = replaced {
            signal.fire(None);
        }
        Ok(())
    }

    async fn stop(&self, handle: &(GuildId, u64)) {
        let stopped = self.update(handle.0, |s| {
            s.stops += 1;
            s.playing.take()
        });
        if let Some((_, signal)) = stopped {
            signal.fire(None);
        }
    }

    async fn is_playing(&self, handle: &(GuildId, u64)) -> bool {
        self.with_guild(handle.0, |s| s.playing.is_some())
    }

    async fn is_paused(&self, _handle: &(GuildId, u64)) -> bool {
        false
    }

    async fn is_connected(&self, handle: &(GuildId, u64)) -> bool {
        self.with_guild(handle.0, |s| s.connected && s.session == handle.1)
    }

    async fn disconnect(&self, handle: &(GuildId, u64)) -> Result<(), MusicError> {
        self.update(handle.0, |s| {
            s.disconnects += 1;
            s.connected = false;
            s.channel = None;
            s.playing = None;
        });
        Ok(())
    }
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<(ChannelId, Notification)>,
}

impl RecordingNotifier {
    pub fn new() -> (Arc<Self>, NotificationLog) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), NotificationLog { rx })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel_id: ChannelId, notification: Notification) {
        let _ = self.tx.send((channel_id, notification));
    }
}

pub struct NotificationLog {
    rx: mpsc::UnboundedReceiver<(ChannelId, Notification)>,
}

impl NotificationLog {
    pub async fn next(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("no llegó ninguna notificación")
            .expect("notificador cerrado")
            .1
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok((_, notification)) = self.rx.try_recv() {
            out.push(notification);
        }
        out
    }
}

#[derive(Default)]
pub struct RecordingHistory {
    pub entries: Mutex<Vec<HistoryEntry>>,
}

#[async_trait]
impl HistorySink for RecordingHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

pub struct FailingHistory;

#[async_trait]
impl HistorySink for FailingHistory {
    async fn append(&self, _entry: HistoryEntry) -> Result<()> {
        anyhow::bail!("disco lleno")
    }
}

/// Cede el turno hasta que se cumpla la condición (tareas lanzadas con spawn)
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("la condición no se cumplió");
}
