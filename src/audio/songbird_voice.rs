use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    driver::Bitrate,
    input::{AudioStream, AudioStreamError, ChildContainer, Compose, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    io::{BufRead, BufReader},
    process::{Command, Stdio},
    sync::Arc,
};
use symphonia::core::{
    io::{MediaSource, ReadOnlySource},
    probe::Hint,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{
    track::Track,
    voice::{CompletionSignal, VoiceSession},
};
use crate::{error::MusicError, sources::YtDlpClient};

/// Bitrate Opus fijo para todas las guilds
pub const OPUS_BITRATE: i32 = 96_000;

/// Segundos máximos entre reintentos de reconexión de ffmpeg
const RECONNECT_DELAY_MAX_SECS: u32 = 5;

/// Última línea que ffmpeg escribió en stderr
type StderrTail = Arc<SyncMutex<Option<String>>>;

/// Conexión de voz de una guild respaldada por songbird
#[derive(Clone)]
pub struct SongbirdHandle {
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    current: Arc<SyncMutex<Option<TrackHandle>>>,
}

/// [`VoiceSession`] sobre songbird: cada pista es un proceso ffmpeg que
/// entrega Ogg/Opus por stdout.
///
/// `play` solo entrega al driver una entrada perezosa. La URL de stream y el
/// arranque de ffmpeg ocurren después, dentro del driver, así que el
/// controlador de la guild nunca espera a yt-dlp. Si esa preparación falla la
/// pista termina con error y llega como aviso de fin.
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    ytdlp: Arc<YtDlpClient>,
    ffmpeg: String,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>, ytdlp: Arc<YtDlpClient>, ffmpeg: impl Into<String>) -> Self {
        Self {
            manager,
            ytdlp,
            ffmpeg: ffmpeg.into(),
        }
    }

    async fn current_track(handle: &SongbirdHandle) -> Option<PlayMode> {
        let track = handle.current.lock().clone()?;
        track.get_info().await.ok().map(|state| state.playing)
    }
}

/// Argumentos de ffmpeg: reconexión ante cortes de red y salida Ogg/Opus
/// a 48 kHz estéreo por stdout
fn ffmpeg_args(stream_url: &str) -> Vec<String> {
    let bitrate = format!("{}k", OPUS_BITRATE / 1000);
    let reconnect_delay = RECONNECT_DELAY_MAX_SECS.to_string();

    [
        "-reconnect",
        "1",
        "-reconnect_streamed",
        "1",
        "-reconnect_delay_max",
        &reconnect_delay,
        "-i",
        stream_url,
        "-vn",
        "-c:a",
        "libopus",
        "-b:a",
        &bitrate,
        "-ar",
        "48000",
        "-ac",
        "2",
        "-f",
        "ogg",
        "-loglevel",
        "error",
        "pipe:1",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Pasa el stderr de ffmpeg al log y recuerda la última línea no vacía
fn drain_stderr(reader: impl BufRead, tail: &StderrTail) {
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("ffmpeg: {}", line);
        *tail.lock() = Some(line.to_string());
    }
}

/// Motivo de fallo a partir del estado final de la pista
fn failure_reason(mode: &PlayMode, stderr_tail: Option<String>) -> Option<String> {
    let PlayMode::Errored(e) = mode else {
        return None;
    };
    Some(match stderr_tail {
        Some(line) => format!("{e:?} (ffmpeg: {line})"),
        None => format!("{e:?}"),
    })
}

/// Entrada perezosa: resuelve la URL de stream y lanza ffmpeg cuando el
/// driver la necesita
struct LazyStream {
    ytdlp: Arc<YtDlpClient>,
    ffmpeg: String,
    locator: String,
    stderr_tail: StderrTail,
}

impl LazyStream {
    async fn spawn_decoder(&self) -> Result<ChildContainer, MusicError> {
        let stream_url = self.ytdlp.stream_url(&self.locator).await?;

        let mut child = Command::new(&self.ffmpeg)
            .args(ffmpeg_args(&stream_url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MusicError::Resolution(format!("no se pudo iniciar ffmpeg: {e}")))?;

        if let Some(stderr) = child.stderr.take() {
            let tail = self.stderr_tail.clone();
            std::thread::spawn(move || drain_stderr(BufReader::new(stderr), &tail));
        }

        Ok(ChildContainer::from(child))
    }
}

#[async_trait]
impl Compose for LazyStream {
    fn create(&mut self) -> Result<AudioStream<Box<dyn MediaSource>>, AudioStreamError> {
        Err(AudioStreamError::Unsupported)
    }

    async fn create_async(&mut self) -> Result<AudioStream<Box<dyn MediaSource>>, AudioStreamError> {
        let container = self.spawn_decoder().await.map_err(|e| {
            error!("❌ No se pudo preparar el stream {}: {}", self.locator, e);
            AudioStreamError::Fail(Box::new(e))
        })?;

        let mut hint = Hint::new();
        hint.with_extension("ogg");
        Ok(AudioStream {
            input: Box::new(ReadOnlySource::new(container)) as Box<dyn MediaSource>,
            hint: Some(hint),
        })
    }

    fn should_create_async(&self) -> bool {
        true
    }
}

#[async_trait]
impl VoiceSession for SongbirdVoice {
    type Handle = SongbirdHandle;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<SongbirdHandle, MusicError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al obtener handler de voz: {:?}", e);
                MusicError::Connection(e.to_string())
            })?;

        call.lock().await.set_bitrate(Bitrate::BitsPerSecond(OPUS_BITRATE));

        Ok(SongbirdHandle {
            guild_id,
            call,
            current: Arc::new(SyncMutex::new(None)),
        })
    }

    async fn move_to(&self, handle: &SongbirdHandle, channel_id: ChannelId) -> Result<(), MusicError> {
        // Con una llamada existente, join solo cambia de canal
        self.manager
            .join(handle.guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| MusicError::Connection(e.to_string()))
    }

    async fn current_channel(&self, handle: &SongbirdHandle) -> Option<ChannelId> {
        let call = handle.call.lock().await;
        call.current_channel().map(|channel_id| ChannelId::from(channel_id.0))
    }

    async fn play(
        &self,
        handle: &SongbirdHandle,
        track: &Track,
        on_complete: CompletionSignal,
    ) -> Result<(), MusicError> {
        let stderr_tail = StderrTail::default();
        let lazy = LazyStream {
            ytdlp: self.ytdlp.clone(),
            ffmpeg: self.ffmpeg.clone(),
            locator: track.stream_locator().to_string(),
            stderr_tail: stderr_tail.clone(),
        };

        let track_handle = {
            let mut call = handle.call.lock().await;
            call.play_only_input(Input::Lazy(Box::new(lazy)))
        };

        let notifier = TrackEndNotifier {
            signal: on_complete,
            stderr_tail,
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| MusicError::PlaybackStart {
                    title: track.title().to_string(),
                    reason: format!("no se pudo registrar el evento de fin: {e}"),
                })?;
        }

        *handle.current.lock() = Some(track_handle);
        debug!("▶️ Stream en preparación en guild {}: {}", handle.guild_id, track.title());
        Ok(())
    }

    async fn stop(&self, handle: &SongbirdHandle) {
        let current = handle.current.lock().clone();
        if let Some(track) = current {
            let _ = track.stop();
        }
    }

    async fn is_playing(&self, handle: &SongbirdHandle) -> bool {
        matches!(Self::current_track(handle).await, Some(PlayMode::Play))
    }

    async fn is_paused(&self, handle: &SongbirdHandle) -> bool {
        matches!(Self::current_track(handle).await, Some(PlayMode::Pause))
    }

    async fn is_connected(&self, handle: &SongbirdHandle) -> bool {
        // Una llamada reemplazada por otra del mismo guild ya no es válida
        match self.manager.get(handle.guild_id) {
            Some(call) if Arc::ptr_eq(&call, &handle.call) => call.lock().await.current_channel().is_some(),
            _ => false,
        }
    }

    async fn disconnect(&self, handle: &SongbirdHandle) -> Result<(), MusicError> {
        handle.current.lock().take();
        self.manager
            .remove(handle.guild_id)
            .await
            .map_err(|e| MusicError::Connection(e.to_string()))?;
        info!("👋 Llamada de voz cerrada en guild {}", handle.guild_id);
        Ok(())
    }
}

/// Reenvía el fin de una pista al buzón de la guild
#[derive(Clone)]
struct TrackEndNotifier {
    signal: CompletionSignal,
    stderr_tail: StderrTail,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut error = None;
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error = error.or_else(|| failure_reason(&state.playing, self.stderr_tail.lock().clone()));
            }
        }

        debug!("Track terminado (reproducción {})", self.signal.playback_id());
        self.signal.fire(error);
        None
    }
}
