use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod history;
mod sources;
mod ui;

use crate::audio::{controller::PlayerContext, player::AudioPlayer, songbird_voice::SongbirdVoice};
use crate::bot::{events::ChannelNotifier, JukeboxBot};
use crate::config::Config;
use crate::history::JsonHistorySink;
use crate::sources::YtDlpClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let ytdlp = Arc::new(YtDlpClient::new(
        config.ytdlp_path.clone(),
        config.resolve_timeout(),
        config.max_concurrent_lookups,
    ));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&ytdlp, &config.ffmpeg_path).await;
    }

    let history = Arc::new(JsonHistorySink::new(&config.data_dir).await?);
    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));

    let voice = SongbirdVoice::new(songbird.clone(), ytdlp.clone(), config.ffmpeg_path.clone());
    let ctx = PlayerContext {
        voice: Arc::new(voice),
        notifier: Arc::new(ChannelNotifier::new(http)),
        history,
        idle_grace: config.idle_grace(),
    };
    let player = Arc::new(AudioPlayer::new(ctx, ytdlp));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = JukeboxBot::new(config.clone(), player);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(ytdlp: &YtDlpClient, ffmpeg: &str) -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = ytdlp.version().await;

    let ffmpeg = async_process::Command::new(ffmpeg)
        .arg("-version")
        .output()
        .await?;

    match yt_dlp {
        Ok(version) if ffmpeg.status.success() => {
            info!("yt-dlp {}", version);
            println!("OK");
            Ok(())
        }
        _ => anyhow::bail!("Dependencias faltantes"),
    }
}
