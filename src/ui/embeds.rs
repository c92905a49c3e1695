use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        controller::{PlayOutcome, PlayerStatus, SkipOutcome, StopOutcome},
        track::Track,
    },
    error::MusicError,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Máximo de pendientes listados en /queue
const QUEUE_PREVIEW: usize = 10;

fn base_embed(title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn track_fields(embed: CreateEmbed, track: &Track) -> CreateEmbed {
    let duration = track
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "🔴 En vivo".to_string());

    let embed = embed
        .field("⏱️ Duración", duration, true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true);

    if crate::sources::is_url(track.stream_locator()) {
        embed.url(track.stream_locator())
    } else {
        embed
    }
}

/// Crea un embed para la canción que empieza a sonar
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let embed = base_embed("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN);
    track_fields(embed, track)
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let embed = base_embed("✅ Canción Agregada")
        .description(format!(
            "**{}** se ha agregado a la cola (posición **{}**)",
            track.title(),
            position
        ))
        .color(colors::INFO_BLUE);
    track_fields(embed, track)
}

/// Respuesta a /play
pub fn create_play_outcome_embed(outcome: &PlayOutcome) -> CreateEmbed {
    match outcome {
        PlayOutcome::NowPlaying(track) => create_now_playing_embed(track),
        PlayOutcome::Queued { track, position } => create_track_added_embed(track, *position),
    }
}

pub fn create_playback_failed_embed(track: &Track, reason: &str) -> CreateEmbed {
    base_embed("⚠️ No se pudo reproducir")
        .description(format!("**{}**\n{}\n\nSe pasa a la siguiente canción.", track.title(), reason))
        .color(colors::WARNING_ORANGE)
}

pub fn create_queue_finished_embed() -> CreateEmbed {
    base_embed("📭 Cola terminada")
        .description("No quedan canciones. Me desconecto del canal de voz 👋")
        .color(colors::NEUTRAL_GRAY)
}

/// Respuesta a /next
pub fn create_skip_embed(outcome: &SkipOutcome) -> CreateEmbed {
    match outcome {
        SkipOutcome::Skipped(track) => base_embed("⏭️ Saltada")
            .description(format!("**{}**", track.title()))
            .color(colors::INFO_BLUE),
        SkipOutcome::Restarted(track) => create_now_playing_embed(track),
        SkipOutcome::Idle => base_embed("😴 Nada que saltar")
            .description("No hay nada sonando ni en cola")
            .color(colors::NEUTRAL_GRAY),
    }
}

/// Respuesta a /stop
pub fn create_stop_embed(outcome: &StopOutcome) -> CreateEmbed {
    let mut description = String::from("Reproducción detenida");
    if outcome.cleared > 0 {
        description.push_str(&format!(" y **{}** canciones quitadas de la cola", outcome.cleared));
    }
    if outcome.was_connected {
        description.push_str("\nDesconectado del canal de voz");
    }

    base_embed("⏹️ Detenido")
        .description(description)
        .color(colors::INFO_BLUE)
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(status: &PlayerStatus) -> CreateEmbed {
    let embed = base_embed("📋 Cola de Reproducción").color(colors::INFO_BLUE);

    if status.now_playing.is_none() && status.pending.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY);
    }

    let mut embed = embed;
    if let Some(current) = &status.now_playing {
        embed = embed.field("▶️ Reproduciendo", format!("**{}**", current.title()), false);
    }
    if !status.pending.is_empty() {
        embed = embed.field("Próximas canciones", queue_listing(&status.pending), false);
    }

    embed.field("Información", format!("**Total:** {} en cola", status.pending.len()), false)
}

pub fn create_error_embed(error: &MusicError) -> CreateEmbed {
    create_error_embed_with(error.headline(), &error.to_string())
}

/// Crea un embed de error
pub fn create_error_embed_with(title: &str, description: &str) -> CreateEmbed {
    base_embed(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
}

/// Lista numerada de las próximas pistas
fn queue_listing(pending: &[Track]) -> String {
    let mut listing = String::new();
    for (i, track) in pending.iter().take(QUEUE_PREVIEW).enumerate() {
        let duration = track
            .duration()
            .map(|d| format!(" `[{}]`", format_duration(d)))
            .unwrap_or_default();
        listing.push_str(&format!("**{}**. {}{}\n", i + 1, track.title(), duration));
    }
    if pending.len() > QUEUE_PREVIEW {
        listing.push_str(&format!("… y {} más", pending.len() - QUEUE_PREVIEW));
    }
    listing
}

/// Formatea una duración en formato legible
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
