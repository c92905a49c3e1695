//! # Bot Module
//!
//! Discord glue for the jukebox: slash command registration, interaction
//! dispatch and the bot's own voice-state transitions.
//!
//! All playback decisions live in [`crate::audio`]; this module only turns
//! gateway events into calls on [`AudioPlayer`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{player::AudioPlayer, songbird_voice::SongbirdVoice},
    config::Config,
};

/// Handler de eventos de Discord
pub struct JukeboxBot {
    config: Arc<Config>,
    pub player: Arc<AudioPlayer<SongbirdVoice>>,
}

impl JukeboxBot {
    pub fn new(config: Config, player: Arc<AudioPlayer<SongbirdVoice>>) -> Self {
        Self {
            config: Arc::new(config),
            player,
        }
    }

    /// Registra los comandos slash, por guild si `GUILD_ID` está definido
    /// (propagación inmediata) o globalmente.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Solo interesan los cambios del propio bot: entrar a un canal cancela
    /// la desconexión por inactividad y salir limpia el estado de la guild.
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        match new.channel_id {
            Some(channel_id) => debug!("🔊 Bot en canal {} de guild {}", channel_id, guild_id),
            None => info!("🔌 Bot desconectado en guild {}", guild_id),
        }
        self.player.voice_state_changed(guild_id, new.channel_id.is_some());
    }
}
