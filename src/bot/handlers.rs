use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{bot::JukeboxBot, ui::embeds};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(
            ctx,
            &command,
            embeds::create_error_embed_with("Solo en servidores", "Este comando se usa dentro de un servidor"),
        )
        .await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, guild_id, bot).await?,
        "next" => handle_next(ctx, command, guild_id, bot).await?,
        "stop" => handle_stop(ctx, command, guild_id, bot).await?,
        "queue" => handle_queue(ctx, command, guild_id, bot).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

async fn handle_play(ctx: &Context, command: CommandInteraction, guild_id: GuildId, bot: &JukeboxBot) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que la búsqueda puede tomar tiempo
    defer(ctx, &command).await?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        let embed = embeds::create_error_embed_with("Sin canal de voz", "Debes estar en un canal de voz");
        return edit(ctx, &command, embed).await;
    };

    let embed = match bot
        .player
        .play(guild_id, command.user.id, &query, voice_channel_id, command.channel_id)
        .await
    {
        Ok(outcome) => embeds::create_play_outcome_embed(&outcome),
        Err(e) => {
            warn!("/play falló en guild {}: {}", guild_id, e);
            embeds::create_error_embed(&e)
        }
    };

    edit(ctx, &command, embed).await
}

async fn handle_next(ctx: &Context, command: CommandInteraction, guild_id: GuildId, bot: &JukeboxBot) -> Result<()> {
    // El buzón de la guild puede estar ocupado: se confirma antes de esperar
    defer(ctx, &command).await?;
    let embed = match bot.player.skip(guild_id).await {
        Ok(outcome) => embeds::create_skip_embed(&outcome),
        Err(e) => embeds::create_error_embed(&e),
    };
    edit(ctx, &command, embed).await
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, guild_id: GuildId, bot: &JukeboxBot) -> Result<()> {
    defer(ctx, &command).await?;
    let embed = match bot.player.stop(guild_id).await {
        Ok(outcome) => embeds::create_stop_embed(&outcome),
        Err(e) => embeds::create_error_embed(&e),
    };
    edit(ctx, &command, embed).await
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, guild_id: GuildId, bot: &JukeboxBot) -> Result<()> {
    defer(ctx, &command).await?;
    let embed = match bot.player.status(guild_id).await {
        Ok(status) => embeds::create_queue_embed(&status),
        Err(e) => embeds::create_error_embed(&e),
    };
    edit(ctx, &command, embed).await
}

/// Confirma la interacción dentro del plazo de Discord; la respuesta real
/// llega después con [`edit`]
async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

async fn respond(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

/// Canal de voz del usuario según la caché
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
