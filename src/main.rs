use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use poise::CreateReply;
use serenity::CreateEmbed;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use muse::commands::music::play::{Play, play, query_description};
use muse::commands::music::utils::{
    key_value_cache::KeyValueCache,
    music_error::MusicError,
    queue_manager::SongbirdQueue,
    spotify_api::SpotifyApi,
    suggestions::YoutubeAndSpotifySuggestions,
};
use muse::config::Config;
use muse::{Context, Data, Error};

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

/// Reports command failures to the user instead of leaving the interaction hanging.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            let reply = CreateReply::default()
                .embed(
                    CreateEmbed::new()
                        .title("❌ Error")
                        .description(error.to_string())
                        .color(0xff0000),
                )
                .ephemeral(true);

            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error reply: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn build_cache(config: &Config) -> Arc<KeyValueCache> {
    if !config.cache_persist {
        return Arc::new(KeyValueCache::new());
    }

    match KeyValueCache::with_database(&config.cache_db_path) {
        Ok(cache) => {
            if let Err(e) = cache.load_persisted().await {
                warn!("Failed to load persisted cache entries: {}", e);
            }
            Arc::new(cache)
        }
        Err(e) => {
            warn!("Falling back to an in-memory cache: {}", e);
            Arc::new(KeyValueCache::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("muse=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Config::from_env()?;
    let spotify = config.spotify.clone().map(|credentials| Arc::new(SpotifyApi::new(credentials)));
    info!(
        "Spotify support {}",
        if spotify.is_some() { "enabled" } else { "disabled" }
    );

    let cache = build_cache(&config).await;

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut play_command = play();
    if let Some(parameter) = play_command
        .parameters
        .iter_mut()
        .find(|parameter| parameter.name == "query")
    {
        parameter.description = Some(query_description(spotify.is_some()).to_string());
    }

    let commands = vec![register(), play_command];

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let songbird = songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)?;
                let queue = SongbirdQueue::new(songbird, ctx.cache.clone(), spotify.clone());
                let play = Play::new(
                    Arc::new(queue),
                    cache,
                    Arc::new(YoutubeAndSpotifySuggestions::new()),
                    spotify,
                );

                info!("Bot is ready");
                Ok(Data { play })
            })
        });

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework.build())
        .register_songbird()
        .await?;

    client.start().await.map_err(Into::into)
}
