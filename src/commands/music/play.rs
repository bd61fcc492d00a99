use poise::serenity_prelude::{AutocompleteChoice, CreateEmbed};
use poise::CreateReply;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::commands::music::utils::{
    ONE_HOUR,
    key_value_cache::KeyValueCache,
    music_error::{MusicError, MusicResult},
    queue_manager::{ChannelRef, PlayRequest, QueueOutcome, QueueService},
    spotify_api::SpotifyApi,
    suggestions::{Suggestion, SuggestionProvider},
};
use crate::{CommandResult, Context};

/// Upper bound on suggestions requested from the provider.
pub const AUTOCOMPLETE_LIMIT: usize = 10;

/// A `/play` invocation, independent of the chat platform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayInvocation {
    pub query: String,
    pub immediate: Option<bool>,
    pub shuffle: Option<bool>,
    pub split: Option<bool>,
    pub skip: Option<bool>,
    /// `None` when the command was not issued from a usable text channel.
    pub channel: Option<ChannelRef>,
    pub simulated: bool,
}

/// Cache key under which suggestions for `query` are stored.
pub fn autocomplete_cache_key(query: &str) -> String {
    format!("autocomplete:{}", query)
}

/// Description of the `query` option, depending on whether Spotify is available.
pub fn query_description(spotify_enabled: bool) -> &'static str {
    if spotify_enabled {
        "YouTube URL, Spotify URL, or search query"
    } else {
        "YouTube URL or search query"
    }
}

/// Executes `/play` and resolves autocomplete requests for its query field.
pub struct Play {
    queue: Arc<dyn QueueService>,
    cache: Arc<KeyValueCache>,
    suggestions: Arc<dyn SuggestionProvider>,
    spotify: Option<Arc<SpotifyApi>>,
}

impl Play {
    pub fn new(
        queue: Arc<dyn QueueService>,
        cache: Arc<KeyValueCache>,
        suggestions: Arc<dyn SuggestionProvider>,
        spotify: Option<Arc<SpotifyApi>>,
    ) -> Self {
        Self {
            queue,
            cache,
            suggestions,
            spotify,
        }
    }

    pub fn spotify_enabled(&self) -> bool {
        self.spotify.is_some()
    }

    /// Validates the invocation and hands one request to the queue service.
    pub async fn execute(&self, invocation: PlayInvocation) -> MusicResult<QueueOutcome> {
        let channel = invocation.channel.ok_or_else(|| {
            MusicError::Precondition("This command must be used in a text channel.".to_string())
        })?;

        let request = PlayRequest {
            query: invocation.query.trim().to_string(),
            add_to_front_of_queue: invocation.immediate.unwrap_or(false),
            shuffle_additions: invocation.shuffle.unwrap_or(false),
            should_split_chapters: invocation.split.unwrap_or(false),
            skip_current_track: invocation.skip.unwrap_or(false),
            channel,
            is_simulated: invocation.simulated,
        };

        self.queue.add_to_queue(request).await
    }

    /// Suggestions for a partially typed query.
    ///
    /// Blank input and anything that parses as an absolute URL get no
    /// suggestions. Note that this includes inputs like `spotify:track:x` or
    /// `localhost:8080`, which a user may have meant as search text.
    pub async fn resolve_autocomplete(&self, partial: &str) -> MusicResult<Vec<Suggestion>> {
        let query = partial.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if Url::parse(query).is_ok() {
            debug!("Not suggesting for URL input: {}", query);
            return Ok(Vec::new());
        }

        let spotify = self.spotify.clone();
        self.cache
            .wrap(&autocomplete_cache_key(query), ONE_HOUR, || {
                self.suggestions.suggest(query, spotify, AUTOCOMPLETE_LIMIT)
            })
            .await
    }
}

/// Play a song
#[poise::command(slash_command, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "YouTube URL or search query"]
    #[autocomplete = "autocomplete_query"]
    query: String,
    #[description = "add track to the front of the queue"] immediate: Option<bool>,
    #[description = "shuffle the input if you're adding multiple tracks"] shuffle: Option<bool>,
    #[description = "if a track has chapters, split it"] split: Option<bool>,
    #[description = "skip the currently playing track"] skip: Option<bool>,
) -> CommandResult {
    info!("Received play command with query: {}", query);

    let channel = ctx.guild_id().map(|guild_id| ChannelRef {
        guild_id,
        channel_id: ctx.channel_id(),
        requested_by: ctx.author().id,
    });

    // Resolving sources can take a while
    ctx.defer().await?;

    let outcome = ctx
        .data()
        .play
        .execute(PlayInvocation {
            query,
            immediate,
            shuffle,
            split,
            skip,
            channel,
            simulated: false,
        })
        .await?;

    ctx.send(CreateReply::default().embed(added_to_queue_embed(&outcome)))
        .await?;

    Ok(())
}

fn added_to_queue_embed(outcome: &QueueOutcome) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎵 Added to Queue")
        .description(queue_summary(outcome))
        .color(0x00ff00)
}

fn queue_summary(outcome: &QueueOutcome) -> String {
    let title = outcome.first_title.as_deref().unwrap_or("Unknown title");

    match outcome.tracks_added {
        0 | 1 => format!("**{}**", title),
        n => format!("**{}** and {} more tracks", title, n - 1),
    }
}

/// Autocomplete function for the `query` argument of `/play`.
///
/// Lookup failures are logged and answered with no choices.
async fn autocomplete_query(ctx: Context<'_>, partial: &str) -> Vec<AutocompleteChoice> {
    match ctx.data().play.resolve_autocomplete(partial).await {
        Ok(suggestions) => suggestions
            .into_iter()
            .map(|suggestion| AutocompleteChoice::new(suggestion.name, suggestion.value))
            .collect(),
        Err(e) => {
            warn!("Failed to fetch suggestions for '{}': {}", partial, e);
            Vec::new()
        }
    }
}
