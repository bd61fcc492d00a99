//! The queue service behind `/play`: turns a [`PlayRequest`] into playable
//! sources and schedules them on the guild's songbird queue.

use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use songbird::input::{Input, YoutubeDl};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::HTTP_CLIENT;

use super::music_error::{MusicError, MusicResult};
use super::spotify_api::SpotifyApi;

/// The text channel a command was issued in, and who issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelRef {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub requested_by: UserId,
}

/// A validated request to add a query to a guild's queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayRequest {
    pub query: String,
    pub add_to_front_of_queue: bool,
    pub shuffle_additions: bool,
    pub should_split_chapters: bool,
    pub skip_current_track: bool,
    pub channel: ChannelRef,
    /// Simulated requests resolve their sources without touching voice state.
    pub is_simulated: bool,
}

/// What a successful enqueue added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueOutcome {
    pub tracks_added: usize,
    pub first_title: Option<String>,
}

/// Resolves queries into playable media and schedules them.
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn add_to_queue(&self, request: PlayRequest) -> MusicResult<QueueOutcome>;
}

/// Something yt-dlp can play.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackSource {
    Url(String),
    Search(String),
}

impl TrackSource {
    fn into_input(self, client: reqwest::Client) -> Input {
        match self {
            TrackSource::Url(url) => YoutubeDl::new(client, url).into(),
            TrackSource::Search(query) => YoutubeDl::new_search(client, query).into(),
        }
    }
}

/// Turns a query into the sources it stands for.
///
/// Spotify references expand into one YouTube search per track when a Spotify
/// client is available. Any other URL is handed to yt-dlp directly and plain
/// text becomes a YouTube search.
pub async fn resolve_sources(
    query: &str,
    spotify: Option<&SpotifyApi>,
) -> MusicResult<Vec<TrackSource>> {
    if query.is_empty() {
        return Err(MusicError::EmptyQuery);
    }

    if let Some(spotify) = spotify {
        if let Some(reference) = SpotifyApi::parse_reference(query) {
            let tracks = spotify.resolve(&reference).await?;
            if tracks.is_empty() {
                return Err(MusicError::AudioSourceError(
                    "Spotify collection is empty".to_string(),
                ));
            }

            return Ok(tracks
                .iter()
                .map(|track| TrackSource::Search(SpotifyApi::youtube_search_query(track)))
                .collect());
        }
    }

    if Url::parse(query).is_ok() {
        Ok(vec![TrackSource::Url(query.to_string())])
    } else {
        Ok(vec![TrackSource::Search(query.to_string())])
    }
}

/// Queue service backed by songbird's built-in track queue.
pub struct SongbirdQueue {
    songbird: Arc<Songbird>,
    cache: Arc<serenity::Cache>,
    spotify: Option<Arc<SpotifyApi>>,
}

impl SongbirdQueue {
    pub fn new(
        songbird: Arc<Songbird>,
        cache: Arc<serenity::Cache>,
        spotify: Option<Arc<SpotifyApi>>,
    ) -> Self {
        Self {
            songbird,
            cache,
            spotify,
        }
    }

    /// Get the voice channel ID that the user is currently in
    fn user_voice_channel(&self, guild_id: GuildId, user_id: UserId) -> MusicResult<ChannelId> {
        let guild = self.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        find_voice_channel(
            guild
                .voice_states
                .iter()
                .map(|(id, voice_state)| (*id, voice_state.channel_id)),
            user_id,
        )
    }

    /// Joins `voice_channel` unless the bot is already connected in the guild.
    async fn ensure_connected(&self, guild_id: GuildId, voice_channel: ChannelId) -> MusicResult<()> {
        if self.songbird.get(guild_id).is_some() {
            return Ok(());
        }

        if let Err(err) = self.songbird.join(guild_id, voice_channel).await {
            error!(
                "Failed to join voice channel {} for guild {}: {}",
                voice_channel, guild_id, err
            );
            return Err(MusicError::JoinError(err.to_string()));
        }

        Ok(())
    }
}

/// Finds the voice channel `user_id` is connected to among a guild's voice states.
pub fn find_voice_channel<I>(voice_states: I, user_id: UserId) -> MusicResult<ChannelId>
where
    I: IntoIterator<Item = (UserId, Option<ChannelId>)>,
{
    voice_states
        .into_iter()
        .find(|(id, _)| *id == user_id)
        .and_then(|(_, channel_id)| channel_id)
        .ok_or(MusicError::UserNotInVoiceChannel)
}

#[async_trait]
impl QueueService for SongbirdQueue {
    async fn add_to_queue(&self, request: PlayRequest) -> MusicResult<QueueOutcome> {
        info!("Adding '{}' to the queue of guild {}", request.query, request.channel.guild_id);

        // Playing requires the requester to be in voice, even when the bot already is
        let voice_channel = if request.is_simulated {
            None
        } else {
            Some(self.user_voice_channel(
                request.channel.guild_id,
                request.channel.requested_by,
            )?)
        };

        let mut sources = resolve_sources(&request.query, self.spotify.as_deref()).await?;
        if request.shuffle_additions {
            sources.shuffle(&mut rand::rng());
        }
        if request.should_split_chapters {
            debug!("Chapter splitting requested for '{}', playing tracks whole", request.query);
        }

        let mut inputs: Vec<Input> = sources
            .into_iter()
            .map(|source| source.into_input(HTTP_CLIENT.clone()))
            .collect();

        let first_title = match inputs.first_mut() {
            Some(first) => match first.aux_metadata().await {
                Ok(metadata) => metadata.title,
                Err(e) => {
                    warn!("Could not read metadata for '{}': {}", request.query, e);
                    None
                }
            },
            None => None,
        };

        let tracks_added = inputs.len();
        if request.is_simulated {
            return Ok(QueueOutcome {
                tracks_added,
                first_title,
            });
        }

        let voice_channel = voice_channel.ok_or(MusicError::UserNotInVoiceChannel)?;
        self.ensure_connected(request.channel.guild_id, voice_channel)
            .await?;
        let call = self
            .songbird
            .get(request.channel.guild_id)
            .ok_or(MusicError::NoVoiceManager)?;
        let mut handler = call.lock().await;

        let previous_len = handler.queue().len();
        for input in inputs {
            handler.enqueue_input(input).await;
        }

        // Slot the new tracks right behind the one currently playing
        if request.add_to_front_of_queue && previous_len > 1 {
            handler.queue().modify_queue(|queue| {
                let added: Vec<_> = queue.drain(previous_len..).collect();
                for (offset, track) in added.into_iter().enumerate() {
                    queue.insert(1 + offset, track);
                }
            });
        }

        if request.skip_current_track && previous_len > 0 {
            if let Err(e) = handler.queue().skip() {
                warn!("Failed to skip current track: {}", e);
            }
        }

        Ok(QueueOutcome {
            tracks_added,
            first_title,
        })
    }
}
