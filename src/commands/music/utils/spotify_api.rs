//! Spotify Web API client: client-credentials authentication, catalog search and
//! track listing for tracks, albums and playlists.
//!
//! The client is optional. When no credentials are configured the bot runs
//! without any Spotify support.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::HTTP_CLIENT;
use crate::config::SpotifyCredentials;

use super::music_error::{MusicError, MusicResult};

const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
const API_BASE_URL: &str = "https://api.spotify.com";

/// Regex to match Spotify web links, e.g. `https://open.spotify.com/album/<id>`.
static SPOTIFY_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?open\.spotify\.com/(?:intl-[a-z]+/)?(track|album|playlist)/([a-zA-Z0-9]+)(?:\?.*)?$",
    )
    .expect("valid spotify link regex")
});

/// Regex to match Spotify URIs, e.g. `spotify:track:<id>`.
static SPOTIFY_URI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^spotify:(track|album|playlist):([a-zA-Z0-9]+)$").expect("valid spotify uri regex")
});

/// A reference to a Spotify resource the queue can expand into tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpotifyReference {
    Track(String),
    Album(String),
    Playlist(String),
}

/// Basic track information used to search for a playable source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotifyTrack {
    pub name: String,
    pub artists: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SpotifyArtist {
    pub name: String,
}

/// An album or track returned by the search endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SpotifyItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

/// Albums and tracks matching a search query, in Spotify's ranking order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpotifySearchResults {
    pub albums: Vec<SpotifyItem>,
    pub tracks: Vec<SpotifyItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: Option<Page<SpotifyItem>>,
    tracks: Option<Page<SpotifyItem>>,
}

/// Track object as listed by album, playlist and track endpoints.
#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<TrackObject>,
}

impl From<TrackObject> for SpotifyTrack {
    fn from(track: TrackObject) -> Self {
        Self {
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

/// Represents the response from Spotify's token endpoint.
#[derive(Debug, Deserialize)]
struct SpotifyToken {
    access_token: String,
    expires_in: u64,
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl SpotifyToken {
    /// Considers the token expired 30 seconds before its actual expiry time.
    fn is_expired(&self) -> bool {
        let expiry = Duration::from_secs(self.expires_in);
        self.created_at.elapsed() > expiry.saturating_sub(Duration::from_secs(30))
    }
}

/// Spotify API client
pub struct SpotifyApi {
    credentials: SpotifyCredentials,
    http: reqwest::Client,
    accounts_base_url: String,
    api_base_url: String,
    token: Mutex<Option<SpotifyToken>>,
}

impl SpotifyApi {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self::with_base_urls(credentials, ACCOUNTS_BASE_URL, API_BASE_URL)
    }

    /// Creates a client talking to custom endpoints (used by tests).
    pub fn with_base_urls(
        credentials: SpotifyCredentials,
        accounts_base_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            http: HTTP_CLIENT.clone(),
            accounts_base_url: accounts_base_url.into(),
            api_base_url: api_base_url.into(),
            token: Mutex::new(None),
        }
    }

    /// Recognizes Spotify web links and `spotify:` URIs.
    pub fn parse_reference(input: &str) -> Option<SpotifyReference> {
        let input = input.trim();
        let captures = SPOTIFY_LINK_REGEX
            .captures(input)
            .or_else(|| SPOTIFY_URI_REGEX.captures(input))?;

        let id = captures.get(2)?.as_str().to_string();
        match captures.get(1)?.as_str() {
            "track" => Some(SpotifyReference::Track(id)),
            "album" => Some(SpotifyReference::Album(id)),
            "playlist" => Some(SpotifyReference::Playlist(id)),
            _ => None,
        }
    }

    /// Builds a YouTube search query for a Spotify track,
    /// e.g. "Track Name by Artist1, Artist2 audio".
    pub fn youtube_search_query(track: &SpotifyTrack) -> String {
        if track.artists.is_empty() {
            format!("{} audio", track.name)
        } else {
            format!("{} by {} audio", track.name, track.artists.join(", "))
        }
    }

    /// Retrieves a valid access token, requesting a new one when the cached
    /// token is missing or about to expire.
    async fn access_token(&self) -> MusicResult<String> {
        let mut token_lock = self.token.lock().await;

        if let Some(token) = &*token_lock {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting a new Spotify access token");
        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base_url))
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify token: {}", e))
            })?;

        let response = ensure_success(response).await?;
        let token = response.json::<SpotifyToken>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify token: {}", e))
        })?;

        let access_token = token.access_token.clone();
        *token_lock = Some(token);

        Ok(access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> MusicResult<T> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(url)
            .query(query)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| MusicError::ExternalApiError(format!("Spotify request failed: {}", e)))?;

        ensure_success(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to parse Spotify response: {}", e))
            })
    }

    /// Searches albums and tracks matching `query`, at most `limit` of each.
    pub async fn search(&self, query: &str, limit: usize) -> MusicResult<SpotifySearchResults> {
        let url = format!("{}/v1/search", self.api_base_url);
        let response: SearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("type", "album,track".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(SpotifySearchResults {
            albums: response.albums.map(|page| page.items).unwrap_or_default(),
            tracks: response.tracks.map(|page| page.items).unwrap_or_default(),
        })
    }

    /// Fetches a single track by its ID.
    pub async fn get_track(&self, track_id: &str) -> MusicResult<SpotifyTrack> {
        let url = format!("{}/v1/tracks/{}", self.api_base_url, track_id);
        let track: TrackObject = self.get_json(&url, &[]).await?;
        Ok(track.into())
    }

    /// Fetches every track of an album, following pagination.
    pub async fn get_album_tracks(&self, album_id: &str) -> MusicResult<Vec<SpotifyTrack>> {
        let first = format!("{}/v1/albums/{}/tracks?limit=50", self.api_base_url, album_id);
        let items: Vec<TrackObject> = self.collect_pages(first).await?;

        Ok(items
            .into_iter()
            .filter(|track| track.id.is_some())
            .map(SpotifyTrack::from)
            .collect())
    }

    /// Fetches every track of a playlist, following pagination.
    /// Local files (tracks without a Spotify ID) are skipped.
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> MusicResult<Vec<SpotifyTrack>> {
        let first = format!(
            "{}/v1/playlists/{}/tracks?limit=50",
            self.api_base_url, playlist_id
        );
        let items: Vec<PlaylistItem> = self.collect_pages(first).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.track)
            .filter(|track| track.id.is_some())
            .map(SpotifyTrack::from)
            .collect())
    }

    /// Expands a reference into the tracks it stands for.
    pub async fn resolve(&self, reference: &SpotifyReference) -> MusicResult<Vec<SpotifyTrack>> {
        info!("Resolving Spotify reference: {:?}", reference);
        match reference {
            SpotifyReference::Track(id) => Ok(vec![self.get_track(id).await?]),
            SpotifyReference::Album(id) => self.get_album_tracks(id).await,
            SpotifyReference::Playlist(id) => self.get_playlist_tracks(id).await,
        }
    }

    async fn collect_pages<T: DeserializeOwned>(&self, first: String) -> MusicResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url, &[]).await?;
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }
}

async fn ensure_success(response: reqwest::Response) -> MusicResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Cannot read response".to_string());
    Err(MusicError::ExternalApiError(format!(
        "Spotify API error: {} - {}",
        status, text
    )))
}
