//! Search suggestions for the `/play` query field.
//!
//! Suggestions come from YouTube's query completion endpoint and, when Spotify
//! is configured, from Spotify's album and track search. Both sources share a
//! single result limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::HTTP_CLIENT;

use super::music_error::{MusicError, MusicResult};
use super::spotify_api::{SpotifyApi, SpotifyItem, SpotifySearchResults};

const YOUTUBE_SUGGEST_BASE_URL: &str = "https://suggestqueries.google.com";

/// A single autocomplete option: the label shown to the user and the value
/// submitted as the query when it is picked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    pub value: String,
}

impl Suggestion {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Source of ranked search completions for a text query.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Returns at most `limit` suggestions for `query`. Spotify results are only
    /// included when a client is given.
    async fn suggest(
        &self,
        query: &str,
        spotify: Option<Arc<SpotifyApi>>,
        limit: usize,
    ) -> MusicResult<Vec<Suggestion>>;
}

/// Suggestion provider combining YouTube completions with Spotify search.
pub struct YoutubeAndSpotifySuggestions {
    http: reqwest::Client,
    youtube_base_url: String,
}

impl Default for YoutubeAndSpotifySuggestions {
    fn default() -> Self {
        Self::with_base_url(YOUTUBE_SUGGEST_BASE_URL)
    }
}

impl YoutubeAndSpotifySuggestions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider querying a custom completion endpoint (used by tests).
    pub fn with_base_url(youtube_base_url: impl Into<String>) -> Self {
        Self {
            http: HTTP_CLIENT.clone(),
            youtube_base_url: youtube_base_url.into(),
        }
    }

    /// Fetches YouTube's completions for `query`.
    /// The endpoint answers `[query, [suggestion, ...], ...]`.
    pub async fn youtube_suggestions(&self, query: &str) -> MusicResult<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/complete/search", self.youtube_base_url))
            .query(&[("client", "firefox"), ("ds", "yt"), ("q", query)])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request YouTube suggestions: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(MusicError::ExternalApiError(format!(
                "YouTube suggestions error: {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse YouTube suggestions: {}", e))
        })?;

        Ok(body
            .get(1)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl SuggestionProvider for YoutubeAndSpotifySuggestions {
    async fn suggest(
        &self,
        query: &str,
        spotify: Option<Arc<SpotifyApi>>,
        limit: usize,
    ) -> MusicResult<Vec<Suggestion>> {
        let spotify_search = async {
            match &spotify {
                Some(api) => api.search(query, limit).await.map(Some),
                None => Ok(None),
            }
        };

        let (youtube, spotify_results) =
            futures::future::try_join(self.youtube_suggestions(query), spotify_search).await?;

        let suggestions = mix_suggestions(youtube, spotify_results, limit);
        debug!("{} suggestions for '{}'", suggestions.len(), query);
        Ok(suggestions)
    }
}

/// Merges YouTube completions and Spotify results into at most `limit` suggestions.
///
/// Spotify takes up to half of the slots (split between albums and tracks, with
/// tracks getting the odd slot) and YouTube fills the rest. When Spotify has
/// fewer results the remaining slots go to YouTube.
pub fn mix_suggestions(
    youtube: Vec<String>,
    spotify: Option<SpotifySearchResults>,
    limit: usize,
) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = youtube
        .into_iter()
        .take(limit)
        .map(|suggestion| Suggestion::new(format!("YouTube: {}", suggestion), suggestion))
        .collect();

    let Some(spotify) = spotify else {
        return suggestions;
    };

    let albums = dedup_by_name(spotify.albums);
    let tracks = dedup_by_name(spotify.tracks);

    let spotify_count = (limit / 2).min(albums.len() + tracks.len());
    let album_count = (spotify_count / 2).min(albums.len());
    let track_count = (spotify_count - album_count).min(tracks.len());
    // Albums take over slots the tracks could not fill
    let album_count = (spotify_count - track_count).min(albums.len());

    suggestions.truncate(limit - spotify_count);

    suggestions.extend(albums.into_iter().take(album_count).map(|album| {
        Suggestion::new(
            format!("Spotify: 💿 {}", label(&album)),
            format!("spotify:album:{}", album.id),
        )
    }));

    suggestions.extend(tracks.into_iter().take(track_count).map(|track| {
        Suggestion::new(
            format!("Spotify: 🎵 {}", label(&track)),
            format!("spotify:track:{}", track.id),
        )
    }));

    suggestions
}

fn label(item: &SpotifyItem) -> String {
    match item.artists.first() {
        Some(artist) => format!("{} - {}", item.name, artist.name),
        None => item.name.clone(),
    }
}

/// Keeps the first item for every distinct name.
fn dedup_by_name(items: Vec<SpotifyItem>) -> Vec<SpotifyItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::utils::spotify_api::SpotifyArtist;
    use crate::config::SpotifyCredentials;
    use assert_matches::assert_matches;
    use serde_json::json;
    use test_case::test_case;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(id: &str, name: &str, artist: Option<&str>) -> SpotifyItem {
        SpotifyItem {
            id: id.to_string(),
            name: name.to_string(),
            artists: artist
                .map(|name| {
                    vec![SpotifyArtist {
                        name: name.to_string(),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn youtube(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("song {}", i)).collect()
    }

    fn spotify(albums: usize, tracks: usize) -> SpotifySearchResults {
        SpotifySearchResults {
            albums: (1..=albums)
                .map(|i| item(&format!("a{}", i), &format!("Album {}", i), Some("Artist")))
                .collect(),
            tracks: (1..=tracks)
                .map(|i| item(&format!("t{}", i), &format!("Track {}", i), Some("Artist")))
                .collect(),
        }
    }

    fn count_by_prefix(suggestions: &[Suggestion], prefix: &str) -> usize {
        suggestions
            .iter()
            .filter(|s| s.name.starts_with(prefix))
            .count()
    }

    #[test]
    fn test_youtube_only_respects_limit() {
        let suggestions = mix_suggestions(youtube(15), None, 10);

        assert_eq!(suggestions.len(), 10);
        assert_eq!(suggestions[0], Suggestion::new("YouTube: song 1", "song 1"));
    }

    #[test_case(15, 10, 10, 10 => (5, 2, 3); "both sources saturated")]
    #[test_case(15, 0, 3, 10 => (7, 0, 3); "no albums")]
    #[test_case(15, 1, 1, 10 => (8, 1, 1); "few spotify results")]
    #[test_case(2, 10, 10, 10 => (2, 2, 3); "few youtube results")]
    #[test_case(15, 10, 10, 5 => (3, 1, 1); "odd limit")]
    #[test_case(15, 5, 0, 10 => (5, 5, 0); "no tracks")]
    fn test_mix_split(
        youtube_count: usize,
        albums: usize,
        tracks: usize,
        limit: usize,
    ) -> (usize, usize, usize) {
        let suggestions = mix_suggestions(youtube(youtube_count), Some(spotify(albums, tracks)), limit);

        assert!(suggestions.len() <= limit);
        (
            count_by_prefix(&suggestions, "YouTube: "),
            count_by_prefix(&suggestions, "Spotify: 💿"),
            count_by_prefix(&suggestions, "Spotify: 🎵"),
        )
    }

    #[test]
    fn test_spotify_suggestion_format() {
        let results = SpotifySearchResults {
            albums: vec![item("al1", "Chill Album", Some("Lofi Girl"))],
            tracks: vec![item("tr1", "Rain", None)],
        };

        let suggestions = mix_suggestions(vec![], Some(results), 10);

        assert_eq!(
            suggestions,
            vec![
                Suggestion::new("Spotify: 💿 Chill Album - Lofi Girl", "spotify:album:al1"),
                Suggestion::new("Spotify: 🎵 Rain", "spotify:track:tr1"),
            ]
        );
    }

    #[test]
    fn test_spotify_duplicates_are_dropped() {
        let results = SpotifySearchResults {
            albums: vec![],
            tracks: vec![
                item("t1", "Same", Some("A")),
                item("t2", "Same", Some("B")),
                item("t3", "Other", Some("C")),
            ],
        };

        let suggestions = mix_suggestions(vec![], Some(results), 10);

        assert_eq!(
            suggestions
                .iter()
                .map(|s| s.value.as_str())
                .collect::<Vec<_>>(),
            vec!["spotify:track:t1", "spotify:track:t3"]
        );
    }

    #[tokio::test]
    async fn test_youtube_suggestions_are_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/complete/search"))
            .and(query_param("client", "firefox"))
            .and(query_param("ds", "yt"))
            .and(query_param("q", "lofi beats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(["lofi beats", ["lofi beats 1", "lofi beats 2"]])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = YoutubeAndSpotifySuggestions::with_base_url(server.uri());
        let suggestions = provider.suggest("lofi beats", None, 10).await.unwrap();

        assert_eq!(
            suggestions,
            vec![
                Suggestion::new("YouTube: lofi beats 1", "lofi beats 1"),
                Suggestion::new("YouTube: lofi beats 2", "lofi beats 2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_suggestions_include_spotify_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/complete/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!(["rain", ["rain sounds"]])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "t",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "albums": { "items": [], "next": null },
                "tracks": { "items": [
                    { "id": "tr9", "name": "Rain", "artists": [{ "name": "Storm" }] }
                ], "next": null }
            })))
            .mount(&server)
            .await;

        let spotify = Arc::new(SpotifyApi::with_base_urls(
            SpotifyCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
            server.uri(),
            server.uri(),
        ));
        let provider = YoutubeAndSpotifySuggestions::with_base_url(server.uri());
        let suggestions = provider.suggest("rain", Some(spotify), 10).await.unwrap();

        assert_eq!(
            suggestions,
            vec![
                Suggestion::new("YouTube: rain sounds", "rain sounds"),
                Suggestion::new("Spotify: 🎵 Rain - Storm", "spotify:track:tr9"),
            ]
        );
    }

    #[tokio::test]
    async fn test_youtube_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/complete/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = YoutubeAndSpotifySuggestions::with_base_url(server.uri());
        let result = provider.suggest("anything", None, 10).await;

        assert_matches!(result, Err(MusicError::ExternalApiError(_)));
    }
}
