//! Runtime configuration read from the process environment (and `.env` via `dotenv`).

use std::env;
use std::path::PathBuf;

use crate::commands::music::utils::music_error::{MusicError, MusicResult};
use crate::utils::database::APPDATA_DB;

/// Client credentials for the Spotify Web API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Settings the bot needs at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub discord_token: String,
    /// `None` disables every Spotify feature.
    pub spotify: Option<SpotifyCredentials>,
    /// SQLite file backing the key/value cache.
    pub cache_db_path: PathBuf,
    pub cache_persist: bool,
}

impl Config {
    /// Reads the configuration from environment variables.
    pub fn from_env() -> MusicResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> MusicResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let discord_token = non_empty("DISCORD_TOKEN")
            .ok_or_else(|| MusicError::ConfigError("DISCORD_TOKEN not set".to_string()))?;

        let spotify = match (non_empty("SPOTIFY_CLIENT_ID"), non_empty("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => {
                return Err(MusicError::ConfigError(
                    "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together".to_string(),
                ));
            }
        };

        let cache_db_path = non_empty("CACHE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(APPDATA_DB));

        let cache_persist = match non_empty("CACHE_PERSIST") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                MusicError::ConfigError(format!("CACHE_PERSIST is not a boolean: {}", value))
            })?,
            None => true,
        };

        Ok(Self {
            discord_token,
            spotify,
            cache_db_path,
            cache_persist,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use test_case::test_case;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "token")])).unwrap();

        assert_eq!(
            config,
            Config {
                discord_token: "token".to_string(),
                spotify: None,
                cache_db_path: PathBuf::from(APPDATA_DB),
                cache_persist: true,
            }
        );
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert_matches!(result, Err(MusicError::ConfigError(_)));
    }

    #[test]
    fn test_spotify_credentials_enable_spotify() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(
            config.spotify,
            Some(SpotifyCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            })
        );
    }

    #[test]
    fn test_half_configured_spotify_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("SPOTIFY_CLIENT_ID", "id"),
        ]));
        assert_matches!(result, Err(MusicError::ConfigError(_)));
    }

    #[test_case("true", true)]
    #[test_case("0", false)]
    #[test_case("Off", false)]
    #[test_case("YES", true)]
    fn test_cache_persist_flag(raw: &str, expected: bool) {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("CACHE_PERSIST", raw),
        ]))
        .unwrap();
        assert_eq!(config.cache_persist, expected);
    }

    #[test]
    fn test_invalid_cache_persist_flag() {
        let result = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "token"),
            ("CACHE_PERSIST", "sometimes"),
        ]));
        assert_matches!(result, Err(MusicError::ConfigError(_)));
    }
}
