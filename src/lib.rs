//! `muse` is a Discord music bot built on poise/serenity and songbird.
//!
//! This crate exposes the `/play` command together with the pieces it is built
//! from: the autocomplete pipeline, the key/value cache, the suggestion provider,
//! the optional Spotify client and the songbird-backed queue service.

use std::sync::LazyLock;

pub mod commands;
pub mod config;
pub mod utils;

use commands::music::play::Play;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Shared HTTP client used for every outbound API request.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// User data stored by the framework and accessible in all command invocations.
pub struct Data {
    pub play: Play,
}
