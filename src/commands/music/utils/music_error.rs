use thiserror::Error;

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("{0}")]
    Precondition(String),

    #[error("Not in a guild")]
    NotInGuild,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Audio source error: {0}")]
    AudioSourceError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;
