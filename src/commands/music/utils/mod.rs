// Export music utilities
pub mod key_value_cache;
pub mod music_error;
pub mod queue_manager;
pub mod spotify_api;
pub mod suggestions;

use std::time::Duration;

/// Time-to-live used for cached autocomplete suggestions.
pub const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
