//! Sample data used across the `/play` tests.

use muse::commands::music::utils::queue_manager::ChannelRef;
use muse::commands::music::utils::suggestions::Suggestion;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};

/// Sample guild ID for testing
pub const SAMPLE_GUILD_ID: u64 = 111111111;

/// Sample channel ID for testing
pub const SAMPLE_CHANNEL_ID: u64 = 987654321;

/// Sample user ID for testing
pub const SAMPLE_USER_ID: u64 = 123456789;

pub fn sample_channel() -> ChannelRef {
    ChannelRef {
        guild_id: GuildId::new(SAMPLE_GUILD_ID),
        channel_id: ChannelId::new(SAMPLE_CHANNEL_ID),
        requested_by: UserId::new(SAMPLE_USER_ID),
    }
}

pub fn lofi_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new("lofi beats 1", "lofi beats 1"),
        Suggestion::new("lofi beats 2", "lofi beats 2"),
    ]
}
