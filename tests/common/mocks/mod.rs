//! Mock implementations of the collaborators behind `/play`.

use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;

use muse::commands::music::utils::music_error::MusicResult;
use muse::commands::music::utils::queue_manager::{PlayRequest, QueueOutcome, QueueService};
use muse::commands::music::utils::spotify_api::SpotifyApi;
use muse::commands::music::utils::suggestions::{Suggestion, SuggestionProvider};

mock! {
    pub Queue {}

    #[async_trait]
    impl QueueService for Queue {
        async fn add_to_queue(&self, request: PlayRequest) -> MusicResult<QueueOutcome>;
    }
}

mock! {
    pub Suggestions {}

    #[async_trait]
    impl SuggestionProvider for Suggestions {
        async fn suggest(
            &self,
            query: &str,
            spotify: Option<Arc<SpotifyApi>>,
            limit: usize,
        ) -> MusicResult<Vec<Suggestion>>;
    }
}
