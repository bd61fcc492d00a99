//! Common test utilities, fixtures, and mocks

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::sync::{Arc, Once};

use muse::commands::music::play::Play;
use muse::commands::music::utils::key_value_cache::KeyValueCache;

use mocks::{MockQueue, MockSuggestions};

static INIT: Once = Once::new();

/// Initialize tracing for tests
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("muse=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Builds a `Play` around the given mocks and a fresh in-memory cache.
/// The cache is returned as well so tests can inspect it.
pub fn play_with(queue: MockQueue, suggestions: MockSuggestions) -> (Play, Arc<KeyValueCache>) {
    init();
    let cache = Arc::new(KeyValueCache::new());
    let play = Play::new(Arc::new(queue), cache.clone(), Arc::new(suggestions), None);
    (play, cache)
}
