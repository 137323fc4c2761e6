//! Transcoding job cache.
//!
//! Turns image and slideshow requests into live HLS streams on disk, one
//! encoder per stream key:
//!
//! - [`ArtifactStore`]: `<base>/<key>/index.m3u8` plus segments
//! - [`JobLauncher`]: starts encoders ([`FfmpegLauncher`] in production)
//! - [`JobRegistry`]: running encoders, capped, least recently used evicted first
//! - [`await_ready`]: bounded wait for a new playlist
//! - [`StreamService`]: ties the above together behind `get`

mod launcher;
mod ready;
mod registry;
mod service;
mod store;

pub use launcher::{FfmpegLauncher, JobLauncher, JobProcess};
pub use ready::{await_ready, ReadyPolicy};
pub use registry::{JobRegistry, JobSnapshot, JobState};
pub use service::{CacheStatus, FetchTimeouts, StreamLocation, StreamService};
pub use store::ArtifactStore;

use std::sync::Arc;

use crate::config::Config;
use crate::sources::Fetcher;

/// Build the stream service described by `config` around the given
/// collaborators.
pub fn build_service(
    config: &Config,
    launcher: Arc<dyn JobLauncher>,
    fetcher: Arc<dyn Fetcher>,
) -> StreamService {
    let store = ArtifactStore::new(&config.cache.base_dir);
    let registry = Arc::new(JobRegistry::new(
        config.cache.capacity,
        store.clone(),
        config.cache.termination_grace(),
    ));

    StreamService::new(store, registry, launcher, fetcher)
        .with_ready_policy(ReadyPolicy {
            poll_interval: config.cache.poll_interval(),
            timeout: config.cache.ready_timeout(),
        })
        .with_fetch_timeouts(FetchTimeouts {
            single: config.fetch.single_timeout(),
            slideshow_item: config.fetch.slideshow_timeout(),
        })
}
