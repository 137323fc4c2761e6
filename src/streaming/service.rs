//! Request-facing orchestration of the stream cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use stillcast_av::{EncodeJob, MANIFEST_NAME};
use stillcast_common::paths::image_extensions;
use stillcast_common::{Error, ImageSource, JobDescriptor, Result, StreamKey};
use tokio::sync::Notify;

use super::launcher::JobLauncher;
use super::ready::{await_ready, ReadyPolicy};
use super::registry::{JobRegistry, JobSnapshot};
use super::store::ArtifactStore;
use crate::sources::Fetcher;

/// Where a ready stream can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamLocation {
    pub key: StreamKey,
    /// Filesystem path of the playlist.
    pub manifest: PathBuf,
    /// Playlist path relative to the artifact root: `<key>/index.m3u8`.
    pub relative: String,
}

/// Per-download timeouts.
#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub single: Duration,
    pub slideshow_item: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            single: Duration::from_secs(2),
            slideshow_item: Duration::from_secs(5),
        }
    }
}

/// Cache status for the API.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub capacity: usize,
    pub running: Vec<JobSnapshot>,
    pub cached: usize,
}

/// Turns job descriptors into ready streams, reusing cached output where
/// possible.
#[derive(Clone)]
pub struct StreamService {
    store: ArtifactStore,
    registry: Arc<JobRegistry>,
    launcher: Arc<dyn JobLauncher>,
    fetcher: Arc<dyn Fetcher>,
    policy: ReadyPolicy,
    timeouts: FetchTimeouts,
    in_flight: Arc<DashMap<StreamKey, Arc<Notify>>>,
}

impl StreamService {
    pub fn new(
        store: ArtifactStore,
        registry: Arc<JobRegistry>,
        launcher: Arc<dyn JobLauncher>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            store,
            registry,
            launcher,
            fetcher,
            policy: ReadyPolicy::default(),
            timeouts: FetchTimeouts::default(),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn with_ready_policy(mut self, policy: ReadyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fetch_timeouts(mut self, timeouts: FetchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Return a ready stream for `descriptor`, starting an encoder if there
    /// is no cached output.
    ///
    /// Concurrent calls for the same key share one launch. The launch itself
    /// runs in its own task, so a caller going away does not leave a job
    /// half-registered.
    pub async fn get(&self, descriptor: JobDescriptor) -> Result<StreamLocation> {
        descriptor.validate()?;
        let key = descriptor.key();

        if let Some(location) = self.cached(&key).await {
            return Ok(location);
        }

        let notify = loop {
            match self.in_flight.entry(key.clone()) {
                Entry::Occupied(e) => {
                    // Another request is starting this stream; wait for it.
                    let notify = e.get().clone();
                    let notified = notify.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    drop(e);
                    notified.await;

                    if let Some(location) = self.cached(&key).await {
                        return Ok(location);
                    }
                    // It failed; try to start it ourselves.
                }
                Entry::Vacant(e) => {
                    let notify = Arc::new(Notify::new());
                    e.insert(notify.clone());
                    break notify;
                }
            }
        };

        let guard = InFlight {
            map: self.in_flight.clone(),
            key: key.clone(),
            notify,
        };
        let service = self.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            service.start(&descriptor, &key).await
        });

        task.await
            .map_err(|e| Error::internal(format!("stream task failed: {e}")))?
    }

    /// Stop all encoders. Artifact directories stay on disk.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    pub fn status(&self) -> Result<CacheStatus> {
        Ok(CacheStatus {
            capacity: self.registry.capacity(),
            running: self.registry.snapshot(),
            cached: self.store.list()?.len(),
        })
    }

    async fn cached(&self, key: &StreamKey) -> Option<StreamLocation> {
        if !self.store.is_ready(key).await {
            return None;
        }
        if self.registry.touch(key) {
            tracing::debug!(key = %key, "Cache hit");
        } else {
            tracing::debug!(key = %key, "Cache hit on unregistered stream");
        }
        Some(self.location(key))
    }

    fn location(&self, key: &StreamKey) -> StreamLocation {
        StreamLocation {
            key: key.clone(),
            manifest: self.store.manifest_path(key),
            relative: format!("{}/{}", key, MANIFEST_NAME),
        }
    }

    async fn start(&self, descriptor: &JobDescriptor, key: &StreamKey) -> Result<StreamLocation> {
        // A previous leader may have finished between our check and taking
        // the slot.
        if let Some(location) = self.cached(key).await {
            return Ok(location);
        }

        tracing::info!(key = %key, "Cache miss, starting stream");
        let dir = self.store.prepare(key).await?;

        let job = match self.resolve_inputs(descriptor, &dir).await {
            Ok(job) => job,
            Err(e) => {
                self.discard(key).await;
                return Err(e);
            }
        };

        self.registry.make_room().await;

        let process = match self.launcher.launch(&job, &dir).await {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to launch encoder");
                self.discard(key).await;
                return Err(e);
            }
        };
        self.registry.admit(key.clone(), process).await;

        let registry = &self.registry;
        match await_ready(&self.store, key, &self.policy, || registry.state(key)).await {
            Ok(()) => {
                tracing::info!(key = %key, "Stream ready");
                Ok(self.location(key))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stream did not become ready");
                self.registry.evict(key).await;
                Err(e)
            }
        }
    }

    /// Drop a directory that never got an encoder. Keeps it if something
    /// else already made it ready.
    async fn discard(&self, key: &StreamKey) {
        if !self.registry.contains(key) && !self.store.is_ready(key).await {
            self.store.delete(key).await;
        }
    }

    /// Turn the descriptor into local input files inside `dir`.
    async fn resolve_inputs(&self, descriptor: &JobDescriptor, dir: &Path) -> Result<EncodeJob> {
        match descriptor {
            JobDescriptor::Single(ImageSource::Path(path)) => {
                let image = PathBuf::from(path);
                if !image.is_file() {
                    return Err(Error::not_found("image", path));
                }
                Ok(EncodeJob::Still { image })
            }
            JobDescriptor::Single(ImageSource::Url(url)) => {
                let image = dir.join(source_file_name(0, url));
                self.fetcher.fetch(url, &image, self.timeouts.single).await?;
                Ok(EncodeJob::Still { image })
            }
            JobDescriptor::Slideshow(spec) => {
                let mut images = Vec::with_capacity(spec.urls.len());
                for (index, url) in spec.urls.iter().enumerate() {
                    let image = dir.join(source_file_name(index, url));
                    self.fetcher
                        .fetch(url, &image, self.timeouts.slideshow_item)
                        .await?;
                    tracing::debug!("Downloaded image {}/{}: {}", index + 1, spec.urls.len(), url);
                    images.push(image);
                }
                Ok(EncodeJob::Slideshow {
                    images,
                    duration_secs: spec.duration_secs,
                    loop_count: spec.loop_count,
                })
            }
        }
    }
}

/// `source_000.png` for a URL ending in `.png`; `.jpg` when the URL has no
/// recognizable image extension.
fn source_file_name(index: usize, url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let ext = last
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| image_extensions().contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("source_{index:03}.{ext}")
}

/// Releases the in-flight slot for a key and wakes its waiters, however the
/// launch task ends.
struct InFlight {
    map: Arc<DashMap<StreamKey, Arc<Notify>>>,
    key: StreamKey,
    notify: Arc<Notify>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.map.remove(&self.key);
        self.notify.notify_waiters();
    }
}
