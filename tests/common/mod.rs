//! Shared test harness for integration tests.
//!
//! Provides in-process fakes for the encoder and the image fetcher, and
//! [`TestHarness`], a [`StreamService`] over a temporary artifact directory.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stillcast::config::Config;
use stillcast::sources::Fetcher;
use stillcast::streaming::{
    build_service, JobLauncher, JobProcess, ReadyPolicy, StreamService,
};
use stillcast_av::{EncodeJob, Termination, MANIFEST_NAME};
use stillcast_common::{Error, Result};
use tempfile::TempDir;

/// What the fake encoder does after launch.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Write a playlist after the given delay.
    Publish(Duration),
    /// Keep running without ever writing a playlist.
    Hang,
    /// Exit immediately without output.
    Crash,
    /// Fail to start.
    FailLaunch,
}

#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
    terminated: Arc<AtomicBool>,
    exited: bool,
}

#[async_trait]
impl JobProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn exit_status(&mut self) -> Option<String> {
        self.exited.then(|| "exit status: 1".to_string())
    }

    async fn terminate(&mut self, _grace: Duration) -> stillcast_av::Result<Termination> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(Termination::Graceful)
    }
}

/// Records every launch and simulates the encoder writing its playlist.
pub struct FakeLauncher {
    behavior: Mutex<Behavior>,
    next_pid: AtomicU32,
    pub jobs: Mutex<Vec<EncodeJob>>,
    pub terminated: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FakeLauncher {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            next_pid: AtomicU32::new(1000),
            jobs: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn launches(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the `n`-th launched process has been terminated.
    pub fn was_terminated(&self, n: usize) -> bool {
        self.terminated.lock()[n].load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobLauncher for FakeLauncher {
    async fn launch(&self, job: &EncodeJob, out_dir: &Path) -> Result<Box<dyn JobProcess>> {
        let behavior = *self.behavior.lock();
        if let Behavior::FailLaunch = behavior {
            return Err(Error::launch("ffmpeg: spawn failed"));
        }

        self.jobs.lock().push(job.clone());
        let terminated = Arc::new(AtomicBool::new(false));
        self.terminated.lock().push(terminated.clone());

        if let Behavior::Publish(delay) = behavior {
            let manifest = out_dir.join(MANIFEST_NAME);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tokio::fs::write(manifest, "#EXTM3U\n#EXT-X-VERSION:3\n").await;
            });
        }

        Ok(Box::new(FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            terminated,
            exited: matches!(behavior, Behavior::Crash),
        }))
    }
}

/// Writes placeholder bytes; URLs containing `fail` error out.
#[derive(Default)]
pub struct FakeFetcher {
    pub fetched: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path, _timeout: Duration) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("fail") {
            return Err(Error::fetch(url, "404 Not Found"));
        }
        tokio::fs::write(dest, b"image").await?;
        self.fetched.lock().push(url.to_string());
        Ok(())
    }
}

/// A stream service over a temporary directory with fake collaborators.
pub struct TestHarness {
    pub dir: TempDir,
    pub config: Config,
    pub launcher: Arc<FakeLauncher>,
    pub fetcher: Arc<FakeFetcher>,
    pub service: StreamService,
}

impl TestHarness {
    pub fn new(behavior: Behavior) -> Self {
        Self::with_capacity(4, behavior)
    }

    pub fn with_capacity(capacity: usize, behavior: Behavior) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.cache.base_dir = dir.path().join("stream");
        config.cache.capacity = capacity;
        config.sources.search_cache_dir = dir.path().join("cache");

        let launcher = Arc::new(FakeLauncher::new(behavior));
        let fetcher = Arc::new(FakeFetcher::default());
        let service = build_service(&config, launcher.clone(), fetcher.clone())
            .with_ready_policy(ReadyPolicy {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_millis(500),
            });

        Self {
            dir,
            config,
            launcher,
            fetcher,
            service,
        }
    }
}

pub fn image_url(n: usize) -> String {
    format!("https://images.example/{n}.jpg")
}
