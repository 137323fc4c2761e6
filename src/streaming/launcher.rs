//! Encoder launching.
//!
//! The registry and orchestrator only see the two traits here, so tests can
//! drive the whole cache with in-process fakes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use stillcast_av::{EncodeJob, EncodeSettings, EncoderProcess, Termination};
use stillcast_common::{Error, Result};

/// A running encode job, owned by the registry.
#[async_trait]
pub trait JobProcess: Send + std::fmt::Debug {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Non-blocking check. `Some(status)` once the process has exited.
    fn exit_status(&mut self) -> Option<String>;

    /// SIGTERM, wait up to `grace`, then kill.
    async fn terminate(&mut self, grace: Duration) -> stillcast_av::Result<Termination>;
}

#[async_trait]
impl JobProcess for EncoderProcess {
    fn id(&self) -> Option<u32> {
        EncoderProcess::id(self)
    }

    fn exit_status(&mut self) -> Option<String> {
        match self.try_exit_status() {
            Ok(status) => status.map(|s| s.to_string()),
            Err(e) => {
                tracing::warn!(pid = ?self.id(), error = %e, "Failed to poll encoder status");
                None
            }
        }
    }

    async fn terminate(&mut self, grace: Duration) -> stillcast_av::Result<Termination> {
        EncoderProcess::terminate(self, grace).await
    }
}

/// Starts encode jobs.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    /// Start `job`, writing its artifacts into `out_dir`.
    ///
    /// Returns once the process is running, not once it has output.
    async fn launch(&self, job: &EncodeJob, out_dir: &Path) -> Result<Box<dyn JobProcess>>;
}

/// Launches ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    ffmpeg: PathBuf,
    settings: EncodeSettings,
}

impl FfmpegLauncher {
    pub fn new(ffmpeg: impl Into<PathBuf>, settings: EncodeSettings) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            settings,
        }
    }

    /// Resolve ffmpeg from the configured path or `PATH`.
    pub fn locate(configured: Option<&Path>, settings: EncodeSettings) -> Result<Self> {
        let ffmpeg = stillcast_av::get_tool_path("ffmpeg", configured).map_err(launch_error)?;
        Ok(Self::new(ffmpeg, settings))
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }
}

#[async_trait]
impl JobLauncher for FfmpegLauncher {
    async fn launch(&self, job: &EncodeJob, out_dir: &Path) -> Result<Box<dyn JobProcess>> {
        let process =
            stillcast_av::start(&self.ffmpeg, &self.settings, job, out_dir).map_err(launch_error)?;
        Ok(Box::new(process))
    }
}

fn launch_error(e: stillcast_av::Error) -> Error {
    Error::launch(e.to_string())
}
