use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use stillcast_av::EncodeSettings;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// URL prefix the artifact directory is served under. Redirects point
    /// at `<stream_prefix>/<key>/index.m3u8`.
    #[serde(default = "default_stream_prefix")]
    pub stream_prefix: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_stream_prefix() -> String {
    "/video/stream".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_prefix: default_stream_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Root of the per-stream artifact directories.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Maximum number of encoders running at once.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// How often a waiting request re-checks the playlist (default: 100ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest a request waits for a new playlist (default: 30s).
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Time an encoder gets to exit after SIGTERM before it is killed.
    #[serde(default = "default_grace_secs")]
    pub termination_grace_secs: u64,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("stream")
}
fn default_capacity() -> usize {
    4
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_ready_timeout_secs() -> u64 {
    30
}
fn default_grace_secs() -> u64 {
    5
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            capacity: default_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            ready_timeout_secs: default_ready_timeout_secs(),
            termination_grace_secs: default_grace_secs(),
        }
    }
}

impl CacheConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.termination_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderConfig {
    /// Explicit ffmpeg binary; falls back to PATH lookup.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// x264 CRF (default: 30)
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// x264 preset (default: "ultrafast")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// HLS segment length in seconds (default: 4)
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,

    /// Playlist window for single-image streams (default: 6 segments)
    #[serde(default = "default_still_window")]
    pub still_window: u32,

    /// Encode length ceiling in seconds (default: 3600)
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Wall-clock span a slideshow playlist should cover (default: 3600)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u32,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_fps() -> u32 {
    16
}
fn default_crf() -> u32 {
    30
}
fn default_preset() -> String {
    "ultrafast".to_string()
}
fn default_segment_secs() -> u32 {
    4
}
fn default_still_window() -> u32 {
    6
}
fn default_max_duration_secs() -> u64 {
    3600
}
fn default_retention_secs() -> u32 {
    3600
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            preset: default_preset(),
            segment_secs: default_segment_secs(),
            still_window: default_still_window(),
            max_duration_secs: default_max_duration_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl From<&EncoderConfig> for EncodeSettings {
    fn from(c: &EncoderConfig) -> Self {
        Self {
            width: c.width,
            height: c.height,
            fps: c.fps,
            crf: c.crf,
            preset: c.preset.clone(),
            segment_secs: c.segment_secs,
            still_window: c.still_window,
            max_duration_secs: c.max_duration_secs,
            retention_secs: c.retention_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single-image download (default: 2000ms)
    #[serde(default = "default_single_timeout_ms")]
    pub single_timeout_ms: u64,

    /// Timeout for each slideshow image download (default: 5000ms)
    #[serde(default = "default_slideshow_timeout_ms")]
    pub slideshow_timeout_ms: u64,
}

fn default_user_agent() -> String {
    "curl/7.54.1".to_string()
}
fn default_single_timeout_ms() -> u64 {
    2000
}
fn default_slideshow_timeout_ms() -> u64 {
    5000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            single_timeout_ms: default_single_timeout_ms(),
            slideshow_timeout_ms: default_slideshow_timeout_ms(),
        }
    }
}

impl FetchConfig {
    pub fn single_timeout(&self) -> Duration {
        Duration::from_millis(self.single_timeout_ms)
    }

    pub fn slideshow_timeout(&self) -> Duration {
        Duration::from_millis(self.slideshow_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Accept local image paths in `?url=`. Off by default: it lets clients
    /// name any readable image on the server.
    #[serde(default)]
    pub allow_local_paths: bool,

    /// Newline-separated list of video URLs used by `?url=random`.
    #[serde(default = "default_random_list_url")]
    pub random_list_url: String,

    /// YouTube Data API key (also read from `YOUTUBE_API_KEY`).
    #[serde(default)]
    pub youtube_api_key: Option<String>,

    #[serde(default = "default_youtube_api_base")]
    pub youtube_api_base: String,

    /// Where search results and grid images are cached.
    #[serde(default = "default_search_cache_dir")]
    pub search_cache_dir: PathBuf,

    /// Search cache lifetime (default: 3600s)
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,
}

fn default_random_list_url() -> String {
    "https://gist.githubusercontent.com/cympfh/653f299d9c748aa78b1a800f2bfa5221/raw/random-videos"
        .to_string()
}
fn default_youtube_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}
fn default_search_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}
fn default_search_cache_ttl_secs() -> u64 {
    3600
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            allow_local_paths: false,
            random_list_url: default_random_list_url(),
            youtube_api_key: None,
            youtube_api_base: default_youtube_api_base(),
            search_cache_dir: default_search_cache_dir(),
            search_cache_ttl_secs: default_search_cache_ttl_secs(),
        }
    }
}

impl SourcesConfig {
    /// Configured key, else the `YOUTUBE_API_KEY` environment variable.
    pub fn resolved_youtube_api_key(&self) -> Option<String> {
        self.youtube_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}
