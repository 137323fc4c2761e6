//! # stillcast-av
//!
//! Live HLS encoding of still images with ffmpeg.
//!
//! This crate provides:
//! - Encode planning: ffmpeg arguments for a looped single image or a
//!   concatenated slideshow, including the rolling playlist window
//! - Encoder process control: fire-and-forget spawn and bounded
//!   graceful-then-forceful termination
//! - External tool detection
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use stillcast_av::{EncodeJob, EncodeSettings};
//! use std::path::{Path, PathBuf};
//!
//! # async fn example() -> stillcast_av::Result<()> {
//! let settings = EncodeSettings::default();
//! let job = EncodeJob::Still { image: PathBuf::from("/tmp/cat.jpg") };
//! let process = stillcast_av::start(Path::new("ffmpeg"), &settings, &job, Path::new("/tmp/out"))?;
//! println!("encoder pid: {:?}", process.id());
//! # Ok(())
//! # }
//! ```

pub mod encode;
mod error;
pub mod process;
pub mod tools;

// Re-exports
pub use encode::{
    concat_list, effective_loops, expand_sequence, slideshow_window, start, EncodeJob, EncodePlan,
    EncodeSettings, CONCAT_FILE_NAME, MANIFEST_NAME, SEGMENT_PATTERN,
};
pub use error::{Error, Result};
pub use process::{EncoderProcess, Termination};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};
