//! ffmpeg argument planning for live HLS encodes of still images.
//!
//! Both job shapes produce the same output layout in the job directory:
//! - `index.m3u8` - rolling live playlist, never terminated
//! - `seg_00000.ts`, `seg_00001.ts`, … - media segments, pruned as the
//!   window moves
//!
//! Slideshows additionally write `concat.txt` for ffmpeg's concat demuxer.

use std::path::{Path, PathBuf};

use crate::process::EncoderProcess;
use crate::{Error, Result};

/// Playlist file name inside a job directory.
pub const MANIFEST_NAME: &str = "index.m3u8";

/// Segment file name pattern inside a job directory.
pub const SEGMENT_PATTERN: &str = "seg_%05d.ts";

/// Concat demuxer input list for slideshows.
pub const CONCAT_FILE_NAME: &str = "concat.txt";

const HLS_FLAGS: &str = "delete_segments+append_list+omit_endlist";

/// Encoder parameters shared by every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// x264 constant rate factor.
    pub crf: u32,
    /// x264 preset name.
    pub preset: String,
    /// Target HLS segment length in seconds. Keyframes are forced on this cadence.
    pub segment_secs: u32,
    /// Playlist window for single-image streams.
    pub still_window: u32,
    /// Hard ceiling on the encode length in seconds.
    pub max_duration_secs: u64,
    /// Wall-clock span a slideshow playlist window should cover.
    pub retention_secs: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 16,
            crf: 30,
            preset: "ultrafast".to_string(),
            segment_secs: 4,
            still_window: 6,
            max_duration_secs: 3600,
            retention_secs: 3600,
        }
    }
}

/// Shape of an encode job, with inputs already on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeJob {
    /// One image looped for the whole stream.
    Still { image: PathBuf },
    /// Images shown in order, the list repeated `loop_count` times.
    Slideshow {
        images: Vec<PathBuf>,
        duration_secs: u32,
        loop_count: u32,
    },
}

/// Everything needed to start one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    /// ffmpeg arguments, program name excluded.
    pub args: Vec<String>,
    /// Contents of `concat.txt`, for slideshows.
    pub concat_list: Option<String>,
    /// Number of segments kept in the playlist.
    pub window: u32,
}

impl EncodeSettings {
    /// Build the ffmpeg invocation for `job`, writing into `out_dir`.
    pub fn plan(&self, job: &EncodeJob, out_dir: &Path) -> Result<EncodePlan> {
        let fps = self.fps.to_string();
        let mut args: Vec<String> = vec!["-y".into(), "-re".into()];

        let (window, concat, tune) = match job {
            EncodeJob::Still { image } => {
                args.extend(["-loop", "1", "-framerate", fps.as_str()].map(String::from));
                args.push("-i".into());
                args.push(image.to_string_lossy().into_owned());
                (self.still_window.max(1), None, true)
            }
            EncodeJob::Slideshow {
                images,
                duration_secs,
                loop_count,
            } => {
                if images.is_empty() {
                    return Err(Error::InvalidInput("slideshow has no images".into()));
                }
                if *duration_secs == 0 || *loop_count == 0 {
                    return Err(Error::InvalidInput(
                        "slideshow duration and loop count must be positive".into(),
                    ));
                }
                let concat_path = out_dir.join(CONCAT_FILE_NAME);
                args.extend(["-f", "concat", "-safe", "0", "-i"].map(String::from));
                args.push(concat_path.to_string_lossy().into_owned());
                let window = slideshow_window(
                    self.retention_secs,
                    self.segment_secs,
                    *duration_secs,
                    images.len(),
                );
                let entries: Vec<PathBuf> =
                    images.iter().map(|image| concat_entry(image, out_dir)).collect();
                let loops = effective_loops(
                    self.max_duration_secs,
                    *duration_secs,
                    images.len(),
                    *loop_count,
                );
                let list = concat_list(&entries, *duration_secs, loops);
                (window, Some(list), false)
            }
        };

        args.push("-vf".into());
        args.push(self.scale_filter());
        args.extend(["-c:v", "libx264", "-preset"].map(String::from));
        args.push(self.preset.clone());
        if tune {
            args.extend(["-tune", "stillimage"].map(String::from));
        }
        args.push("-crf".into());
        args.push(self.crf.to_string());
        args.push("-r".into());
        args.push(fps);
        args.push("-g".into());
        args.push((self.fps * self.segment_secs).to_string());
        args.extend(["-sc_threshold", "0", "-force_key_frames"].map(String::from));
        args.push(format!("expr:gte(t,n_forced*{})", self.segment_secs));
        args.push("-an".into());
        args.push("-t".into());
        args.push(self.max_duration_secs.to_string());
        args.extend(["-f", "hls", "-hls_time"].map(String::from));
        args.push(self.segment_secs.to_string());
        args.push("-hls_list_size".into());
        args.push(window.to_string());
        args.extend(["-hls_flags", HLS_FLAGS, "-hls_segment_filename"].map(String::from));
        args.push(out_dir.join(SEGMENT_PATTERN).to_string_lossy().into_owned());
        args.push(out_dir.join(MANIFEST_NAME).to_string_lossy().into_owned());

        Ok(EncodePlan {
            args,
            concat_list: concat,
            window,
        })
    }

    /// Fit inside the target frame, then letterbox to exactly that size.
    fn scale_filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,format=yuv420p"
        )
    }
}

/// Playlist window for a slideshow so the retained segments span roughly
/// `retention_secs` of wall clock, never fewer than one segment.
///
/// Matches `max(floor(retention / segment / duration / images), 1)`.
pub fn slideshow_window(
    retention_secs: u32,
    segment_secs: u32,
    duration_secs: u32,
    image_count: usize,
) -> u32 {
    if segment_secs == 0 || duration_secs == 0 || image_count == 0 {
        return 1;
    }
    let window = retention_secs as f64
        / segment_secs as f64
        / duration_secs as f64
        / image_count as f64;
    (window.floor() as u32).max(1)
}

/// Number of list passes worth writing out. Anything past
/// `max_duration_secs` is cut by `-t`, so longer lists only cost memory.
pub fn effective_loops(
    max_duration_secs: u64,
    duration_secs: u32,
    image_count: usize,
    loop_count: u32,
) -> u32 {
    let pass_secs = u64::from(duration_secs) * image_count as u64;
    if pass_secs == 0 {
        return loop_count;
    }
    let needed = max_duration_secs.div_ceil(pass_secs).max(1);
    u64::from(loop_count).min(needed) as u32
}

/// How `image` is named inside a concat list stored in `list_dir`.
///
/// The demuxer resolves relative entries against the list's own directory,
/// not the working directory.
fn concat_entry(image: &Path, list_dir: &Path) -> PathBuf {
    if let Ok(name) = image.strip_prefix(list_dir) {
        return name.to_path_buf();
    }
    if image.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(image);
        }
    }
    image.to_path_buf()
}

/// The display order: the full image list repeated `loop_count` times.
pub fn expand_sequence(images: &[PathBuf], loop_count: u32) -> Vec<&PathBuf> {
    (0..loop_count).flat_map(|_| images.iter()).collect()
}

/// Concat demuxer list for a slideshow.
///
/// The demuxer ignores the `duration` of the final entry, so the last image
/// is listed once more without one.
pub fn concat_list(images: &[PathBuf], duration_secs: u32, loop_count: u32) -> String {
    let sequence = expand_sequence(images, loop_count);
    let mut out = String::new();
    for image in &sequence {
        out.push_str(&format!("file {}\n", quote_concat_path(image)));
        out.push_str(&format!("duration {duration_secs}\n"));
    }
    if let Some(last) = sequence.last() {
        out.push_str(&format!("file {}\n", quote_concat_path(last)));
    }
    out
}

/// Single-quote a path for the concat list; embedded quotes become `'\''`.
fn quote_concat_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// Create the job directory, write any side files, and spawn the encoder.
///
/// Returns as soon as the process is running; the playlist appears later.
pub fn start(
    ffmpeg: &Path,
    settings: &EncodeSettings,
    job: &EncodeJob,
    out_dir: &Path,
) -> Result<EncoderProcess> {
    std::fs::create_dir_all(out_dir)?;

    let plan = settings.plan(job, out_dir)?;
    if let Some(ref list) = plan.concat_list {
        std::fs::write(out_dir.join(CONCAT_FILE_NAME), list)?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        window = plan.window,
        "ffmpeg command: {} {}",
        ffmpeg.display(),
        plan.args.join(" ")
    );

    EncoderProcess::spawn(ffmpeg, &plan.args)
}
