//! Stream keys and the request descriptors they are derived from.
//!
//! A [`StreamKey`] is the SHA-256 of a job's semantic input. It names the
//! artifact directory and the registry entry, so the byte layout fed into
//! the hash must stay stable: it matches stream directories written by
//! earlier deployments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Minimum number of images in a slideshow.
pub const SLIDESHOW_MIN_IMAGES: usize = 2;

/// Maximum number of images in a slideshow.
pub const SLIDESHOW_MAX_IMAGES: usize = 10;

/// Hex-encoded SHA-256 fingerprint of a job's input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Hash arbitrary bytes into a key.
    pub fn digest(bytes: impl AsRef<[u8]>) -> Self {
        Self(hex::encode(Sha256::digest(bytes.as_ref())))
    }

    /// The 64-character lowercase hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StreamKey {
    type Err = Error;

    /// Parse a directory name back into a key. Only well-formed digests are
    /// accepted so stray directories under the cache root are ignored.
    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == 64
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::validation(format!("not a stream key: {s}")))
        }
    }
}

/// Where a single-image job reads its picture from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A file already on local disk.
    Path(String),
    /// A remote image that must be downloaded first.
    Url(String),
}

impl ImageSource {
    /// The descriptor string as given by the caller.
    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::Path(p) => p,
            ImageSource::Url(u) => u,
        }
    }
}

/// Ordered slideshow of remote images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideshowSpec {
    /// Image URLs in display order.
    pub urls: Vec<String>,
    /// Seconds each image stays on screen.
    pub duration_secs: u32,
    /// How many times the whole list is played.
    pub loop_count: u32,
}

impl SlideshowSpec {
    pub fn new(urls: Vec<String>, duration_secs: u32, loop_count: u32) -> Self {
        Self {
            urls,
            duration_secs,
            loop_count,
        }
    }

    /// Check image count bounds and positive timing fields.
    pub fn validate(&self) -> Result<()> {
        let n = self.urls.len();
        if n < SLIDESHOW_MIN_IMAGES {
            return Err(Error::validation(format!(
                "Slideshow requires at least {SLIDESHOW_MIN_IMAGES} images, got {n}"
            )));
        }
        if n > SLIDESHOW_MAX_IMAGES {
            return Err(Error::validation(format!(
                "Slideshow supports at most {SLIDESHOW_MAX_IMAGES} images, got {n}"
            )));
        }
        if self.urls.iter().any(|u| u.trim().is_empty()) {
            return Err(Error::validation("Slideshow URLs must not be empty"));
        }
        if self.duration_secs == 0 {
            return Err(Error::validation("duration must be a positive integer"));
        }
        if self.loop_count == 0 {
            return Err(Error::validation("loop count must be a positive integer"));
        }
        Ok(())
    }

    /// Serialized form hashed into the stream key.
    ///
    /// `["u1", "u2"]|duration=5|loop=2`, with the list written the way a
    /// default JSON encoder with ASCII-only output renders it.
    pub fn key_material(&self) -> String {
        let mut out = String::from("[");
        for (i, url) in self.urls.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            push_ascii_json_string(&mut out, url);
        }
        out.push(']');
        out.push_str(&format!(
            "|duration={}|loop={}",
            self.duration_secs, self.loop_count
        ));
        out
    }
}

/// Description of one encode job, before any input is downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDescriptor {
    /// A single looped still image.
    Single(ImageSource),
    /// An ordered list of images shown in sequence.
    Slideshow(SlideshowSpec),
}

impl JobDescriptor {
    /// Single-image job reading a local file.
    pub fn path(path: impl Into<String>) -> Self {
        JobDescriptor::Single(ImageSource::Path(path.into()))
    }

    /// Single-image job reading a remote image.
    pub fn url(url: impl Into<String>) -> Self {
        JobDescriptor::Single(ImageSource::Url(url.into()))
    }

    /// Reject malformed descriptors before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        match self {
            JobDescriptor::Single(source) => {
                if source.as_str().trim().is_empty() {
                    return Err(Error::validation("Either path or url must be provided"));
                }
                Ok(())
            }
            JobDescriptor::Slideshow(spec) => spec.validate(),
        }
    }

    /// Derive the stream key. Pure; no normalization of any field.
    pub fn key(&self) -> StreamKey {
        match self {
            JobDescriptor::Single(source) => StreamKey::digest(source.as_str()),
            JobDescriptor::Slideshow(spec) => StreamKey::digest(spec.key_material()),
        }
    }
}

fn push_ascii_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(urls: &[&str], duration: u32, loops: u32) -> SlideshowSpec {
        SlideshowSpec::new(urls.iter().map(|u| u.to_string()).collect(), duration, loops)
    }

    #[test]
    fn test_single_key_is_sha256_of_descriptor() {
        // sha256("abc")
        let key = JobDescriptor::url("abc").key();
        assert_eq!(
            key.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(JobDescriptor::path("abc").key(), key);
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = JobDescriptor::Slideshow(show(&["https://a/1.png", "https://a/2.png"], 5, 2));
        let b = a.clone();
        assert_eq!(a.key(), a.key());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_material_layout() {
        let spec = show(&["https://a/1.png", "https://a/2.png"], 5, 2);
        assert_eq!(
            spec.key_material(),
            r#"["https://a/1.png", "https://a/2.png"]|duration=5|loop=2"#
        );
    }

    #[test]
    fn test_key_material_escapes_non_ascii() {
        let spec = show(&["https://a/猫.png", "https://a/\"q\".png"], 1, 1);
        assert_eq!(
            spec.key_material(),
            r#"["https://a/\u732b.png", "https://a/\"q\".png"]|duration=1|loop=1"#
        );

        let emoji = show(&["😀", "x"], 1, 1);
        assert!(emoji.key_material().starts_with(r#"["\ud83d\ude00", "x"]"#));
    }

    #[test]
    fn test_key_material_escapes_control_and_delete() {
        let spec = show(&["a\u{7f}b", "c\u{1}d"], 1, 1);
        assert_eq!(
            spec.key_material(),
            r#"["a\u007fb", "c\u0001d"]|duration=1|loop=1"#
        );
    }

    #[test]
    fn test_key_sensitive_to_order_duration_and_loops() {
        let base = JobDescriptor::Slideshow(show(&["u1", "u2", "u3"], 5, 2)).key();
        let reordered = JobDescriptor::Slideshow(show(&["u2", "u1", "u3"], 5, 2)).key();
        let longer = JobDescriptor::Slideshow(show(&["u1", "u2", "u3"], 6, 2)).key();
        let more_loops = JobDescriptor::Slideshow(show(&["u1", "u2", "u3"], 5, 3)).key();

        assert_ne!(base, reordered);
        assert_ne!(base, longer);
        assert_ne!(base, more_loops);
    }

    #[test]
    fn test_slideshow_bounds() {
        assert!(show(&["a"], 5, 1).validate().is_err());
        assert!(show(&["a", "b"], 5, 1).validate().is_ok());

        let ten: Vec<String> = (0..10).map(|i| format!("u{i}")).collect();
        assert!(SlideshowSpec::new(ten.clone(), 5, 1).validate().is_ok());

        let mut eleven = ten;
        eleven.push("u10".into());
        assert!(matches!(
            SlideshowSpec::new(eleven, 5, 1).validate(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_slideshow_timing_must_be_positive() {
        assert!(show(&["a", "b"], 0, 1).validate().is_err());
        assert!(show(&["a", "b"], 1, 0).validate().is_err());
    }

    #[test]
    fn test_empty_single_rejected() {
        assert!(JobDescriptor::url("  ").validate().is_err());
        assert!(JobDescriptor::path("/tmp/a.png").validate().is_ok());
    }

    #[test]
    fn test_stream_key_from_str() {
        let key = JobDescriptor::url("x").key();
        let parsed: StreamKey = key.as_str().parse().unwrap();
        assert_eq!(parsed, key);

        assert!("not-a-key".parse::<StreamKey>().is_err());
        assert!(key.as_str().to_uppercase().parse::<StreamKey>().is_err());
    }
}
