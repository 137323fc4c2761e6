//! Stillcast-Common: shared types for the stream cache.
//!
//! - **Stream keys**: SHA-256 fingerprints identifying an encode job's input
//! - **Descriptors**: single-image and slideshow request shapes, with validation
//! - **Path utilities**: image detection for local paths and URLs
//! - **Error handling**: the unified error type and its HTTP status mapping
//!
//! # Examples
//!
//! ```
//! use stillcast_common::{JobDescriptor, SlideshowSpec};
//!
//! let single = JobDescriptor::url("https://example.com/cat.jpg");
//! assert_eq!(single.key(), single.key());
//!
//! let show = SlideshowSpec::new(
//!     vec!["https://a/1.png".into(), "https://a/2.png".into()],
//!     5,
//!     1,
//! );
//! assert!(show.validate().is_ok());
//! ```

pub mod error;
pub mod key;
pub mod paths;

pub use error::{Error, Result};
pub use key::{ImageSource, JobDescriptor, SlideshowSpec, StreamKey};
