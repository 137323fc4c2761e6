//! Where stream and redirect targets come from.
//!
//! The root endpoint accepts a single free-form `url` parameter; [`classify`]
//! decides what it is and the server dispatches on the resulting [`Target`].

mod fetch;
pub mod random;
pub mod rewrite;
pub mod search;

pub use fetch::{build_client, Fetcher, HttpFetcher};
pub use random::RandomSource;
pub use rewrite::rewrite;
pub use search::{SearchResult, VideoSearch};

use std::path::Path;

use stillcast_common::paths::{is_http_url, is_image_file, is_image_url};

/// What a raw `url` parameter refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The literal `random`: today's pick from the random video list.
    Random,
    /// A remote image, streamed.
    ImageUrl(String),
    /// Any other web URL, redirected to (after platform rewriting).
    VideoUrl(String),
    /// A local image file, streamed.
    ImagePath(String),
    /// Free text, treated as a video search.
    Keyword(String),
}

/// Classify a raw target. Local paths are only recognized when
/// `allow_local_paths` is set; otherwise they are searched for like any
/// other text.
pub fn classify(raw: &str, allow_local_paths: bool) -> Target {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("random") {
        return Target::Random;
    }

    if is_http_url(trimmed) {
        return if is_image_url(trimmed) {
            Target::ImageUrl(trimmed.to_string())
        } else {
            Target::VideoUrl(trimmed.to_string())
        };
    }

    if allow_local_paths {
        let path = Path::new(trimmed);
        if is_image_file(path) && path.is_file() {
            return Target::ImagePath(trimmed.to_string());
        }
    }

    Target::Keyword(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random() {
        assert_eq!(classify("random", false), Target::Random);
        assert_eq!(classify("  RANDOM ", false), Target::Random);
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            classify("https://example.com/cat.jpg", false),
            Target::ImageUrl("https://example.com/cat.jpg".into())
        );
        assert_eq!(
            classify("http://example.com/a/b.PNG?size=large", false),
            Target::ImageUrl("http://example.com/a/b.PNG?size=large".into())
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abcd", false),
            Target::VideoUrl("https://www.youtube.com/watch?v=abcd".into())
        );
    }

    #[test]
    fn test_local_paths_need_opt_in() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("still.png");
        std::fs::write(&image, b"png").unwrap();
        let raw = image.to_string_lossy().to_string();

        assert_eq!(classify(&raw, true), Target::ImagePath(raw.clone()));
        assert_eq!(classify(&raw, false), Target::Keyword(raw.clone()));

        let missing = tmp.path().join("missing.png").to_string_lossy().to_string();
        assert_eq!(classify(&missing, true), Target::Keyword(missing.clone()));
    }

    #[test]
    fn test_keyword() {
        assert_eq!(classify("lofi hip hop", true), Target::Keyword("lofi hip hop".into()));
    }
}
