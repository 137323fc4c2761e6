//! Image detection for local paths and remote URLs.
//!
//! Input classification decides between "stream this picture" and "redirect
//! to this video" by extension alone; nothing is downloaded to decide.

use std::path::Path;

/// Image extensions accepted as stream sources.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use stillcast_common::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("poster.jpg")));
/// assert!(!is_image_file(Path::new("movie.mkv")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(is_image_extension)
        .unwrap_or(false)
}

/// Check if an `http(s)` URL points at an image, judging by the last path
/// segment. Query strings and fragments are ignored.
///
/// # Examples
///
/// ```
/// use stillcast_common::paths::is_image_url;
///
/// assert!(is_image_url("https://example.com/a/cat.PNG?size=large"));
/// assert!(!is_image_url("https://www.youtube.com/watch?v=abcd"));
/// ```
pub fn is_image_url(url: &str) -> bool {
    let Some(rest) = strip_scheme(url) else {
        return false;
    };
    let path = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    // The host alone (no '/') never names a file.
    let Some((_, path)) = path.split_once('/') else {
        return false;
    };
    let last = path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && is_image_extension(ext))
        .unwrap_or(false)
}

/// Whether the string is an absolute `http://` or `https://` URL.
pub fn is_http_url(s: &str) -> bool {
    strip_scheme(s).is_some()
}

/// Get the list of image file extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

fn strip_scheme(s: &str) -> Option<&str> {
    ["https://", "http://"].into_iter().find_map(|scheme| {
        let head = s.get(..scheme.len())?;
        head.eq_ignore_ascii_case(scheme)
            .then(|| &s[scheme.len()..])
    })
}
