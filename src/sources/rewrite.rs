//! Platform-specific player URLs.
//!
//! Some video sites do not play in the clients this server targets; their
//! watch URLs are swapped for a compatible player.

const NICOVIDEO_WATCH: &str = "nicovideo.jp/watch/";
const NICOVIDEO_PLAYER: &str = "https://www.nicovideo.life/watch?v=";
const BILIBILI_VIDEO: &str = "bilibili.com/video/";
const BILIBILI_PLAYER: &str = "https://biliplayer.91vrchat.com/player/?url=";

/// Rewrite a video URL for playback. Unknown URLs are returned unchanged.
pub fn rewrite(url: &str) -> String {
    if url.contains(NICOVIDEO_WATCH) {
        let last = url.rsplit('/').next().unwrap_or(url);
        let id = last.split('?').next().unwrap_or(last);
        return format!("{NICOVIDEO_PLAYER}{id}");
    }

    if url.contains(BILIBILI_VIDEO) {
        return format!("{BILIBILI_PLAYER}{url}");
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nicovideo() {
        assert_eq!(
            rewrite("https://www.nicovideo.jp/watch/sm44886216"),
            "https://www.nicovideo.life/watch?v=sm44886216"
        );
        assert_eq!(
            rewrite("https://www.nicovideo.jp/watch/sm44886216?hoge=fuga"),
            "https://www.nicovideo.life/watch?v=sm44886216"
        );
    }

    #[test]
    fn test_bilibili() {
        let url = "https://www.bilibili.com/video/BV1smLczPEa5/?spm_id_from=333.1007.tianma.1-1-1.click";
        assert_eq!(
            rewrite(url),
            format!("https://biliplayer.91vrchat.com/player/?url={url}")
        );
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(
            rewrite("https://www.youtube.com/watch?v=abcd"),
            "https://www.youtube.com/watch?v=abcd"
        );
    }
}
