//! Keyword search against the YouTube Data API.
//!
//! Results and rendered thumbnail grids are cached on disk, keyed by the
//! SHA-256 of the keyword, and reused while younger than the cache TTL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{imageops::FilterType, Rgba, RgbaImage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use stillcast_common::{Error, Result, StreamKey};

const SERVICE: &str = "youtube";
const MAX_RESULTS: u32 = 20;
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(5);

/// Thumbnail cell size in the grid image.
pub const CELL_WIDTH: u32 = 320;
pub const CELL_HEIGHT: u32 = 180;
/// The grid is `GRID_SIZE` x `GRID_SIZE` cells.
pub const GRID_SIZE: u32 = 3;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub thumbnail: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
    thumbnails: Thumbnails,
}

#[derive(Deserialize)]
struct Thumbnails {
    medium: Thumbnail,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

/// Video search with an on-disk result cache.
#[derive(Debug, Clone)]
pub struct VideoSearch {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    cache_dir: PathBuf,
    ttl: Duration,
}

impl VideoSearch {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        api_key: Option<String>,
        cache_dir: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            cache_dir: cache_dir.into(),
            ttl,
        }
    }

    /// Search results for `keyword`, from cache when fresh.
    pub async fn search(&self, keyword: &str) -> Result<Vec<SearchResult>> {
        let cache_file = self.cache_path(keyword, "json");
        if is_fresh(&cache_file, self.ttl).await {
            match read_cached(&cache_file).await {
                Ok(results) => {
                    tracing::debug!(keyword, "Search cache hit");
                    return Ok(results);
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable search cache"),
            }
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Unavailable("video search requires a YouTube API key".into()))?;

        tracing::info!(keyword, "Searching videos");
        let max_results = MAX_RESULTS.to_string();
        let response: SearchResponse = self
            .client
            .get(format!("{}/search", self.api_base))
            .query(&[
                ("part", "snippet"),
                ("q", keyword),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::upstream(SERVICE, e))?
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, e))?;

        let results: Vec<SearchResult> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(SearchResult {
                    title: item.snippet.title,
                    url: format!("https://www.youtube.com/watch?v={video_id}"),
                    thumbnail: item.snippet.thumbnails.medium.url,
                })
            })
            .collect();

        if let Err(e) = self.write_cache(&cache_file, &results).await {
            tracing::warn!(error = %e, "Failed to write search cache");
        }
        Ok(results)
    }

    /// The `index`-th result (0-based) for `keyword`.
    pub async fn result(&self, keyword: &str, index: usize) -> Result<SearchResult> {
        let results = self.search(keyword).await?;
        let count = results.len();
        results.into_iter().nth(index).ok_or_else(|| {
            Error::not_found(
                "search result",
                format!("{index} (found {count} results for {keyword:?})"),
            )
        })
    }

    /// A PNG grid of the first nine result thumbnails, each labelled with
    /// its index. Returns the cached file's path.
    pub async fn grid(&self, keyword: &str) -> Result<PathBuf> {
        let grid_file = self.cache_path(keyword, "png");
        if is_fresh(&grid_file, self.ttl).await {
            return Ok(grid_file);
        }

        let results = self.search(keyword).await?;
        let cells = (GRID_SIZE * GRID_SIZE) as usize;

        let mut thumbnails = Vec::with_capacity(cells);
        for result in results.iter().take(cells) {
            thumbnails.push(self.download_thumbnail(&result.thumbnail).await);
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let target = grid_file.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let grid = render_grid(&thumbnails);
            let tmp = target.with_extension("png.tmp");
            grid.save_with_format(&tmp, image::ImageFormat::Png)
                .map_err(|e| Error::internal(format!("failed to write grid image: {e}")))?;
            std::fs::rename(&tmp, &target)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::internal(format!("grid render task failed: {e}")))??;

        tracing::info!(keyword, path = %grid_file.display(), "Rendered search grid");
        Ok(grid_file)
    }

    async fn download_thumbnail(&self, url: &str) -> Option<Vec<u8>> {
        let result = async {
            self.client
                .get(url)
                .timeout(THUMBNAIL_TIMEOUT)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        }
        .await;

        match result {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to download thumbnail");
                None
            }
        }
    }

    fn cache_path(&self, keyword: &str, ext: &str) -> PathBuf {
        let hash = StreamKey::digest(keyword);
        self.cache_dir.join(format!("yt_search_{hash}.{ext}"))
    }

    async fn write_cache(&self, path: &Path, results: &[SearchResult]) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let json = serde_json::to_vec_pretty(results)
            .map_err(|e| Error::internal(format!("failed to encode search cache: {e}")))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

async fn read_cached(path: &Path) -> Result<Vec<SearchResult>> {
    let data = tokio::fs::read(path).await?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::internal(format!("corrupt search cache {}: {e}", path.display())))
}

async fn is_fresh(path: &Path, ttl: Duration) -> bool {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age < ttl)
        .unwrap_or(false)
}

/// Lay thumbnails out row by row on a transparent canvas. Cells without a
/// decodable thumbnail stay transparent.
pub fn render_grid(thumbnails: &[Option<Vec<u8>>]) -> RgbaImage {
    let mut canvas = RgbaImage::new(CELL_WIDTH * GRID_SIZE, CELL_HEIGHT * GRID_SIZE);
    let cells = (GRID_SIZE * GRID_SIZE) as usize;

    for index in 0..cells {
        let x = (index as u32 % GRID_SIZE) * CELL_WIDTH;
        let y = (index as u32 / GRID_SIZE) * CELL_HEIGHT;

        let Some(Some(bytes)) = thumbnails.get(index) else {
            continue;
        };
        match image::load_from_memory(bytes) {
            Ok(img) => {
                let cell = img
                    .resize_exact(CELL_WIDTH, CELL_HEIGHT, FilterType::Triangle)
                    .to_rgba8();
                image::imageops::replace(&mut canvas, &cell, i64::from(x), i64::from(y));
                draw_label(&mut canvas, x, y, &index.to_string());
            }
            Err(e) => tracing::warn!(index, error = %e, "Undecodable thumbnail"),
        }
    }
    canvas
}

/// 3x5 bitmap digits, one row per byte, high bit on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];
const GLYPH_SCALE: u32 = 4;
const GLYPH_GAP: u32 = 4;
const OUTLINE: u32 = 2;
const LABEL_MARGIN: u32 = 10;

/// White digits with a black outline, centered at the bottom of a cell.
fn draw_label(canvas: &mut RgbaImage, cell_x: u32, cell_y: u32, label: &str) {
    let glyph_w = 3 * GLYPH_SCALE;
    let glyph_h = 5 * GLYPH_SCALE;
    let digits: Vec<usize> = label
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();
    if digits.is_empty() {
        return;
    }

    let width = digits.len() as u32 * glyph_w + (digits.len() as u32 - 1) * GLYPH_GAP;
    let left = cell_x + CELL_WIDTH.saturating_sub(width) / 2;
    let top = cell_y + CELL_HEIGHT.saturating_sub(glyph_h + LABEL_MARGIN);

    for (color, grow) in [(Rgba([0, 0, 0, 255]), OUTLINE), (Rgba([255, 255, 255, 255]), 0)] {
        for (n, digit) in digits.iter().enumerate() {
            let gx = left + n as u32 * (glyph_w + GLYPH_GAP);
            for (row, bits) in DIGITS[*digit].iter().enumerate() {
                for col in 0..3u32 {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    let px = gx + col * GLYPH_SCALE;
                    let py = top + row as u32 * GLYPH_SCALE;
                    fill_rect(
                        canvas,
                        px.saturating_sub(grow),
                        py.saturating_sub(grow),
                        GLYPH_SCALE + 2 * grow,
                        GLYPH_SCALE + 2 * grow,
                        color,
                    );
                }
            }
        }
    }
}

fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x_end = (x + w).min(canvas.width());
    let y_end = (y + h).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            canvas.put_pixel(px, py, color);
        }
    }
}
