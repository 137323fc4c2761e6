//! "Random" video of the hour.
//!
//! The list is shuffled with a seed derived from the UTC date, and the hour
//! of the day indexes into it: every client gets the same video for an hour,
//! and the rotation order changes daily.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reqwest::Client;
use sha2::{Digest, Sha256};
use stillcast_common::{Error, Result};

const LIST_TIMEOUT: Duration = Duration::from_secs(1);

/// Fetches the published video list and picks today's entry for this hour.
#[derive(Debug, Clone)]
pub struct RandomSource {
    client: Client,
    list_url: String,
}

impl RandomSource {
    pub fn new(client: Client, list_url: impl Into<String>) -> Self {
        Self {
            client,
            list_url: list_url.into(),
        }
    }

    /// The pick for the current hour.
    pub async fn pick(&self) -> Result<String> {
        let list = self.fetch_list().await?;
        pick_from(list, Utc::now())
            .ok_or_else(|| Error::upstream("random", "no video URLs found in the list"))
    }

    async fn fetch_list(&self) -> Result<Vec<String>> {
        let body = self
            .client
            .get(&self.list_url)
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::upstream("random", e))?
            .text()
            .await
            .map_err(|e| Error::upstream("random", e))?;

        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Shuffle `list` with the day's seed and take entry `hour % len`.
pub fn pick_from(mut list: Vec<String>, now: DateTime<Utc>) -> Option<String> {
    if list.is_empty() {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(day_seed(&now));
    list.shuffle(&mut rng);
    let index = now.hour() as usize % list.len();
    list.into_iter().nth(index)
}

fn day_seed(now: &DateTime<Utc>) -> u64 {
    let date = now.format("%Y/%m/%d").to_string();
    let digest = Sha256::digest(date.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}
