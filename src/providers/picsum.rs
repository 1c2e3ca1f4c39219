//! Random target images from Lorem Picsum.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use uuid::Uuid;

use super::TargetSource;
use crate::config::Config;
use crate::models::{AcquiredTarget, SENTINEL_TARGET_ID};

const DEFAULT_URL: &str = "https://picsum.photos";
const IMAGE_SIZE: u32 = 512;

/// Downloads a seeded random image per target.
///
/// The seed doubles as the target id, so the same id always maps to the same
/// picture upstream.
#[derive(Debug, Clone)]
pub struct PicsumTargetSource {
    base_url: String,
    dir: PathBuf,
    attempts: u32,
    retry_delay: Duration,
    client: Client,
}

impl PicsumTargetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            dir: dir.into(),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.targets_dir.clone()).with_attempts(config.acquire_attempts)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn download(&self, seed: &str) -> anyhow::Result<PathBuf> {
        let url = format!("{}/seed/{}/{}/{}", self.base_url, seed, IMAGE_SIZE, IMAGE_SIZE);
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.jpg", seed));
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!("Downloaded target {} ({} bytes)", seed, bytes.len());
        Ok(path)
    }

    /// Path of the placeholder image, created empty if missing.
    async fn sentinel_image(&self) -> PathBuf {
        let path = self.dir.join(format!("{}.jpg", SENTINEL_TARGET_ID));
        if let Err(e) = ensure_file(&path).await {
            tracing::warn!("Could not create placeholder image {}: {}", path.display(), e);
        }
        path
    }
}

#[async_trait]
impl TargetSource for PicsumTargetSource {
    async fn acquire_target(&self) -> AcquiredTarget {
        for attempt in 1..=self.attempts {
            let seed = new_seed();
            match self.download(&seed).await {
                Ok(path) => {
                    return AcquiredTarget {
                        target_id: seed,
                        image_ref: path.to_string_lossy().into_owned(),
                        fallback: false,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Target download attempt {}/{} failed: {}",
                        attempt,
                        self.attempts,
                        e
                    );
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        tracing::error!(
            "Giving up on target download after {} attempts, using sentinel target",
            self.attempts
        );
        let path = self.sentinel_image().await;
        AcquiredTarget::sentinel(path.to_string_lossy().into_owned())
    }
}

/// Eight-digit, zero-padded random seed.
fn new_seed() -> String {
    format!("{:08}", Uuid::new_v4().as_u128() % 100_000_000)
}

async fn ensure_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if !tokio::fs::try_exists(path).await? {
        tokio::fs::write(path, b"").await?;
    }
    Ok(())
}
