//! Photo asset fetching
//!
//! Brings a photo's image file into a valid state on local storage: skips
//! assets that are already present and valid, repairs corrupt leftovers
//! from earlier failed attempts, and streams the remote resource to disk.
//! Every lifecycle transition is persisted so an interrupted fetch is
//! observable on restart. No retry loop here; a photo is retried only when
//! it is re-submitted.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use matchbook_common::db::{AssetFetcher, Repository};
use matchbook_common::model::{Photo, PhotoStatus};
use matchbook_common::{Error, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// The upstream image host rejects requests without the origin-site referer
const UPSTREAM_REFERER: &str = "https://tinder.com";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// True when the file starts with a recognized image signature.
///
/// Explicit predicate, never an error: an unreadable, empty, truncated or
/// non-image file is simply not valid.
pub fn validate_image(path: &Path) -> bool {
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    let mut header = [0u8; 64];
    let read = match file.read(&mut header) {
        Ok(read) => read,
        Err(_) => return false,
    };

    read > 0 && infer::is_image(&header[..read])
}

/// Fetches photo assets into the image tree.
pub struct PhotoFetcher {
    client: reqwest::Client,
    repo: Repository,
    image_root: PathBuf,
}

impl PhotoFetcher {
    pub fn new(repo: Repository, image_root: PathBuf) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            repo,
            image_root,
        })
    }

    pub fn image_root(&self) -> &Path {
        &self.image_root
    }

    /// Stream the remote resource to `target`. On any failure the partial
    /// file is removed by the caller.
    async fn download(&self, photo: &Photo, target: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(&photo.url)
            .header(reqwest::header::REFERER, UPSTREAM_REFERER)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "unexpected status {} for {}",
                status, photo.url
            )));
        }

        let mut file = tokio::fs::File::create(target).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        // A 200 with an error page or truncated payload must not be
        // recorded as a downloaded image
        if !validate_image(target) {
            return Err(Error::Fetch(format!(
                "fetched payload for {} is not a valid image",
                photo.url
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AssetFetcher for PhotoFetcher {
    async fn ensure(&self, photo: &Photo) -> Result<Photo> {
        let target = photo.path_under(&self.image_root);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if target.exists() {
            if validate_image(&target) {
                // Idempotent skip, no network call
                if photo.status != PhotoStatus::Downloaded {
                    self.repo
                        .update_photo_status(&photo.id, PhotoStatus::Downloaded)
                        .await?;
                }
                debug!(photo_id = %photo.id, "asset already on disk, skipping fetch");
                let mut updated = photo.clone();
                updated.status = PhotoStatus::Downloaded;
                return Ok(updated);
            }

            warn!(photo_id = %photo.id, "asset on disk is not a valid image, re-fetching");
            tokio::fs::remove_file(&target).await?;
        }

        // Persisted before the fetch so a crash mid-download is visible
        // (and recoverable) on restart
        self.repo
            .update_photo_status(&photo.id, PhotoStatus::Downloading)
            .await?;

        let mut updated = photo.clone();
        match self.download(photo, &target).await {
            Ok(()) => {
                updated.status = PhotoStatus::Downloaded;
                info!(
                    photo_id = %photo.id,
                    person_id = %photo.person_id,
                    "photo downloaded"
                );
            }
            Err(e) => {
                warn!(photo_id = %photo.id, "photo fetch failed: {}", e);
                // Never leave a zero-byte or partial file behind
                if target.exists() {
                    if let Err(e) = tokio::fs::remove_file(&target).await {
                        warn!(photo_id = %photo.id, "could not remove partial file: {}", e);
                    }
                }
                updated.status = PhotoStatus::Error;
            }
        }

        self.repo
            .update_photo_status(&photo.id, updated.status)
            .await?;

        Ok(updated)
    }
}
