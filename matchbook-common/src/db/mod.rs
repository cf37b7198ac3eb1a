//! Repository over the SQLite store
//!
//! The [`Repository`] is the sole writer/reader of durable person/photo
//! state. It is explicitly constructed from a pool at bootstrap and passed
//! by handle into the worker pool and classifier middleware; there is no
//! ambient global connection.

pub mod init;

pub use init::{create_person_table, create_photo_table, init_database};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, warn};

use crate::model::{Label, Person, Photo, PhotoStatus};
use crate::{Error, Result};

/// Seam between the repository and the image fetch sub-pipeline.
///
/// `ensure` brings the photo's local asset into a valid state and returns
/// the photo with its updated status. Transport and validation failures are
/// confined to the returned status; only storage faults surface as errors.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn ensure(&self, photo: &Photo) -> Result<Photo>;
}

/// Sole reader/writer of the person/photo tables.
///
/// Cheap to clone; all clones share the underlying pool.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent create-or-merge by person id.
    ///
    /// The label only moves forward in strength order (a re-ingested
    /// recommendation never overwrites an existing like/dislike/match).
    /// Photos are merged by id; a photo's download status is preserved
    /// across re-ingestion. The metadata transaction commits atomically
    /// before any fetch runs, so a fetch failure can never lose metadata;
    /// each fetch failure is confined to that photo's status.
    pub async fn upsert(&self, person: &Person, fetcher: &dyn AssetFetcher) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT label FROM person WHERE id = ?")
                .bind(&person.id)
                .fetch_optional(&mut *tx)
                .await?;

        let label = match existing.as_deref().and_then(Label::from_str) {
            Some(current) if current.strength() > person.label.strength() => current,
            _ => person.label,
        };

        sqlx::query(
            r#"
            INSERT INTO person (id, label, name, birth_date, bio, gender, distance_mi)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                label = excluded.label,
                name = COALESCE(excluded.name, person.name),
                birth_date = COALESCE(excluded.birth_date, person.birth_date),
                bio = COALESCE(excluded.bio, person.bio),
                gender = COALESCE(excluded.gender, person.gender),
                distance_mi = COALESCE(excluded.distance_mi, person.distance_mi),
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&person.id)
        .bind(label.as_str())
        .bind(&person.name)
        .bind(person.birth_date.map(|d| d.to_rfc3339()))
        .bind(&person.bio)
        .bind(person.gender)
        .bind(person.distance_mi)
        .execute(&mut *tx)
        .await?;

        for photo in &person.photos {
            // Insert-if-absent, fields updated if present; status untouched
            // so a downloaded asset is not re-queued by re-ingestion
            sqlx::query(
                r#"
                INSERT INTO photo (id, person_id, url, file_name, crop_info, media_type,
                                   rank, score, win_count, status)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    file_name = excluded.file_name,
                    crop_info = COALESCE(excluded.crop_info, photo.crop_info),
                    media_type = COALESCE(excluded.media_type, photo.media_type),
                    rank = COALESCE(excluded.rank, photo.rank),
                    score = COALESCE(excluded.score, photo.score),
                    win_count = COALESCE(excluded.win_count, photo.win_count),
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&photo.id)
            .bind(&person.id)
            .bind(&photo.url)
            .bind(&photo.file_name)
            .bind(&photo.crop_info)
            .bind(&photo.media_type)
            .bind(photo.rank)
            .bind(photo.score)
            .bind(photo.win_count)
            .bind(PhotoStatus::NotDownloaded.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        // Fetch phase: runs outside the transaction so network I/O never
        // holds a write lock. Failures stay confined to the photo's status.
        for photo in &person.photos {
            let Some(stored) = self.get_photo(&photo.id).await? else {
                continue;
            };
            if matches!(
                stored.status,
                PhotoStatus::NotDownloaded | PhotoStatus::Error
            ) {
                match fetcher.ensure(&stored).await {
                    Ok(updated) => {
                        debug!(
                            photo_id = %updated.id,
                            status = updated.status.as_str(),
                            "photo ensured"
                        );
                    }
                    Err(e) => {
                        warn!(photo_id = %stored.id, "photo fetch failed: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Direct label transition used by like/dislike events.
    ///
    /// Unconditional overwrite: an explicit user action always wins over the
    /// merge policy. A missing id is a no-op, not an error, because the
    /// like/dislike may be observed before the recommendation that would
    /// have created the row.
    pub async fn set_label(&self, id: &str, label: Label) -> Result<()> {
        let result = sqlx::query(
            "UPDATE person SET label = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(label.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(person_id = %id, "set_label on unknown person, ignoring");
        }

        Ok(())
    }

    /// Load one person with their photos
    pub async fn get_person(&self, id: &str) -> Result<Option<Person>> {
        let row = sqlx::query(
            "SELECT id, label, name, birth_date, bio, gender, distance_mi FROM person WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut person = person_from_row(&row)?;

        let photo_rows = sqlx::query(
            r#"
            SELECT id, person_id, url, file_name, crop_info, media_type,
                   rank, score, win_count, status
            FROM photo
            WHERE person_id = ?
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        for photo_row in &photo_rows {
            person.photos.push(photo_from_row(photo_row)?);
        }

        Ok(Some(person))
    }

    /// Load the full person/photo graph
    pub async fn get_all(&self) -> Result<Vec<Person>> {
        let person_rows = sqlx::query(
            "SELECT id, label, name, birth_date, bio, gender, distance_mi FROM person ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let photo_rows = sqlx::query(
            r#"
            SELECT id, person_id, url, file_name, crop_info, media_type,
                   rank, score, win_count, status
            FROM photo
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut photos_by_person: HashMap<String, Vec<Photo>> = HashMap::new();
        for row in &photo_rows {
            let photo = photo_from_row(row)?;
            photos_by_person
                .entry(photo.person_id.clone())
                .or_default()
                .push(photo);
        }

        let mut people = Vec::with_capacity(person_rows.len());
        for row in &person_rows {
            let mut person = person_from_row(row)?;
            if let Some(photos) = photos_by_person.remove(&person.id) {
                person.photos = photos;
            }
            people.push(person);
        }

        Ok(people)
    }

    /// Read-only query over the materialized graph
    pub async fn find<F>(&self, predicate: F) -> Result<Vec<Person>>
    where
        F: Fn(&Person) -> bool,
    {
        let mut people = self.get_all().await?;
        people.retain(|p| predicate(p));
        Ok(people)
    }

    /// Load one photo by id
    pub async fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        let row = sqlx::query(
            r#"
            SELECT id, person_id, url, file_name, crop_info, media_type,
                   rank, score, win_count, status
            FROM photo
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(photo_from_row).transpose()
    }

    /// Persist a photo lifecycle transition
    pub async fn update_photo_status(&self, photo_id: &str, status: PhotoStatus) -> Result<()> {
        sqlx::query("UPDATE photo SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(status.as_str())
            .bind(photo_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All photos currently in the given state
    pub async fn photos_with_status(&self, status: PhotoStatus) -> Result<Vec<Photo>> {
        let rows = sqlx::query(
            r#"
            SELECT id, person_id, url, file_name, crop_info, media_type,
                   rank, score, win_count, status
            FROM photo
            WHERE status = ?
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(photo_from_row).collect()
    }

    /// Reset photos stranded in `downloading` by a prior crash.
    ///
    /// Must run at bootstrap before the worker pool starts, so interrupted
    /// fetches become eligible again. Returns the number of rows reset.
    pub async fn reset_stale_downloads(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE photo SET status = ? WHERE status = ?")
            .bind(PhotoStatus::NotDownloaded.as_str())
            .bind(PhotoStatus::Downloading.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn person_from_row(row: &SqliteRow) -> Result<Person> {
    let label_str: String = row.get("label");
    let label = Label::from_str(&label_str)
        .ok_or_else(|| Error::Internal(format!("invalid label in person row: {label_str}")))?;

    let birth_date: Option<String> = row.get("birth_date");
    let birth_date = birth_date
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|d| d.with_timezone(&Utc));

    Ok(Person {
        id: row.get("id"),
        label,
        name: row.get("name"),
        birth_date,
        bio: row.get("bio"),
        gender: row.get("gender"),
        distance_mi: row.get("distance_mi"),
        photos: Vec::new(),
    })
}

fn photo_from_row(row: &SqliteRow) -> Result<Photo> {
    let status_str: String = row.get("status");
    let status = PhotoStatus::from_str(&status_str)
        .ok_or_else(|| Error::Internal(format!("invalid status in photo row: {status_str}")))?;

    Ok(Photo {
        id: row.get("id"),
        person_id: row.get("person_id"),
        url: row.get("url"),
        file_name: row.get("file_name"),
        crop_info: row.get("crop_info"),
        media_type: row.get("media_type"),
        rank: row.get("rank"),
        score: row.get("score"),
        win_count: row.get("win_count"),
        status,
    })
}
