//! Shared fixtures for matchbook-ingest integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use matchbook_common::db::{create_person_table, create_photo_table, AssetFetcher, Repository};
use matchbook_common::model::{Label, Person, Photo, PhotoStatus};
use matchbook_common::Result;
use sqlx::sqlite::SqlitePoolOptions;

/// Minimal JPEG header; enough for signature-based image validation
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
];

/// Fetcher stub that leaves photos untouched
pub struct NoopFetcher;

#[async_trait]
impl AssetFetcher for NoopFetcher {
    async fn ensure(&self, photo: &Photo) -> Result<Photo> {
        Ok(photo.clone())
    }
}

pub async fn test_repo() -> Repository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    create_person_table(&pool).await.unwrap();
    create_photo_table(&pool).await.unwrap();

    Repository::new(pool)
}

pub fn photo(id: &str, person_id: &str, url: &str, file_name: &str) -> Photo {
    Photo {
        id: id.to_string(),
        person_id: person_id.to_string(),
        url: url.to_string(),
        file_name: file_name.to_string(),
        crop_info: None,
        media_type: Some("image".to_string()),
        rank: None,
        score: None,
        win_count: None,
        status: PhotoStatus::NotDownloaded,
    }
}

pub fn person(id: &str, label: Label, photos: Vec<Photo>) -> Person {
    Person {
        id: id.to_string(),
        label,
        name: Some("Sam".to_string()),
        birth_date: None,
        bio: None,
        gender: None,
        distance_mi: None,
        photos,
    }
}
