//! Domain model: people, photos and relationship labels
//!
//! Pure data types, no I/O. Instances produced by the classifiers are
//! transient; the durable copies are owned by the [`crate::db::Repository`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relationship label attached to an observed profile.
///
/// `Match` is a strong positive signal and collapses to `Like` for downstream
/// consumers (see [`Label::effective`]), but is stored distinctly because it
/// originates from a different event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Recommendation,
    Like,
    Dislike,
    Match,
}

impl Label {
    /// Stable string form used in the `person.label` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Recommendation => "recommendation",
            Label::Like => "like",
            Label::Dislike => "dislike",
            Label::Match => "match",
        }
    }

    /// Parse the column string form
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "recommendation" => Some(Label::Recommendation),
            "like" => Some(Label::Like),
            "dislike" => Some(Label::Dislike),
            "match" => Some(Label::Match),
            _ => None,
        }
    }

    /// Strength order used by the upsert merge policy:
    /// `Recommendation < {Like, Dislike} < Match`.
    ///
    /// A re-ingested recommendation must never overwrite a label the user
    /// already expressed an opinion about.
    pub fn strength(&self) -> u8 {
        match self {
            Label::Recommendation => 0,
            Label::Like | Label::Dislike => 1,
            Label::Match => 2,
        }
    }

    /// Label as seen by downstream consumers: a match counts as a like.
    pub fn effective(&self) -> Label {
        match self {
            Label::Match => Label::Like,
            other => *other,
        }
    }
}

/// Lifecycle state of a photo's image asset on local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoStatus {
    NotDownloaded,
    Downloading,
    Downloaded,
    Error,
}

impl PhotoStatus {
    /// Stable string form used in the `photo.status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::NotDownloaded => "not-downloaded",
            PhotoStatus::Downloading => "downloading",
            PhotoStatus::Downloaded => "downloaded",
            PhotoStatus::Error => "error",
        }
    }

    /// Parse the column string form
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "not-downloaded" => Some(PhotoStatus::NotDownloaded),
            "downloading" => Some(PhotoStatus::Downloading),
            "downloaded" => Some(PhotoStatus::Downloaded),
            "error" => Some(PhotoStatus::Error),
            _ => None,
        }
    }
}

/// One image asset belonging to a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    /// Source-assigned id, stable across re-ingestion
    pub id: String,
    /// Owning person id
    pub person_id: String,
    /// Remote source URL
    pub url: String,
    /// File name under the person's image directory
    pub file_name: String,
    /// Opaque crop metadata from the source, serialized JSON
    pub crop_info: Option<String>,
    pub media_type: Option<String>,
    /// Popularity signals supplied by the source
    pub rank: Option<i64>,
    pub score: Option<f64>,
    pub win_count: Option<i64>,
    pub status: PhotoStatus,
}

impl Photo {
    /// Local path of the image asset under `root`.
    ///
    /// Deterministic: two records with the same id always resolve to the
    /// same `root/person_id/file_name` path.
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.person_id).join(&self.file_name)
    }
}

/// One observed profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    /// Source-assigned id, stable across re-ingestion
    pub id: String,
    pub label: Label,
    pub name: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub gender: Option<i64>,
    pub distance_mi: Option<i64>,
    /// Owned photos, merged by id on re-ingestion; order irrelevant
    pub photos: Vec<Photo>,
}
