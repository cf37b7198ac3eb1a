//! Concrete classifiers for the dating-app API
//!
//! Match rules:
//! - recommendations feed: GET with `/v2/recs` in the path
//! - matches list: GET with `/v2/matches` in the path
//! - like: POST with `/like/` in the path, profile id in the next segment
//! - pass: GET with `/pass/` in the path, profile id in the next segment

use chrono::{DateTime, Utc};
use matchbook_common::model::{Label, Person, Photo, PhotoStatus};
use matchbook_common::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::Classifier;
use crate::exchange::Exchange;
use crate::pipeline::{WorkItem, WorkQueue};

#[derive(Debug, Deserialize)]
struct RecsBody {
    data: Option<RecsData>,
}

#[derive(Debug, Deserialize)]
struct RecsData {
    #[serde(default)]
    results: Vec<RecEntry>,
}

#[derive(Debug, Deserialize)]
struct RecEntry {
    // The recs feed has carried the profile under both keys over time.
    // Kept as raw values so one malformed record skips, not the batch.
    user: Option<Value>,
    person: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MatchesBody {
    data: Option<MatchesData>,
}

#[derive(Debug, Deserialize)]
struct MatchesData {
    #[serde(default)]
    matches: Vec<MatchEntry>,
}

#[derive(Debug, Deserialize)]
struct MatchEntry {
    person: Option<Value>,
}

/// Profile as it appears on the wire
#[derive(Debug, Deserialize)]
struct ProfileWire {
    #[serde(rename = "_id")]
    id: String,
    name: Option<String>,
    birth_date: Option<String>,
    bio: Option<String>,
    gender: Option<i64>,
    distance_mi: Option<i64>,
    #[serde(default)]
    photos: Vec<Value>,
}

/// Parse one profile record, skipping it on shape mismatch
fn parse_profile(raw: Value) -> Option<ProfileWire> {
    match serde_json::from_value(raw) {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!("unparseable profile in payload, skipping record: {}", e);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct PhotoWire {
    id: String,
    url: String,
    #[serde(rename = "fileName")]
    file_name: String,
    crop_info: Option<Value>,
    media_type: Option<String>,
    rank: Option<i64>,
    score: Option<f64>,
    win_count: Option<i64>,
}

impl ProfileWire {
    fn into_person(self, label: Label) -> Person {
        let person_id = self.id;
        let photos = self
            .photos
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<PhotoWire>(raw) {
                Ok(photo) => photo.into_photo(&person_id),
                Err(e) => {
                    warn!("unparseable photo for {}, skipping: {}", person_id, e);
                    None
                }
            })
            .collect();

        Person {
            id: person_id,
            label,
            name: self.name,
            birth_date: self.birth_date.as_deref().and_then(parse_birth_date),
            bio: self.bio,
            gender: self.gender,
            distance_mi: self.distance_mi,
            photos,
        }
    }
}

impl PhotoWire {
    fn into_photo(self, person_id: &str) -> Option<Photo> {
        // The file name becomes part of the local asset path; never accept
        // one that could escape the person's directory
        if self.file_name.is_empty()
            || self.file_name.contains('/')
            || self.file_name.contains('\\')
        {
            warn!("ignoring photo {} with unusable file name", self.id);
            return None;
        }

        Some(Photo {
            id: self.id,
            person_id: person_id.to_string(),
            url: self.url,
            file_name: self.file_name,
            crop_info: self.crop_info.map(|v| v.to_string()),
            media_type: self.media_type,
            rank: self.rank,
            score: self.score,
            win_count: self.win_count,
            status: PhotoStatus::NotDownloaded,
        })
    }
}

fn parse_birth_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Profile id following `marker` in the exchange path
fn id_after<'a>(exchange: &'a Exchange, marker: &str) -> Option<&'a str> {
    let segments = exchange.path_segments();
    segments
        .iter()
        .position(|s| *s == marker)
        .and_then(|i| segments.get(i + 1))
        .copied()
}

/// Profiles surfaced in the recommendations feed
pub struct RecommendationClassifier {
    queue: WorkQueue,
}

impl RecommendationClassifier {
    pub fn new(queue: WorkQueue) -> Self {
        Self { queue }
    }
}

impl Classifier for RecommendationClassifier {
    fn name(&self) -> &'static str {
        "recommendations"
    }

    fn accepts(&self, exchange: &Exchange) -> bool {
        exchange.path.contains("/v2/recs") && exchange.method == "GET"
    }

    fn process(&self, _exchange: &Exchange, body: Option<&Value>) -> Result<()> {
        let Some(body) = body else {
            return Ok(());
        };

        let parsed: RecsBody = serde_json::from_value(body.clone())
            .map_err(|e| Error::Classification(e.to_string()))?;
        let results = parsed.data.map(|d| d.results).unwrap_or_default();

        info!("Found {} recs", results.len());
        for entry in results {
            match entry.user.or(entry.person).and_then(parse_profile) {
                Some(profile) => {
                    self.queue
                        .submit(WorkItem::AddRec(profile.into_person(Label::Recommendation)));
                }
                None => warn!("rec entry without usable profile, skipping"),
            }
        }

        Ok(())
    }
}

/// Profiles surfaced in the matches list
pub struct MatchClassifier {
    queue: WorkQueue,
}

impl MatchClassifier {
    pub fn new(queue: WorkQueue) -> Self {
        Self { queue }
    }
}

impl Classifier for MatchClassifier {
    fn name(&self) -> &'static str {
        "matches"
    }

    fn accepts(&self, exchange: &Exchange) -> bool {
        exchange.path.contains("/v2/matches") && exchange.method == "GET"
    }

    fn process(&self, _exchange: &Exchange, body: Option<&Value>) -> Result<()> {
        let Some(body) = body else {
            return Ok(());
        };

        let parsed: MatchesBody = serde_json::from_value(body.clone())
            .map_err(|e| Error::Classification(e.to_string()))?;
        let matches = parsed.data.map(|d| d.matches).unwrap_or_default();

        info!("Found {} matches", matches.len());
        for entry in matches {
            match entry.person.and_then(parse_profile) {
                Some(profile) => {
                    self.queue
                        .submit(WorkItem::AddMatch(profile.into_person(Label::Match)));
                }
                None => warn!("match entry without usable profile, skipping"),
            }
        }

        Ok(())
    }
}

/// Explicit like actions, id taken from the request path
pub struct LikeClassifier {
    queue: WorkQueue,
}

impl LikeClassifier {
    pub fn new(queue: WorkQueue) -> Self {
        Self { queue }
    }
}

impl Classifier for LikeClassifier {
    fn name(&self) -> &'static str {
        "likes"
    }

    fn accepts(&self, exchange: &Exchange) -> bool {
        exchange.path.contains("/like/") && exchange.method == "POST"
    }

    fn process(&self, exchange: &Exchange, _body: Option<&Value>) -> Result<()> {
        match id_after(exchange, "like") {
            Some(id) => {
                self.queue.submit(WorkItem::Like(id.to_string()));
                Ok(())
            }
            None => Err(Error::Classification(format!(
                "no profile id in like path `{}`",
                exchange.path
            ))),
        }
    }
}

/// Explicit pass actions, id taken from the request path
pub struct DislikeClassifier {
    queue: WorkQueue,
}

impl DislikeClassifier {
    pub fn new(queue: WorkQueue) -> Self {
        Self { queue }
    }
}

impl Classifier for DislikeClassifier {
    fn name(&self) -> &'static str {
        "dislikes"
    }

    fn accepts(&self, exchange: &Exchange) -> bool {
        exchange.path.contains("/pass/") && exchange.method == "GET"
    }

    fn process(&self, exchange: &Exchange, _body: Option<&Value>) -> Result<()> {
        match id_after(exchange, "pass") {
            Some(id) => {
                self.queue.submit(WorkItem::Dislike(id.to_string()));
                Ok(())
            }
            None => Err(Error::Classification(format!(
                "no profile id in pass path `{}`",
                exchange.path
            ))),
        }
    }
}
