//! Work handlers binding the pipeline to the repository

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use matchbook_common::db::{AssetFetcher, Repository};
use matchbook_common::model::Label;
use matchbook_common::{Error, Result};
use tracing::info;

use super::{WorkHandler, WorkItem, WorkKind};

/// Upserts profiles surfaced by the recommendations and matches feeds.
pub struct ProfileUpsertHandler {
    repo: Repository,
    fetcher: Arc<dyn AssetFetcher>,
}

impl ProfileUpsertHandler {
    pub fn new(repo: Repository, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { repo, fetcher }
    }
}

#[async_trait]
impl WorkHandler for ProfileUpsertHandler {
    async fn handle(&self, item: WorkItem) -> Result<()> {
        let person = match item {
            WorkItem::AddRec(person) | WorkItem::AddMatch(person) => person,
            other => return Err(Error::Dispatch(other.kind().to_string())),
        };

        info!(
            "Intercepted {}: {} ({})",
            person.label.as_str(),
            person.name.as_deref().unwrap_or("<unnamed>"),
            person.id
        );

        self.repo.upsert(&person, self.fetcher.as_ref()).await
    }
}

/// Applies explicit like/dislike actions.
pub struct LabelHandler {
    repo: Repository,
}

impl LabelHandler {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl WorkHandler for LabelHandler {
    async fn handle(&self, item: WorkItem) -> Result<()> {
        let (id, label) = match item {
            WorkItem::Like(id) => (id, Label::Like),
            WorkItem::Dislike(id) => (id, Label::Dislike),
            other => return Err(Error::Dispatch(other.kind().to_string())),
        };

        info!("{}: {}", label.as_str(), id);

        self.repo.set_label(&id, label).await
    }
}

/// Full handler registry for the capture pipeline.
pub fn default_handlers(
    repo: Repository,
    fetcher: Arc<dyn AssetFetcher>,
) -> HashMap<WorkKind, Arc<dyn WorkHandler>> {
    let upsert: Arc<dyn WorkHandler> = Arc::new(ProfileUpsertHandler::new(repo.clone(), fetcher));
    let label: Arc<dyn WorkHandler> = Arc::new(LabelHandler::new(repo));

    let mut handlers: HashMap<WorkKind, Arc<dyn WorkHandler>> = HashMap::new();
    handlers.insert(WorkKind::AddRec, Arc::clone(&upsert));
    handlers.insert(WorkKind::AddMatch, upsert);
    handlers.insert(WorkKind::Like, Arc::clone(&label));
    handlers.insert(WorkKind::Dislike, label);
    handlers
}
