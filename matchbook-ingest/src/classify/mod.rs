//! Event classification
//!
//! Stateless classifiers inspect captured exchanges and translate the ones
//! that represent a domain event into work items. The middleware owns the
//! fixed classifier list and fans every exchange out to it, once per
//! direction; a failing classifier never prevents the others from running.

mod events;

pub use events::{
    DislikeClassifier, LikeClassifier, MatchClassifier, RecommendationClassifier,
};

use matchbook_common::Result;
use serde_json::Value;
use tracing::warn;

use crate::exchange::Exchange;

/// Which direction of the exchange a classifier inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Request,
    Response,
}

/// Decides whether an exchange represents a domain event and, if so,
/// enqueues the corresponding work items.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// All current classifiers read the response phase; the request line is
    /// still available there for path-only events like like/pass.
    fn phase(&self) -> Phase {
        Phase::Response
    }

    fn accepts(&self, exchange: &Exchange) -> bool;

    /// Translate the exchange into work items. `body` is the parsed JSON
    /// response body, absent when missing or malformed.
    fn process(&self, exchange: &Exchange, body: Option<&Value>) -> Result<()>;
}

/// Receives every captured exchange and fans it out to the classifiers.
pub struct ClassifierMiddleware {
    classifiers: Vec<Box<dyn Classifier>>,
    host_filter: Option<String>,
}

impl ClassifierMiddleware {
    pub fn new(classifiers: Vec<Box<dyn Classifier>>) -> Self {
        Self {
            classifiers,
            host_filter: None,
        }
    }

    /// Only process exchanges whose host contains `needle`
    pub fn with_host_filter(mut self, needle: impl Into<String>) -> Self {
        self.host_filter = Some(needle.into());
        self
    }

    pub fn handle_request(&self, exchange: &Exchange) {
        self.run_phase(Phase::Request, exchange);
    }

    pub fn handle_response(&self, exchange: &Exchange) {
        self.run_phase(Phase::Response, exchange);
    }

    fn run_phase(&self, phase: Phase, exchange: &Exchange) {
        if let Some(needle) = &self.host_filter {
            if !exchange.host.contains(needle.as_str()) {
                return;
            }
        }

        // Parse once per phase, shared by all classifiers
        let body = match phase {
            Phase::Response => exchange.json_body(),
            Phase::Request => None,
        };

        for classifier in self.classifiers.iter().filter(|c| c.phase() == phase) {
            if !classifier.accepts(exchange) {
                continue;
            }
            if let Err(e) = classifier.process(exchange, body.as_ref()) {
                // Recorded, not propagated: the other classifiers still run
                warn!(
                    "classifier `{}` failed on {} {}: {}",
                    classifier.name(),
                    exchange.method,
                    exchange.path,
                    e
                );
            }
        }
    }
}
