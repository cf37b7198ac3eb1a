//! Classifier and middleware behavior against captured exchanges

use matchbook_common::model::Label;
use matchbook_common::{Error, Result};
use matchbook_ingest::classify::{
    Classifier, ClassifierMiddleware, DislikeClassifier, LikeClassifier, MatchClassifier,
    RecommendationClassifier,
};
use matchbook_ingest::exchange::Exchange;
use matchbook_ingest::pipeline::{WorkItem, WorkQueue};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

fn exchange(method: &str, path: &str, body: Option<&str>) -> Exchange {
    Exchange {
        method: method.to_string(),
        path: path.to_string(),
        host: "api.gotinder.com".to_string(),
        response_body: body.map(|b| b.as_bytes().to_vec()),
    }
}

fn drain(rx: &mut UnboundedReceiver<WorkItem>) -> Vec<WorkItem> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

const RECS_BODY: &str = r#"{
    "data": {
        "results": [
            {"user": {"_id": "p1", "name": "Ada", "birth_date": "1994-03-02T00:00:00.000Z",
                      "photos": [{"id": "ph1", "url": "http://x/a.jpg", "fileName": "a.jpg"}]}},
            {"person": {"_id": "p2", "name": "Grace"}}
        ]
    }
}"#;

#[test]
fn recs_exchange_emits_one_item_per_profile() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = RecommendationClassifier::new(queue);

    let ex = exchange("GET", "/v2/recs/core?locale=en", Some(RECS_BODY));
    assert!(classifier.accepts(&ex));
    classifier.process(&ex, ex.json_body().as_ref()).unwrap();

    let items = drain(&mut rx);
    assert_eq!(items.len(), 2);

    let WorkItem::AddRec(first) = &items[0] else {
        panic!("expected add_rec item");
    };
    assert_eq!(first.id, "p1");
    assert_eq!(first.label, Label::Recommendation);
    assert_eq!(first.name.as_deref(), Some("Ada"));
    assert_eq!(first.photos.len(), 1);
    assert_eq!(first.photos[0].file_name, "a.jpg");
}

#[test]
fn malformed_record_skips_without_aborting_the_batch() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = RecommendationClassifier::new(queue);

    // Middle record has no _id; the others must still come through
    let body = r#"{
        "data": {
            "results": [
                {"user": {"_id": "p1"}},
                {"user": {"name": "broken"}},
                {"user": {"_id": "p3"}}
            ]
        }
    }"#;
    let ex = exchange("GET", "/v2/recs/core", Some(body));
    classifier.process(&ex, ex.json_body().as_ref()).unwrap();

    let ids: Vec<String> = drain(&mut rx)
        .into_iter()
        .map(|item| match item {
            WorkItem::AddRec(p) => p.id,
            other => panic!("unexpected item {:?}", other.kind()),
        })
        .collect();
    assert_eq!(ids, vec!["p1".to_string(), "p3".to_string()]);
}

#[test]
fn absent_body_is_not_an_error() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = RecommendationClassifier::new(queue);

    let ex = exchange("GET", "/v2/recs/core", None);
    classifier.process(&ex, None).unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn recs_classifier_only_accepts_matching_requests() {
    let (queue, _rx) = WorkQueue::new();
    let classifier = RecommendationClassifier::new(queue);

    assert!(classifier.accepts(&exchange("GET", "/v2/recs/core", None)));
    assert!(!classifier.accepts(&exchange("POST", "/v2/recs/core", None)));
    assert!(!classifier.accepts(&exchange("GET", "/v2/profile", None)));
}

#[test]
fn matches_exchange_emits_match_items() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = MatchClassifier::new(queue);

    let body = r#"{"data": {"matches": [{"person": {"_id": "p7", "name": "Joan"}}]}}"#;
    let ex = exchange("GET", "/v2/matches?count=60", Some(body));
    assert!(classifier.accepts(&ex));
    classifier.process(&ex, ex.json_body().as_ref()).unwrap();

    let items = drain(&mut rx);
    assert_eq!(items.len(), 1);
    let WorkItem::AddMatch(person) = &items[0] else {
        panic!("expected add_match item");
    };
    assert_eq!(person.id, "p7");
    assert_eq!(person.label, Label::Match);
}

#[test]
fn like_classifier_extracts_id_from_path() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = LikeClassifier::new(queue);

    let ex = exchange("POST", "/like/abc123?locale=en", None);
    assert!(classifier.accepts(&ex));
    classifier.process(&ex, None).unwrap();

    let items = drain(&mut rx);
    assert!(matches!(&items[0], WorkItem::Like(id) if id == "abc123"));
}

#[test]
fn like_path_without_id_is_a_classification_error() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = LikeClassifier::new(queue);

    let ex = exchange("POST", "/like/", None);
    let result = classifier.process(&ex, None);
    assert!(matches!(result, Err(Error::Classification(_))));
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn dislike_classifier_extracts_id_from_path() {
    let (queue, mut rx) = WorkQueue::new();
    let classifier = DislikeClassifier::new(queue);

    let ex = exchange("GET", "/pass/xyz789", None);
    assert!(classifier.accepts(&ex));
    classifier.process(&ex, None).unwrap();

    let items = drain(&mut rx);
    assert!(matches!(&items[0], WorkItem::Dislike(id) if id == "xyz789"));
}

/// Always accepts, always fails
struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn accepts(&self, _exchange: &Exchange) -> bool {
        true
    }

    fn process(&self, _exchange: &Exchange, _body: Option<&Value>) -> Result<()> {
        Err(Error::Classification("always fails".to_string()))
    }
}

#[test]
fn one_failing_classifier_does_not_stop_the_others() {
    let (queue, mut rx) = WorkQueue::new();
    let middleware = ClassifierMiddleware::new(vec![
        Box::new(FailingClassifier),
        Box::new(LikeClassifier::new(queue)),
    ]);

    let ex = exchange("POST", "/like/abc123", None);
    middleware.handle_response(&ex);

    // The like classifier listed after the failing one still ran
    let items = drain(&mut rx);
    assert_eq!(items.len(), 1);
}

#[test]
fn host_filter_skips_foreign_traffic() {
    let (queue, mut rx) = WorkQueue::new();
    let middleware =
        ClassifierMiddleware::new(vec![Box::new(LikeClassifier::new(queue))])
            .with_host_filter("tinder");

    let mut ex = exchange("POST", "/like/abc123", None);
    ex.host = "www.example.com".to_string();
    middleware.handle_response(&ex);
    assert!(drain(&mut rx).is_empty());

    ex.host = "api.gotinder.com".to_string();
    middleware.handle_response(&ex);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn request_phase_runs_no_response_classifiers() {
    let (queue, mut rx) = WorkQueue::new();
    let middleware = ClassifierMiddleware::new(vec![Box::new(LikeClassifier::new(queue))]);

    let ex = exchange("POST", "/like/abc123", None);
    middleware.handle_request(&ex);
    assert!(drain(&mut rx).is_empty());
}
