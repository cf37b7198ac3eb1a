//! Photo fetcher behavior against a mock upstream

mod helpers;

use helpers::{person, photo, test_repo, NoopFetcher, JPEG_BYTES};
use matchbook_common::db::{AssetFetcher, Repository};
use matchbook_common::model::{Label, Photo, PhotoStatus};
use matchbook_ingest::fetch::{validate_image, PhotoFetcher};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Seed one person with one photo pointing at the mock server
async fn seed(repo: &Repository, url: &str) -> Photo {
    let p1 = person(
        "p1",
        Label::Recommendation,
        vec![photo("ph1", "p1", url, "a.jpg")],
    );
    repo.upsert(&p1, &NoopFetcher).await.unwrap();
    repo.get_photo("ph1").await.unwrap().unwrap()
}

#[tokio::test]
async fn successful_fetch_marks_downloaded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .and(header("referer", "https://tinder.com"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let images = TempDir::new().unwrap();
    let fetcher = PhotoFetcher::new(repo.clone(), images.path().to_path_buf()).unwrap();

    let seeded = seed(&repo, &format!("{}/a.jpg", server.uri())).await;
    let ensured = fetcher.ensure(&seeded).await.unwrap();

    assert_eq!(ensured.status, PhotoStatus::Downloaded);
    let target = images.path().join("p1").join("a.jpg");
    assert!(target.exists());
    assert!(validate_image(&target));

    // The transition was persisted, not just returned
    let stored = repo.get_photo("ph1").await.unwrap().unwrap();
    assert_eq!(stored.status, PhotoStatus::Downloaded);
}

#[tokio::test]
async fn non_2xx_leaves_no_file_and_marks_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let images = TempDir::new().unwrap();
    let fetcher = PhotoFetcher::new(repo.clone(), images.path().to_path_buf()).unwrap();

    let seeded = seed(&repo, &format!("{}/a.jpg", server.uri())).await;
    let ensured = fetcher.ensure(&seeded).await.unwrap();

    assert_eq!(ensured.status, PhotoStatus::Error);
    assert!(!images.path().join("p1").join("a.jpg").exists());

    let stored = repo.get_photo("ph1").await.unwrap().unwrap();
    assert_eq!(stored.status, PhotoStatus::Error);
}

#[tokio::test]
async fn valid_payload_with_error_page_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let images = TempDir::new().unwrap();
    let fetcher = PhotoFetcher::new(repo.clone(), images.path().to_path_buf()).unwrap();

    let seeded = seed(&repo, &format!("{}/a.jpg", server.uri())).await;
    let ensured = fetcher.ensure(&seeded).await.unwrap();

    // A 200 that is not an image must not leave a file behind
    assert_eq!(ensured.status, PhotoStatus::Error);
    assert!(!images.path().join("p1").join("a.jpg").exists());
}

#[tokio::test]
async fn corrupt_file_on_disk_is_deleted_and_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let images = TempDir::new().unwrap();
    let fetcher = PhotoFetcher::new(repo.clone(), images.path().to_path_buf()).unwrap();

    let seeded = seed(&repo, &format!("{}/a.jpg", server.uri())).await;

    // Leftover from a previously interrupted attempt
    let target = images.path().join("p1").join("a.jpg");
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, b"truncated-garbage").unwrap();
    assert!(!validate_image(&target));

    let ensured = fetcher.ensure(&seeded).await.unwrap();
    assert_eq!(ensured.status, PhotoStatus::Downloaded);
    assert!(validate_image(&target));
}

#[tokio::test]
async fn valid_file_on_disk_skips_the_network() {
    let server = MockServer::start().await;
    // Zero expected requests: hitting the server at all fails the test
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_BYTES))
        .expect(0)
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let images = TempDir::new().unwrap();
    let fetcher = PhotoFetcher::new(repo.clone(), images.path().to_path_buf()).unwrap();

    let seeded = seed(&repo, &format!("{}/a.jpg", server.uri())).await;

    let target = images.path().join("p1").join("a.jpg");
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, JPEG_BYTES).unwrap();

    // Repeated calls stay idempotent
    for _ in 0..2 {
        let ensured = fetcher.ensure(&seeded).await.unwrap();
        assert_eq!(ensured.status, PhotoStatus::Downloaded);
    }

    let stored = repo.get_photo("ph1").await.unwrap().unwrap();
    assert_eq!(stored.status, PhotoStatus::Downloaded);
}

#[tokio::test]
async fn upsert_drives_fetch_and_never_leaves_downloading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_BYTES))
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let images = TempDir::new().unwrap();
    let fetcher = PhotoFetcher::new(repo.clone(), images.path().to_path_buf()).unwrap();

    let p1 = person(
        "p1",
        Label::Recommendation,
        vec![photo("ph1", "p1", &format!("{}/a.jpg", server.uri()), "a.jpg")],
    );
    repo.upsert(&p1, &fetcher).await.unwrap();

    let stored = repo.get_photo("ph1").await.unwrap().unwrap();
    assert_eq!(stored.status, PhotoStatus::Downloaded);
    assert!(stored.path_under(images.path()).exists());
}
