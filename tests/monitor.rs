mod common;

use std::sync::Arc;

use course_monitor::models::{Candidate, Config, Destination, Module, NodeShape, ResourceKind};
use course_monitor::services::{
    AuthSession, ChangeMonitor, DeliveryOutcome, Dispatcher, ResourceClassifier,
};
use course_monitor::storage::{DeliveryLedger, LocalStorage};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{MockChannel, course_page, test_config};

struct Harness {
    config: Arc<Config>,
    session: AuthSession,
    _tmp: TempDir,
}

async fn harness(server: &MockServer, configure: impl FnOnce(&mut Config)) -> Harness {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), tmp.path());
    configure(&mut config);
    let config = Arc::new(config);
    let session = AuthSession::open(Arc::clone(&config), LocalStorage::new(tmp.path()))
        .await
        .unwrap();
    Harness {
        config,
        session,
        _tmp: tmp,
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .mount(server)
        .await;
}

async fn mount_pdf(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(server)
        .await;
}

fn module(server: &MockServer, destination: Destination) -> Module {
    Module::new(
        "7",
        "Algorithms",
        format!("{}/course/view.php?id=7", server.uri()),
        destination,
    )
}

fn candidate(url: String) -> Candidate {
    Candidate {
        url,
        name: "Chapitre 1".into(),
        shape: NodeShape::Resource,
    }
}

#[tokio::test]
async fn new_resource_is_reported_once_until_delivered() {
    let server = MockServer::start().await;
    let resource_url = format!("{}/mod/resource/view.php?id=5", server.uri());
    mount_page(
        &server,
        "/course/view.php",
        course_page(&[(&resource_url, "Chapitre 1")]),
        "text/html",
    )
    .await;
    mount_pdf(&server, "/mod/resource/view.php").await;

    let h = harness(&server, |_| {}).await;
    let monitor = ChangeMonitor::new(Arc::clone(&h.config));
    let destination: Destination = "100_2".parse().unwrap();
    let module = module(&server, destination);
    let mut ledger = DeliveryLedger::default();

    let first = monitor.check_module(&h.session, &module, &ledger).await.unwrap();
    let again = monitor.check_module(&h.session, &module, &ledger).await.unwrap();
    assert_eq!(first, again);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, ResourceKind::Document);
    assert_eq!(first[0].source_url, resource_url);
    assert_eq!(first[0].name, "Chapitre 1");

    let channel = MockChannel::new();
    let dispatcher = Dispatcher::new(Arc::clone(&h.config), channel.clone());
    let outcome = dispatcher.deliver(&h.session, &destination, &first[0]).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered);
    ledger.record(&module.id, &destination, &first[0].source_url);

    assert_eq!(ledger.sent_to("7", &destination), [resource_url.clone()]);
    let after = monitor.check_module(&h.session, &module, &ledger).await.unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn delivery_history_is_per_destination() {
    let server = MockServer::start().await;
    let resource_url = format!("{}/mod/resource/view.php?id=5", server.uri());
    mount_page(
        &server,
        "/course/view.php",
        course_page(&[(&resource_url, "Chapitre 1")]),
        "text/html",
    )
    .await;
    mount_pdf(&server, "/mod/resource/view.php").await;

    let h = harness(&server, |_| {}).await;
    let monitor = ChangeMonitor::new(Arc::clone(&h.config));
    let first = Destination::chat(-100);
    let second = Destination::thread(-100, 9);

    let mut ledger = DeliveryLedger::default();
    ledger.record("7", &first, &resource_url);

    let for_first = monitor
        .check_module(&h.session, &module(&server, first), &ledger)
        .await
        .unwrap();
    let for_second = monitor
        .check_module(&h.session, &module(&server, second), &ledger)
        .await
        .unwrap();
    assert!(for_first.is_empty());
    assert_eq!(for_second.len(), 1);
}

#[tokio::test]
async fn unreachable_module_page_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/course/view.php"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let h = harness(&server, |_| {}).await;
    let monitor = ChangeMonitor::new(Arc::clone(&h.config));
    let result = monitor
        .check_module(&h.session, &module(&server, Destination::chat(1)), &DeliveryLedger::default())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn non_deliverable_links_are_skipped() {
    let server = MockServer::start().await;
    let forum = format!("{}/mod/url/view.php?id=1", server.uri());
    let pdf = format!("{}/mod/resource/view.php?id=2", server.uri());
    mount_page(
        &server,
        "/course/view.php",
        course_page(&[(&forum, "Forum rules"), (&pdf, "TD 1")]),
        "text/html",
    )
    .await;
    mount_page(
        &server,
        "/mod/url/view.php",
        r#"<a href="https://example.org/rules.html">rules</a>"#.into(),
        "text/html",
    )
    .await;
    mount_pdf(&server, "/mod/resource/view.php").await;

    let h = harness(&server, |_| {}).await;
    let monitor = ChangeMonitor::new(Arc::clone(&h.config));
    let found = monitor
        .check_module(&h.session, &module(&server, Destination::chat(1)), &DeliveryLedger::default())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].source_url, pdf);
}

#[tokio::test]
async fn classifier_document_content_type_wins() {
    let server = MockServer::start().await;
    mount_pdf(&server, "/watch/view.php").await;

    let h = harness(&server, |c| c.classifier.video_patterns = vec!["/watch/".into()]).await;
    let classifier = ResourceClassifier::new(Arc::clone(&h.config));
    let descriptor = classifier
        .classify(
            h.session.client(),
            &candidate(format!("{}/watch/view.php?id=3", server.uri())),
        )
        .await
        .unwrap();
    assert_eq!(descriptor.kind, ResourceKind::Document);
}

#[tokio::test]
async fn classifier_follows_view_page_to_drive() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/mod/url/view.php",
        r#"<div class="urlworkaround"><a href="https://drive.google.com/file/d/ABC123/view">open</a></div>"#.into(),
        "text/html; charset=utf-8",
    )
    .await;

    let h = harness(&server, |_| {}).await;
    let classifier = ResourceClassifier::new(Arc::clone(&h.config));
    let source = format!("{}/mod/url/view.php?id=9", server.uri());
    let descriptor = classifier
        .classify(h.session.client(), &candidate(source.clone()))
        .await
        .unwrap();
    assert_eq!(descriptor.kind, ResourceKind::ExternalDrive);
    assert_eq!(descriptor.source_url, source);
    assert!(descriptor.final_url.contains("ABC123"));
}

#[tokio::test]
async fn classifier_recognizes_video_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/mod/url/view.php",
        r#"<a href="https://www.youtube.com/watch?v=xyz">video</a>"#.into(),
        "text/html",
    )
    .await;

    let h = harness(&server, |_| {}).await;
    let classifier = ResourceClassifier::new(Arc::clone(&h.config));
    let descriptor = classifier
        .classify(
            h.session.client(),
            &candidate(format!("{}/mod/url/view.php?id=4", server.uri())),
        )
        .await
        .unwrap();
    assert_eq!(descriptor.kind, ResourceKind::Video);
    assert_eq!(descriptor.final_url, "https://www.youtube.com/watch?v=xyz");
}

#[tokio::test]
async fn classifier_skips_other_binaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/slides.pptx"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"PK".to_vec(),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ))
        .mount(&server)
        .await;

    let h = harness(&server, |_| {}).await;
    let classifier = ResourceClassifier::new(Arc::clone(&h.config));
    let descriptor = classifier
        .classify(
            h.session.client(),
            &candidate(format!("{}/files/slides.pptx", server.uri())),
        )
        .await;
    assert!(descriptor.is_none());
}
