//! End-to-end harvests of a mock site
//!
//! Every test serves the site from a local wiremock server and writes into a
//! temporary directory; no network access and no yt-dlp are needed.

mod common;

use common::*;
use kb_harvest::output::read_tree;
use kb_harvest::{FailureKind, NodeKind, Payload, harvest};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn full_site_becomes_a_three_category_tree() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let config = site_config(&server, dir.path());
    let tree_path = config.output.tree_path();

    let (tree, stats) = harvest(config).await.unwrap();

    let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec![ARTICLES_ANCHOR, QUESTIONS_ANCHOR, DOCUMENTS_ANCHOR]);
    assert!(tree.thumbnail.as_ref().is_some_and(|p| p.exists()));

    // The empty design listing is omitted, the programming topic holds one article
    let articles = category(&tree, ARTICLES_ANCHOR);
    assert_eq!(articles.children.len(), 1);
    let article = child(child(articles, "برمجة"), "Intro to Python");
    assert_eq!(article.kind, NodeKind::Topic);
    assert_eq!(article.author, "Ahmad");
    assert_eq!(article.description.as_deref(), Some("A first look at Python"));
    assert!(article.thumbnail.is_some());
    assert_eq!(article.children.len(), 1, "videos are not downloaded");

    let bundle = article.children[0].payload.as_ref().unwrap().path();
    assert_eq!(
        bundle_entries(bundle),
        vec!["css/styles.css", "images/snake.png", "index.html", "js/scripts.js"]
    );
    let index = bundle_index(bundle);
    assert!(index.contains("Python reads like prose."));
    assert!(index.contains(r#"src="images/snake.png""#));
    assert!(!index.contains("<iframe"));
    assert!(!index.contains("site header"));

    let questions = child(category(&tree, QUESTIONS_ANCHOR), "أسئلة البرمجة");
    let thread_titles: Vec<&str> = questions.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(thread_titles, vec!["Question 1", "Question 2"]);
    assert!(questions.children.iter().all(|c| c.kind == NodeKind::Html5));
    let thread = bundle_index(questions.children[0].payload.as_ref().unwrap().path());
    assert!(thread.contains("<h2>Question 1</h2>"));
    assert!(thread.contains("Like this."));
    assert!(thread.contains("text-align:right"));

    let document = child(child(category(&tree, DOCUMENTS_ANCHOR), "كتب"), "Python Guide");
    assert_eq!(document.kind, NodeKind::Document);
    assert_eq!(document.author, "Sara");
    assert_eq!(document.description.as_deref(), Some("The complete guide"));
    assert!(document.thumbnail.is_some());
    match document.payload.as_ref().unwrap() {
        Payload::Document { path } => {
            assert_eq!(std::fs::read(path).unwrap(), PDF_BYTES);
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        }
        other => panic!("expected a document payload, got {other:?}"),
    }

    assert_eq!(stats.attached.html5, 3);
    assert_eq!(stats.attached.document, 1);
    assert_eq!(stats.cached_bundles, 0);
    assert_eq!(read_tree(&tree_path).await.unwrap(), tree);
}

#[tokio::test]
async fn rerun_rebuilds_an_identical_tree_from_disk() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = TempDir::new().unwrap();
    let config = site_config(&server, dir.path());
    let cache_dir = config.http.cache_dir.clone();

    let (first, _) = harvest(config.clone()).await.unwrap();

    // Without the response cache only the artifacts on disk prevent refetching;
    // detail pages, the PDF and images are mounted to be served exactly once
    std::fs::remove_dir_all(&cache_dir).unwrap();
    let (second, stats) = harvest(config).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(stats.cached_bundles, 3);
    assert_eq!(stats.skipped.total(), 1, "only the empty design topic is skipped");
    assert_eq!(leaves(&second).len(), 4);
}

#[tokio::test]
async fn missing_detail_pages_skip_only_their_items() {
    let server = MockServer::start().await;
    // Mounted first with a higher priority, these shadow the site's detail pages
    for route in ["/questions/2/", "/files/1/"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(404))
            .with_priority(1)
            .mount(&server)
            .await;
    }
    mount_site_without_expectations(&server).await;
    let dir = TempDir::new().unwrap();

    let (tree, stats) = harvest(site_config(&server, dir.path())).await.unwrap();

    let titles: Vec<&str> = tree.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec![ARTICLES_ANCHOR, QUESTIONS_ANCHOR]);
    let questions = child(category(&tree, QUESTIONS_ANCHOR), "أسئلة البرمجة");
    assert_eq!(questions.children.len(), 1);
    assert_eq!(stats.skipped.html5, 1);
    assert_eq!(stats.skipped.document, 1);
}

#[tokio::test]
async fn home_page_without_navigation_gives_an_empty_tree() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_site_without_expectations(&server).await;
    let dir = TempDir::new().unwrap();
    let config = site_config(&server, dir.path());
    let tree_path = config.output.tree_path();

    let (tree, stats) = harvest(config).await.unwrap();

    assert!(tree.children.is_empty());
    assert_eq!(stats.pages, 0);
    assert!(tree_path.exists());
}

#[tokio::test]
async fn unreachable_support_files_abort_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/support/styles.css"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = site_config(&server, dir.path());
    let tree_path = config.output.tree_path();

    let err = harvest(config).await.unwrap_err();

    assert_eq!(err.failure_kind(), FailureKind::Fatal);
    assert!(!tree_path.exists());
}
