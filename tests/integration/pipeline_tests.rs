//! End-to-end batch tests
//!
//! Every test wires the pipeline from a TOML config file, exactly as the
//! binary does, with a temp SQLite database.

use press_sieve::analysis::ChatAnalysisClient;
use press_sieve::config::{load_config_with_hash, resolve_api_key, Config};
use press_sieve::pipeline::{load_statistics, FeedItem, ItemSource, Pipeline, QueueSource};
use press_sieve::queue::PersistentQueue;
use press_sieve::storage::{self, open_storage, RunStatus, SharedStorage, Storage};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY: &str = "Regional lawmakers approved the new transit budget late on Tuesday, \
    adding three bus corridors and extending night service on the river line.";

fn page(title: &str) -> String {
    format!(
        "<html><head><title>{title} | City Desk</title></head><body>\
         <nav><a href=\"/\">Home</a></nav>\
         <article><h1>{title}</h1><p>{BODY}</p><p>{BODY}</p></article>\
         <div class=\"related\"><a href=\"/x\">More stories</a></div>\
         </body></html>"
    )
}

fn reply(content: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
    }))
}

fn write_config(dir: &TempDir, api: &MockServer) -> std::path::PathBuf {
    let config_path = dir.path().join("press-sieve.toml");
    let toml = format!(
        r#"
[fetcher]
timeout-secs = 5
rendered-domains = []

[analysis]
base-url = "{api}/v1"
model = "test-model"
api-key = "sk-test"
taxonomy = ["Politics", "Economy", "Transport"]

[retry]
max-tries = 2
delay-ms = 0

[storage]
database-path = "{db}"

[queue]
path = "{queue}"

[pipeline]
concurrency = 1
"#,
        api = api.uri(),
        db = dir.path().join("articles.db").display(),
        queue = dir.path().join("queue.json").display(),
    );
    std::fs::write(&config_path, toml).unwrap();
    config_path
}

fn build(config_path: &Path) -> (Pipeline, SharedStorage, Config) {
    let (config, hash) = load_config_with_hash(config_path).unwrap();
    let storage =
        storage::share(open_storage(Path::new(&config.storage.database_path)).unwrap());
    let api_key = resolve_api_key(&config.analysis).unwrap();
    let client = Arc::new(ChatAnalysisClient::new(&config.analysis, api_key).unwrap());
    let pipeline =
        Pipeline::from_config(&config, &hash, Arc::clone(&storage), None, client).unwrap();
    (pipeline, storage, config)
}

async fn mount_page(site: &MockServer, route: &str, title: &str, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(title)))
        .expect(hits)
        .mount(site)
        .await;
}

async fn mount_analysis(api: &MockServer, summaries: u64, classifications: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Summarise the article"))
        .respond_with(reply(json!({
            "summary": "The transit budget passed with new bus corridors.",
            "tags": ["transit", "Budget", "budget"]
        })))
        .expect(summaries)
        .mount(api)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Classify the article"))
        .respond_with(reply(json!({"classification": ["Transport", "Politics"]})))
        .expect(classifications)
        .mount(api)
        .await;
}

fn item(site: &MockServer, route: &str) -> FeedItem {
    FeedItem::new("city-desk", format!("{}{}", site.uri(), route), "")
        .published_at("Tue, 14 May 2024 21:05:00 +0200")
}

#[tokio::test]
async fn test_same_url_twice_is_stored_once_without_new_analysis() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_page(&site, "/transit-budget", "Transit budget passes", 1).await;
    mount_analysis(&api, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let (pipeline, storage, _) = build(&write_config(&dir, &api));

    let first = pipeline
        .run_batch(vec![item(&site, "/transit-budget")])
        .await
        .unwrap();
    let second = pipeline
        .run_batch(vec![item(&site, "/transit-budget")])
        .await
        .unwrap();

    assert_eq!((first.processed, first.skipped, first.failed), (1, 0, 0));
    assert_eq!((second.processed, second.skipped, second.failed), (0, 1, 0));

    let store = storage.lock().unwrap();
    assert_eq!(store.count_articles().unwrap(), 1);

    let url = format!("{}/transit-budget", site.uri());
    let url_hash = press_sieve::ContentFingerprint::of_url(&url).unwrap();
    let record = store.find_by_url_hash(url_hash.as_str()).unwrap().unwrap();
    assert_eq!(record.title, "Transit budget passes");
    assert_eq!(record.summary, "The transit budget passed with new bus corridors.");
    assert_eq!(record.tags, vec!["Budget", "transit"]);
    assert_eq!(record.classification, json!(["Transport", "Politics"]));
    assert_eq!(record.published_at, "2024-05-14T19:05:00+00:00");
    assert_eq!(record.extraction_strategy, "structured");
}

#[tokio::test]
async fn test_identical_text_at_two_urls_collapses_to_one_record() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_page(&site, "/story", "Transit budget passes", 1).await;
    mount_page(&site, "/amp/story", "Transit budget passes", 1).await;
    mount_analysis(&api, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let (pipeline, storage, _) = build(&write_config(&dir, &api));

    let summary = pipeline
        .run_batch(vec![item(&site, "/story"), item(&site, "/amp/story")])
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(storage.lock().unwrap().count_articles().unwrap(), 1);
}

#[tokio::test]
async fn test_analysis_outage_stores_degraded_article() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_page(&site, "/transit-budget", "Transit budget passes", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        // max-tries = 2, and the classify call is never made
        .expect(2)
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let (pipeline, storage, _) = build(&write_config(&dir, &api));

    let summary = pipeline
        .run_batch(vec![item(&site, "/transit-budget")])
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);

    let store = storage.lock().unwrap();
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let url_hash =
        press_sieve::ContentFingerprint::of_url(&format!("{}/transit-budget", site.uri()))
            .unwrap();
    let record = store.find_by_url_hash(url_hash.as_str()).unwrap().unwrap();
    assert_eq!(record.summary, "Transit budget passes");
    assert!(record.tags.is_empty());
    assert!(record.classification.is_null());
}

#[tokio::test]
async fn test_queued_items_survive_reopen_and_results_persist() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_page(&site, "/a", "Transit budget passes", 1).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site)
        .await;
    mount_analysis(&api, 1, 1).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &api);
    let (config, _) = load_config_with_hash(&config_path).unwrap();

    {
        let queue: PersistentQueue<FeedItem> = PersistentQueue::open(&config.queue.path).unwrap();
        queue
            .extend(vec![item(&site, "/a"), item(&site, "/b")])
            .unwrap();
    }

    {
        let (pipeline, _storage, _) = build(&config_path);
        let queue = Arc::new(PersistentQueue::open(&config.queue.path).unwrap());
        assert_eq!(queue.size(), 2);

        let items = QueueSource::new(Arc::clone(&queue)).load_items().await.unwrap();
        let summary = pipeline.run_batch(items).await.unwrap();
        assert_eq!((summary.processed, summary.failed), (1, 1));
        assert!(queue.is_empty());
    }

    let reopened = open_storage(Path::new(&config.storage.database_path)).unwrap();
    let stats = load_statistics(&reopened).unwrap();
    assert_eq!(stats.articles, 1);
    assert_eq!(stats.sources, 1);
    assert_eq!(stats.tags, 2);

    let run = stats.latest_run.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!((run.processed, run.skipped, run.failed), (1, 0, 1));

    let source = reopened.get_source("city-desk").unwrap().unwrap();
    assert!(source.last_fetched_at.is_some());
}
