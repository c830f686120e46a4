//! End-to-end tests for batch validation
//!
//! Metadata documents are served by a mock HTTP server and batch records come
//! from an in-memory lookup, so these run without network or database access.

use nftfix_cli::checkpoint::CheckpointStore;
use nftfix_cli::fetch::{FetchConfig, ResilientFetcher};
use nftfix_cli::lookup::StaticLookup;
use nftfix_cli::validator::BatchValidator;
use nftfix_common::proxy::ProxyRewriter;
use nftfix_common::{MetadataDocument, RecordRef, Verdict};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn fast_fetch() -> FetchConfig {
    FetchConfig {
        max_attempts: 2,
        timeout: Duration::from_secs(2),
        max_delay: Duration::from_millis(10),
        max_jitter: Duration::ZERO,
        ..FetchConfig::default()
    }
}

fn validator(dir: &TempDir, lookup: StaticLookup) -> BatchValidator {
    concurrent_validator(dir, lookup, 1)
}

fn concurrent_validator(dir: &TempDir, lookup: StaticLookup, concurrency: usize) -> BatchValidator {
    BatchValidator::new(
        Box::new(lookup),
        ResilientFetcher::new(fast_fetch()).unwrap(),
        ProxyRewriter::default(),
        CheckpointStore::new(dir.path()),
    )
    .with_concurrency(concurrency)
}

fn valid_doc(name: &str) -> Value {
    json!({
        "name": name,
        "image": format!("https://arweave.net/{name}.jpg"),
        "properties": {
            "files": [{"uri": format!("https://arweave.net/{name}.jpg"), "type": "image/jpeg"}],
            "category": "image"
        }
    })
}

fn malformed_doc(name: &str) -> Value {
    json!({
        "name": name,
        "image": "https://arweave.net/shared.jpg",
        "animation_url": "https://arweave.net/shared.mp4",
        "properties": {
            "files": [{"uri": "shared.jpg", "type": "image/jpeg"}],
            "category": "video"
        }
    })
}

async fn serve(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn record(server: &MockServer, id: &str) -> RecordRef {
    RecordRef::new(id, format!("{}/{}.json", server.uri(), id))
}

fn batches(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn test_validate_writes_verdicts_and_one_repair() {
    let server = MockServer::start().await;
    serve(&server, "/good.json", valid_doc("good")).await;
    serve(&server, "/bad1.json", malformed_doc("Drop")).await;
    serve(&server, "/bad2.json", malformed_doc("Drop")).await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new().with_batch(
        "cm1",
        vec![
            record(&server, "good"),
            record(&server, "bad1"),
            record(&server, "bad2"),
        ],
    );
    let validator = validator(&temp, lookup);

    let summary = validator.run(&batches(&["cm1"]), false).await;

    assert_eq!(summary.batches_processed, 1);
    assert_eq!(summary.records_seen, 3);
    assert_eq!(summary.records_valid, 1);
    assert_eq!(summary.invalid_record_count(), 2);
    assert!(summary.affected_batch_ids.contains("cm1"));
    assert!(summary.drift_batches.is_empty());
    assert_eq!(
        summary.headline(),
        "Found 2 bad records across 1 batches (since previous run)"
    );

    let store = validator.store();
    assert_eq!(store.read_verdict("cm1", "good").unwrap(), Some(Verdict::Valid));
    assert_eq!(store.read_verdict("cm1", "bad1").unwrap(), Some(Verdict::Invalid));
    assert_eq!(store.invalid_records("cm1").unwrap(), vec!["bad1", "bad2"]);

    let repaired = store.read_batch_repair("cm1").unwrap().unwrap();
    let repaired = serde_json::to_value(&repaired).unwrap();
    assert_eq!(
        repaired["properties"]["files"],
        json!([
            {"uri": "https://arweave.net/shared.jpg", "type": "image/jpeg"},
            {"uri": "https://arweave.net/shared.mp4", "type": "video/mp4"}
        ])
    );
    assert_eq!(repaired["properties"]["category"], "video");
    assert_eq!(repaired["name"], "Drop");
}

#[tokio::test]
async fn test_second_run_skips_checkpointed_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(valid_doc("a")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(malformed_doc("b")))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new()
        .with_batch("cm1", vec![record(&server, "a"), record(&server, "b")]);
    let validator = validator(&temp, lookup);

    let first = validator.run(&batches(&["cm1"]), false).await;
    assert_eq!(first.invalid_record_count(), 1);

    let second = validator.run(&batches(&["cm1"]), false).await;
    assert_eq!(second.records_seen, 2);
    assert_eq!(second.records_skipped, 2);
    assert_eq!(second.invalid_record_count(), 0);
    assert!(second.affected_batch_ids.is_empty());
}

#[tokio::test]
async fn test_refresh_reevaluates_and_replaces_stale_repair() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(malformed_doc("new")))
        .expect(2)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp.path());
    store.ensure_batch("cm1").unwrap();
    let stale: MetadataDocument = serde_json::from_value(json!({"name": "stale"})).unwrap();
    store.overwrite_batch_repair("cm1", &stale).unwrap();

    let lookup = StaticLookup::new().with_batch("cm1", vec![record(&server, "a")]);
    let validator = validator(&temp, lookup);

    // Without refresh the stale repair is compared, not replaced
    let plain = validator.run(&batches(&["cm1"]), false).await;
    assert!(plain.drift_batches.contains("cm1"));
    assert_eq!(validator.store().read_batch_repair("cm1").unwrap().unwrap(), stale);

    let refreshed = validator.run(&batches(&["cm1"]), true).await;
    assert_eq!(refreshed.records_skipped, 0);
    assert!(refreshed.drift_batches.is_empty());
    assert!(refreshed.affected_batch_ids.contains("cm1"));

    let repaired = validator.store().read_batch_repair("cm1").unwrap().unwrap();
    assert_eq!(serde_json::to_value(&repaired).unwrap()["name"], "new");
}

#[tokio::test]
async fn test_differing_repairs_in_one_batch_report_drift() {
    let server = MockServer::start().await;
    serve(&server, "/first.json", malformed_doc("First")).await;
    serve(&server, "/second.json", malformed_doc("Second")).await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new().with_batch(
        "cm1",
        vec![record(&server, "first"), record(&server, "second")],
    );
    let validator = validator(&temp, lookup);

    let summary = validator.run(&batches(&["cm1"]), false).await;

    assert_eq!(summary.invalid_record_count(), 2);
    assert!(summary.drift_batches.contains("cm1"));

    // First writer wins
    let stored = validator.store().read_batch_repair("cm1").unwrap().unwrap();
    assert_eq!(serde_json::to_value(&stored).unwrap()["name"], "First");
    assert_eq!(
        validator.store().read_verdict("cm1", "second").unwrap(),
        Some(Verdict::Invalid)
    );
}

#[tokio::test]
async fn test_unfetchable_record_gets_no_verdict() {
    let server = MockServer::start().await;
    serve(&server, "/ok.json", valid_doc("ok")).await;
    Mock::given(method("GET"))
        .and(path("/down.json"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new()
        .with_batch("cm1", vec![record(&server, "down"), record(&server, "ok")]);
    let validator = validator(&temp, lookup);

    let summary = validator.run(&batches(&["cm1"]), false).await;

    assert_eq!(summary.batches_processed, 1);
    assert_eq!(summary.records_valid, 1);
    assert_eq!(summary.unresolved_records.len(), 1);
    assert_eq!(summary.unresolved_records[0].record_id, "down");
    assert!(!validator.store().has_verdict("cm1", "down").unwrap());
    assert!(validator.store().has_verdict("cm1", "ok").unwrap());
}

#[tokio::test]
async fn test_lookup_failure_does_not_stop_other_batches() {
    let server = MockServer::start().await;
    serve(&server, "/a.json", malformed_doc("a")).await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new()
        .with_failure("cm-down")
        .with_batch("cm2", vec![record(&server, "a")]);
    let validator = validator(&temp, lookup);

    let summary = validator.run(&batches(&["cm-down", "cm2"]), false).await;

    assert_eq!(summary.batches_processed, 1);
    assert_eq!(summary.failed_batches.len(), 1);
    assert_eq!(summary.failed_batches[0].batch_id, "cm-down");
    assert_eq!(summary.invalid_record_count(), 1);
    assert!(summary.affected_batch_ids.contains("cm2"));
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let validator = validator(&temp, StaticLookup::new());

    let summary = validator.run(&batches(&["cm-empty"]), false).await;

    assert_eq!(summary.batches_processed, 1);
    assert_eq!(summary.records_seen, 0);
    assert!(validator.store().verdicts("cm-empty").unwrap().is_empty());
    assert!(validator.store().read_batch_repair("cm-empty").unwrap().is_none());
}

#[tokio::test]
async fn test_validate_command_saves_summary() {
    let server = MockServer::start().await;
    serve(&server, "/a.json", malformed_doc("a")).await;

    let temp = TempDir::new().unwrap();
    let cmids = temp.path().join("cmids.txt");
    std::fs::write(&cmids, "# retired\ncm1\n\n").unwrap();

    let config = nftfix_cli::Config {
        data_dir: temp.path().join("cmids"),
        summary_dir: temp.path().join("summaries"),
        fetch: fast_fetch(),
        ..nftfix_cli::Config::default()
    };
    let lookup = StaticLookup::new().with_batch("cm1", vec![record(&server, "a")]);

    let summary = nftfix_cli::commands::validate::run_with_lookup(
        &config,
        &cmids,
        false,
        Box::new(lookup),
        false,
    )
    .await
    .unwrap();
    assert_eq!(summary.invalid_record_count(), 1);

    let saved: Vec<_> = std::fs::read_dir(temp.path().join("summaries"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("summary_"));
}

#[tokio::test]
async fn test_concurrent_records_share_one_repair() {
    let server = MockServer::start().await;
    let broken_files = [
        json!([{"uri": "0.jpg", "type": "image/jpeg"}]),
        json!([{"uri": "0.mp4"}, {"uri": "https://arweave.net/shared.jpg"}]),
        json!(["shared.jpg"]),
        json!([{"type": "video/mp4"}]),
        json!([{"uri": 7}]),
        json!("shared.jpg"),
    ];
    let mut records = Vec::new();
    for (i, files) in broken_files.iter().enumerate() {
        let id = format!("mint{i}");
        let mut doc = malformed_doc("Drop");
        doc["properties"]["files"] = files.clone();
        // Responses overlap so every record reaches the repair step together
        Mock::given(method("GET"))
            .and(path(format!("/{id}.json")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(doc)
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;
        records.push(record(&server, &id));
    }

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new().with_batch("cm1", records);
    let validator = concurrent_validator(&temp, lookup, 8);

    let summary = validator.run(&batches(&["cm1"]), false).await;

    assert_eq!(summary.invalid_record_count(), broken_files.len());
    assert!(summary.drift_batches.is_empty());
    assert!(summary.affected_batch_ids.contains("cm1"));

    let store = validator.store();
    assert_eq!(store.invalid_records("cm1").unwrap().len(), broken_files.len());

    let mut names: Vec<String> = std::fs::read_dir(store.batch_dir("cm1").unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains("metadata.json"))
        .collect();
    names.sort();
    assert_eq!(names, vec!["metadata.json"]);

    let repaired = serde_json::to_value(store.read_batch_repair("cm1").unwrap().unwrap()).unwrap();
    assert_eq!(
        repaired["properties"]["files"],
        json!([
            {"uri": "https://arweave.net/shared.jpg", "type": "image/jpeg"},
            {"uri": "https://arweave.net/shared.mp4", "type": "video/mp4"}
        ])
    );
}

#[tokio::test]
async fn test_refresh_reevaluates_valid_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(malformed_doc("a")))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp.path());
    store.ensure_batch("cm1").unwrap();
    store.write_verdict("cm1", "a", Verdict::Valid).unwrap();

    let lookup = StaticLookup::new().with_batch("cm1", vec![record(&server, "a")]);
    let validator = validator(&temp, lookup);

    let plain = validator.run(&batches(&["cm1"]), false).await;
    assert_eq!(plain.records_skipped, 1);
    assert_eq!(
        validator.store().read_verdict("cm1", "a").unwrap(),
        Some(Verdict::Valid)
    );

    let refreshed = validator.run(&batches(&["cm1"]), true).await;
    assert_eq!(refreshed.records_skipped, 0);
    assert_eq!(refreshed.invalid_record_count(), 1);
    assert_eq!(
        validator.store().read_verdict("cm1", "a").unwrap(),
        Some(Verdict::Invalid)
    );
    assert!(validator.store().read_batch_repair("cm1").unwrap().is_some());
}

#[tokio::test]
async fn test_unusable_record_id_does_not_abort_batch() {
    let server = MockServer::start().await;
    serve(&server, "/good.json", valid_doc("good")).await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new().with_batch(
        "cm1",
        vec![
            RecordRef::new("bad id", format!("{}/good.json", server.uri())),
            record(&server, "good"),
        ],
    );
    let validator = validator(&temp, lookup);

    let summary = validator.run(&batches(&["cm1"]), false).await;

    assert!(summary.failed_batches.is_empty());
    assert_eq!(summary.batches_processed, 1);
    assert_eq!(summary.rejected_records.len(), 1);
    assert_eq!(summary.rejected_records[0].record_id, "bad id");
    assert_eq!(
        validator.store().read_verdict("cm1", "good").unwrap(),
        Some(Verdict::Valid)
    );
}

#[tokio::test]
async fn test_non_string_fields_get_a_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/odd.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": 5,
            "properties": {"files": [{"uri": "bare.jpg"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let lookup = StaticLookup::new().with_batch("cm1", vec![record(&server, "odd")]);
    let validator = validator(&temp, lookup);

    let summary = validator.run(&batches(&["cm1"]), false).await;

    assert!(summary.unresolved_records.is_empty());
    assert_eq!(summary.invalid_record_count(), 1);
    assert_eq!(
        validator.store().read_verdict("cm1", "odd").unwrap(),
        Some(Verdict::Invalid)
    );
}
