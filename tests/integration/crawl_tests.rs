//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the listing site and run the
//! full resolve, walk, fetch and store cycle end-to-end.

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use zip_sweep::config::{
    Config, CrawlMode, CrawlerConfig, EndpointConfig, OutputConfig, ZipcodeConfig,
};
use zip_sweep::crawler::{Coordinator, ListingRecord, SharedStorage};
use zip_sweep::state::ZipcodeOutcome;
use zip_sweep::storage::{
    ListingSink, RunRecord, RunStatus, SqliteStorage, Storage, StorageError, StorageResult,
};
use zip_sweep::CrawlError;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server, without delays
fn create_test_config(server: &MockServer, mode: CrawlMode, detail_workers: u32) -> Config {
    let mut headers = BTreeMap::new();
    headers.insert("User-Agent".to_string(), "TestBot/1.0".to_string());

    Config {
        crawler: CrawlerConfig {
            max_attempts: 2,
            min_delay_ms: 0,
            max_delay_ms: 0,
            request_timeout_secs: 5,
            detail_workers,
            mode,
            skip_known_listings: true,
        },
        endpoints: EndpointConfig {
            geography_url: format!("{}/geography", server.uri()),
            search_url: format!("{}/search", server.uri()),
            fragment_pointer: "/PlacardState/HTML".to_string(),
            pins_pointer: "/PinsState/cl".to_string(),
            listing_selector: "article.placard a.property-link".to_string(),
        },
        headers,
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
        zipcodes: ZipcodeConfig::default(),
    }
}

fn detail_page(lat: &str, description: &str) -> String {
    format!(
        r#"<html><head>
        <meta property="place:location:latitude" content="{}" />
        <meta property="place:location:longitude" content="-118.2437" />
        </head><body>
        <section id="descriptionSection"><p>{}</p></section>
        <div class="specList"><ul><li>• Pool</li><li>• Gym</li></ul></div>
        <div class="specList"><span class="specLabel">Parking</span></div>
        </body></html>"#,
        lat, description
    )
}

fn search_page(server: &MockServer, routes: &[&str]) -> String {
    let html: String = routes
        .iter()
        .map(|route| {
            format!(
                r#"<article class="placard"><a class="property-link" href="{}{}">Listing</a></article>"#,
                server.uri(),
                route
            )
        })
        .collect();
    json!({ "PlacardState": { "HTML": html } }).to_string()
}

async fn mount_region(server: &MockServer, zipcode: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/geography"))
        .and(body_json(json!({ "t": zipcode })))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_search_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "Paging": { "Page": page } })))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn in_memory_storage() -> Arc<Mutex<SqliteStorage>> {
    Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()))
}

fn zipcodes(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn test_full_crawl_isolates_failures_per_postal_code() {
    let server = MockServer::start().await;

    mount_region(
        &server,
        "90001",
        ResponseTemplate::new(200).set_body_string(r#"[{"Geography":"R123"}]"#),
    )
    .await;
    mount_region(&server, "90002", ResponseTemplate::new(200).set_body_string("[]")).await;
    mount_region(&server, "90003", ResponseTemplate::new(503)).await;

    // Page 2 repeats page 1, which ends the walk
    let page = search_page(&server, &["/sunny-two-bed/a1/", "/no-coordinates/b2/"]);
    mount_search_page(&server, 1, page.clone()).await;
    mount_search_page(&server, 2, page).await;

    mount_detail(&server, "/sunny-two-bed/a1/", detail_page("34.0522", "Sunny two bed")).await;
    mount_detail(
        &server,
        "/no-coordinates/b2/",
        detail_page("34.0", "Hidden").replace("place:location:latitude", "og:title"),
    )
    .await;

    let storage = in_memory_storage();
    let shared: SharedStorage = storage.clone();
    let config = create_test_config(&server, CrawlMode::Detail, 2);
    let mut coordinator = Coordinator::with_storage(config, "hash", shared).unwrap();

    let report = coordinator
        .run(&zipcodes(&["90001", "90002", "90003"]))
        .await
        .unwrap();

    assert_eq!(report.zipcodes_with(ZipcodeOutcome::Populated), vec!["90001"]);
    assert_eq!(report.zipcodes_with(ZipcodeOutcome::Unresolved), vec!["90002"]);
    assert_eq!(report.zipcodes_with(ZipcodeOutcome::Blocked), vec!["90003"]);
    assert_eq!(report.records_stored, 1);
    assert_eq!(report.listings_skipped, 1);
    assert_eq!(report.populated_vs_not(), (1, 2));

    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_listings().unwrap(), 1);

    let record = storage.get_listing("a1").unwrap().unwrap();
    assert_eq!(record.lat, 34.0522);
    assert_eq!(record.description, "Sunny two bed");
    assert_eq!(record.features, vec!["Pool", "Gym", "Parking"]);
    assert!(!storage.contains_listing("b2").unwrap());

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, coordinator.run_id());
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        storage
            .get_zipcodes_by_outcome(run.id, ZipcodeOutcome::Blocked)
            .unwrap(),
        vec!["90003"]
    );
}

#[tokio::test]
async fn test_unresolved_postal_code_emits_nothing() {
    let server = MockServer::start().await;
    mount_region(&server, "90002", ResponseTemplate::new(200).set_body_string("[]")).await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let storage = in_memory_storage();
    let config = create_test_config(&server, CrawlMode::Detail, 1);
    let mut coordinator = Coordinator::with_storage(config, "hash", storage.clone()).unwrap();

    let report = coordinator.run(&zipcodes(&["90002"])).await.unwrap();

    assert_eq!(report.count(ZipcodeOutcome::Unresolved), 1);
    assert_eq!(report.records_stored, 0);
    assert_eq!(storage.lock().unwrap().count_listings().unwrap(), 0);
}

#[tokio::test]
async fn test_walk_follows_pages_until_repeat() {
    let server = MockServer::start().await;
    mount_region(
        &server,
        "90001",
        ResponseTemplate::new(200).set_body_string(r#"[{"Geography":"R123"}]"#),
    )
    .await;

    mount_search_page(&server, 1, search_page(&server, &["/first/p1/", "/second/p2/"])).await;
    mount_search_page(&server, 2, search_page(&server, &["/third/p3/"])).await;
    mount_search_page(&server, 3, search_page(&server, &["/third/p3/"])).await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "Paging": { "Page": 4 } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for route in ["/first/p1/", "/second/p2/", "/third/p3/"] {
        mount_detail(&server, route, detail_page("34.1", route)).await;
    }

    let storage = in_memory_storage();
    let config = create_test_config(&server, CrawlMode::Detail, 1);
    let mut coordinator = Coordinator::with_storage(config, "hash", storage.clone()).unwrap();

    let report = coordinator.run(&zipcodes(&["90001"])).await.unwrap();

    assert_eq!(report.records_stored, 3);
    let storage = storage.lock().unwrap();
    for id in ["p1", "p2", "p3"] {
        assert!(storage.contains_listing(id).unwrap(), "missing {}", id);
    }
}

#[tokio::test]
async fn test_known_listings_are_not_fetched_again() {
    let server = MockServer::start().await;
    mount_region(
        &server,
        "90001",
        ResponseTemplate::new(200).set_body_string(r#"[{"Geography":"R123"}]"#),
    )
    .await;
    mount_search_page(&server, 1, search_page(&server, &["/sunny-two-bed/a1/"])).await;
    mount_search_page(&server, 2, search_page(&server, &["/sunny-two-bed/a1/"])).await;
    Mock::given(method("GET"))
        .and(path("/sunny-two-bed/a1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("34.0", "Once")))
        .expect(1)
        .mount(&server)
        .await;

    let storage = in_memory_storage();

    let config = create_test_config(&server, CrawlMode::Detail, 1);
    let mut first = Coordinator::with_storage(config.clone(), "hash", storage.clone()).unwrap();
    let report = first.run(&zipcodes(&["90001"])).await.unwrap();
    assert_eq!(report.records_stored, 1);

    let mut second = Coordinator::with_storage(config, "hash", storage.clone()).unwrap();
    let report = second.run(&zipcodes(&["90001"])).await.unwrap();
    assert_eq!(report.records_stored, 0);
    assert_eq!(report.known_skipped, 1);
    assert_eq!(report.zipcodes_with(ZipcodeOutcome::Populated), vec!["90001"]);
    assert_eq!(report.zipcodes[0].records, 0);

    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(storage.lock().unwrap().count_listings().unwrap(), 1);
}

#[tokio::test]
async fn test_postal_codes_sharing_a_listing_are_both_populated() {
    let server = MockServer::start().await;
    for zipcode in ["90001", "90002"] {
        mount_region(
            &server,
            zipcode,
            ResponseTemplate::new(200).set_body_string(r#"[{"Geography":"R123"}]"#),
        )
        .await;
    }
    let page = search_page(&server, &["/shared/s1/"]);
    mount_search_page(&server, 1, page.clone()).await;
    mount_search_page(&server, 2, page).await;
    Mock::given(method("GET"))
        .and(path("/shared/s1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("34.0", "Shared")))
        .expect(1)
        .mount(&server)
        .await;

    let storage = in_memory_storage();
    let config = create_test_config(&server, CrawlMode::Detail, 2);
    let mut coordinator = Coordinator::with_storage(config, "hash", storage.clone()).unwrap();

    let report = coordinator.run(&zipcodes(&["90001", "90002"])).await.unwrap();

    assert_eq!(
        report.zipcodes_with(ZipcodeOutcome::Populated),
        vec!["90001", "90002"]
    );
    assert_eq!(report.populated_vs_not(), (2, 0));
    assert_eq!(report.records_stored, 1);
    assert_eq!(report.known_skipped, 1);
    assert_eq!(report.zipcodes[0].records, 1);
    assert_eq!(report.zipcodes[1].records, 0);

    let storage = storage.lock().unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(
        storage
            .count_zipcodes_by_outcome(run.id, ZipcodeOutcome::Populated)
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_pins_mode_stores_coordinates_only() {
    let server = MockServer::start().await;
    mount_region(
        &server,
        "90001",
        ResponseTemplate::new(200).set_body_string(r#"[{"Geography":"R123"}]"#),
    )
    .await;

    let pins = r#"a1|x|null|34.05|-118.24~bldg|x|[{"ListingId":"u1"},{"ListingId":"u2"}]|34.10|-118.30~bad|x|null|n/a|n/a"#;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_json(json!({ "Geography": { "Geography": "R123" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(json!({ "PinsState": { "cl": pins } }).to_string()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = in_memory_storage();
    let config = create_test_config(&server, CrawlMode::Pins, 1);
    let mut coordinator = Coordinator::with_storage(config, "hash", storage.clone()).unwrap();

    let report = coordinator.run(&zipcodes(&["90001"])).await.unwrap();

    assert_eq!(report.records_stored, 3);
    assert_eq!(report.zipcodes_with(ZipcodeOutcome::Populated), vec!["90001"]);

    let storage = storage.lock().unwrap();
    let record = storage.get_listing("u2").unwrap().unwrap();
    assert_eq!(record.lat, 34.10);
    assert_eq!(record.lon, -118.30);
    assert!(record.description.is_empty());
    assert!(record.features.is_empty());
    assert!(!storage.contains_listing("bad").unwrap());
}

/// Storage whose sink always fails, for checking that sink failures end the run
struct FailingSink {
    inner: SqliteStorage,
}

impl ListingSink for FailingSink {
    fn store_listing(&mut self, _record: &ListingRecord) -> StorageResult<bool> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn contains_listing(&self, listing_id: &str) -> StorageResult<bool> {
        self.inner.contains_listing(listing_id)
    }
}

impl Storage for FailingSink {
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.inner.create_run(config_hash)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.inner.get_run(run_id)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.inner.update_run_status(run_id, status)
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.inner.complete_run(run_id)
    }

    fn record_zipcode(
        &mut self,
        run_id: i64,
        zipcode: &str,
        outcome: ZipcodeOutcome,
        records: u64,
    ) -> StorageResult<()> {
        self.inner.record_zipcode(run_id, zipcode, outcome, records)
    }

    fn count_listings(&self) -> StorageResult<u64> {
        self.inner.count_listings()
    }

    fn count_zipcodes_by_outcome(
        &self,
        run_id: i64,
        outcome: ZipcodeOutcome,
    ) -> StorageResult<u64> {
        self.inner.count_zipcodes_by_outcome(run_id, outcome)
    }

    fn get_zipcodes_by_outcome(
        &self,
        run_id: i64,
        outcome: ZipcodeOutcome,
    ) -> StorageResult<Vec<String>> {
        self.inner.get_zipcodes_by_outcome(run_id, outcome)
    }
}

#[tokio::test]
async fn test_sink_failure_ends_the_run() {
    let server = MockServer::start().await;
    mount_region(
        &server,
        "90001",
        ResponseTemplate::new(200).set_body_string(r#"[{"Geography":"R123"}]"#),
    )
    .await;
    mount_search_page(&server, 1, search_page(&server, &["/sunny-two-bed/a1/"])).await;
    mount_search_page(&server, 2, search_page(&server, &["/sunny-two-bed/a1/"])).await;
    mount_detail(&server, "/sunny-two-bed/a1/", detail_page("34.0", "Sunny")).await;

    let storage = Arc::new(Mutex::new(FailingSink {
        inner: SqliteStorage::new_in_memory().unwrap(),
    }));
    let config = create_test_config(&server, CrawlMode::Detail, 1);
    let mut coordinator = Coordinator::with_storage(config, "hash", storage.clone()).unwrap();

    let result = coordinator.run(&zipcodes(&["90001", "90002"])).await;
    assert!(matches!(result, Err(CrawlError::Storage(_))));

    let run = storage.lock().unwrap().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}
