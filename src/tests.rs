//! Integration tests for the contest tracker backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{Config, ProviderUrls};
use crate::db::{init_database, Repository};
use crate::models::{Platform, UpstreamContest};
use crate::providers::fake::{contest, FakeProvider};
use crate::providers::{Provider, ProviderChain};
use crate::sync::{Aggregator, Reconciler, SyncScheduler};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
///
/// Serves the full router on a random port, backed by a throwaway database
/// and in-memory providers standing in for the upstream sites.
struct TestFixture {
    client: Client,
    base_url: String,
    state: AppState,
    /// Reference instant the canned contests are placed around
    now: DateTime<Utc>,
    codeforces: Arc<FakeProvider>,
    kontests_leetcode: Arc<FakeProvider>,
    leetcode_direct: Arc<FakeProvider>,
    _temp_dir: TempDir,
}

/// Current time truncated to whole seconds, the precision the store keeps.
fn now_seconds() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
}

fn codeforces_contests(now: DateTime<Utc>) -> Vec<UpstreamContest> {
    vec![
        contest(
            "cf_2000",
            "Div 2",
            Platform::Codeforces,
            now + Duration::days(1),
            Some(7200),
        ),
        contest(
            "cf_1990",
            "Educational Round",
            Platform::Codeforces,
            now - Duration::minutes(30),
            Some(7200),
        ),
        contest(
            "cf_1900",
            "Div 1",
            Platform::Codeforces,
            now - Duration::days(10),
            Some(7200),
        ),
        contest(
            "cf_1800",
            "Div 3",
            Platform::Codeforces,
            now - Duration::days(20),
            Some(7200),
        ),
    ]
}

fn leetcode_contests(now: DateTime<Utc>) -> Vec<UpstreamContest> {
    vec![contest(
        "lc_weekly-contest-400",
        "Weekly Contest 400",
        Platform::Leetcode,
        now + Duration::days(2),
        Some(5400),
    )]
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Providers
        let now = now_seconds();
        let codeforces =
            FakeProvider::returning("Codeforces", Platform::Codeforces, codeforces_contests(now));
        let kontests_leetcode = FakeProvider::failing(
            "Leetcode (kontests.net)",
            Platform::Leetcode,
            3,
            "502 Bad Gateway",
        );
        let leetcode_direct =
            FakeProvider::returning("Leetcode (direct)", Platform::Leetcode, leetcode_contests(now));

        let cf: Arc<dyn Provider> = codeforces.clone();
        let lc_primary: Arc<dyn Provider> = kontests_leetcode.clone();
        let lc_fallback: Arc<dyn Provider> = leetcode_direct.clone();
        let aggregator = Aggregator::new(vec![
            ProviderChain::new(Platform::Codeforces, vec![cf]),
            ProviderChain::new(Platform::Leetcode, vec![lc_primary, lc_fallback]),
        ]);
        let scheduler = Arc::new(SyncScheduler::new(
            aggregator,
            Reconciler::new(repo.clone()),
        ));

        // Upstream hosts only matter to the health check here
        let local = "http://127.0.0.1:9".to_string();
        let config = Config {
            db_path,
            providers: ProviderUrls {
                codeforces: local.clone(),
                kontests: local.clone(),
                leetcode: local.clone(),
                codechef: local,
            },
            sync_on_startup: false,
            ..Config::default()
        };

        let state = AppState {
            repo,
            scheduler,
            config: Arc::new(config),
        };
        let app = create_router(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            state,
            now,
            codeforces,
            kontests_leetcode,
            leetcode_direct,
            _temp_dir: temp_dir,
        }
    }

    /// Fixture with one successful sync already applied.
    async fn synced() -> Self {
        let fixture = Self::new().await;
        fixture
            .state
            .scheduler
            .run_cycle()
            .await
            .expect("Initial sync failed");
        fixture
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post_json(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut req = self.client.post(self.url(path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["externalId"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["contests"], 0);
    assert!(body["timestamp"].is_string());
    assert!(body["lastSync"].is_null());

    for provider in ["codeforces", "kontests", "leetcode", "codechef"] {
        assert_eq!(body["dns"][provider]["status"], "ok", "{}", provider);
        assert_eq!(body["dns"][provider]["host"], "127.0.0.1");
    }
}

#[tokio::test]
async fn test_reads_work_before_any_sync() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/contests").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_list_defaults_to_upcoming() {
    let fixture = TestFixture::synced().await;

    let (status, body) = fixture.get_json("/api/contests").await;
    assert_eq!(status, 200);
    assert_eq!(ids(&body), vec!["cf_2000", "lc_weekly-contest-400"]);
    for item in body["data"].as_array().unwrap() {
        assert_eq!(item["status"], "upcoming");
    }
}

#[tokio::test]
async fn test_list_filters_by_platform_and_status() {
    let fixture = TestFixture::synced().await;

    let (_, body) = fixture.get_json("/api/contests?platforms=Leetcode").await;
    assert_eq!(ids(&body), vec!["lc_weekly-contest-400"]);
    assert_eq!(body["data"][0]["platform"], "Leetcode");

    let (_, body) = fixture
        .get_json("/api/contests?platforms=codeforces,leetcode&status=past")
        .await;
    assert_eq!(ids(&body), vec!["cf_1900", "cf_1800"]);

    let (_, body) = fixture.get_json("/api/contests?status=ongoing").await;
    assert_eq!(ids(&body), vec!["cf_1990"]);
    assert_eq!(body["data"][0]["status"], "ongoing");
}

#[tokio::test]
async fn test_ongoing_and_past_endpoints() {
    let fixture = TestFixture::synced().await;

    let (status, body) = fixture.get_json("/api/ongoing-contests").await;
    assert_eq!(status, 200);
    assert_eq!(ids(&body), vec!["cf_1990"]);

    // Newest first
    let (status, body) = fixture.get_json("/api/past-contests").await;
    assert_eq!(status, 200);
    assert_eq!(ids(&body), vec!["cf_1900", "cf_1800"]);
    assert_eq!(body["data"][0]["status"], "past");

    let (_, body) = fixture.get_json("/api/past-contests?platforms=Leetcode").await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_unknown_filter_values_are_rejected() {
    let fixture = TestFixture::synced().await;

    let (status, body) = fixture.get_json("/api/contests?platforms=AtCoder").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = fixture.get_json("/api/contests?status=live").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_contest() {
    let fixture = TestFixture::synced().await;

    let (status, body) = fixture.get_json("/api/contests/cf_2000").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["externalId"], "cf_2000");
    assert_eq!(body["data"]["name"], "Div 2");
    assert_eq!(body["data"]["durationSeconds"], 7200);
    assert_eq!(body["data"]["bookmarked"], false);
    assert_eq!(body["data"]["status"], "upcoming");

    let (status, body) = fixture.get_json("/api/contests/cf_missing").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_bookmark_and_unbookmark() {
    let fixture = TestFixture::synced().await;

    let (status, body) = fixture
        .post_json("/api/contests/cf_2000/bookmark", None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["bookmarked"], true);

    let (_, body) = fixture.get_json("/api/contests/cf_2000").await;
    assert_eq!(body["data"]["bookmarked"], true);

    let (status, body) = fixture
        .post_json("/api/contests/cf_2000/unbookmark", None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["bookmarked"], false);

    let (status, _) = fixture
        .post_json("/api/contests/cf_missing/bookmark", None)
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_attach_and_clear_solution_link() {
    let fixture = TestFixture::synced().await;

    let (status, body) = fixture
        .post_json(
            "/api/contests/cf_1900/solution",
            Some(json!({ "youtubeLink": "https://youtu.be/abc" })),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["solutionLink"], "https://youtu.be/abc");

    let (status, body) = fixture
        .post_json(
            "/api/contests/cf_1900/solution",
            Some(json!({ "youtubeLink": "not a link" })),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture
        .post_json(
            "/api/contests/cf_1900/solution",
            Some(json!({ "youtubeLink": "" })),
        )
        .await;
    assert_eq!(status, 200);
    assert!(body["data"].get("solutionLink").is_none());
}

#[tokio::test]
async fn test_last_sync_and_force_sync() {
    let fixture = TestFixture::new().await;

    let (_, body) = fixture.get_json("/api/last-sync").await;
    assert!(body["data"]["lastSync"].is_null());

    let (status, body) = fixture.post_json("/api/force-sync", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["fetched"], 5);
    assert_eq!(body["data"]["syncedCount"], 5);
    assert_eq!(body["data"]["reconcile"]["inserted"], 5);
    // The kontests failure is reported even though the fallback covered it
    assert_eq!(body["data"]["errors"][0]["source"], "Leetcode (kontests.net)");
    assert_eq!(fixture.kontests_leetcode.attempts(), 3);
    assert_eq!(fixture.leetcode_direct.attempts(), 1);

    let (_, last) = fixture.get_json("/api/last-sync").await;
    assert_eq!(last["data"]["lastSync"], body["data"]["completedAt"]);

    let (_, health) = fixture.get_json("/api/health").await;
    assert_eq!(health["lastSync"], body["data"]["completedAt"]);
}

#[tokio::test]
async fn test_force_sync_total_failure() {
    let fixture = TestFixture::synced().await;
    let (_, before) = fixture.get_json("/api/last-sync").await;

    fixture.codeforces.set_failing("connection reset");
    fixture.leetcode_direct.set_failing("timed out");

    let (status, body) = fixture.post_json("/api/force-sync", None).await;
    assert_eq!(status, 502);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "SYNC_FAILED");
    assert_eq!(body["error"]["details"]["errors"].as_array().unwrap().len(), 3);

    // Stored data and the last sync time survive
    let (_, after) = fixture.get_json("/api/last-sync").await;
    assert_eq!(after["data"]["lastSync"], before["data"]["lastSync"]);
    let (status, _) = fixture.get_json("/api/contests/cf_2000").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_rename_upstream_updates_in_place() {
    let fixture = TestFixture::synced().await;

    let mut renamed = codeforces_contests(fixture.now);
    renamed[0].name = "Div 2 Round".to_string();
    fixture.codeforces.set_contests(renamed);

    let (status, body) = fixture.post_json("/api/force-sync", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["reconcile"]["updated"], 1);
    assert_eq!(body["data"]["reconcile"]["inserted"], 0);

    let (_, body) = fixture.get_json("/api/contests/cf_2000").await;
    assert_eq!(body["data"]["name"], "Div 2 Round");
    assert_eq!(fixture.state.repo.count_contests().await.unwrap(), 5);
}

#[tokio::test]
async fn test_bookmark_survives_resync() {
    let fixture = TestFixture::synced().await;

    fixture
        .post_json("/api/contests/cf_2000/bookmark", None)
        .await;
    fixture
        .post_json(
            "/api/contests/cf_2000/solution",
            Some(json!({ "youtubeLink": "https://youtu.be/xyz" })),
        )
        .await;

    let mut moved = codeforces_contests(fixture.now);
    moved[0].start_time = moved[0].start_time + Duration::hours(1);
    fixture.codeforces.set_contests(moved);

    let (status, _) = fixture.post_json("/api/force-sync", None).await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get_json("/api/contests/cf_2000").await;
    assert_eq!(body["data"]["bookmarked"], true);
    assert_eq!(body["data"]["solutionLink"], "https://youtu.be/xyz");
}

#[tokio::test]
async fn test_router_without_server() {
    let fixture = TestFixture::synced().await;
    let app = create_router(fixture.state.clone());

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/ongoing-contests?platforms=Codeforces")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ids(&body), vec!["cf_1990"]);
}
