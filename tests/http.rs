use chrono::NaiveDate;
use lens_tracker::client::{ApiClient, ClientError, Tracker};
use lens_tracker::models::{AppStateMap, UsageLog};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// The spawned binary plus the directory holding its database file.
struct TestServer {
    base_url: String,
    child: Child,
    _data_dir: TempDir,
}

impl TestServer {
    fn api(&self) -> ApiClient {
        ApiClient::new(self.base_url.clone())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

// Ready once the migrations have run and the usage-log table answers.
async fn wait_for_api(api: &ApiClient) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while api.fetch_usage_logs().await.is_err() {
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_dir = tempfile::tempdir().expect("create temp dir");
    let db_path = data_dir.path().join("nested").join("tracker.db");
    let child = Command::new(env!("CARGO_BIN_EXE_lens_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DB_PATH", &db_path)
        .env("RUST_LOG", "lens_tracker=debug")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let server = TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        child,
        _data_dir: data_dir,
    };
    wait_for_api(&server.api()).await;
    assert!(db_path.exists(), "database file was not created");
    server
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn clear(client: &Client, base_url: &str) {
    let response = client
        .delete(format!("{base_url}/clear-data"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn http_usage_log_accumulates_for_same_date() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    clear(&client, &server.base_url).await;

    for _ in 0..2 {
        let response = client
            .post(format!("{}/usage-logs", server.base_url))
            .json(&serde_json::json!({ "date": "2024-01-01", "count": 1 }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let logs: Vec<UsageLog> = client
        .get(format!("{}/usage-logs", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].date, "2024-01-01");
    assert_eq!(logs[0].count, 2);
}

#[tokio::test]
async fn http_app_state_round_trips_numbers_as_strings() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    clear(&client, &server.base_url).await;

    let response = client
        .post(format!("{}/app-state", server.base_url))
        .json(&serde_json::json!({ "key": "usageCount", "value": 5 }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let state: AppStateMap = client
        .get(format!("{}/app-state", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state.get("usageCount").map(String::as_str), Some("5"));

    let response = client
        .post(format!("{}/app-state", server.base_url))
        .json(&serde_json::json!({ "key": "lastUsed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let state: AppStateMap = client
        .get(format!("{}/app-state", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!state.contains_key("lastUsed"));
}

#[tokio::test]
async fn http_clear_data_empties_everything() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let api = ApiClient::new(format!("{}/api", server.base_url));

    api.log_usage("2024-03-01", 2).await.unwrap();
    api.update_app_state("usageCount", 2).await.unwrap();

    api.clear_all_data().await.unwrap();

    assert!(api.fetch_usage_logs().await.unwrap().is_empty());
    assert!(api.fetch_app_state().await.unwrap().is_empty());
}

#[tokio::test]
async fn http_tracker_follows_server_state() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let api = server.api();
    api.clear_all_data().await.unwrap();

    let mut tracker = Tracker::load(api.clone()).await.unwrap();
    assert_eq!(tracker.usage_count(), 0);
    assert_eq!(tracker.last_used(), None);
    assert!(tracker.logs().is_empty());

    let day = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
    tracker.log_usage_on(day).await.unwrap();
    let row = tracker.log_usage_on(day).await.unwrap();
    assert_eq!(row.count, 2);
    assert_eq!(tracker.usage_count(), 2);
    assert_eq!(tracker.last_used(), Some("2024-05-20"));
    assert_eq!(tracker.usage_for_date(day), 2);
    assert_eq!(tracker.summary().total, 2);

    let reloaded = Tracker::load(api.clone()).await.unwrap();
    assert_eq!(reloaded.usage_count(), 2);
    assert_eq!(reloaded.last_used(), Some("2024-05-20"));
    assert_eq!(reloaded.logs(), tracker.logs());

    tracker.reset_counter().await.unwrap();
    assert_eq!(tracker.usage_count(), 0);
    assert_eq!(tracker.logs().len(), 1);

    tracker.clear_history().await.unwrap();
    assert!(tracker.logs().is_empty());
    assert_eq!(tracker.last_used(), None);
    assert!(api.fetch_usage_logs().await.unwrap().is_empty());
}

#[tokio::test]
async fn http_client_reports_rejected_requests() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let api = server.api();

    let err = api.log_usage("", 1).await.unwrap_err();
    match err {
        ClientError::Status { status, .. } => assert_eq!(status, StatusCode::BAD_REQUEST),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn http_overflowing_count_is_rejected_without_breaking_reads() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let api = server.api();
    api.clear_all_data().await.unwrap();

    api.log_usage("2024-02-01", i64::MAX).await.unwrap();
    let err = api.log_usage("2024-02-01", 1).await.unwrap_err();
    match err {
        ClientError::Status { status, .. } => assert_eq!(status, StatusCode::BAD_REQUEST),
        other => panic!("unexpected error: {other}"),
    }

    let logs = api.fetch_usage_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].count, i64::MAX);
}

#[tokio::test]
async fn http_index_page_renders() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client.get(&server.base_url).send().await.unwrap();
    assert!(response.status().is_success());
    let html = response.text().await.unwrap();
    assert!(html.contains("Contact Lens Tracker"));
}
