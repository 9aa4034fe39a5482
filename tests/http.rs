use futures::StreamExt;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tap_counter::models::{ChangeEvent, CountryCode};
use tap_counter::{CounterBackend, HttpBackend, SessionSettings, TapSession};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

#[derive(Debug, Deserialize)]
struct TotalResponse {
    total_taps: u64,
}

#[derive(Debug, Deserialize)]
struct CountryRow {
    country_code: String,
    taps: u64,
}

struct TestServer {
    base_url: String,
    child: Child,
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
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

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

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("tap_counter_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/total")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_tap_counter"))
        .arg("serve")
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", unique_data_path())
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
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

async fn total(client: &Client, base_url: &str) -> u64 {
    let body: TotalResponse = client
        .get(format!("{base_url}/api/total"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body.total_taps
}

async fn leaderboard(client: &Client, base_url: &str) -> Vec<CountryRow> {
    client
        .get(format!("{base_url}/api/leaderboard?limit=100"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn increment(client: &Client, base_url: &str, country: &str, amount: u64) -> StatusCode {
    client
        .post(format!("{base_url}/rpc/increment_taps"))
        .json(&serde_json::json!({ "country_code": country, "amount": amount }))
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn http_increment_updates_total_and_leaderboard() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = total(&client, &server.base_url).await;

    assert_eq!(increment(&client, &server.base_url, "za", 10).await, StatusCode::NO_CONTENT);
    assert_eq!(increment(&client, &server.base_url, "ZM", 25).await, StatusCode::NO_CONTENT);
    assert_eq!(increment(&client, &server.base_url, "unknown", 5).await, StatusCode::NO_CONTENT);

    assert_eq!(total(&client, &server.base_url).await, before + 40);

    let rows = leaderboard(&client, &server.base_url).await;
    assert!(rows.windows(2).all(|pair| pair[0].taps >= pair[1].taps));
    let position = |code: &str| rows.iter().position(|row| row.country_code == code).unwrap();
    assert!(position("ZM") < position("ZA"));
    assert!(rows.iter().any(|row| row.country_code == "ZA" && row.taps >= 10));
}

#[tokio::test]
async fn http_rejects_invalid_increments() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = total(&client, &server.base_url).await;
    assert_eq!(increment(&client, &server.base_url, "US", 0).await, StatusCode::BAD_REQUEST);
    assert_eq!(increment(&client, &server.base_url, "France", 3).await, StatusCode::BAD_REQUEST);
    assert_eq!(total(&client, &server.base_url).await, before);
}

#[tokio::test]
async fn http_change_stream_delivers_events() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let backend = HttpBackend::new(server.base_url.clone()).unwrap();

    let mut changes = backend.subscribe_changes().await.unwrap();
    let expected = backend.global_total().await.unwrap() + 2;
    backend
        .increment_taps(&CountryCode::parse("IS").unwrap(), 2)
        .await
        .unwrap();

    let first = timeout(Duration::from_secs(3), changes.next()).await.unwrap();
    assert_eq!(first, Some(ChangeEvent::GlobalState { total_taps: Some(expected) }));
    let second = timeout(Duration::from_secs(3), changes.next()).await.unwrap();
    assert_eq!(
        second,
        Some(ChangeEvent::CountryTaps {
            country_code: CountryCode::parse("IS").unwrap()
        })
    );
}

#[tokio::test]
async fn http_session_batches_taps_into_one_increment() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let backend = Arc::new(HttpBackend::new(server.base_url.clone()).unwrap());
    let before = total(&client, &server.base_url).await;

    let session = TapSession::start(
        backend,
        &SessionSettings::default(),
        CountryCode::parse("LU").unwrap(),
    );
    for _ in 0..5 {
        session.press_start();
        session.press_end();
    }

    let mut view = session.view().subscribe();
    timeout(Duration::from_secs(3), async {
        while view.borrow_and_update().total < before + 5 {
            view.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(session.teardown().await, 0);
    assert_eq!(total(&client, &server.base_url).await, before + 5);
    let rows = leaderboard(&client, &server.base_url).await;
    assert!(rows.iter().any(|row| row.country_code == "LU" && row.taps == 5));
}

#[tokio::test]
async fn http_scoreboard_page_renders() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client.get(format!("{}/", server.base_url)).send().await.unwrap();
    assert!(response.status().is_success());
    let html = response.text().await.unwrap();
    assert!(html.contains("Total Taps"));
    assert!(html.contains("Country Leaderboard"));
}
