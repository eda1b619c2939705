//! Purpose: End-to-end tests for the snippet HTTP/JSON server.
//! Exports: None (integration test module).
//! Role: Validate catalogue, invocation, source and error routes across TCP.
//! Invariants: Uses loopback-only server with a temp snippets directory.
//! Invariants: Server processes are cleaned up on drop.

use serde_json::{Value, json};
use std::fs;
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

struct TestServer {
    child: Child,
    base_url: String,
    _snippets: tempfile::TempDir,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start() -> TestResult<Self> {
        Self::start_with_args(&[])
    }

    fn start_with_args(extra: &[&str]) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let snippets = snippets_fixture()?;
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut child = Command::new(env!("CARGO_BIN_EXE_snipserve"))
                .arg("--snippets-dir")
                .arg(snippets.path())
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .args(extra)
                .env_remove("API_PREFIX")
                .env_remove("BACKEND_CORS_ORIGINS")
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()?;

            match wait_for_server(&mut child, bind.parse()?) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        base_url,
                        _snippets: snippets,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post(&self, path: &str, body: Value) -> TestResult<(u16, Value)> {
        match ureq::post(&self.url(path)).send_json(body) {
            Ok(resp) => Ok((resp.status(), resp.into_json()?)),
            Err(ureq::Error::Status(code, resp)) => Ok((code, resp.into_json()?)),
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, path: &str) -> TestResult<(u16, Option<Value>)> {
        match ureq::get(&self.url(path)).call() {
            Ok(resp) => Ok((resp.status(), Some(resp.into_json()?))),
            Err(ureq::Error::Status(code, resp)) => Ok((code, resp.into_json().ok())),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn snippets_fixture() -> TestResult<tempfile::TempDir> {
    let temp = tempfile::tempdir()?;
    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join("snippets");
    for entry in fs::read_dir(bundled)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name == "mod.rs" {
            continue;
        }
        fs::copy(&path, temp.path().join(file_name))?;
    }
    fs::write(temp.path().join("broken.rs"), "pub fn execute(params: {")?;
    Ok(temp)
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, addr: SocketAddr) -> TestResult<()> {
    let url = format!("http://{addr}/health");
    let start = Instant::now();
    loop {
        if let Ok(resp) = ureq::get(&url).call() {
            if resp.status() == 200 {
                return Ok(());
            }
        }
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.trim();
            return Err(format!(
                "server exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("server did not start in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}

fn catalogue_entry<'a>(catalogue: &'a Value, name: &str) -> Option<&'a Value> {
    catalogue["snippets"]
        .as_array()?
        .iter()
        .find(|entry| entry["name"] == name)
}

#[test]
fn health_reports_healthy() -> TestResult<()> {
    let server = TestServer::start()?;
    let (status, body) = server.get("/health")?;
    assert_eq!(status, 200);
    assert_eq!(body, Some(json!({"status": "healthy"})));
    Ok(())
}

#[test]
fn catalogue_describes_loaded_snippets_and_omits_broken_ones() -> TestResult<()> {
    let server = TestServer::start()?;
    let (status, body) = server.get("/api/snippets")?;
    assert_eq!(status, 200);
    let catalogue = body.ok_or("catalogue body")?;

    assert!(catalogue_entry(&catalogue, "broken").is_none());

    let add = catalogue_entry(&catalogue, "add_two_numbers").ok_or("add_two_numbers")?;
    assert_eq!(add["endpoint"], "/api/snippets/add_two_numbers");
    assert_eq!(add["params"], json!({"a": "float", "b": "float"}));
    assert_eq!(add["return_type"], "float");
    assert_eq!(add["is_async"], false);

    let sum = catalogue_entry(&catalogue, "sum_of_primes").ok_or("sum_of_primes")?;
    assert_eq!(sum["dependencies"], json!(["find_primes"]));
    assert_eq!(sum["is_async"], true);

    for entry in catalogue["snippets"].as_array().ok_or("snippets array")? {
        let endpoint = entry["endpoint"].as_str().ok_or("endpoint")?;
        let (status, _) = server.post(endpoint, json!({}))?;
        assert!(
            status != 404 && status != 405,
            "endpoint {endpoint} answered {status}"
        );
    }
    Ok(())
}

#[test]
fn invocation_returns_snippet_results() -> TestResult<()> {
    let server = TestServer::start()?;

    let (status, body) = server.post("/api/snippets/add_two_numbers", json!({"a": 2, "b": 3}))?;
    assert_eq!(status, 200);
    assert_eq!(body.as_f64(), Some(5.0));

    let (status, body) = server.post("/api/snippets/find_primes", json!({"limit": "20"}))?;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 8);
    assert_eq!(body["primes"], json!([2, 3, 5, 7, 11, 13, 17, 19]));

    let (status, body) = server.post("/api/snippets/sum_of_primes", json!({"limit": "10"}))?;
    assert_eq!(status, 200);
    assert_eq!(body, json!(17));
    Ok(())
}

#[test]
fn form_style_params_are_coerced() -> TestResult<()> {
    let server = TestServer::start()?;

    let (status, body) = server.post("/api/snippets/add_two_numbers", json!({"a": "2", "b": "3"}))?;
    assert_eq!(status, 200);
    assert_eq!(body.as_f64(), Some(5.0));

    let (status, body) = server.post("/api/snippets/sum_of_primes", json!({"limit": 10}))?;
    assert_eq!(status, 200);
    assert_eq!(body, json!(17));

    let (status, body) = server.post(
        "/api/snippets/timestamp_to_date",
        json!({"timestamp": 1625140800000u64}),
    )?;
    assert_eq!(status, 200);
    assert!(body.as_str().ok_or("date")?.starts_with("2021-07-0"));
    Ok(())
}

#[test]
fn dependency_failures_surface_as_bad_requests() -> TestResult<()> {
    let server = TestServer::start()?;
    let (status, body) = server.post("/api/snippets/sum_of_primes", json!({"limit": "1"}))?;
    assert_eq!(status, 400);
    let detail = body["detail"].as_str().ok_or("detail")?;
    assert!(detail.contains("Error calculating sum of primes"), "{detail}");
    assert!(
        detail.contains(
            "Failed to execute snippet find_primes: Invalid input: Limit must be at least 2"
        ),
        "{detail}"
    );
    Ok(())
}

#[test]
fn time_snippets_report_the_current_day() -> TestResult<()> {
    let server = TestServer::start()?;

    let (status, now) = server.post("/api/snippets/current_time", json!({}))?;
    assert_eq!(status, 200);
    for key in ["timestamp", "date", "iso", "time"] {
        assert!(now[key].is_string(), "missing {key}");
    }
    let date = now["date"].as_str().ok_or("date")?;
    let shape_ok = date.len() == 10
        && date.char_indices().all(|(i, ch)| match i {
            4 | 7 => ch == '-',
            _ => ch.is_ascii_digit(),
        });
    assert!(shape_ok, "date {date:?} is not YYYY-MM-DD");

    let (status, start) = server.post("/api/snippets/day_start_timestamp", json!({}))?;
    assert_eq!(status, 200);
    let start = start.as_i64().ok_or("integer timestamp")?;
    let now_secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64;
    assert!(start <= now_secs);
    assert!(start > now_secs - 86_400);
    assert_eq!(start % 60, 0);
    Ok(())
}

#[test]
fn repeated_invocations_are_stable() -> TestResult<()> {
    let server = TestServer::start()?;
    let matrix = json!({"matrix": [[2.0, 0.0], [0.0, 3.0]]});
    let (first_status, first) = server.post("/api/snippets/find_determinant", matrix.clone())?;
    let (second_status, second) = server.post("/api/snippets/find_determinant", matrix)?;
    assert_eq!(first_status, 200);
    assert_eq!(second_status, 200);
    assert_eq!(first.as_f64(), Some(6.0));
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn snippet_failures_become_bad_requests_with_detail() -> TestResult<()> {
    let server = TestServer::start()?;
    let (status, body) = server.post(
        "/api/snippets/add_matrices",
        json!({"matrix1": [[1, 2]], "matrix2": [[1]]}),
    )?;
    assert_eq!(status, 400);
    let detail = body["detail"].as_str().ok_or("detail")?;
    assert!(detail.starts_with("Failed to execute snippet add_matrices:"));
    assert!(detail.contains("Matrix dimensions must match"));

    let (status, body) = server.post("/api/snippets/find_primes", json!({"limit": "1"}))?;
    assert_eq!(status, 400);
    assert!(body["detail"].as_str().ok_or("detail")?.contains("Limit must be at least 2"));
    Ok(())
}

#[test]
fn malformed_bodies_are_rejected_with_detail() -> TestResult<()> {
    let server = TestServer::start()?;
    let result = ureq::post(&server.url("/api/snippets/add_two_numbers"))
        .set("Content-Type", "application/json")
        .send_string("{not json");
    match result {
        Err(ureq::Error::Status(code, resp)) => {
            assert!((400..500).contains(&code), "status {code}");
            let body: Value = resp.into_json()?;
            assert!(body["detail"].is_string());
        }
        Ok(resp) => return Err(format!("expected rejection, got {}", resp.status()).into()),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

#[test]
fn unknown_snippets_are_not_found() -> TestResult<()> {
    let server = TestServer::start()?;
    let (status, _) = server.post("/api/snippets/does_not_exist", json!({}))?;
    assert_eq!(status, 404);
    let (status, _) = server.get("/api/snippets/does_not_exist/code")?;
    assert_eq!(status, 404);
    Ok(())
}

#[test]
fn code_route_returns_source_text() -> TestResult<()> {
    let server = TestServer::start()?;
    let (status, body) = server.get("/api/snippets/add_two_numbers/code")?;
    assert_eq!(status, 200);
    let body = body.ok_or("code body")?;
    let code = body["code"].as_str().ok_or("code")?;
    assert!(code.contains("fn execute"));

    let (status, body) = server.get("/api/snippets/broken/code")?;
    assert_eq!(status, 200);
    assert_eq!(body.ok_or("broken body")?["code"], "pub fn execute(params: {");
    Ok(())
}

#[test]
fn api_prefix_moves_snippet_routes() -> TestResult<()> {
    let server = TestServer::start_with_args(&["--api-prefix", "/v1"])?;
    let (status, body) = server.post("/v1/snippets/add_two_numbers", json!({"a": 1, "b": 1}))?;
    assert_eq!(status, 200);
    assert_eq!(body.as_f64(), Some(2.0));
    let (status, _) = server.get("/api/snippets")?;
    assert_eq!(status, 404);
    Ok(())
}

#[test]
fn cors_allows_configured_origins() -> TestResult<()> {
    let origin = "http://localhost:3000";
    let server = TestServer::start()?;

    let resp = ureq::get(&server.url("/api/snippets"))
        .set("Origin", origin)
        .call()?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.header("access-control-allow-origin"), Some(origin));
    assert_eq!(resp.header("access-control-allow-credentials"), Some("true"));

    let preflight = ureq::request("OPTIONS", &server.url("/api/snippets/add_two_numbers"))
        .set("Origin", origin)
        .set("Access-Control-Request-Method", "POST")
        .call()?;
    assert!(matches!(preflight.status(), 200 | 204));
    assert_eq!(preflight.header("access-control-allow-origin"), Some(origin));

    let other = ureq::get(&server.url("/api/snippets"))
        .set("Origin", "http://evil.test")
        .call()?;
    assert_eq!(other.header("access-control-allow-origin"), None);
    Ok(())
}
