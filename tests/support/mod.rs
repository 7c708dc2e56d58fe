#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Daemon {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl Daemon {
    /// Daemon with no completion backend configured; every narrative surface
    /// runs its fallback path.
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_env(envs: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_forgeedd");
        let mut cmd = Command::new(exe);
        cmd.env_remove("OPENAI_API_KEY")
            .env_remove("FORGEED_COMPLETIONS_URL")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (k, v) in envs {
            cmd.env(k, v);
        }
        let mut child = cmd.spawn().expect("spawn forgeedd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Daemon {
            child,
            stdin,
            reader: BufReader::new(stdout),
        }
    }

    /// Daemon pointed at a mock completion endpoint.
    pub fn spawn_with_mock(mock: &MockCompletions) -> Self {
        Self::spawn_with_env(&[
            ("OPENAI_API_KEY", "test-key"),
            ("FORGEED_COMPLETIONS_URL", mock.url.as_str()),
        ])
    }

    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    pub fn request_ok(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Asserts the call failed with the given error code and returns the
    /// error object.
    pub fn request_err(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
        code: &str,
    ) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().expect("error object");
        assert_eq!(
            error.get("code").and_then(|v| v.as_str()),
            Some(code),
            "{} wrong error code: {}",
            method,
            error
        );
        error
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct MockCompletions {
    pub url: String,
    calls: Arc<AtomicUsize>,
}

impl MockCompletions {
    /// Chat-completions endpoint backed by `reply`, which maps the raw
    /// request body to the content string of the response. The server thread
    /// lives until the test process exits.
    pub fn start(reply: impl Fn(&str) -> String + Send + 'static) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind mock server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("ip listen addr")
            .port();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        std::thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                counter.fetch_add(1, Ordering::SeqCst);
                let content = reply(&body);
                let envelope = json!({
                    "choices": [{ "message": { "content": content } }]
                });
                let response = tiny_http::Response::from_string(envelope.to_string())
                    .with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"application/json"[..],
                        )
                        .expect("header"),
                    );
                let _ = request.respond(response);
            }
        });
        MockCompletions {
            url: format!("http://127.0.0.1:{}", port),
            calls,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Select a fresh workspace and log in as the seeded admin.
/// Returns the admin session token.
pub fn open_workspace_as_admin(daemon: &mut Daemon, workspace: &PathBuf) -> String {
    daemon.request_ok(
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let login = daemon.request_ok(
        "login-admin",
        "auth.login",
        json!({ "email": "admin", "password": "admin123" }),
    );
    login
        .get("token")
        .and_then(|v| v.as_str())
        .expect("admin token")
        .to_string()
}

/// Provision a student account through the admin surface and log it in.
/// Returns (student_id, session_token).
pub fn create_and_login_student(
    daemon: &mut Daemon,
    admin_token: &str,
    email: &str,
    extra: serde_json::Value,
) -> (String, String) {
    let mut params = json!({
        "token": admin_token,
        "email": email,
        "password": "pw",
        "firstName": "Test",
        "lastName": "Student"
    });
    if let (Some(obj), Some(extra_obj)) = (params.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    let created = daemon.request_ok("create-student", "admin.students.create", params);
    let student_id = created
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let login = daemon.request_ok(
        "login-student",
        "auth.login",
        json!({ "email": email, "password": "pw" }),
    );
    let token = login
        .get("token")
        .and_then(|v| v.as_str())
        .expect("student token")
        .to_string();
    (student_id, token)
}
