//! Sync orchestration tests against a local HTTP fixture.
//!
//! The Drive and token endpoints in the config are pointed at a small
//! canned-response server on a loopback socket, so the full
//! ensure -> fetch -> reconcile -> write-back pipeline and the
//! refresh-and-retry path run without touching the real API.

use cardvault::config::{Config, DriveConfig, OAuthConfig};
use cardvault::record::Record;
use cardvault::sync::{self, Credentials, SyncError};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

/// One captured HTTP request.
#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

struct Response {
    status: u16,
    body: String,
}

impl Response {
    fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Start a fixture server on a free loopback port. Returns the base URL and
/// the log of captured requests. One request per connection; the server
/// thread lives until the test process exits.
fn serve(
    mut router: impl FnMut(&Request) -> Response + Send + 'static,
) -> (String, Arc<Mutex<Vec<Request>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture listener");
    let addr = listener.local_addr().expect("fixture addr");
    let captured = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&captured);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            if let Some(request) = read_request(&stream) {
                log.lock().unwrap().push(request.clone());
                write_response(&stream, &router(&request));
            }
        }
    });

    (format!("http://{}", addr), captured)
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);

    let mut line = String::new();
    if reader.read_line(&mut line).ok()? == 0 {
        return None;
    }
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        match name.to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.trim().parse().unwrap_or(0),
            "authorization" => authorization = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(Request {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_response(mut stream: &TcpStream, response: &Response) {
    let reason = match response.status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    let payload = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(payload.as_bytes());
    let _ = stream.flush();
}

/// Config wired to the fixture server.
fn fixture_config(base: &str) -> Config {
    Config {
        oauth: OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            token_url: format!("{}/token", base),
        },
        drive: DriveConfig {
            files_url: format!("{}/files", base),
            upload_url: format!("{}/upload", base),
        },
        ..Config::default()
    }
}

fn credentials(token: &str) -> Credentials {
    Credentials {
        access_token: token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: None,
    }
}

fn record(json: serde_json::Value) -> Record {
    serde_json::from_value(json).expect("test record")
}

const FILE_LIST: &str = r#"{"files":[{"id":"f1","name":"cardholder.json"}]}"#;
const FILE_META: &str = r#"{"id":"f1","name":"cardholder.json"}"#;

#[test]
fn test_run_filters_deleted_merges_and_marks_synced() {
    // Remote holds an older record and a soft-deleted one; the deleted one
    // must be dropped when the file is read, before the merge.
    let remote = concat!(
        r#"[{"key":"c1","last_modified_time":100,"val":"old"},"#,
        r#"{"key":"gone","last_modified_time":500,"is_deleted":true}]"#
    );

    let (base, requests) = serve(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", path) if path.starts_with("/files?") => Response::json(200, FILE_LIST),
        ("GET", path) if path.starts_with("/files/f1") => Response::json(200, remote),
        ("PATCH", path) if path.starts_with("/upload/f1") => Response::json(200, FILE_META),
        _ => Response::json(404, "{}"),
    });

    let config = fixture_config(&base);
    let mut creds = credentials("token-1");
    let incoming = vec![
        record(serde_json::json!({"key":"c1","last_modified_time":200,"val":"new"})),
        record(serde_json::json!({"key":"c2","last_modified_time":50,"val":"x"})),
    ];

    let merged = sync::run(&config, &mut creds, &incoming).expect("sync should succeed");

    // Newer incoming record won, new key appended, deleted record gone
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].key, "c1");
    assert_eq!(merged[0].fields.get("val"), Some(&serde_json::json!("new")));
    assert_eq!(merged[1].key, "c2");
    assert!(merged.iter().all(|r| r.is_synced));

    // The written body matches the returned merge result
    let requests = requests.lock().unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method == "PATCH")
        .expect("update request");
    assert_eq!(patch.authorization.as_deref(), Some("Bearer token-1"));
    let written: Vec<Record> = serde_json::from_str(&patch.body).expect("written records");
    assert_eq!(written, merged);
    assert!(!written.iter().any(|r| r.key == "gone"));

    // No refresh happened
    assert!(!requests.iter().any(|r| r.path.starts_with("/token")));
}

#[test]
fn test_run_refreshes_once_and_retries_on_rejected_token() {
    // First Drive call is rejected; after one refresh exchange the retry
    // goes through with the fresh token.
    let mut rejected = false;
    let (base, requests) = serve(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", path) if path.starts_with("/token") => {
            Response::json(200, r#"{"access_token":"fresh-token","expires_in":3600}"#)
        }
        ("GET", path) if path.starts_with("/files?") => {
            if rejected {
                Response::json(200, FILE_LIST)
            } else {
                rejected = true;
                Response::json(401, r#"{"error":"invalid_grant"}"#)
            }
        }
        ("GET", path) if path.starts_with("/files/f1") => Response::json(200, "[]"),
        ("PATCH", path) if path.starts_with("/upload/f1") => Response::json(200, FILE_META),
        _ => Response::json(404, "{}"),
    });

    let config = fixture_config(&base);
    let mut creds = credentials("stale-token");
    let incoming = vec![record(
        serde_json::json!({"key":"c1","last_modified_time":100}),
    )];

    let merged = sync::run(&config, &mut creds, &incoming).expect("retry should succeed");
    assert_eq!(merged.len(), 1);

    // The refreshed token was written through for the caller to persist
    assert_eq!(creds.access_token, "fresh-token");
    assert_eq!(creds.refresh_token.as_deref(), Some("refresh-1"));

    let requests = requests.lock().unwrap();
    let token_calls = requests.iter().filter(|r| r.path.starts_with("/token")).count();
    assert_eq!(token_calls, 1);
    let refresh = requests
        .iter()
        .find(|r| r.path.starts_with("/token"))
        .expect("refresh request");
    assert!(refresh.body.contains("grant_type=refresh_token"));
    assert!(refresh.body.contains("refresh_token=refresh-1"));

    // Every request after the refresh carries the fresh token
    let patch = requests
        .iter()
        .find(|r| r.method == "PATCH")
        .expect("update request");
    assert_eq!(patch.authorization.as_deref(), Some("Bearer fresh-token"));
}

#[test]
fn test_run_retries_exactly_once() {
    // The token stays rejected even after a refresh: the run must fail
    // after a single refresh exchange and a single retry.
    let (base, requests) = serve(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", path) if path.starts_with("/token") => {
            Response::json(200, r#"{"access_token":"fresh-token","expires_in":3600}"#)
        }
        ("GET", path) if path.starts_with("/files?") => {
            Response::json(401, r#"{"error":"invalid_grant"}"#)
        }
        _ => Response::json(404, "{}"),
    });

    let config = fixture_config(&base);
    let mut creds = credentials("stale-token");

    let err = sync::run(&config, &mut creds, &[]).expect_err("second rejection is fatal");
    assert!(matches!(err, SyncError::TokenRejected(_)));

    // Refreshed credentials survive the failed run so the caller can keep
    // them
    assert_eq!(creds.access_token, "fresh-token");

    let requests = requests.lock().unwrap();
    let token_calls = requests.iter().filter(|r| r.path.starts_with("/token")).count();
    let list_calls = requests.iter().filter(|r| r.path.starts_with("/files?")).count();
    assert_eq!(token_calls, 1);
    assert_eq!(list_calls, 2);
}

#[test]
fn test_run_refreshes_up_front_when_token_expired() {
    let (base, requests) = serve(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", path) if path.starts_with("/token") => {
            Response::json(200, r#"{"access_token":"fresh-token","expires_in":3600}"#)
        }
        ("GET", path) if path.starts_with("/files?") => Response::json(200, FILE_LIST),
        ("GET", path) if path.starts_with("/files/f1") => Response::json(200, "[]"),
        ("PATCH", path) if path.starts_with("/upload/f1") => Response::json(200, FILE_META),
        _ => Response::json(404, "{}"),
    });

    let config = fixture_config(&base);
    let mut creds = Credentials {
        access_token: "expired-token".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(1), // long past
    };

    sync::run(&config, &mut creds, &[]).expect("sync should succeed after refresh");
    assert_eq!(creds.access_token, "fresh-token");

    let requests = requests.lock().unwrap();
    // The refresh came first; no Drive call ever used the expired token
    assert!(requests[0].path.starts_with("/token"));
    assert!(requests
        .iter()
        .skip(1)
        .all(|r| r.authorization.as_deref() == Some("Bearer fresh-token")));
}

#[test]
fn test_run_fails_when_refresh_is_rejected() {
    let (base, requests) = serve(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", path) if path.starts_with("/token") => Response::json(
            200,
            r#"{"error":"invalid_grant","error_description":"revoked"}"#,
        ),
        _ => Response::json(404, "{}"),
    });

    let config = fixture_config(&base);
    let mut creds = Credentials {
        access_token: "expired-token".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(1),
    };

    let err = sync::run(&config, &mut creds, &[]).expect_err("refresh rejection is fatal");
    assert!(matches!(err, SyncError::RefreshFailed(_)));

    // No Drive call was attempted
    let requests = requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.path.starts_with("/token")));
}

#[test]
fn test_run_creates_missing_remote_file() {
    // Empty appDataFolder: the run must create the file before updating it.
    let (base, requests) = serve(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", path) if path.starts_with("/files?") => Response::json(200, r#"{"files":[]}"#),
        ("POST", path) if path.starts_with("/upload?") => Response::json(200, FILE_META),
        ("GET", path) if path.starts_with("/files/f1") => Response::json(200, "[]"),
        ("PATCH", path) if path.starts_with("/upload/f1") => Response::json(200, FILE_META),
        _ => Response::json(404, "{}"),
    });

    let config = fixture_config(&base);
    let mut creds = credentials("token-1");
    let incoming = vec![record(
        serde_json::json!({"key":"c1","last_modified_time":100}),
    )];

    let merged = sync::run(&config, &mut creds, &incoming).expect("sync should succeed");
    assert_eq!(merged.len(), 1);

    let requests = requests.lock().unwrap();
    let create = requests
        .iter()
        .find(|r| r.method == "POST" && r.path.starts_with("/upload?"))
        .expect("create request");
    assert!(create.path.contains("uploadType=multipart"));
    assert!(create.body.contains("appDataFolder"));
    assert!(create.body.contains("cardholder.json"));
}
