//! Tests for the mock client.

use callwright::mock::{respond, respond_json, MockClient};
use callwright::{Error, FatalError, Modifiable, Modifier, Phase, Request, Validatable};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Profile {
    login: String,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A mock that records every request it is asked to answer.
fn recording_client(seen: Arc<Mutex<Vec<Request>>>) -> MockClient {
    MockClient::new(move |request| {
        seen.lock().unwrap().push(request.clone());
        respond_json(
            request,
            StatusCode::OK,
            &Profile {
                login: "octo".to_string(),
            },
        )
    })
}

#[tokio::test]
async fn test_authentication_reaches_the_provider() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let client = recording_client(seen.clone())
        .authentication(Modifier::bearer("test-token"))
        .build()
        .unwrap();

    let profile: Profile = client.get("/me").json_body().await.unwrap();
    assert_eq!(profile.login, "octo");

    client.get("/status").anonymous().send().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].header("authorization"), Some("Bearer test-token"));
    assert_eq!(seen[1].header("authorization"), None);
}

#[tokio::test]
async fn test_deferred_authentication_runs_per_call() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let issued = Arc::new(Mutex::new(0u32));

    let counter = issued.clone();
    let client = recording_client(seen.clone())
        .build()
        .unwrap()
        .authentication_with(move || {
            let counter = counter.clone();
            async move {
                let issued = {
                    let mut count = counter.lock().unwrap();
                    *count += 1;
                    *count
                };
                Ok::<_, std::io::Error>(Modifier::bearer(format!("token-{}", issued)))
            }
        });

    client.get("/a").send().await.unwrap();
    client.get("/b").send().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].header("authorization"), Some("Bearer token-1"));
    assert_eq!(seen[1].header("authorization"), Some("Bearer token-2"));
}

#[tokio::test]
async fn test_provider_errors_are_returned_unchanged() {
    let client = MockClient::new(|request| {
        Err(Error::Transport {
            request: Box::new(request.clone()),
            source: "offline".into(),
        })
    })
    .build()
    .unwrap();

    let err = client.get("/x").send().await.unwrap_err();
    assert_eq!(err.phase(), Phase::Transport);
    assert_eq!(err.request().unwrap().url.path(), "/x");
}

#[tokio::test]
async fn test_mock_decode_failure() {
    let client = MockClient::new(|request| Ok(respond(request, StatusCode::OK, "not json")))
        .build()
        .unwrap();

    let err = client.get("/me").perform_json::<Profile>().await.unwrap_err();
    assert!(matches!(err, Error::Fatal(FatalError::Decode { .. })));
}

#[tokio::test]
async fn test_mock_download_writes_body() {
    let client = MockClient::new(|request| Ok(respond(request, StatusCode::OK, "file contents")))
        .validate_responses(true)
        .build()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("out.txt");
    let response = client
        .get("/out.txt")
        .header("accept", "text/plain")
        .download(&destination)
        .await
        .unwrap();

    assert_eq!(response.data, destination);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "file contents");

    let err = client.get("/out.txt").download(&destination).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Fatal(FatalError::DownloadedFileMoveFailure { .. })
    ));
}

#[tokio::test]
async fn test_mock_download_validates_head_only() {
    let client = MockClient::new(|request| Ok(respond(request, StatusCode::OK, "file contents")))
        .validate_responses(true)
        .build()
        .unwrap()
        .validate_with(|request: &Request, response: &callwright::Response<bytes::Bytes>| {
            if response.data.is_empty() {
                Ok(())
            } else {
                Err(format!("{} carried a body into validation", request.url))
            }
        });

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("head-only.txt");
    let response = client.get("/head-only.txt").download(&destination).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "file contents");
}

#[tokio::test]
async fn test_validator_reads_the_request() {
    let client = MockClient::new(|request| Ok(respond(request, StatusCode::OK, "")))
        .validate_responses(true)
        .build()
        .unwrap()
        .validate_with(|request: &Request, response: &callwright::Response<bytes::Bytes>| {
            if response.data.is_empty() && request.method != http::Method::HEAD {
                Err(format!("empty body for {} {}", request.method, request.url.path()))
            } else {
                Ok(())
            }
        });

    client.head("/status").send().await.unwrap();

    let err = client.get("/status").send().await.unwrap_err();
    assert_eq!(err.phase(), Phase::Validate);
    assert!(err.to_string().contains("empty body for GET /status"));
}
