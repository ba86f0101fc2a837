//! Upstream client integration tests.
//!
//! Runs the client against a real hyper/http1 server bound to a random
//! loopback port, covering each outcome classification: any-status `Ok`,
//! total-deadline `Timeout`, connection-refused `Unreachable`, and the
//! body-cap `Malformed` case.

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use svchub_common::upstream::{Outcome, UpstreamClient};

async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let _ = http1::Builder::new()
                    .serve_connection(io, service_fn(handler))
                    .await;
            });
        }
    });

    addr
}

async fn handler(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/ok" => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(r#"{"ok":true}"#)))
            .unwrap(),
        "/teapot" => Response::builder()
            .status(StatusCode::IM_A_TEAPOT)
            .body(Full::new(Bytes::from(r#"{"teapot":true}"#)))
            .unwrap(),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Response::new(Full::new(Bytes::from("late")))
        }
        "/big" => {
            let body = vec![b'x'; 64 * 1024];
            Response::new(Full::new(Bytes::from(body)))
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap(),
    };
    Ok(response)
}

#[tokio::test]
async fn test_ok_outcome_with_status_and_body() {
    let addr = start_upstream().await;
    let client = UpstreamClient::new();

    let outcome = client
        .call(
            Method::GET,
            &format!("http://{addr}/ok"),
            HeaderMap::new(),
            Bytes::new(),
            Duration::from_secs(5),
        )
        .await;

    match outcome {
        Outcome::Ok {
            status,
            headers,
            body,
        } => {
            assert_eq!(status, StatusCode::OK);
            assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
            assert_eq!(&body[..], br#"{"ok":true}"#);
        }
        other => panic!("expected Ok, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_2xx_status_is_still_ok() {
    let addr = start_upstream().await;
    let client = UpstreamClient::new();

    let outcome = client
        .call(
            Method::POST,
            &format!("http://{addr}/teapot"),
            HeaderMap::new(),
            Bytes::new(),
            Duration::from_secs(5),
        )
        .await;

    match outcome {
        Outcome::Ok { status, .. } => assert_eq!(status, StatusCode::IM_A_TEAPOT),
        other => panic!("expected Ok, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_a_total_deadline() {
    let addr = start_upstream().await;
    let client = UpstreamClient::new();

    let started = Instant::now();
    let outcome = client
        .call(
            Method::GET,
            &format!("http://{addr}/slow"),
            HeaderMap::new(),
            Bytes::new(),
            Duration::from_secs(1),
        )
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, Outcome::Timeout), "got {outcome:?}");
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    // Bind then drop, so the port is known-free.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = UpstreamClient::new();
    let outcome = client
        .call(
            Method::GET,
            &format!("http://{addr}/anything"),
            HeaderMap::new(),
            Bytes::new(),
            Duration::from_secs(2),
        )
        .await;

    match outcome {
        Outcome::Unreachable { cause } => assert!(!cause.is_empty()),
        other => panic!("expected Unreachable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_over_cap_is_malformed() {
    let addr = start_upstream().await;
    let client = UpstreamClient::with_body_cap(1024);

    let outcome = client
        .call(
            Method::GET,
            &format!("http://{addr}/big"),
            HeaderMap::new(),
            Bytes::new(),
            Duration::from_secs(5),
        )
        .await;

    match outcome {
        Outcome::Malformed { cause } => assert!(cause.contains("cap"), "{cause}"),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_headers_and_body_reach_upstream() {
    // The /ok handler does not echo, so spin a dedicated echo server.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let io = TokioIo::new(stream);
            let _ = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(|req: Request<Incoming>| async move {
                        use http_body_util::BodyExt;
                        let content_type = req
                            .headers()
                            .get(CONTENT_TYPE)
                            .cloned()
                            .unwrap_or(HeaderValue::from_static(""));
                        let body = req.into_body().collect().await.unwrap().to_bytes();
                        Ok::<_, Infallible>(
                            Response::builder()
                                .header("x-seen-content-type", content_type)
                                .body(Full::new(body))
                                .unwrap(),
                        )
                    }),
                )
                .await;
        }
    });

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let client = UpstreamClient::new();
    let outcome = client
        .call(
            Method::POST,
            &format!("http://{addr}/echo"),
            headers,
            Bytes::from(r#"{"n":1}"#),
            Duration::from_secs(5),
        )
        .await;

    match outcome {
        Outcome::Ok { headers, body, .. } => {
            assert_eq!(headers.get("x-seen-content-type").unwrap(), "application/json");
            assert_eq!(&body[..], br#"{"n":1}"#);
        }
        other => panic!("expected Ok, got {other:?}"),
    }
}
