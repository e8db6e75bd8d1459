//! End-to-end tests of the pipeline through the default `reqwest` transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dispatch_lib::{
    ClientBuilder, ErrorKind, Pipeline, callback,
    middleware::{if_success, wrap},
};
use http::StatusCode;
use pretty_assertions::assert_eq;
use test_utils::{mock_route, mock_server};
use wiremock::MockServer;

type Outcomes = Arc<Mutex<Vec<(String, Option<u16>)>>>;

/// Callback that records the URL and status (or `None` on error) of every result
fn record(outcomes: &Outcomes) -> dispatch_lib::Callback {
    let outcomes = Arc::clone(outcomes);
    callback(move |request, result| async move {
        let status = result.ok().map(|response| response.status().as_u16());
        outcomes
            .lock()
            .unwrap()
            .push((request.url().path().to_string(), status));
    })
}

#[tokio::test]
async fn test_smoke() {
    let mock_server = MockServer::start().await;
    mock_route!(mock_server, "GET", "/ok", StatusCode::OK, 10);
    mock_route!(mock_server, "GET", "/missing", StatusCode::NOT_FOUND, 5);

    let pipeline = Pipeline::new(4).unwrap();
    let outcomes = Outcomes::default();

    for i in 0..15 {
        let path = if i % 3 == 0 { "missing" } else { "ok" };
        pipeline
            .get(format!("{}/{path}", mock_server.uri()), record(&outcomes))
            .await
            .unwrap();
    }
    pipeline.close();
    pipeline.wait().await;

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 15);
    let mut counts: HashMap<Option<u16>, usize> = HashMap::new();
    for (_, status) in outcomes.iter() {
        *counts.entry(*status).or_default() += 1;
    }
    assert_eq!(counts.get(&Some(200)), Some(&10));
    assert_eq!(counts.get(&Some(404)), Some(&5));
}

#[tokio::test]
async fn test_post_sends_body() {
    let mock_server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/submit"))
        .and(wiremock::matchers::body_string("hello"))
        .respond_with(wiremock::ResponseTemplate::new(StatusCode::CREATED))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = Pipeline::new(1).unwrap();
    let outcomes = Outcomes::default();
    pipeline
        .post(
            format!("{}/submit", mock_server.uri()),
            "hello",
            record(&outcomes),
        )
        .await
        .unwrap();
    pipeline.close();
    pipeline.wait().await;

    assert_eq!(
        *outcomes.lock().unwrap(),
        [("/submit".to_string(), Some(201))]
    );
}

#[tokio::test]
async fn test_rate_limit_spaces_requests_to_one_host() {
    let mock_server = mock_server!(StatusCode::OK);
    let delay = Duration::from_millis(100);

    let pipeline = Pipeline::new(3).unwrap();
    pipeline.set_rate_limit(delay);

    let start = Instant::now();
    let outcomes = Outcomes::default();
    for _ in 0..3 {
        pipeline
            .get(mock_server.uri(), record(&outcomes))
            .await
            .unwrap();
    }
    pipeline.close();
    pipeline.wait().await;

    assert_eq!(outcomes.lock().unwrap().len(), 3);
    // Three admissions to one host need at least two full delays
    assert!(start.elapsed() >= delay * 2);

    let stats = pipeline.rate_limiter().host_stats();
    assert_eq!(stats.len(), 1);
    let (_, host) = stats.sorted().into_iter().next().unwrap();
    assert_eq!(host.admissions, 3);
}

#[tokio::test]
async fn test_unreachable_host_reports_error() {
    let pipeline = Pipeline::with_transport(
        2,
        ClientBuilder::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .client()
            .unwrap(),
    );
    let errors = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&errors);
    pipeline
        .get(
            "http://127.0.0.1:1/",
            callback(move |_, result| async move {
                sink.lock().unwrap().push(result.is_err());
            }),
        )
        .await
        .unwrap();
    pipeline.close();
    pipeline.wait().await;

    assert_eq!(*errors.lock().unwrap(), [true]);
}

#[tokio::test]
async fn test_submit_after_close() {
    let pipeline = Pipeline::new(1).unwrap();
    pipeline.close();

    let result = pipeline
        .get("https://example.com", callback(|_, _| async {}))
        .await;
    assert!(matches!(result, Err(ErrorKind::PipelineClosed)));

    pipeline.wait().await;
}

#[tokio::test]
async fn test_middleware_filters_failures() {
    let mock_server = MockServer::start().await;
    mock_route!(mock_server, "GET", "/ok", StatusCode::OK, 1);
    mock_route!(mock_server, "GET", "/broken", StatusCode::INTERNAL_SERVER_ERROR, 1);

    let pipeline = Pipeline::new(2).unwrap();
    let outcomes = Outcomes::default();
    for path in ["ok", "broken"] {
        pipeline
            .get(
                format!("{}/{path}", mock_server.uri()),
                wrap(record(&outcomes), [if_success]),
            )
            .await
            .unwrap();
    }
    pipeline.close();
    pipeline.wait().await;

    assert_eq!(*outcomes.lock().unwrap(), [("/ok".to_string(), Some(200))]);
}
