use mock_datadog::{MockServer, ServerHandle};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tokio::net::UdpSocket;

const WAIT: Duration = Duration::from_secs(5);

async fn post_event(client: &reqwest::Client, server: &ServerHandle, path: &str, body: String) -> (u16, Value) {
    let response = client
        .post(format!("http://{}{}", server.http_addr(), path))
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .expect("Failed to send request");

    let status = response.status().as_u16();
    let body = response.json::<Value>().await.expect("Response is not JSON");
    (status, body)
}

async fn get_status(client: &reqwest::Client, server: &ServerHandle) -> Value {
    let response = client
        .get(format!("http://{}/status", server.http_addr()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    response.json::<Value>().await.expect("Status is not JSON")
}

async fn send_datagram(server: &ServerHandle, payload: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind client socket");
    socket
        .send_to(payload, server.statsd_addr())
        .await
        .expect("Failed to send datagram");
}

#[tokio::test]
async fn test_post_event_returns_sequential_ids() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    for expected_id in 1..=3 {
        let event = json!({
            "title": format!("Pool tank event {expected_id}"),
            "text": "Pool state changed",
            "alert_type": "warning",
            "tags": ["pool:tank", "env:test"],
            "host": "nas01"
        });
        let (status, body) = post_event(&client, &server, "/api/v1/events", event.to_string()).await;

        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "ok", "event_id": expected_id}));
    }

    server
        .with_captures(|captures| {
            assert_eq!(captures.event_count(), 3);

            captures
                .expect_event_at_path("/api/v1/events")
                .with_field("alert_type", "warning")
                .with_tag("pool:tank")
                .assert_count(3);

            captures
                .expect_event()
                .with_field("title", "Pool tank event 2")
                .with_field("host", "nas01")
                .assert_exists();
        })
        .await;

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_post_accepts_any_path_and_content_type() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/intake/custom?api_key=abc", server.http_addr()))
        .header("Content-Type", "text/plain")
        .body(r#"[1, 2, 3]"#)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let (status, body) = post_event(&client, &server, "/status", r#""scalar""#.to_string()).await;
    assert_eq!(status, 200);
    assert_eq!(body["event_id"], 2);

    server
        .with_captures(|captures| {
            let events = captures.events();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].path(), "/intake/custom?api_key=abc");
            assert_eq!(events[0].payload(), &json!([1, 2, 3]));
            assert_eq!(events[1].path(), "/status");
            assert_eq!(events[1].payload(), &json!("scalar"));
        })
        .await;

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_malformed_json_is_acknowledged_but_not_stored() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    let (_, body) = post_event(&client, &server, "/api/v1/events", json!({"title": "ok"}).to_string()).await;
    assert_eq!(body["event_id"], 1);

    for malformed in ["{not json", "", "{\"title\": }"] {
        let (status, body) = post_event(&client, &server, "/api/v1/events", malformed.to_string()).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["event_id"], 1);
    }

    let status = get_status(&client, &server).await;
    assert_eq!(status["events_received"], 1);

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_non_utf8_body_is_acknowledged_but_not_stored() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/v1/events", server.http_addr()))
        .body(vec![0xff, 0xfe, 0xfd])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Response is not JSON");
    assert_eq!(body, json!({"status": "ok", "event_id": 0}));

    assert_eq!(server.snapshot().await.events_received, 0);

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_status_returns_last_ten_in_arrival_order() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    for n in 1..=12 {
        post_event(&client, &server, "/api/v1/events", json!({ "n": n }).to_string()).await;
    }
    for n in 1..=4 {
        send_datagram(&server, format!("queue.depth:{n}|g").as_bytes()).await;
    }
    server.wait_for_metrics(4, WAIT).await.expect("Metrics never arrived");

    let status = get_status(&client, &server).await;
    assert_eq!(status["events_received"], 12);
    assert_eq!(status["metrics_received"], 4);

    let events = status["events"].as_array().expect("events is an array");
    assert_eq!(events.len(), 10);
    let ns: Vec<i64> = events
        .iter()
        .map(|e| e["payload"]["n"].as_i64().expect("n is a number"))
        .collect();
    assert_eq!(ns, (3..=12).collect::<Vec<_>>());
    assert_eq!(events[0]["path"], "/api/v1/events");
    assert!(events[0]["received_at"].is_string());

    let metrics = status["metrics"].as_array().expect("metrics is an array");
    assert_eq!(metrics.len(), 4);
    for metric in metrics {
        assert_eq!(metric["source_address"], "127.0.0.1");
        assert!(metric["received_at"].is_string());
    }

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_empty_status() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    let status = get_status(&client, &server).await;
    assert_eq!(
        status,
        json!({
            "events_received": 0,
            "metrics_received": 0,
            "events": [],
            "metrics": []
        })
    );

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_unknown_get_path_returns_404_with_empty_body() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    for path in ["/", "/api/v1/events", "/status/extra"] {
        let response = client
            .get(format!("http://{}{}", server.http_addr(), path))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), 404);
        assert!(response.bytes().await.expect("Failed to read body").is_empty());
    }

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_concurrent_posts_get_distinct_ids() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for i in 0..100 {
        let client = client.clone();
        let url = format!("http://{}/api/v1/events", server.http_addr());
        tasks.push(tokio::spawn(async move {
            let response = client
                .post(url)
                .body(json!({ "title": format!("event {i}") }).to_string())
                .send()
                .await
                .expect("Failed to send request");
            let body: Value = response.json().await.expect("Response is not JSON");
            body["event_id"].as_u64().expect("event_id is a number")
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.expect("Task panicked"));
    }
    assert_eq!(ids, (1..=100).collect::<HashSet<_>>());

    let status = get_status(&client, &server).await;
    assert_eq!(status["events_received"], 100);

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_statsd_metric_is_parsed_and_captured() {
    let server = MockServer::new().start().await.expect("Failed to start server");

    send_datagram(&server, b"page.views:1|c|#env:prod,service:web").await;
    server.wait_for_metrics(1, WAIT).await.expect("Metric never arrived");

    server
        .with_captures(|captures| {
            let metric = &captures.metrics()[0];
            assert_eq!(metric.raw_line(), "page.views:1|c|#env:prod,service:web");
            assert_eq!(metric.source_address(), "127.0.0.1");

            let line = metric.parsed().expect("line should parse");
            assert_eq!(line.name, "page.views");
            assert_eq!(line.value, "1");
            assert_eq!(line.metric_type, "c");
            assert_eq!(line.tags.as_deref(), Some("env:prod,service:web"));

            captures
                .expect_metric_with_name("page.views")
                .with_value("1")
                .with_type("c")
                .with_tags(["env:prod", "service:web"])
                .assert_count(1);
        })
        .await;

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_statsd_survives_malformed_and_binary_datagrams() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    send_datagram(&server, b"garbage").await;
    server.wait_for_metrics(1, WAIT).await.expect("Raw line never arrived");

    send_datagram(&server, &[0xff, 0xfe, 0x00, 0x80]).await;
    send_datagram(&server, b"  zfs.pool.health:0|g|#pool:tank\n").await;
    server.wait_for_metrics(2, WAIT).await.expect("Listener stopped after bad input");

    server
        .with_captures(|captures| {
            assert_eq!(captures.metric_count(), 2);
            captures
                .expect_metric()
                .with_raw_line("garbage")
                .unparsed()
                .assert_count(1);
            captures
                .expect_metric_with_name("zfs.pool.health")
                .with_raw_line("zfs.pool.health:0|g|#pool:tank")
                .with_tag("pool:tank")
                .assert_exists();
        })
        .await;

    let status = get_status(&client, &server).await;
    assert_eq!(status["metrics_received"], 2);
    assert_eq!(status["metrics"][0]["raw_line"], "garbage");

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_oversized_datagram_is_truncated() {
    let server = MockServer::new().start().await.expect("Failed to start server");

    let long_line = format!("big:1|c|#{}", "t".repeat(2000));
    send_datagram(&server, long_line.as_bytes()).await;
    server.wait_for_metrics(1, WAIT).await.expect("Metric never arrived");

    server
        .with_captures(|captures| {
            let metric = &captures.metrics()[0];
            assert_eq!(metric.raw_line().len(), mock_datadog::MAX_DATAGRAM_SIZE);
            assert!(long_line.starts_with(metric.raw_line()));
        })
        .await;

    server.shutdown().await.expect("Failed to shutdown");
}

#[tokio::test]
async fn test_events_and_metrics_share_one_store() {
    let server = MockServer::new().start().await.expect("Failed to start server");
    let client = reqwest::Client::new();

    let http = {
        let client = client.clone();
        let url = format!("http://{}/api/v1/events", server.http_addr());
        tokio::spawn(async move {
            for i in 0..20 {
                client
                    .post(&url)
                    .body(json!({ "n": i }).to_string())
                    .send()
                    .await
                    .expect("Failed to send request");
            }
        })
    };

    for i in 0..20 {
        send_datagram(&server, format!("requests:{i}|c").as_bytes()).await;
    }
    http.await.expect("HTTP task panicked");

    server.wait_for_events(20, WAIT).await.expect("Events never arrived");
    server.wait_for_metrics(20, WAIT).await.expect("Metrics never arrived");

    let status = get_status(&client, &server).await;
    assert_eq!(status["events_received"], 20);
    assert_eq!(status["metrics_received"], 20);

    server.shutdown().await.expect("Failed to shutdown");
}
