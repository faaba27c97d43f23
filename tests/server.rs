//! End-to-end tests against a bound server.

use std::time::Duration;

use webid_server::config::ServerConfig;

mod common;
use common::*;

#[tokio::test]
async fn serves_profile_over_tcp() {
    let server = start_server(test_config()).await;
    let client = client();

    let res = client.get(server.url("/")).send().await.expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["@id"], "http://example.org/profile#me");

    let res = client.post(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 405);

    server.stop().await;
}

#[tokio::test]
async fn concurrent_reads_and_writes() {
    let server = start_server(test_config()).await;
    let client = client();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let url = server.url("/profile");
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                client
                    .put(&url)
                    .bearer_auth(TOKEN)
                    .header("content-type", "application/json")
                    .body(profile_named(&format!("writer-{}", i)).to_string())
                    .send()
                    .await
                    .unwrap()
                    .status()
            } else {
                client.get(&url).send().await.unwrap().status()
            }
        }));
    }

    for task in tasks {
        let status = task.await.unwrap();
        assert!(status.is_success(), "unexpected status {}", status);
    }

    let body: serde_json::Value = client
        .get(server.url("/profile"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let name = body["primaryTopic"]["name"].as_str().unwrap();
    assert!(name.starts_with("writer-"));

    server.stop().await;
}

#[tokio::test]
async fn profile_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.profile.storage_path = Some(dir.path().join("profile.json"));

    let server = start_server(config.clone()).await;
    let res = client()
        .put(server.url("/profile"))
        .bearer_auth(TOKEN)
        .header("content-type", "application/ld+json")
        .body(profile_named("Durable").to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
    server.stop().await;

    let server = start_server(config).await;
    let body: serde_json::Value = client()
        .get(server.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["primaryTopic"]["name"], "Durable");
    server.stop().await;
}

#[tokio::test]
async fn config_update_rotates_tokens() {
    let server = start_server(test_config()).await;
    let client = client();

    let put = |token: &'static str| {
        client
            .put(server.url("/profile"))
            .bearer_auth(token)
            .header("content-type", "application/json")
            .body(profile_named("Rotated").to_string())
            .send()
    };

    assert_eq!(put("rotated-token").await.unwrap().status(), 401);

    let mut updated = test_config();
    updated.auth.bearer_tokens = vec!["rotated-token".into()];
    server.config_tx.send(updated).unwrap();

    let mut status = 401;
    for _ in 0..50 {
        status = put("rotated-token").await.unwrap().status().as_u16();
        if status != 401 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, 204);
    assert_eq!(put(TOKEN).await.unwrap().status(), 401);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let server = start_server(ServerConfig {
        listener: test_config().listener,
        ..ServerConfig::default()
    })
    .await;
    let url = server.url("/health");
    assert_eq!(client().get(&url).send().await.unwrap().status(), 200);

    server.stop().await;
    assert!(client().get(&url).send().await.is_err());
}
