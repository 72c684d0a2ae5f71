//! Basic authentication in front of every WebDAV method

mod common;

use common::TestServer;
use reqwest::StatusCode;

#[tokio::test]
async fn test_requests_without_credentials_are_rejected() {
    let server = TestServer::with_auth("alice", "s3cret").await;

    let resp = server.request("PROPFIND", "/").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["www-authenticate"], "Basic realm=\"webdav\"");

    let resp = server
        .request("GET", "/")
        .basic_auth("alice", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_credentials_pass() {
    let server = TestServer::with_auth("alice", "s3cret").await;

    let resp = server
        .request("PUT", "/private.txt")
        .basic_auth("alice", Some("s3cret"))
        .body("mine")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server
        .request("GET", "/private.txt")
        .basic_auth("alice", Some("s3cret"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "mine");
}

#[tokio::test]
async fn test_options_needs_no_credentials() {
    let server = TestServer::with_auth("alice", "s3cret").await;
    let resp = server.request("OPTIONS", "/").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["dav"], "1, 2, 3");
}

#[tokio::test]
async fn test_open_server_needs_no_credentials() {
    let server = TestServer::memory().await;
    let (status, _) = server.propfind("/", "0").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
}
