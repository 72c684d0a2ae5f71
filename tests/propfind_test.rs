//! PROPFIND, PROPPATCH, LOCK and UNLOCK over HTTP

mod common;

use common::{hrefs, TestServer};
use reqwest::StatusCode;

async fn tree(server: &TestServer) {
    server.mkcol("/music").await;
    for name in ["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"] {
        server.put(&format!("/music/{}", name), "tune").await;
    }
    server.mkcol("/music/live").await;
    server.put("/music/live/encore.mp3", "tune").await;
}

#[tokio::test]
async fn test_propfind_root_depth_zero() {
    let server = TestServer::memory().await;
    tree(&server).await;

    let (status, xml) = server.propfind("/", "0").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(hrefs(&xml), vec!["/"]);
    assert!(xml.contains("<resourcetype><collection /></resourcetype>"));
    assert!(xml.contains("<getcontenttype>httpd/unix-directory</getcontenttype>"));
    assert!(xml.contains("<quota>0</quota>"));
}

#[tokio::test]
async fn test_propfind_depth_one_lists_direct_children() {
    let server = TestServer::memory().await;
    tree(&server).await;

    let (status, xml) = server.propfind("/music/", "1").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(
        hrefs(&xml),
        vec![
            "/music/",
            "/music/a.mp3",
            "/music/b.mp3",
            "/music/c.mp3",
            "/music/d.mp3",
            "/music/e.mp3",
            "/music/live/",
        ]
    );
}

#[tokio::test]
async fn test_propfind_depth_infinity_lists_everything() {
    let server = TestServer::memory().await;
    tree(&server).await;

    let (_, xml) = server.propfind("/music", "infinity").await;
    let listed = hrefs(&xml);
    assert_eq!(listed.len(), 8);
    assert!(listed.contains(&"/music/live/encore.mp3".to_string()));

    // Absent Depth means infinity
    let resp = server.request("PROPFIND", "/music").send().await.unwrap();
    let xml = resp.text().await.unwrap();
    assert_eq!(hrefs(&xml).len(), 8);
}

#[tokio::test]
async fn test_propfind_file_properties() {
    let server = TestServer::memory().await;
    server
        .request("PUT", "/readme.md")
        .header("content-type", "text/markdown")
        .body("# hi")
        .send()
        .await
        .unwrap();

    let (status, xml) = server.propfind("/readme.md", "0").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(xml.contains("<displayname>readme.md</displayname>"));
    assert!(xml.contains("<getcontentlength>4</getcontentlength>"));
    assert!(xml.contains("<getcontenttype>text/markdown</getcontenttype>"));
    assert!(xml.contains("<resourcetype></resourcetype>"));
    assert!(xml.contains("<supportedlock><lockentry>"));
    assert!(!xml.contains("<quota>"));
}

#[tokio::test]
async fn test_propfind_errors() {
    let server = TestServer::memory().await;
    tree(&server).await;

    let (status, _) = server.propfind("/nothing-here", "0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.propfind("/music", "2").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_propfind_placeholder_is_synthetic() {
    let server = TestServer::memory().await;
    let (status, xml) = server.propfind("/._Icon", "0").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(hrefs(&xml), vec!["/._Icon"]);
    assert!(xml.contains("<getcontentlength>0</getcontentlength>"));
}

const PATCH_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:schemas-microsoft-com:">
  <D:set><D:prop><Z:Win32FileAttributes>00000020</Z:Win32FileAttributes></D:prop></D:set>
  <D:remove><D:prop><Z:Win32LastAccessTime/></D:prop></D:remove>
</D:propertyupdate>"#;

#[tokio::test]
async fn test_proppatch_acknowledges_each_property() {
    let server = TestServer::memory().await;
    server.put("/doc.txt", "content").await;

    let resp = server
        .request("PROPPATCH", "/doc.txt")
        .body(PATCH_BODY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let xml = resp.text().await.unwrap();
    assert_eq!(hrefs(&xml), vec!["/doc.txt", "/doc.txt"]);
    assert!(xml.contains("<win32fileattributes />"));
    assert!(xml.contains("<win32lastaccesstime />"));

    // Body and transport metadata survive the rewrite
    let (status, body) = server.get("/doc.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"content");
}

#[tokio::test]
async fn test_proppatch_keeps_collection_marker() {
    let server = TestServer::memory().await;
    server.mkcol("/dir").await;

    let resp = server
        .request("PROPPATCH", "/dir/")
        .body(PATCH_BODY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    assert_eq!(hrefs(&resp.text().await.unwrap())[0], "/dir/");

    let (_, xml) = server.propfind("/dir", "0").await;
    assert!(xml.contains("<resourcetype><collection /></resourcetype>"));
}

#[tokio::test]
async fn test_proppatch_errors() {
    let server = TestServer::memory().await;
    server.put("/doc.txt", "content").await;

    let resp = server
        .request("PROPPATCH", "/doc.txt")
        .body("<propertyupdate><set>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .request("PROPPATCH", "/missing.txt")
        .body(PATCH_BODY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server
        .request("PROPPATCH", "/._doc.txt")
        .body(PATCH_BODY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
}

const LOCK_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:lockinfo xmlns:D="DAV:">
  <D:lockscope><D:exclusive/></D:lockscope>
  <D:locktype><D:write/></D:locktype>
  <D:owner><D:href>mailto:ana@example.com</D:href></D:owner>
</D:lockinfo>"#;

#[tokio::test]
async fn test_lock_issues_token() {
    let server = TestServer::memory().await;
    server.put("/doc.txt", "content").await;

    let resp = server
        .request("LOCK", "/doc.txt")
        .body(LOCK_BODY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token = resp.headers()["lock-token"].to_str().unwrap().to_string();
    assert!(token.starts_with("<urn:uuid:") && token.ends_with('>'));
    let xml = resp.text().await.unwrap();
    assert!(xml.contains(&token[1..token.len() - 1]));
    assert!(xml.contains("<D:owner><D:href>mailto:ana@example.com</D:href></D:owner>"));
    assert!(xml.contains("<D:timeout>Second-3600</D:timeout>"));

    // Every LOCK gets a fresh token
    let again = server.request("LOCK", "/doc.txt").send().await.unwrap();
    assert_ne!(again.headers()["lock-token"].to_str().unwrap(), token);
}

#[tokio::test]
async fn test_lock_status_follows_parent() {
    let server = TestServer::memory().await;
    server.mkcol("/dir").await;

    let resp = server.request("LOCK", "/dir/new.txt").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server.request("LOCK", "/missing/new.txt").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server.request("UNLOCK", "/dir/new.txt").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
