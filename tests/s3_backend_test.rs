//! WebDAV over the S3 adapter. Needs MinIO on localhost:9000 with the
//! `bucketdav-test` bucket; skipped otherwise.

mod common;

use common::{hrefs, TestServer};
use reqwest::StatusCode;

/// Unique top-level collection so runs do not see each other's keys.
fn scratch_dir() -> String {
    format!("/run-{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_s3_webdav_flow() {
    skip_unless_minio!();
    let server = TestServer::s3().await;
    let dir = scratch_dir();

    server.mkcol(&dir).await;
    server
        .put(&format!("{}/data.bin", dir), (0u8..100).collect::<Vec<_>>())
        .await;

    let resp = server
        .request("GET", &format!("{}/data.bin", dir))
        .header("range", "bytes=5-14")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()["content-range"], "bytes 5-14/100");
    assert_eq!(resp.bytes().await.unwrap().to_vec(), (5u8..15).collect::<Vec<_>>());

    let (_, xml) = server.propfind(&dir, "1").await;
    assert_eq!(
        hrefs(&xml),
        vec![format!("{}/", dir), format!("{}/data.bin", dir)]
    );

    let resp = server.request("DELETE", &dir).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        server.status_of(&format!("{}/data.bin", dir)).await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_s3_copy_keeps_collection_marker() {
    skip_unless_minio!();
    let server = TestServer::s3().await;
    let dir = scratch_dir();
    let copy = scratch_dir();

    server.mkcol(&dir).await;
    server.put(&format!("{}/note.txt", dir), "hello").await;

    let resp = server
        .request("COPY", &dir)
        .header("Destination", server.url(&copy))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(server.get(&format!("{}/note.txt", copy)).await.1, b"hello");

    let (_, xml) = server.propfind(&copy, "0").await;
    assert!(xml.contains("<resourcetype><collection /></resourcetype>"));

    for path in [&dir, &copy] {
        server.request("DELETE", path).send().await.unwrap();
    }
}
