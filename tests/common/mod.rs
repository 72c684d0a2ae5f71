//! Shared test infrastructure for integration tests
//!
//! Provides TestServer (memory, filesystem and S3 backends), WebDAV request
//! helpers, and MinIO availability gating.

#![allow(dead_code)]

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use reqwest::{Method, RequestBuilder, StatusCode};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Port counter to avoid conflicts between tests.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19400);

/// MinIO configuration constants
pub const MINIO_ENDPOINT: &str = "http://localhost:9000";
pub const MINIO_BUCKET: &str = "bucketdav-test";
pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";

/// Listing page size for memory-backed servers. Small enough that every
/// multi-entry listing crosses cursor boundaries.
pub const TINY_PAGE_SIZE: usize = 2;

/// Test server wrapper that spawns a real bucketdav binary
pub struct TestServer {
    process: Child,
    port: u16,
    _dir: TempDir,
    client: reqwest::Client,
}

impl TestServer {
    // ── Factory methods ──

    /// Memory backend with a tiny listing page size
    pub async fn memory() -> Self {
        Self::memory_with("").await
    }

    /// Memory backend with extra top-level TOML settings
    pub async fn memory_with(settings: &str) -> Self {
        let config = format!(
            "{}\n[backend]\ntype = \"memory\"\npage_size = {}\n",
            settings, TINY_PAGE_SIZE
        );
        Self::spawn_with_config(&config, None).await
    }

    /// Memory backend requiring Basic auth
    pub async fn with_auth(username: &str, password: &str) -> Self {
        Self::memory_with(&format!(
            "username = \"{}\"\npassword = \"{}\"\n",
            username, password
        ))
        .await
    }

    /// Filesystem backend rooted in a temp dir
    pub async fn filesystem() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = format!(
            "[backend]\ntype = \"filesystem\"\npath = \"{}\"\n",
            dir.path().join("data").display()
        );
        Self::spawn_with_config(&config, Some(dir)).await
    }

    /// S3 backend (needs MinIO running)
    pub async fn s3() -> Self {
        let config = format!(
            concat!(
                "[backend]\n",
                "type = \"s3\"\n",
                "bucket = \"{}\"\n",
                "endpoint = \"{}\"\n",
                "region = \"us-east-1\"\n",
                "force_path_style = true\n",
                "access_key_id = \"{}\"\n",
                "secret_access_key = \"{}\"\n",
            ),
            MINIO_BUCKET, MINIO_ENDPOINT, MINIO_ACCESS_KEY, MINIO_SECRET_KEY,
        );
        Self::spawn_with_config(&config, None).await
    }

    // ── Shared spawn logic ──

    /// Allocate a port, write a TOML config, spawn the server and wait for
    /// readiness. All factory methods delegate here.
    async fn spawn_with_config(config_body: &str, dir: Option<TempDir>) -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = match dir {
            Some(d) => d,
            None => TempDir::new().expect("Failed to create temp dir"),
        };

        let full_config = format!("listen_addr = \"127.0.0.1:{}\"\n{}", port, config_body);
        let config_path = dir.path().join("test.toml");
        std::fs::write(&config_path, &full_config).expect("Failed to write test config");

        let process = Command::new(env!("CARGO_BIN_EXE_bucketdav"))
            .env("BDAV_CONFIG", &config_path)
            .env("RUST_LOG", "bucketdav=warn")
            .spawn()
            .expect("Failed to start server");

        let mut server = Self {
            process,
            port,
            _dir: dir,
            client: reqwest::Client::new(),
        };
        server.wait_ready().await;
        server
    }

    // ── Instance methods ──

    async fn wait_ready(&mut self) {
        let addr = format!("127.0.0.1:{}", self.port);
        for _ in 0..150 {
            if std::net::TcpStream::connect(&addr).is_ok() {
                sleep(Duration::from_millis(100)).await;
                return;
            }

            if let Ok(Some(status)) = self.process.try_wait() {
                panic!("Server exited before becoming ready: {}", status);
            }

            sleep(Duration::from_millis(100)).await;
        }

        let _ = self.process.kill();
        panic!("Timed out waiting for server on {}", addr);
    }

    /// Get the HTTP endpoint URL
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Absolute URL for a request path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint(), path)
    }

    /// Request builder for any method, including WebDAV extension verbs
    pub fn request(&self, method: &str, path: &str) -> RequestBuilder {
        let method = Method::from_bytes(method.as_bytes()).expect("valid method");
        self.client.request(method, self.url(path))
    }

    /// PUT a body and assert 201
    pub async fn put(&self, path: &str, body: impl Into<reqwest::Body>) {
        let resp = self
            .request("PUT", path)
            .body(body)
            .send()
            .await
            .expect("PUT failed");
        assert_eq!(resp.status(), StatusCode::CREATED, "PUT {}", path);
    }

    /// MKCOL and assert 201
    pub async fn mkcol(&self, path: &str) {
        let resp = self.request("MKCOL", path).send().await.expect("MKCOL failed");
        assert_eq!(resp.status(), StatusCode::CREATED, "MKCOL {}", path);
    }

    /// GET a path and return status and body
    pub async fn get(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let resp = self.request("GET", path).send().await.expect("GET failed");
        let status = resp.status();
        (status, resp.bytes().await.unwrap().to_vec())
    }

    /// Status of a GET without reading the body further
    pub async fn status_of(&self, path: &str) -> StatusCode {
        self.get(path).await.0
    }

    /// PROPFIND with the given Depth, returning status and XML body
    pub async fn propfind(&self, path: &str, depth: &str) -> (StatusCode, String) {
        let resp = self
            .request("PROPFIND", path)
            .header("Depth", depth)
            .send()
            .await
            .expect("PROPFIND failed");
        let status = resp.status();
        (status, resp.text().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

/// `<href>` values of a multistatus body, in document order
pub fn hrefs(xml: &str) -> Vec<String> {
    xml.split("<href>")
        .skip(1)
        .filter_map(|rest| rest.split("</href>").next())
        .map(str::to_string)
        .collect()
}

// === MinIO gating ===

/// Create an S3 client pointing directly at MinIO
pub async fn minio_client() -> Client {
    let credentials = Credentials::new(MINIO_ACCESS_KEY, MINIO_SECRET_KEY, None, None, "test");
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(MINIO_ENDPOINT)
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();
    Client::from_conf(config)
}

/// Check if MinIO is available (TCP probe + HeadBucket with 2s timeout)
pub async fn minio_available() -> bool {
    if std::net::TcpStream::connect("localhost:9000").is_err() {
        return false;
    }

    let client = minio_client().await;

    // Verify the specific test bucket exists (not just any S3-compatible service)
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        client.head_bucket().bucket(MINIO_BUCKET).send(),
    )
    .await;
    matches!(result, Ok(Ok(_)))
}

/// Macro to skip a test if MinIO is not available.
/// Use at the start of any test that requires MinIO.
#[macro_export]
macro_rules! skip_unless_minio {
    () => {
        if !common::minio_available().await {
            eprintln!("MinIO not available, skipping test");
            return;
        }
    };
}
