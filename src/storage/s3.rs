//! S3-compatible object store adapter using the AWS SDK
//!
//! Transport metadata maps onto the native content headers and custom
//! metadata onto user metadata (`x-amz-meta-*`). One configured bucket
//! backs the whole WebDAV namespace.

use super::traits::{
    BodyStream, GetOptions, GetOutcome, ListPage, ListRequest, ObjectBody, ObjectStore,
    PutOptions, StorageError,
};
use crate::config::BackendConfig;
use crate::types::{StoredObject, TransportMetadata};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// S3 DeleteObjects accepts at most this many keys per request.
const DELETE_BATCH: usize = 1000;

/// Object store backed by a single S3 bucket
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Max concurrent HEAD requests to avoid S3 503 SlowDown throttling.
    const MAX_CONCURRENT_HEADS: usize = 50;

    /// Build an S3 client from a BackendConfig.
    pub fn build_client(config: &BackendConfig) -> Result<Client, StorageError> {
        let BackendConfig::S3 {
            endpoint,
            region,
            force_path_style,
            access_key_id,
            secret_access_key,
            ..
        } = config
        else {
            return Err(StorageError::Other(
                "S3Store requires S3 configuration".to_string(),
            ));
        };

        // Require explicit credentials, never the default AWS credential chain
        let credentials = match (access_key_id, secret_access_key) {
            (Some(key_id), Some(secret)) => {
                Credentials::new(key_id, secret, None, None, "bucketdav-config")
            }
            _ => {
                return Err(StorageError::Other(
                    "S3 backend requires explicit credentials: set BDAV_S3_ACCESS_KEY_ID and BDAV_S3_SECRET_ACCESS_KEY".to_string(),
                ));
            }
        };

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.clone()))
            .credentials_provider(credentials)
            .force_path_style(*force_path_style);

        if let Some(ep) = endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(ep);
        }

        Ok(Client::from_conf(s3_config_builder.build()))
    }

    pub fn new(config: &BackendConfig) -> Result<Self, StorageError> {
        let client = Self::build_client(config)?;
        let BackendConfig::S3 { bucket, .. } = config else {
            return Err(StorageError::Other(
                "S3Store requires S3 configuration".to_string(),
            ));
        };
        debug!("S3Store initialized for bucket {}", bucket);
        Ok(Self {
            client,
            bucket: bucket.clone(),
        })
    }

    fn classify_s3_error(e: &SdkError<impl std::fmt::Debug>, context: &str) -> StorageError {
        StorageError::S3(format!("{} failed: {:?}", context, e))
    }

    /// HTTP status of a service error, if the request reached the service.
    fn service_status<E>(e: &SdkError<E>) -> Option<u16> {
        match e {
            SdkError::ServiceError(svc) => Some(svc.raw().status().as_u16()),
            _ => None,
        }
    }

    /// Fire bounded parallel HEAD calls, returning records in the order of `keys`.
    ///
    /// Uses `buffer_unordered(MAX_CONCURRENT_HEADS)` instead of `join_all()`
    /// to avoid triggering 503 SlowDown throttling on large pages.
    async fn bounded_head_calls(&self, keys: Vec<String>) -> Result<Vec<StoredObject>, StorageError> {
        let head_futs: Vec<_> = keys
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, key)| async move { (idx, self.head(&key).await) })
            .collect();
        let mut results: Vec<(usize, Result<Option<StoredObject>, StorageError>)> =
            futures::stream::iter(head_futs)
                .buffer_unordered(Self::MAX_CONCURRENT_HEADS)
                .collect()
                .await;
        results.sort_by_key(|(idx, _)| *idx);

        let mut objects = Vec::with_capacity(results.len());
        for (_, result) in results {
            // A key deleted between LIST and HEAD is simply skipped
            if let Some(obj) = result? {
                objects.push(obj);
            }
        }
        Ok(objects)
    }
}

fn to_chrono(ts: Option<&S3DateTime>) -> DateTime<Utc> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

fn to_s3_date(value: &str) -> Option<S3DateTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| S3DateTime::from_secs(d.timestamp()))
}

/// Total object size from a `Content-Range: bytes a-b/size` header.
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// Inclusive bounds from a `Content-Range: bytes a-b/size` header.
fn bounds_from_content_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes ")?;
    let (bounds, _) = spec.split_once('/')?;
    let (start, end) = bounds.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn record(
    key: &str,
    size: u64,
    etag: Option<&str>,
    last_modified: Option<&S3DateTime>,
    transport: TransportMetadata,
    metadata: Option<&HashMap<String, String>>,
) -> StoredObject {
    StoredObject {
        key: key.to_string(),
        size,
        etag: etag.unwrap_or_default().trim_matches('"').to_string(),
        uploaded: to_chrono(last_modified),
        transport,
        custom: metadata.cloned().unwrap_or_default(),
    }
}

/// Stream chunks directly from the S3 response body without buffering.
fn body_stream(body: ByteStream) -> BodyStream {
    futures::stream::unfold(body, |mut body| async move {
        match body.try_next().await {
            Ok(Some(chunk)) => Some((Ok(chunk), body)),
            Ok(None) => None,
            Err(e) => Some((
                Err(StorageError::S3(format!(
                    "Failed to read response body: {}",
                    e
                ))),
                body,
            )),
        }
    })
    .boxed()
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let response = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(SdkError::ServiceError(svc)) if matches!(svc.err(), HeadObjectError::NotFound(_)) => {
                return Ok(None)
            }
            Err(e) => return Err(Self::classify_s3_error(&e, "head_object")),
        };

        let transport = TransportMetadata {
            content_type: response.content_type().map(str::to_string),
            content_disposition: response.content_disposition().map(str::to_string),
            content_encoding: response.content_encoding().map(str::to_string),
            content_language: response.content_language().map(str::to_string),
            cache_control: response.cache_control().map(str::to_string),
        };
        Ok(Some(record(
            key,
            response.content_length().unwrap_or(0).max(0) as u64,
            response.e_tag(),
            response.last_modified(),
            transport,
            response.metadata(),
        )))
    }

    #[instrument(skip(self, opts))]
    async fn get(&self, key: &str, opts: GetOptions) -> Result<GetOutcome, StorageError> {
        let cond = &opts.conditional;
        let mut range = opts.range;

        // S3 has no If-Range; decide against the current record instead
        if let (Some(_), Some(if_range)) = (range, cond.if_range.as_deref()) {
            let Some(current) = self.head(key).await? else {
                return Ok(GetOutcome::NotFound);
            };
            let probe = crate::types::Conditional {
                if_range: Some(if_range.to_string()),
                ..Default::default()
            };
            if super::conditional::applied_range(range, &probe, &current)?.is_none() {
                range = None;
            }
        }

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range.map(|r| r.to_header()))
            .set_if_match(cond.if_match.clone())
            .set_if_none_match(cond.if_none_match.clone())
            .set_if_modified_since(cond.if_modified_since.as_deref().and_then(to_s3_date))
            .set_if_unmodified_since(cond.if_unmodified_since.as_deref().and_then(to_s3_date));

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return match Self::service_status(&e) {
                    Some(404) => Ok(GetOutcome::NotFound),
                    Some(304) | Some(412) => match self.head(key).await? {
                        Some(obj) => Ok(GetOutcome::PreconditionFailed(obj)),
                        None => Ok(GetOutcome::NotFound),
                    },
                    Some(416) => {
                        let size = self.head(key).await?.map(|o| o.size).unwrap_or(0);
                        Err(StorageError::InvalidRange { size })
                    }
                    _ => Err(Self::classify_s3_error(&e, "get_object")),
                }
            }
        };

        let content_range = response.content_range().map(str::to_string);
        let length = response.content_length().unwrap_or(0).max(0) as u64;
        let size = content_range
            .as_deref()
            .and_then(total_from_content_range)
            .unwrap_or(length);
        let applied = content_range.as_deref().and_then(bounds_from_content_range);

        let transport = TransportMetadata {
            content_type: response.content_type().map(str::to_string),
            content_disposition: response.content_disposition().map(str::to_string),
            content_encoding: response.content_encoding().map(str::to_string),
            content_language: response.content_language().map(str::to_string),
            cache_control: response.cache_control().map(str::to_string),
        };
        let object = record(
            key,
            size,
            response.e_tag(),
            response.last_modified(),
            transport,
            response.metadata(),
        );
        debug!("S3 GET {}/{} (range {:?})", self.bucket, key, applied);
        Ok(GetOutcome::Found(ObjectBody {
            object,
            range: applied,
            body: body_stream(response.body),
        }))
    }

    #[instrument(skip(self, body, opts), fields(size = body.len()))]
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        opts: PutOptions,
    ) -> Result<StoredObject, StorageError> {
        let size = body.len() as u64;
        let transport = opts.transport;
        let response = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(transport.content_type.clone())
            .set_content_disposition(transport.content_disposition.clone())
            .set_content_encoding(transport.content_encoding.clone())
            .set_content_language(transport.content_language.clone())
            .set_cache_control(transport.cache_control.clone())
            .set_metadata(Some(opts.custom.clone()))
            .set_if_match(opts.conditional.if_match.clone())
            .set_if_none_match(opts.conditional.if_none_match.clone())
            .send()
            .await
            .map_err(|e| match Self::service_status(&e) {
                Some(412) => StorageError::PreconditionFailed(key.to_string()),
                _ => Self::classify_s3_error(&e, "put_object"),
            })?;

        debug!("S3 PUT {}/{} ({} bytes)", self.bucket, key, size);
        Ok(StoredObject {
            key: key.to_string(),
            size,
            etag: response
                .e_tag()
                .unwrap_or_default()
                .trim_matches('"')
                .to_string(),
            uploaded: Utc::now(),
            transport,
            custom: opts.custom,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::classify_s3_error(&e, "delete_object"))?;
        debug!("S3 DELETE {}/{}", self.bucket, key);
        Ok(())
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn delete_many(&self, keys: &[String]) -> Result<(), StorageError> {
        for chunk in keys.chunks(DELETE_BATCH) {
            let ids = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::S3(format!("invalid delete key: {}", e)))?;
            let delete = Delete::builder()
                .set_objects(Some(ids))
                .quiet(true)
                .build()
                .map_err(|e| StorageError::S3(format!("invalid delete request: {}", e)))?;
            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Self::classify_s3_error(&e, "delete_objects"))?;
            if let Some(err) = response.errors().first() {
                warn!(
                    "S3 batch delete reported {} failures, first: {:?}",
                    response.errors().len(),
                    err
                );
                return Err(StorageError::S3(format!(
                    "delete_objects failed for {}",
                    err.key().unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, req: ListRequest) -> Result<ListPage, StorageError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&req.prefix)
            .set_delimiter(req.delimiter.clone())
            .set_continuation_token(req.cursor.clone())
            .set_max_keys(req.limit.map(|l| l.min(i32::MAX as usize) as i32))
            .send()
            .await
            .map_err(|e| Self::classify_s3_error(&e, "list_objects_v2"))?;

        // Keys ending in "/" are folder placeholders from other S3 tools
        let keys: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|o| o.key())
            .filter(|k| !k.ends_with('/'))
            .map(str::to_string)
            .collect();

        let objects = self.bounded_head_calls(keys).await?;
        let truncated = response.is_truncated().unwrap_or(false);
        Ok(ListPage {
            objects,
            cursor: response.next_continuation_token().map(str::to_string),
            truncated,
        })
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_parsing() {
        assert_eq!(total_from_content_range("bytes 5-14/100"), Some(100));
        assert_eq!(bounds_from_content_range("bytes 5-14/100"), Some((5, 14)));
        assert_eq!(bounds_from_content_range("bytes */100"), None);
    }

    #[test]
    fn test_http_date_to_s3() {
        let ts = to_s3_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(ts.secs(), 784111777);
    }

    #[test]
    fn test_requires_credentials() {
        let config = BackendConfig::S3 {
            bucket: "dav".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            region: "us-east-1".to_string(),
            force_path_style: true,
            access_key_id: None,
            secret_access_key: None,
        };
        assert!(S3Store::new(&config).is_err());
    }
}
