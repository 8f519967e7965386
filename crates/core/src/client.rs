//! Bucket client implementation using AWS S3 SDK

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::scanner::LocalEntry;
use crate::store::{ObjectStore, RemoteEntry, DEFAULT_MAX_DELETE_BATCH};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
    Client,
};
use std::future::Future;
use tracing::{debug, instrument};

/// S3-compatible client bound to one bucket
pub struct BucketClient {
    client: Client,
    bucket: String,
}

impl BucketClient {
    /// Create a new client from resolved storage settings
    pub fn new(storage: &StorageConfig) -> Self {
        // Create credentials
        let credentials = Credentials::new(
            &storage.credential_id,
            &storage.credential_secret,
            None,
            None,
            "sitepush",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(storage.path_style);

        if let Some(endpoint) = &storage.endpoint {
            config_builder = config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(config_builder.build());

        Self {
            client,
            bucket: storage.bucket_name(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for BucketClient {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        let entries = collect_pages(|continuation_token| {
            let request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token);

            async move {
                let response = request.send().await.map_err(remote_list_error)?;
                let next_token = response.next_continuation_token().map(str::to_string);
                Ok(ListPage {
                    entries: response
                        .contents()
                        .iter()
                        .filter_map(|obj| {
                            obj.key()
                                .map(|key| RemoteEntry::new(key, obj.e_tag().unwrap_or_default()))
                        })
                        .collect(),
                    truncated: response.is_truncated().unwrap_or(next_token.is_some()),
                    next_token,
                })
            }
        })
        .await?;

        debug!(objects = entries.len(), "Remote listing complete");
        Ok(entries)
    }

    async fn put(&self, entry: &LocalEntry) -> Result<()> {
        let body = ByteStream::from_path(&entry.absolute_path)
            .await
            .map_err(|e| {
                Error::Transfer(format!("cannot read {}: {e}", entry.absolute_path.display()))
            })?;

        // Detect content type
        let content_type = mime_guess::from_path(&entry.absolute_path)
            .first_or_octet_stream()
            .to_string();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&entry.key)
            .content_length(entry.size as i64)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(transfer_error)?;

        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(transfer_error)?;

        // Quiet mode only reports the keys that could not be deleted
        let failures: Vec<(String, String)> = response
            .errors()
            .iter()
            .map(|e| {
                let message = e.message().or(e.code()).unwrap_or("unknown error");
                (e.key().unwrap_or_default().to_string(), message.to_string())
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::PartialDelete(failures))
        }
    }

    fn max_delete_batch(&self) -> usize {
        DEFAULT_MAX_DELETE_BATCH
    }
}

/// One page of a bucket listing
struct ListPage {
    entries: Vec<RemoteEntry>,
    truncated: bool,
    next_token: Option<String>,
}

/// Follow continuation tokens until the listing is complete.
///
/// A truncated page without a continuation token fails the whole listing
/// instead of yielding a partial snapshot.
async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<RemoteEntry>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage>>,
{
    let mut entries = Vec::new();
    let mut continuation_token = None;

    loop {
        let page = fetch(continuation_token.take()).await?;
        entries.extend(page.entries);

        if !page.truncated {
            return Ok(entries);
        }

        match page.next_token {
            Some(token) => {
                debug!(listed = entries.len(), "Listing truncated, fetching next page");
                continuation_token = Some(token);
            }
            None => {
                return Err(Error::RemoteList {
                    status: None,
                    message: format!(
                        "listing truncated after {} object(s) without a continuation token",
                        entries.len()
                    ),
                })
            }
        }
    }
}

fn remote_list_error<E>(err: SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::RemoteList {
        status: err.raw_response().map(|response| response.status().as_u16()),
        message: DisplayErrorContext(&err).to_string(),
    }
}

fn transfer_error<E>(err: SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Transfer(DisplayErrorContext(&err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StorageConfig {
        StorageConfig {
            credential_id: "AKIDEXAMPLE".to_string(),
            credential_secret: "secret".to_string(),
            bucket: "blog".to_string(),
            region: "ap-guangzhou".to_string(),
            app_id: Some("1250000000".to_string()),
            endpoint: Some("https://cos.ap-guangzhou.myqcloud.com".to_string()),
            path_style: false,
        }
    }

    #[test]
    fn test_client_addresses_full_bucket_name() {
        let client = BucketClient::new(&storage());
        assert_eq!(client.bucket(), "blog-1250000000");
        assert_eq!(client.max_delete_batch(), 1000);
    }

    fn page(keys: &[&str], next_token: Option<&str>) -> ListPage {
        ListPage {
            entries: keys.iter().map(|key| RemoteEntry::new(*key, "\"h\"")).collect(),
            truncated: next_token.is_some(),
            next_token: next_token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_collect_pages_follows_tokens() {
        let mut pages = vec![
            page(&["a.html"], Some("t1")),
            page(&["b.html", "c.html"], Some("t2")),
            page(&["d.html"], None),
        ]
        .into_iter();
        let mut tokens = Vec::new();

        let entries = collect_pages(|token| {
            tokens.push(token);
            let next = pages.next();
            async move { next.ok_or_else(|| Error::Other("no more pages".to_string())) }
        })
        .await
        .unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a.html", "b.html", "c.html", "d.html"]);
        assert_eq!(
            tokens,
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_truncated_page_without_token_fails() {
        let mut fetched = 0;
        let result = collect_pages(|_| {
            fetched += 1;
            async {
                Ok(ListPage {
                    entries: vec![RemoteEntry::new("a.html", "\"h\"")],
                    truncated: true,
                    next_token: None,
                })
            }
        })
        .await;

        assert!(matches!(result, Err(Error::RemoteList { status: None, .. })));
        assert_eq!(fetched, 1);
    }

    #[tokio::test]
    async fn test_empty_bucket_lists_nothing() {
        let entries = collect_pages(|_| async { Ok(page(&[], None)) }).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_upload_is_transfer_failure() {
        let dir = tempfile::tempdir().unwrap();
        let client = BucketClient::new(&storage());
        let entry = LocalEntry {
            key: "gone.html".to_string(),
            absolute_path: dir.path().join("gone.html"),
            size: 0,
        };

        let err = client.put(&entry).await.unwrap_err();
        assert!(matches!(err, Error::Transfer(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_delete_batch_is_noop() {
        let client = BucketClient::new(&storage());
        assert!(client.delete_batch(&[]).await.is_ok());
    }
}
