//! S3 driver built on aws-sdk-s3. Each store owns an explicitly configured
//! client; nothing is read from or written to process-wide SDK state except
//! the default credential chain when no static keys are configured.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::storage::{ObjectStream, ObjectStore, PutOptions};

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region().to_string()));
        if let Some((access_key_id, secret_access_key)) = config.credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "s3-image-store",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style());
        if let Some(endpoint) = config.endpoint() {
            builder = builder.endpoint_url(endpoint);
        }

        Self::from_client(Client::from_conf(builder.build()), config.bucket())
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn map_sdk_error<E>(key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match err.raw_response().map(|response| response.status().as_u16()) {
        Some(404) => StoreError::NotFound(key.to_string()),
        // 412: `If-None-Match` failed; 409: a concurrent conditional write won.
        Some(412) | Some(409) => StoreError::AlreadyExists(key.to_string()),
        _ => StoreError::backend(key, err),
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(name, value);
    }
}

fn response_headers(output: &GetObjectOutput) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, header::CONTENT_TYPE, output.content_type());
    insert_header(&mut headers, header::CACHE_CONTROL, output.cache_control());
    insert_header(&mut headers, header::CONTENT_ENCODING, output.content_encoding());
    insert_header(&mut headers, header::CONTENT_DISPOSITION, output.content_disposition());
    insert_header(&mut headers, header::ETAG, output.e_tag());
    insert_header(&mut headers, header::ACCEPT_RANGES, output.accept_ranges());
    if let Some(length) = output.content_length().filter(|len| *len >= 0) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    if let Some(modified) = output
        .last_modified()
        .and_then(|ts| ts.fmt(aws_sdk_s3::primitives::DateTimeFormat::HttpDate).ok())
    {
        insert_header(&mut headers, header::LAST_MODIFIED, Some(&modified));
    }
    headers
}

#[async_trait::async_trait]
impl ObjectStore for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(options.content_type.clone())
            .set_cache_control(options.cache_control.clone());
        if options.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }
        if options.if_absent {
            request = request.if_none_match("*");
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|err| map_sdk_error(key, err))
    }

    async fn head_object(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| map_sdk_error(key, err))
    }

    async fn get_object(&self, key: &str) -> Result<ObjectStream, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(key, err))?;

        let headers = response_headers(&output);
        let body = ReaderStream::new(output.body.into_async_read())
            .map_err(StoreError::from)
            .boxed();
        Ok(ObjectStream { headers, body })
    }

    /// S3 acknowledges deletes of missing keys, so existence is checked
    /// first to report [`StoreError::NotFound`] like the other drivers.
    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.head_object(key).await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| map_sdk_error(key, err))
    }
}
