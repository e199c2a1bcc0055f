use tracing::debug;

use super::BlobStore;
use crate::auth::Session;
use crate::config::GoogleConfig;
use crate::error::Result;
use crate::http::{self, RetryPolicy};

/// Cloud Storage JSON API client for one bucket.
pub struct GcsBucket {
    agent: ureq::Agent,
    endpoint: String,
    bucket: String,
    session: Session,
    retry: RetryPolicy,
}

impl GcsBucket {
    pub fn new(config: &GoogleConfig, bucket: &str, session: Session, retry: RetryPolicy) -> Self {
        Self {
            agent: http::agent(config.request_timeout()),
            endpoint: config.storage_endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            session,
            retry,
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(name)
        )
    }
}

impl BlobStore for GcsBucket {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(&self.bucket)
        );
        let auth = http::bearer(&self.session);

        http::send(&self.retry, "storage.objects.insert", || {
            self.agent
                .post(&url)
                .query("uploadType", "media")
                .query("name", name)
                .set("Authorization", &auth)
                .set("Content-Type", content_type)
                .send_bytes(bytes)
        })?;

        debug!(bucket = %self.bucket, object = name, size = bytes.len(), "Uploaded object");
        Ok(())
    }

    fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.object_url(name);
        let auth = http::bearer(&self.session);

        let response = http::send(&self.retry, "storage.objects.get", || {
            self.agent
                .get(&url)
                .query("alt", "media")
                .set("Authorization", &auth)
                .call()
        })?;

        http::read_bytes(response)
    }
}
