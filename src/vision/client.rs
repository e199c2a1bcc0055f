use std::time::Duration;
use tracing::info;

use super::types::{AsyncBatchAnnotateRequest, FeatureType, Operation};
use super::{poll_until_done, result_file_name, Annotator};
use crate::auth::Session;
use crate::config::{GoogleConfig, VisionConfig};
use crate::error::{PipelineError, Result};
use crate::http::{self, RetryPolicy};
use crate::storage::BlobLocator;

/// Cloud Vision REST client for asynchronous batch annotation.
pub struct VisionClient {
    agent: ureq::Agent,
    endpoint: String,
    session: Session,
    retry: RetryPolicy,
    timeout: Duration,
    poll_interval: Duration,
}

impl VisionClient {
    pub fn new(google: &GoogleConfig, vision: &VisionConfig, session: Session, retry: RetryPolicy) -> Self {
        Self {
            agent: http::agent(google.request_timeout()),
            endpoint: google.vision_endpoint.trim_end_matches('/').to_string(),
            session,
            retry,
            timeout: vision.timeout(),
            poll_interval: vision.poll_interval(),
        }
    }

    /// Start the job. Sent exactly once: a resend after a lost response
    /// would start a second job.
    fn submit(&self, request: &AsyncBatchAnnotateRequest) -> Result<Operation> {
        let url = format!("{}/v1/images:asyncBatchAnnotate", self.endpoint);
        let auth = http::bearer(&self.session);

        let response = http::send(&RetryPolicy::once(), "images.asyncBatchAnnotate", || {
            self.agent
                .post(&url)
                .set("Authorization", &auth)
                .send_json(request)
        })?;

        http::read_json(response)
    }

    fn fetch_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/v1/{}", self.endpoint, name);
        let auth = http::bearer(&self.session);

        let response = http::send(&self.retry, "operations.get", || {
            self.agent.get(&url).set("Authorization", &auth).call()
        })?;

        http::read_json(response)
    }
}

impl Annotator for VisionClient {
    fn batch_annotate(
        &self,
        bucket: &str,
        file_names: &[String],
        output_prefix: &str,
        feature: FeatureType,
    ) -> Result<String> {
        if file_names.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }

        let images: Vec<BlobLocator> = file_names
            .iter()
            .map(|name| BlobLocator::new(bucket, name.as_str()))
            .collect();
        let destination = BlobLocator::new(bucket, output_prefix);
        let request = AsyncBatchAnnotateRequest::new(&images, feature, &destination);

        let submitted = self.submit(&request)?;
        info!(
            operation = %submitted.name,
            images = images.len(),
            timeout = ?self.timeout,
            "Waiting for annotation to complete"
        );

        // The submit response may already be final
        let mut first = Some(submitted.clone());
        poll_until_done(
            || match first.take() {
                Some(operation) => Ok(operation),
                None => self.fetch_operation(&submitted.name),
            },
            self.timeout,
            self.poll_interval,
        )?;

        let output = result_file_name(output_prefix, file_names.len());
        info!(output = %output, "Annotation output written");
        Ok(output)
    }
}
