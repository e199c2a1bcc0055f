pub mod client;
pub mod types;

pub use client::VisionClient;
pub use types::{AnnotateImageResponse, AnnotationJobResult, FaceAnnotation, FeatureType, Vertex};

use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use types::Operation;

/// Submits batch annotation jobs and waits for them to finish.
pub trait Annotator {
    /// Annotate `file_names` (objects in `bucket`) as one batch and block until
    /// the job completes. Returns the name of the result object.
    fn batch_annotate(
        &self,
        bucket: &str,
        file_names: &[String],
        output_prefix: &str,
        feature: FeatureType,
    ) -> Result<String>;
}

/// Name of the single result file a batch of `count` inputs produces when
/// the batch size equals the input count.
pub fn result_file_name(output_prefix: &str, count: usize) -> String {
    format!("{}output-1-to-{}.json", output_prefix, count)
}

/// Poll `fetch` every `interval` until the operation is done or `timeout`
/// has elapsed since the first check.
pub fn poll_until_done<F>(mut fetch: F, timeout: Duration, interval: Duration) -> Result<Operation>
where
    F: FnMut() -> Result<Operation>,
{
    let started = Instant::now();
    loop {
        let operation = fetch()?;

        if operation.done {
            if let Some(error) = operation.error {
                return Err(PipelineError::AnnotationFailed {
                    operation: operation.name,
                    code: error.code,
                    message: error.message,
                });
            }
            info!(operation = %operation.name, elapsed = ?started.elapsed(), "Annotation finished");
            return Ok(operation);
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(PipelineError::AnnotationTimeout {
                operation: operation.name,
                waited: elapsed,
            });
        }

        debug!(operation = %operation.name, ?elapsed, "Annotation still running");
        thread::sleep(interval.min(timeout - elapsed));
    }
}
