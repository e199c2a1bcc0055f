use image::{DynamicImage, GenericImageView};
use std::collections::HashMap;
use tracing::{debug, info};

use super::crop::{self, CropRect};
use super::metadata::{self, user_comment_field};
use super::naming::face_crop_file_name;
use crate::config::FacesConfig;
use crate::error::{PipelineError, Result};
use crate::photos::PhotoLibrary;
use crate::vision::{AnnotationJobResult, FaceAnnotation, Vertex};

/// A cropped face ready for upload.
#[derive(Debug, Clone)]
pub struct FaceCropArtifact {
    pub image_bytes: Vec<u8>,
    pub embedded_metadata: String,
    pub destination_file_name: String,
}

/// What happens to each detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode<'a> {
    /// Crop, stamp and upload into the album with this id.
    Upload { album_id: &'a str },
    /// Only report bounding-polygon vertices.
    DryRun,
}

/// Bounding polygon of one face, reported in dry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedFace {
    pub source_file: String,
    pub index: usize,
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingSummary {
    /// Destination names, in upload order.
    pub uploaded: Vec<String>,
    pub inspected: Vec<InspectedFace>,
    pub images_with_faces: usize,
    pub skipped_with_error: usize,
    pub skipped_without_faces: usize,
}

/// Turns a finished face-detection job into face crops in an album.
pub struct FaceResultProcessor<'a> {
    library: &'a dyn PhotoLibrary,
    file_prefix: String,
    jpeg_quality: u8,
}

impl<'a> FaceResultProcessor<'a> {
    pub fn new(library: &'a dyn PhotoLibrary, config: &FacesConfig) -> Self {
        Self {
            library,
            file_prefix: config.file_prefix.clone(),
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Process every response in result order. `originals` maps each source
    /// filename to the bytes that were submitted for annotation.
    pub fn process(
        &self,
        result: &AnnotationJobResult,
        originals: &HashMap<String, Vec<u8>>,
        mode: ProcessingMode<'_>,
    ) -> Result<ProcessingSummary> {
        let mut summary = ProcessingSummary::default();

        for response in &result.responses {
            let file_name = response.source_file_name()?;

            if let Some(ref error) = response.error {
                info!(file = file_name, %error, "Skipping image the detector could not process");
                summary.skipped_with_error += 1;
                continue;
            }

            let faces = response.faces();
            if faces.is_empty() {
                debug!(file = file_name, "No faces");
                summary.skipped_without_faces += 1;
                continue;
            }

            info!(file = file_name, count = faces.len(), "Found faces");
            summary.images_with_faces += 1;

            let bytes = originals
                .get(file_name)
                .ok_or_else(|| PipelineError::MissingOriginal(file_name.to_string()))?;
            let image = image::load_from_memory(bytes).map_err(|source| PipelineError::ImageDecode {
                file: file_name.to_string(),
                source,
            })?;
            let creation_date = metadata::creation_date(bytes);

            for (index, face) in faces.iter().enumerate() {
                match mode {
                    ProcessingMode::DryRun => {
                        let vertices = face.vertices();
                        info!(file = file_name, index, vertices = ?vertices, "Face bounding polygon");
                        summary.inspected.push(InspectedFace {
                            source_file: file_name.to_string(),
                            index,
                            vertices,
                        });
                    }
                    ProcessingMode::Upload { album_id } => {
                        let artifact = build_face_crop(
                            &image,
                            face,
                            index,
                            file_name,
                            &creation_date,
                            &self.file_prefix,
                            self.jpeg_quality,
                        )?;

                        info!(file = file_name, index, name = %artifact.destination_file_name, "Uploading face");
                        self.library
                            .upload_to_album(&artifact.image_bytes, &artifact.destination_file_name, album_id)?;
                        summary.uploaded.push(artifact.destination_file_name);
                    }
                }
            }
        }

        info!(
            uploaded = summary.uploaded.len(),
            inspected = summary.inspected.len(),
            skipped_with_error = summary.skipped_with_error,
            skipped_without_faces = summary.skipped_without_faces,
            "Face results processed"
        );
        Ok(summary)
    }
}

/// Crop face `index` out of `image` and encode it with the annotation as its
/// only metadata.
pub fn build_face_crop(
    image: &DynamicImage,
    face: &FaceAnnotation,
    index: usize,
    source_file: &str,
    creation_date: &str,
    file_prefix: &str,
    jpeg_quality: u8,
) -> Result<FaceCropArtifact> {
    let (width, height) = image.dimensions();
    let rect = CropRect::from_face(face, width, height);
    let cropped = crop::crop(image, rect).ok_or_else(|| PipelineError::EmptyCrop {
        file: source_file.to_string(),
        index,
    })?;

    let embedded_metadata = serde_json::to_string(face)?;
    let image_bytes = metadata::encode_jpeg(&cropped, jpeg_quality, &[user_comment_field(&embedded_metadata)])?;

    Ok(FaceCropArtifact {
        image_bytes,
        embedded_metadata,
        destination_file_name: face_crop_file_name(file_prefix, creation_date, index, source_file),
    })
}
