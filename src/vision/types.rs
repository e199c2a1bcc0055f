//! Request and result shapes of the batch image annotation API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::storage::BlobLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    FaceDetection,
    ImageProperties,
    LabelDetection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncBatchAnnotateRequest {
    pub requests: Vec<AnnotateImageRequest>,
    pub output_config: OutputConfig,
}

impl AsyncBatchAnnotateRequest {
    /// One request per image, all results written to a single output file.
    pub fn new(images: &[BlobLocator], feature: FeatureType, destination: &BlobLocator) -> Self {
        Self {
            requests: images
                .iter()
                .map(|image| AnnotateImageRequest {
                    image: Image {
                        source: ImageSource {
                            image_uri: image.to_string(),
                        },
                    },
                    features: vec![Feature { kind: feature }],
                })
                .collect(),
            output_config: OutputConfig {
                gcs_destination: GcsDestination {
                    uri: destination.to_string(),
                },
                batch_size: images.len(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnnotateImageRequest {
    pub image: Image,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
pub struct Image {
    pub source: ImageSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub image_uri: String,
}

#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub gcs_destination: GcsDestination,
    pub batch_size: usize,
}

#[derive(Debug, Serialize)]
pub struct GcsDestination {
    pub uri: String,
}

/// Long-running operation handle returned by the submit call and by polling.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Contents of a result file written by a finished batch job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationJobResult {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

impl AnnotationJobResult {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| PipelineError::MalformedResult(format!("cannot parse result file: {}", e)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    pub context: Option<ImageContext>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub face_annotations: Option<Vec<FaceAnnotation>>,
}

impl AnnotateImageResponse {
    pub fn source_uri(&self) -> Option<&str> {
        self.context.as_ref().map(|context| context.uri.as_str())
    }

    /// Filename of the annotated image: the last segment of its URI.
    pub fn source_file_name(&self) -> Result<&str> {
        let uri = self
            .source_uri()
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| PipelineError::MalformedResult("response without context.uri".to_string()))?;
        Ok(uri.rsplit('/').next().unwrap_or(uri))
    }

    pub fn faces(&self) -> &[FaceAnnotation] {
        self.face_annotations.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageContext {
    #[serde(default)]
    pub uri: String,
}

/// One detected face, held as the service returned it. Only the bounding
/// polygon is interpreted; serializing writes the record back with its
/// original keys in their original order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceAnnotation(Map<String, Value>);

impl FaceAnnotation {
    /// A face with nothing but a bounding polygon.
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        let vertices: Vec<Value> = vertices.iter().map(Vertex::to_value).collect();
        let mut poly = Map::new();
        poly.insert("vertices".to_string(), Value::Array(vertices));
        let mut face = Map::new();
        face.insert("boundingPoly".to_string(), Value::Object(poly));
        Self(face)
    }

    /// `boundingPoly.vertices`, clockwise from top-left. A missing polygon
    /// has no vertices.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.raw_vertices()
            .map(|vertices| vertices.iter().map(Vertex::from_value).collect())
            .unwrap_or_default()
    }

    /// Vertex `index`, or one with both coordinates absent.
    pub fn vertex(&self, index: usize) -> Vertex {
        self.raw_vertices()
            .and_then(|vertices| vertices.get(index))
            .map(Vertex::from_value)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn raw_vertices(&self) -> Option<&Vec<Value>> {
        self.0.get("boundingPoly")?.get("vertices")?.as_array()
    }
}

/// Coordinates the service omits sit on the image edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex {
    pub x: Option<i64>,
    pub y: Option<i64>,
}

impl Vertex {
    pub fn new(x: Option<i64>, y: Option<i64>) -> Self {
        Self { x, y }
    }

    fn from_value(value: &Value) -> Self {
        let coordinate = |key: &str| {
            let number = value.get(key)?;
            number.as_i64().or_else(|| number.as_f64().map(|f| f.round() as i64))
        };
        Self::new(coordinate("x"), coordinate("y"))
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(x) = self.x {
            map.insert("x".to_string(), Value::from(x));
        }
        if let Some(y) = self.y {
            map.insert("y".to_string(), Value::from(y));
        }
        Value::Object(map)
    }
}
