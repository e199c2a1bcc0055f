//! In-memory stand-ins for the remote services, and synthetic images.

use chrono::NaiveDate;
use exif::{Field, In, Tag, Value};
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Read;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use crate::error::{PipelineError, Result};
use crate::faces::metadata;
use crate::photos::{Album, MediaItem, MediaMetadata, MediaType, PhotoLibrary};
use crate::storage::BlobStore;
use crate::vision::{result_file_name, AnnotationJobResult, Annotator, FeatureType};

pub const BUCKET: &str = "test-bucket-gpa";

#[derive(Debug, Clone)]
pub struct AlbumUpload {
    pub album_id: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct FakeLibrary {
    pub albums: RefCell<Vec<Album>>,
    pub album_items: RefCell<HashMap<String, Vec<MediaItem>>>,
    pub by_date: RefCell<HashMap<NaiveDate, Vec<MediaItem>>>,
    /// Download bytes keyed by media item id.
    pub content: RefCell<HashMap<String, Vec<u8>>>,
    pub uploads: RefCell<Vec<AlbumUpload>>,
    pub searches: RefCell<Vec<(NaiveDate, MediaType)>>,
    pub album_calls: Cell<usize>,
}

impl FakeLibrary {
    pub fn photo(filename: &str) -> MediaItem {
        MediaItem {
            id: format!("id-{}", filename),
            filename: filename.to_string(),
            mime_type: "image/jpeg".to_string(),
            base_url: format!("https://lh3.example.com/{}", filename),
            media_metadata: MediaMetadata {
                photo: Some(json!({})),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn add_album(&self, id: &str, title: &str) {
        self.albums.borrow_mut().push(Album {
            id: id.to_string(),
            title: title.to_string(),
            product_url: None,
            media_items_count: None,
        });
    }

    pub fn add_album_item(&self, album_id: &str, item: MediaItem) {
        self.album_items
            .borrow_mut()
            .entry(album_id.to_string())
            .or_default()
            .push(item);
    }

    /// Register a photo taken on `date` with the given content.
    pub fn add_photo(&self, date: NaiveDate, filename: &str, bytes: Vec<u8>) -> MediaItem {
        let item = Self::photo(filename);
        self.content.borrow_mut().insert(item.id.clone(), bytes);
        self.by_date.borrow_mut().entry(date).or_default().push(item.clone());
        item
    }
}

impl PhotoLibrary for FakeLibrary {
    fn search_by_date(&self, date: NaiveDate, media_type: MediaType) -> Result<Vec<MediaItem>> {
        self.searches.borrow_mut().push((date, media_type));
        Ok(self
            .by_date
            .borrow()
            .get(&date)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| media_type != MediaType::Photo || item.is_photo())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn download(&self, item: &MediaItem) -> Result<Vec<u8>> {
        self.content.borrow().get(&item.id).cloned().ok_or_else(|| PipelineError::Http {
            operation: "download".to_string(),
            status: 404,
            body: item.download_url(),
        })
    }

    fn list_albums(&self) -> Result<Vec<Album>> {
        self.album_calls.set(self.album_calls.get() + 1);
        Ok(self.albums.borrow().clone())
    }

    fn create_album(&self, title: &str) -> Result<Album> {
        self.album_calls.set(self.album_calls.get() + 1);
        let id = format!("album-{}", self.albums.borrow().len() + 1);
        self.add_album(&id, title);
        Ok(Album {
            id,
            title: title.to_string(),
            product_url: None,
            media_items_count: None,
        })
    }

    fn list_album_items(&self, album_id: &str) -> Result<Vec<MediaItem>> {
        Ok(self.album_items.borrow().get(album_id).cloned().unwrap_or_default())
    }

    fn upload_to_album(&self, bytes: &[u8], file_name: &str, album_id: &str) -> Result<()> {
        self.uploads.borrow_mut().push(AlbumUpload {
            album_id: album_id.to_string(),
            file_name: file_name.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

pub struct FakeBlobStore {
    pub bucket: String,
    pub objects: RefCell<HashMap<String, Vec<u8>>>,
    /// `(name, content type)` per upload, in call order.
    pub uploads: RefCell<Vec<(String, String)>>,
}

impl Default for FakeBlobStore {
    fn default() -> Self {
        Self {
            bucket: BUCKET.to_string(),
            objects: RefCell::new(HashMap::new()),
            uploads: RefCell::new(Vec::new()),
        }
    }
}

impl FakeBlobStore {
    pub fn put(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.objects.borrow_mut().insert(name.to_string(), bytes.into());
    }
}

impl BlobStore for FakeBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.uploads
            .borrow_mut()
            .push((name.to_string(), content_type.to_string()));
        self.put(name, bytes);
        Ok(())
    }

    fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.objects.borrow().get(name).cloned().ok_or_else(|| PipelineError::Http {
            operation: "objects.get".to_string(),
            status: 404,
            body: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateCall {
    pub bucket: String,
    pub file_names: Vec<String>,
    pub output_prefix: String,
    pub feature: FeatureType,
}

/// Writes a canned result file into `store` the way the real job would.
pub struct FakeAnnotator<'a> {
    store: &'a FakeBlobStore,
    result_json: String,
    pub calls: RefCell<Vec<AnnotateCall>>,
    pub failure: RefCell<Option<PipelineError>>,
}

impl<'a> FakeAnnotator<'a> {
    pub fn writing_to(store: &'a FakeBlobStore, result_json: impl Into<String>) -> Self {
        Self {
            store,
            result_json: result_json.into(),
            calls: RefCell::new(Vec::new()),
            failure: RefCell::new(None),
        }
    }

    pub fn failing(store: &'a FakeBlobStore, error: PipelineError) -> Self {
        let annotator = Self::writing_to(store, "{}");
        *annotator.failure.borrow_mut() = Some(error);
        annotator
    }
}

impl Annotator for FakeAnnotator<'_> {
    fn batch_annotate(
        &self,
        bucket: &str,
        file_names: &[String],
        output_prefix: &str,
        feature: FeatureType,
    ) -> Result<String> {
        self.calls.borrow_mut().push(AnnotateCall {
            bucket: bucket.to_string(),
            file_names: file_names.to_vec(),
            output_prefix: output_prefix.to_string(),
            feature,
        });
        if let Some(error) = self.failure.borrow_mut().take() {
            return Err(error);
        }
        if file_names.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }

        let output = result_file_name(output_prefix, file_names.len());
        self.store.put(&output, self.result_json.as_bytes());
        Ok(output)
    }
}

pub fn date_field(value: &str) -> Field {
    Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![value.as_bytes().to_vec()]),
    }
}

/// Blue image with a red `(left, top, right, bottom)` region.
pub fn two_tone_image(width: u32, height: u32, face: (u32, u32, u32, u32)) -> DynamicImage {
    let (left, top, right, bottom) = face;
    let image = RgbImage::from_fn(width, height, |x, y| {
        if (left..right).contains(&x) && (top..bottom).contains(&y) {
            Rgb([230, 20, 20])
        } else {
            Rgb([20, 20, 230])
        }
    });
    DynamicImage::ImageRgb8(image)
}

/// JPEG bytes of `image`, with `DateTimeOriginal` set when given.
pub fn jpeg_with_date(image: &DynamicImage, date_time_original: Option<&str>) -> Vec<u8> {
    let fields: Vec<Field> = date_time_original.into_iter().map(date_field).collect();
    metadata::encode_jpeg(image, 95, &fields).unwrap()
}

/// Result file JSON with one entry per `(file name, faces)`, each face given
/// as a complete `(left, top, right, bottom)` polygon.
pub fn face_result_json(entries: &[(&str, &[(i64, i64, i64, i64)])]) -> String {
    let responses: Vec<serde_json::Value> = entries
        .iter()
        .map(|(name, faces)| {
            let faces: Vec<serde_json::Value> = faces
                .iter()
                .map(|&(left, top, right, bottom)| {
                    json!({
                        "boundingPoly": {"vertices": [
                            {"x": left, "y": top},
                            {"x": right, "y": top},
                            {"x": right, "y": bottom},
                            {"x": left, "y": bottom}
                        ]},
                        "detectionConfidence": 0.9
                    })
                })
                .collect();
            json!({
                "faceAnnotations": faces,
                "context": {"uri": format!("gs://{}/{}", BUCKET, name)}
            })
        })
        .collect();
    json!({ "responses": responses }).to_string()
}

pub fn face_result(entries: &[(&str, &[(i64, i64, i64, i64)])]) -> AnnotationJobResult {
    AnnotationJobResult::from_json(&face_result_json(entries)).unwrap()
}

/// A local endpoint that reads each request and hangs up without replying.
/// Returns its base URL and a count of connections accepted.
pub fn hang_up_server() -> (String, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let connections = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&connections);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
        }
    });
    (url, connections)
}

/// A local base URL nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}
