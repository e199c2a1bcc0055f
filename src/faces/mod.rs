//! Face crops: geometry, naming, EXIF metadata and the result processor
//! that ties them to the photo library.

pub mod crop;
pub mod metadata;
pub mod naming;
pub mod processor;

pub use crop::CropRect;
pub use naming::{face_crop_file_name, is_face_crop};
pub use processor::{FaceCropArtifact, FaceResultProcessor, InspectedFace, ProcessingMode, ProcessingSummary};
