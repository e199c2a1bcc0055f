//! Harvest face crops from a cloud photo library.
//!
//! A day's photos are staged in a storage bucket, run through batch face
//! detection, and every detected face is cropped, stamped with its detection
//! record and uploaded to a dedicated album.

pub mod auth;
pub mod config;
pub mod dataset;
pub mod error;
pub mod faces;
pub mod http;
pub mod logging;
pub mod photos;
pub mod pipeline;
pub mod storage;
pub mod vision;

#[cfg(test)]
mod testing;

pub use error::{ErrorKind, PipelineError, Result};
