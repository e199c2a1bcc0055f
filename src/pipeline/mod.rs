//! The daily face harvest: list a day's photos, stage them in the bucket,
//! run face detection over them as one batch and upload the crops.

pub mod trigger;

pub use trigger::TriggerEvent;

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::FacesConfig;
use crate::error::{PipelineError, Result};
use crate::faces::{is_face_crop, FaceResultProcessor, ProcessingMode, ProcessingSummary};
use crate::photos::{MediaItem, MediaType, PhotoLibrary};
use crate::storage::{BlobLocator, BlobStore};
use crate::vision::{AnnotationJobResult, Annotator, FeatureType};

/// Where a run currently is. Runs only move forward; any error ends in
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Listing,
    Uploading,
    Submitted,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// No photos were taken that day.
    NothingToDo,
    /// Dry run: the filenames that would have been sent for detection.
    DryRun { would_process: Vec<String> },
    Completed(ProcessingSummary),
}

/// Output prefix for a day's annotation results: `2022_10_16_`, `2021_12_5_`.
pub fn output_prefix(date: NaiveDate) -> String {
    format!("{}_{}_{}_", date.year(), date.month(), date.day())
}

pub struct DailyDriver<'a> {
    library: &'a dyn PhotoLibrary,
    store: &'a dyn BlobStore,
    annotator: &'a dyn Annotator,
    faces: &'a FacesConfig,
    state: RunState,
}

impl<'a> DailyDriver<'a> {
    pub fn new(
        library: &'a dyn PhotoLibrary,
        store: &'a dyn BlobStore,
        annotator: &'a dyn Annotator,
        faces: &'a FacesConfig,
    ) -> Self {
        Self {
            library,
            store,
            annotator,
            faces,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, state: RunState) {
        info!(from = ?self.state, to = ?state, "Run state");
        self.state = state;
    }

    /// Harvest faces from the photos taken on `date`.
    pub fn run(&mut self, date: NaiveDate, dry_run: bool) -> Result<RunOutcome> {
        info!(%date, dry_run, "Processing photos");
        self.state = RunState::Idle;

        let result = self.run_stages(date, dry_run);
        if let Err(ref e) = result {
            warn!(%date, error = %e, "Run failed");
            self.advance(RunState::Failed);
        }
        result
    }

    fn run_stages(&mut self, date: NaiveDate, dry_run: bool) -> Result<RunOutcome> {
        self.advance(RunState::Listing);
        let items = self.list_candidates(date)?;

        if items.is_empty() {
            info!(%date, "No photos found");
            self.advance(RunState::Done);
            return Ok(RunOutcome::NothingToDo);
        }

        if dry_run {
            let would_process: Vec<String> = items.into_iter().map(|item| item.filename).collect();
            info!(%date, count = would_process.len(), files = ?would_process, "Dry run, nothing staged");
            self.advance(RunState::Done);
            return Ok(RunOutcome::DryRun { would_process });
        }

        self.advance(RunState::Uploading);
        let mut file_names = Vec::with_capacity(items.len());
        let mut originals = HashMap::with_capacity(items.len());
        for item in items {
            let bytes = self.library.download(&item)?;
            info!(file = %item.filename, bytes = bytes.len(), to = %self.store.locator(&item.filename), "Staging photo");
            self.store.upload(&item.filename, &bytes, &item.mime_type)?;
            file_names.push(item.filename.clone());
            originals.insert(item.filename, bytes);
        }

        self.advance(RunState::Submitted);
        let result_file = self.annotator.batch_annotate(
            self.store.bucket(),
            &file_names,
            &output_prefix(date),
            FeatureType::FaceDetection,
        )?;

        self.advance(RunState::Processing);
        let album = self.library.upsert_album(&self.faces.album_title)?;
        let result = AnnotationJobResult::from_json(&self.store.read_text(&result_file)?)?;
        let summary = FaceResultProcessor::new(self.library, self.faces).process(
            &result,
            &originals,
            ProcessingMode::Upload { album_id: &album.id },
        )?;

        self.advance(RunState::Done);
        Ok(RunOutcome::Completed(summary))
    }

    /// Photos taken on `date`, minus our own crops and repeated filenames.
    fn list_candidates(&self, date: NaiveDate) -> Result<Vec<MediaItem>> {
        let found = self.library.search_by_date(date, MediaType::Photo)?;
        let total = found.len();

        let mut seen = HashMap::new();
        let mut items = Vec::with_capacity(total);
        for item in found {
            if is_face_crop(&item.filename, &self.faces.file_prefix) {
                continue;
            }
            if seen.insert(item.filename.clone(), item.id.clone()).is_some() {
                warn!(file = %item.filename, id = %item.id, "Skipping photo with a filename already seen today");
                continue;
            }
            items.push(item);
        }

        info!(%date, found = total, selected = items.len(), "Listed photos");
        Ok(items)
    }

    /// Run result processing again over a result file already in the bucket.
    /// Originals are read back from the locations the result names.
    pub fn reprocess(&mut self, result_file: &str, dry_run: bool) -> Result<ProcessingSummary> {
        info!(result_file, dry_run, "Reprocessing annotation result");
        self.state = RunState::Idle;

        let result = self.reprocess_stages(result_file, dry_run);
        if let Err(ref e) = result {
            warn!(result_file, error = %e, "Reprocessing failed");
            self.advance(RunState::Failed);
        }
        result
    }

    fn reprocess_stages(&mut self, result_file: &str, dry_run: bool) -> Result<ProcessingSummary> {
        self.advance(RunState::Processing);
        let result = AnnotationJobResult::from_json(&self.store.read_text(result_file)?)?;

        let mut originals = HashMap::new();
        for response in &result.responses {
            if response.error.is_some() || response.faces().is_empty() {
                continue;
            }
            let uri = response
                .source_uri()
                .ok_or_else(|| PipelineError::MalformedResult("response without context.uri".to_string()))?;
            let locator: BlobLocator = uri.parse()?;
            if self.store.locator(&locator.path) != locator {
                return Err(PipelineError::InvalidLocator(uri.to_string()));
            }
            let bytes = self.store.read_bytes(&locator.path)?;
            originals.insert(locator.file_name().to_string(), bytes);
        }

        let processor = FaceResultProcessor::new(self.library, self.faces);
        let summary = if dry_run {
            processor.process(&result, &originals, ProcessingMode::DryRun)?
        } else {
            let album = self.library.upsert_album(&self.faces.album_title)?;
            processor.process(&result, &originals, ProcessingMode::Upload { album_id: &album.id })?
        };

        self.advance(RunState::Done);
        Ok(summary)
    }

    /// Run every date in `[from, to)` in order, stopping at the first failure.
    pub fn backfill(&mut self, from: NaiveDate, to: NaiveDate, dry_run: bool) -> Result<Vec<(NaiveDate, RunOutcome)>> {
        let mut outcomes = Vec::new();
        for date in from.iter_days().take_while(|date| *date < to) {
            let outcome = self.run(date, dry_run)?;
            outcomes.push((date, outcome));
        }
        info!(%from, %to, days = outcomes.len(), "Backfill finished");
        Ok(outcomes)
    }
}
