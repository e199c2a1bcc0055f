//! Export face crops from a curated album as a labelled image dataset.
//!
//! The usual workflow is to search the library for one person, save the
//! results as an album named after them, and harvest that album. Records hold
//! download URLs that expire upstream after about an hour, so consumers must
//! fetch the images promptly.

use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::photos::PhotoLibrary;

/// One line of the dataset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub image_url: String,
    pub label: String,
}

/// Default output file for an album: `<title>_face_dataset.json`.
pub fn default_output_name(album_title: &str) -> String {
    format!("{}_face_dataset.json", album_title)
}

/// Collect up to `limit` face crops from the album titled `album_title`,
/// in album order, each labelled `label`. An empty `face_prefix` takes
/// every item in the album.
pub fn harvest(
    library: &dyn PhotoLibrary,
    album_title: &str,
    label: &str,
    limit: usize,
    face_prefix: &str,
) -> Result<Vec<DatasetRecord>> {
    let mut albums = library.find_albums_by_title(album_title)?;
    let album = match albums.len() {
        0 => return Err(PipelineError::AlbumNotFound(album_title.to_string())),
        1 => albums.remove(0),
        count => {
            return Err(PipelineError::DuplicateAlbum {
                title: album_title.to_string(),
                count,
            })
        }
    };

    let records: Vec<DatasetRecord> = library
        .list_album_items_with_prefix(&album.id, face_prefix)?
        .into_iter()
        .take(limit)
        .map(|item| DatasetRecord {
            image_url: item.download_url(),
            label: label.to_string(),
        })
        .collect();

    info!(album = album_title, label, count = records.len(), limit, "Harvested dataset records");
    Ok(records)
}

/// Write `records` as JSON lines.
pub fn write_jsonl<W: Write>(records: &[DatasetRecord], mut writer: W) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLibrary;
    use std::io::{BufRead, BufReader};

    const PREFIX: &str = "auto_detected_face_image_";

    fn library_with_album() -> FakeLibrary {
        let library = FakeLibrary::default();
        library.add_album("ada", "Ada");
        library.add_album("other", "Holidays");
        library.add_album_item("ada", FakeLibrary::photo("auto_detected_face_image_2022-10-16_0_IMG_1.jpeg"));
        library.add_album_item("ada", FakeLibrary::photo("IMG_1.JPG"));
        library.add_album_item("ada", FakeLibrary::photo("auto_detected_face_image_2022-10-16_1_IMG_1.jpeg"));
        library.add_album_item("ada", FakeLibrary::photo("auto_detected_face_image_2022-10-17_0_IMG_5.jpeg"));
        library.add_album_item("other", FakeLibrary::photo("auto_detected_face_image_2022-01-01_0_X.jpeg"));
        library
    }

    #[test]
    fn test_harvest_filters_and_keeps_order() {
        let library = library_with_album();
        let records = harvest(&library, "Ada", "Ada", 1000, PREFIX).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            DatasetRecord {
                image_url: "https://lh3.example.com/auto_detected_face_image_2022-10-16_0_IMG_1.jpeg=d".to_string(),
                label: "Ada".to_string(),
            }
        );
        assert!(records[2].image_url.contains("IMG_5"));
    }

    #[test]
    fn test_harvest_respects_limit() {
        let library = library_with_album();
        let records = harvest(&library, "Ada", "grandma", 2, PREFIX).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.label == "grandma"));

        assert!(harvest(&library, "Ada", "Ada", 0, PREFIX).unwrap().is_empty());
    }

    #[test]
    fn test_harvest_needs_exactly_one_album() {
        let library = library_with_album();
        assert!(matches!(
            harvest(&library, "Bob", "Bob", 10, PREFIX),
            Err(PipelineError::AlbumNotFound(_))
        ));

        library.add_album("ada2", "Ada");
        assert!(matches!(
            harvest(&library, "Ada", "Ada", 10, PREFIX),
            Err(PipelineError::DuplicateAlbum { count: 2, .. })
        ));
    }

    #[test]
    fn test_write_jsonl() {
        let records = vec![
            DatasetRecord {
                image_url: "https://a/1=d".to_string(),
                label: "Ada".to_string(),
            },
            DatasetRecord {
                image_url: "https://a/2=d".to_string(),
                label: "Ada".to_string(),
            },
        ];

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write_jsonl(&records, file.as_file_mut()).unwrap();

        let lines: Vec<String> = BufReader::new(file.reopen().unwrap())
            .lines()
            .map(|line| line.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"image_url":"https://a/1=d","label":"Ada"}"#);
        let parsed: DatasetRecord = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(parsed, records[1]);
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output_name("Ada"), "Ada_face_dataset.json");
    }

    #[test]
    fn test_harvest_empty_prefix_takes_whole_album() {
        let library = library_with_album();
        let records = harvest(&library, "Ada", "Ada", 1000, "").unwrap();

        assert_eq!(records.len(), 4);
        assert!(records[1].image_url.ends_with("IMG_1.JPG=d"));
    }
}
