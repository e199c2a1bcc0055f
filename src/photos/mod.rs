pub mod client;
pub mod types;

pub use client::GooglePhotosClient;
pub use types::{Album, MediaItem, MediaMetadata, MediaType};

use chrono::NaiveDate;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Operations the pipeline needs from the cloud photo library.
pub trait PhotoLibrary {
    /// Every item taken on `date`, across all result pages.
    fn search_by_date(&self, date: NaiveDate, media_type: MediaType) -> Result<Vec<MediaItem>>;

    /// Full-resolution bytes of `item`.
    fn download(&self, item: &MediaItem) -> Result<Vec<u8>>;

    fn list_albums(&self) -> Result<Vec<Album>>;

    fn create_album(&self, title: &str) -> Result<Album>;

    fn list_album_items(&self, album_id: &str) -> Result<Vec<MediaItem>>;

    fn upload_to_album(&self, bytes: &[u8], file_name: &str, album_id: &str) -> Result<()>;

    fn find_albums_by_title(&self, title: &str) -> Result<Vec<Album>> {
        Ok(self
            .list_albums()?
            .into_iter()
            .filter(|album| album.title == title)
            .collect())
    }

    /// Return the single album titled `title`, creating it if none exists.
    /// More than one match is refused rather than guessed at.
    fn upsert_album(&self, title: &str) -> Result<Album> {
        let mut albums = self.find_albums_by_title(title)?;
        match albums.len() {
            0 => {
                info!(title, "Creating album");
                self.create_album(title)
            }
            1 => Ok(albums.remove(0)),
            count => Err(PipelineError::DuplicateAlbum {
                title: title.to_string(),
                count,
            }),
        }
    }

    fn list_album_items_with_prefix(&self, album_id: &str, prefix: &str) -> Result<Vec<MediaItem>> {
        Ok(self
            .list_album_items(album_id)?
            .into_iter()
            .filter(|item| item.filename.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLibrary;

    #[test]
    fn test_upsert_creates_missing_album() {
        let library = FakeLibrary::default();
        let album = library.upsert_album("auto_detected_face_images").unwrap();

        assert_eq!(album.title, "auto_detected_face_images");
        assert_eq!(library.albums.borrow().len(), 1);
    }

    #[test]
    fn test_upsert_reuses_single_album() {
        let library = FakeLibrary::default();
        library.add_album("a1", "auto_detected_face_images");
        library.add_album("a2", "Holidays");

        let album = library.upsert_album("auto_detected_face_images").unwrap();
        assert_eq!(album.id, "a1");
        assert_eq!(library.albums.borrow().len(), 2);
    }

    #[test]
    fn test_upsert_refuses_duplicates() {
        let library = FakeLibrary::default();
        library.add_album("a1", "auto_detected_face_images");
        library.add_album("a2", "auto_detected_face_images");

        let err = library.upsert_album("auto_detected_face_images").unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateAlbum { count: 2, .. }));
        assert_eq!(library.albums.borrow().len(), 2);
    }

    #[test]
    fn test_title_match_is_exact() {
        let library = FakeLibrary::default();
        library.add_album("a1", "Ada");
        library.add_album("a2", "ada");
        library.add_album("a3", "Ada ");

        let albums = library.find_albums_by_title("Ada").unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].id, "a1");
    }

    #[test]
    fn test_album_items_with_prefix() {
        let library = FakeLibrary::default();
        library.add_album("a1", "Ada");
        library.add_album_item("a1", FakeLibrary::photo("auto_detected_face_image_x_0_IMG_1.jpeg"));
        library.add_album_item("a1", FakeLibrary::photo("IMG_2.JPG"));

        let items = library
            .list_album_items_with_prefix("a1", "auto_detected_face_image_")
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename, "auto_detected_face_image_x_0_IMG_1.jpeg");
    }
}
