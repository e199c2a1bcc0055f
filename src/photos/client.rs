use chrono::NaiveDate;
use tracing::debug;

use super::types::*;
use super::PhotoLibrary;
use crate::auth::Session;
use crate::config::GoogleConfig;
use crate::error::{PipelineError, Result};
use crate::http::{self, RetryPolicy};

const SEARCH_PAGE_SIZE: u32 = 100;
const ALBUM_PAGE_SIZE: &str = "50";

/// Google Photos Library REST client.
pub struct GooglePhotosClient {
    agent: ureq::Agent,
    endpoint: String,
    session: Session,
    retry: RetryPolicy,
    upload_description: String,
}

impl GooglePhotosClient {
    pub fn new(config: &GoogleConfig, session: Session, retry: RetryPolicy) -> Self {
        Self {
            agent: http::agent(config.request_timeout()),
            endpoint: config.photos_endpoint.trim_end_matches('/').to_string(),
            session,
            retry,
            upload_description: String::new(),
        }
    }

    /// Description attached to every item created by `upload_to_album`.
    pub fn with_upload_description(mut self, description: &str) -> Self {
        self.upload_description = description.to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path)
    }

    /// Run `mediaItems:search` page by page.
    fn search(&self, album_id: Option<&str>, filters: impl Fn() -> Option<SearchFilters>) -> Result<Vec<MediaItem>> {
        let url = self.url("mediaItems:search");
        let auth = http::bearer(&self.session);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = SearchRequest {
                album_id,
                filters: filters(),
                page_size: SEARCH_PAGE_SIZE,
                page_token: page_token.as_deref(),
            };

            let response = http::send(&self.retry, "mediaItems.search", || {
                self.agent
                    .post(&url)
                    .set("Authorization", &auth)
                    .send_json(&request)
            })?;
            let page: SearchResponse = http::read_json(response)?;

            debug!(count = page.media_items.len(), "Fetched media item page");
            items.extend(page.media_items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

impl PhotoLibrary for GooglePhotosClient {
    fn search_by_date(&self, date: NaiveDate, media_type: MediaType) -> Result<Vec<MediaItem>> {
        self.search(None, || {
            Some(SearchFilters {
                date_filter: DateFilter {
                    dates: vec![date.into()],
                },
                media_type_filter: MediaTypeFilter {
                    media_types: vec![media_type],
                },
            })
        })
    }

    /// Base URLs are pre-authorized content links; no token is sent to them.
    fn download(&self, item: &MediaItem) -> Result<Vec<u8>> {
        let url = item.download_url();

        let response = http::send(&self.retry, "mediaItems.download", || self.agent.get(&url).call())?;

        http::read_bytes(response)
    }

    fn list_albums(&self) -> Result<Vec<Album>> {
        let url = self.url("albums");
        let auth = http::bearer(&self.session);
        let mut albums = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = http::send(&self.retry, "albums.list", || {
                let mut request = self
                    .agent
                    .get(&url)
                    .set("Authorization", &auth)
                    .query("pageSize", ALBUM_PAGE_SIZE);
                if let Some(ref token) = page_token {
                    request = request.query("pageToken", token);
                }
                request.call()
            })?;
            let page: ListAlbumsResponse = http::read_json(response)?;
            albums.extend(page.albums);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(albums)
    }

    fn create_album(&self, title: &str) -> Result<Album> {
        let url = self.url("albums");
        let auth = http::bearer(&self.session);
        let body = CreateAlbumRequest {
            album: NewAlbum { title },
        };

        let response = http::send_create(&self.retry, "albums.create", || {
            self.agent
                .post(&url)
                .set("Authorization", &auth)
                .send_json(&body)
        })?;

        http::read_json(response)
    }

    fn list_album_items(&self, album_id: &str) -> Result<Vec<MediaItem>> {
        self.search(Some(album_id), || None)
    }

    fn upload_to_album(&self, bytes: &[u8], file_name: &str, album_id: &str) -> Result<()> {
        let auth = http::bearer(&self.session);

        // Raw upload first; the response body is the upload token
        let upload_url = self.url("uploads");
        let response = http::send(&self.retry, "uploads", || {
            self.agent
                .post(&upload_url)
                .set("Authorization", &auth)
                .set("Content-Type", "application/octet-stream")
                .set("X-Goog-Upload-Content-Type", "image/jpeg")
                .set("X-Goog-Upload-File-Name", file_name)
                .set("X-Goog-Upload-Protocol", "raw")
                .send_bytes(bytes)
        })?;
        let upload_token = http::read_text(response)?;

        let create_url = self.url("mediaItems:batchCreate");
        let body = BatchCreateRequest {
            album_id,
            new_media_items: vec![NewMediaItem {
                description: &self.upload_description,
                simple_media_item: SimpleMediaItem {
                    file_name,
                    upload_token: upload_token.trim(),
                },
            }],
        };
        let response = http::send_create(&self.retry, "mediaItems.batchCreate", || {
            self.agent
                .post(&create_url)
                .set("Authorization", &auth)
                .send_json(&body)
        })?;
        let created: BatchCreateResponse = http::read_json(response)?;

        // Code 0 is OK; batchCreate reports per-item failures in the body
        if let Some(status) = created
            .new_media_item_results
            .iter()
            .filter_map(|result| result.status.as_ref())
            .find(|status| status.code != 0)
        {
            return Err(PipelineError::Rejected {
                operation: format!("mediaItems.batchCreate for {}", file_name),
                message: status.message.clone(),
            });
        }

        debug!(file = file_name, album_id, size = bytes.len(), "Uploaded item to album");
        Ok(())
    }
}
