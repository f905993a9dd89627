//! Minimal Google Drive client for revision history access.
//!
//! Revision listing uses the Drive v2 endpoint: unlike v3 it returns
//! per-revision export links for Google-native documents. Document metadata
//! and current-content export use v3.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DRIVE_V2_FILES_URL: &str = "https://www.googleapis.com/drive/v2/files";
const DRIVE_V3_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Export template for revisions whose listing carries no export links.
const EXPORT_TEMPLATE: &str = "https://docs.google.com/feeds/download/documents/export/Export";

/// MIME type requested for every export.
pub const EXPORT_MIME: &str = "text/plain";

/// Revisions listing page size.
const PAGE_SIZE: u32 = 200;

/// Rate-limit policy: up to five attempts, exponential backoff from one second.
const MAX_DOWNLOAD_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// One revision of a document, as returned by `revisions.list` (v2).
///
/// The API returns grouped revisions, not every individual edit; fine-grained
/// changes visible in the Docs UI may be collapsed into one record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub id: String,
    /// RFC 3339 modification timestamp; also the basis of the snapshot filename.
    pub modified_date: String,
    /// Export URLs by MIME type. Absent for non-native files.
    #[serde(default)]
    pub export_links: HashMap<String, String>,
}

impl Revision {
    /// Plain-text export URL: the listed link when present, otherwise built
    /// from the document and revision IDs.
    pub fn export_url(&self, file_id: &str) -> String {
        self.export_links
            .get(EXPORT_MIME)
            .cloned()
            .unwrap_or_else(|| {
                format!(
                    "{}?id={}&revision={}&exportFormat=txt",
                    EXPORT_TEMPLATE, file_id, self.id
                )
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevisionList {
    #[serde(default)]
    items: Vec<Revision>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    name: Option<String>,
}

/// Blocking Drive API client carrying a bearer credential.
pub struct DriveClient {
    http: reqwest::blocking::Client,
    access_token: String,
}

impl DriveClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            access_token: access_token.into(),
        }
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::blocking::Response> {
        Ok(self
            .http
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()?)
    }

    /// Document title via v3 `files.get`; "Untitled Document" when unnamed.
    pub fn document_title(&self, file_id: &str) -> Result<String> {
        let url = format!("{}/{}", DRIVE_V3_FILES_URL, file_id);
        let response = self.get(&url, &[("fields", "name")])?;
        if !response.status().is_success() {
            return Err(api_error(response));
        }
        let metadata: FileMetadata = response.json().map_err(|e| Error::Parse(e.to_string()))?;
        Ok(metadata
            .name
            .unwrap_or_else(|| "Untitled Document".to_string()))
    }

    /// All revisions of `file_id`, in API order, paginating until exhausted.
    /// The order is not changed here; it is typically chronological.
    pub fn list_revisions(&self, file_id: &str) -> Result<Vec<Revision>> {
        let url = format!("{}/{}/revisions", DRIVE_V2_FILES_URL, file_id);
        let page_size = PAGE_SIZE.to_string();

        let mut revisions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("maxResults", page_size.as_str())];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.as_str()));
            }

            let response = self.get(&url, &query)?;
            if !response.status().is_success() {
                return Err(api_error(response));
            }

            let page: RevisionList = response.json().map_err(|e| Error::Parse(e.to_string()))?;
            revisions.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(revisions)
    }

    /// Fetch one revision's plain-text export.
    ///
    /// Rate limiting (429) is retried with exponential backoff; any other
    /// non-success status fails immediately. Callers treat either failure as
    /// skip-and-continue.
    pub fn download_revision(&self, file_id: &str, revision: &Revision) -> Result<Vec<u8>> {
        let url = revision.export_url(file_id);
        let mut delay = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self.get(&url, &[])?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.bytes()?.to_vec());
            }

            if status.as_u16() == 429 && attempt < MAX_DOWNLOAD_ATTEMPTS {
                tracing::warn!(
                    "Rate limited on revision {}, retrying in {:?} (attempt {}/{})",
                    revision.id,
                    delay,
                    attempt,
                    MAX_DOWNLOAD_ATTEMPTS
                );
                std::thread::sleep(delay);
                delay *= 2;
                continue;
            }

            return Err(Error::Download {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
    }

    /// Current document content as plain text via v3 `files.export`.
    pub fn export_document(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}/export", DRIVE_V3_FILES_URL, file_id);
        let response = self.get(&url, &[("mimeType", EXPORT_MIME)])?;
        if !response.status().is_success() {
            return Err(api_error(response));
        }
        Ok(response.bytes()?.to_vec())
    }
}

fn api_error(response: reqwest::blocking::Response) -> Error {
    Error::Api {
        status: response.status().as_u16(),
        message: response.text().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_deserialization() {
        let json = r#"{
            "id": "1234",
            "modifiedDate": "2025-07-30T07:18:16.081Z",
            "exportLinks": {
                "text/plain": "https://docs.google.com/feeds/download/documents/export/Export?id=abc&revision=1234&exportFormat=txt"
            }
        }"#;
        let revision: Revision = serde_json::from_str(json).unwrap();
        assert_eq!(revision.id, "1234");
        assert_eq!(revision.modified_date, "2025-07-30T07:18:16.081Z");
        assert!(revision.export_links.contains_key(EXPORT_MIME));
    }

    #[test]
    fn test_export_url_prefers_listed_link() {
        let json = r#"{
            "id": "7",
            "modifiedDate": "2025-01-01T00:00:00.000Z",
            "exportLinks": { "text/plain": "https://example.com/listed" }
        }"#;
        let revision: Revision = serde_json::from_str(json).unwrap();
        assert_eq!(revision.export_url("doc-id"), "https://example.com/listed");
    }

    #[test]
    fn test_export_url_falls_back_to_template() {
        let json = r#"{ "id": "7", "modifiedDate": "2025-01-01T00:00:00.000Z" }"#;
        let revision: Revision = serde_json::from_str(json).unwrap();
        assert_eq!(
            revision.export_url("doc-id"),
            "https://docs.google.com/feeds/download/documents/export/Export?id=doc-id&revision=7&exportFormat=txt"
        );
    }

    #[test]
    fn test_revision_list_pagination_token() {
        let json = r#"{
            "items": [
                { "id": "1", "modifiedDate": "2025-01-01T00:00:00.000Z" },
                { "id": "2", "modifiedDate": "2025-01-02T00:00:00.000Z" }
            ],
            "nextPageToken": "page-2"
        }"#;
        let list: RevisionList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.next_page_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn test_revision_list_empty_body() {
        // A document with no revisions answers without an "items" field.
        let list: RevisionList = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_empty());
        assert!(list.next_page_token.is_none());
    }

    #[test]
    fn test_file_metadata_without_name() {
        let metadata: FileMetadata = serde_json::from_str("{}").unwrap();
        assert!(metadata.name.is_none());
    }

    // Endpoint behavior (status mapping, retry) is exercised against the
    // real API; no mock HTTP server here.
}
