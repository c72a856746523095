//! Google Drive v3 types and calls.

use crate::google_api::client::GoogleClient;
use crate::google_api::types::{Page, paged};
use crate::reconcile::RemoteFile;
use bytes::Bytes;
use eyre::Context;
use http::Method;
use serde::Deserialize;
use std::collections::VecDeque;
use tokio_stream::{Stream, StreamExt};
use tracing::instrument;

/// Drive's maximum page size for `files.list`.
const MAX_PAGE_SIZE: u32 = 1000;

/// Response structure for the `files.list` API call, restricted to the requested fields.
///
/// See: <https://developers.google.com/drive/api/reference/rest/v3/files/list>
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: VecDeque<DriveFile>,
    next_page_token: Option<String>,
}

/// A `file` resource with only `id`, `name`, and `size` requested.
#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
    /// Drive encodes int64 values as decimal strings.
    size: Option<String>,
}

impl DriveFile {
    fn into_remote_file(self) -> eyre::Result<RemoteFile> {
        let size = match self.size {
            Some(size) => size
                .parse()
                .with_context(|| format!("parse size {size:?} of file {}", self.id))?,
            None => 0,
        };
        Ok(RemoteFile {
            id: self.id,
            name: self.name,
            size,
        })
    }
}

/// Raw content of a Drive file, as it arrives.
pub type ContentStream = std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

impl GoogleClient {
    /// Returns a paginated stream of all files whose parent is `folder_id`.
    ///
    /// Files from shared drives are included.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/drive/api/reference/rest/v3/files/list>
    #[instrument(skip(self))]
    pub fn list_folder<'a>(
        &'a self,
        folder_id: &'a str,
    ) -> impl Stream<Item = eyre::Result<RemoteFile>> + 'a {
        paged(move |page_token| async move {
            let page = self
                .list_files_internal(folder_id, MAX_PAGE_SIZE, page_token)
                .await?;
            Ok::<_, eyre::Report>(Page {
                items: page
                    .files
                    .into_iter()
                    .map(DriveFile::into_remote_file)
                    .collect::<eyre::Result<_>>()?,
                next_page_token: page.next_page_token,
            })
        })
    }

    /// Collects every file in `folder_id`, in the order Drive lists them.
    pub async fn list_files(&self, folder_id: &str) -> eyre::Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut stream = std::pin::pin!(self.list_folder(folder_id));
        while let Some(file) = stream.next().await {
            files.push(file.context("fetch file")?);
        }
        Ok(files)
    }

    /// Streams the content of a file.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/drive/api/guides/manage-downloads>
    #[instrument(skip(self))]
    pub async fn download_file(&self, file_id: &str) -> eyre::Result<ContentStream> {
        let url = format!("{}/files/{}", self.endpoints().drive, file_id);
        let query_params = [("alt", "media"), ("supportsAllDrives", "true")];

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await
            .context("start file download")?;

        Ok(Box::pin(response.bytes_stream()))
    }

    /// Moves a file from one parent folder to another.
    ///
    /// Works across shared drives.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/drive/api/reference/rest/v3/files/update>
    #[instrument(skip(self))]
    pub async fn move_file(&self, file_id: &str, from_folder: &str, to_folder: &str) -> eyre::Result<()> {
        let url = format!("{}/files/{}", self.endpoints().drive, file_id);
        let query_params = [
            ("addParents", to_folder),
            ("removeParents", from_folder),
            ("supportsAllDrives", "true"),
            ("fields", "id,parents"),
        ];

        self.make_authenticated_request(
            Method::PATCH,
            &url,
            Some(&query_params),
            Some(&serde_json::json!({})),
        )
        .await?;

        tracing::debug!(file_id, to_folder, "moved file");
        Ok(())
    }

    async fn list_files_internal(
        &self,
        folder_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> eyre::Result<FileList> {
        let url = format!("{}/files", self.endpoints().drive);
        let q = format!("'{}' in parents", escape_query_literal(folder_id));
        let page_size = page_size.to_string();
        let mut query_params = vec![
            ("q", q.as_str()),
            ("corpora", "allDrives"),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
            ("fields", "nextPageToken,files(id,name,size)"),
            ("pageSize", page_size.as_str()),
        ];

        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await?;

        let files: FileList = response
            .json()
            .await
            .context("parse Drive files API response as JSON")?;

        tracing::debug!(
            folder_id,
            returned_items = files.files.len(),
            more = files.next_page_token.is_some(),
            "fetched files"
        );

        Ok(files)
    }
}

/// Escapes a value for use inside a single-quoted Drive query string.
fn escape_query_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
