//! Turning a recording into a video.

use crate::config::Config;
use crate::google_api::GoogleClient;
use crate::google_api::youtube::{
    UploadedVideo, VideoInsert, VideoInsertSnippet, VideoInsertStatus,
};
use crate::reconcile::RemoteFile;
use eyre::Context;
use tracing::instrument;

/// Uploads recordings to the channel and archives them afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Publisher<'a> {
    client: &'a GoogleClient,
    config: &'a Config,
}

impl<'a> Publisher<'a> {
    /// Creates a publisher that uses `client` and takes the folders, channel, and video
    /// metadata from `config`.
    pub fn new(client: &'a GoogleClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// The metadata the video for `file` is created with.
    pub fn metadata(&self, file: &RemoteFile) -> VideoInsert {
        VideoInsert {
            snippet: VideoInsertSnippet {
                title: file.name.clone(),
                description: self.config.upload_description.clone(),
                tags: self.config.upload_tags.clone(),
                channel_id: self.config.channel_id.clone(),
            },
            status: VideoInsertStatus {
                privacy_status: self.config.privacy_status,
            },
        }
    }

    /// Uploads `file`'s content as a new video, then moves `file` to the archive folder.
    ///
    /// The move only happens once the upload has succeeded. If the move fails, the video has
    /// already been uploaded but the file stays in the source folder. A later run only skips
    /// it if the channel listing shows the video, which channel searches do for public videos
    /// only; private and unlisted uploads are uploaded again.
    ///
    /// # Errors
    ///
    /// Returns the first failure among download, upload, and move, with context naming the
    /// step and the file. Nothing is retried.
    #[instrument(skip(self, file), fields(file_id = %file.id, name = %file.name))]
    pub async fn publish(&self, file: &RemoteFile) -> eyre::Result<UploadedVideo> {
        let content = self
            .client
            .download_file(&file.id)
            .await
            .with_context(|| format!("download {}", file.name))?;

        // Drive reports 0 for files it knows no size for.
        let content_length = (file.size > 0).then_some(file.size);
        let video = self
            .client
            .insert_video(&self.metadata(file), content, content_length)
            .await
            .with_context(|| format!("upload {}", file.name))?;
        tracing::info!(video_id = video.id, "uploaded recording");

        self.client
            .move_file(
                &file.id,
                &self.config.source_folder_id,
                &self.config.archive_folder_id,
            )
            .await
            .with_context(|| format!("archive {}", file.name))?;
        tracing::info!("archived recording");

        Ok(video)
    }
}
