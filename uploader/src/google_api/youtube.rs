//! YouTube Data API v3 types and calls.

use crate::config::PrivacyStatus;
use crate::google_api::client::GoogleClient;
use crate::google_api::drive::ContentStream;
use crate::google_api::types::{Page, paged};
use crate::reconcile::RemoteVideo;
use eyre::Context;
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio_stream::{Stream, StreamExt};
use tracing::instrument;

/// The largest page `search.list` will return.
const MAX_SEARCH_RESULTS: u32 = 50;

/// Response structure for the `search.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/search/list>
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    #[serde(default)]
    items: VecDeque<SearchResult>,
    next_page_token: Option<String>,
}

/// A search result pointing at a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/search#resource>
#[derive(Debug, Deserialize)]
struct SearchResult {
    id: SearchResultId,
    snippet: SearchResultSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultId {
    /// Only set for results of kind `youtube#video`, which is all we ask for.
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResultSnippet {
    title: String,
}

/// Metadata for a video being uploaded.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInsert {
    pub snippet: VideoInsertSnippet,
    pub status: VideoInsertStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInsertSnippet {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInsertStatus {
    pub privacy_status: PrivacyStatus,
}

/// The part of the `video` resource returned by an upload that we care about.
#[derive(Debug, Deserialize)]
pub struct UploadedVideo {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
}

impl GoogleClient {
    /// Returns a paginated stream of the videos on a channel.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly` (or broader)
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/search/list>
    #[instrument(skip(self))]
    pub fn list_channel<'a>(
        &'a self,
        channel_id: &'a str,
    ) -> impl Stream<Item = eyre::Result<RemoteVideo>> + 'a {
        paged(move |page_token| async move {
            let response = self
                .search_videos_internal(channel_id, MAX_SEARCH_RESULTS, page_token)
                .await?;
            let items = response
                .items
                .into_iter()
                .filter_map(|result| {
                    Some(RemoteVideo {
                        id: result.id.video_id?,
                        title: result.snippet.title,
                    })
                })
                .collect();
            Ok::<_, eyre::Report>(Page {
                items,
                next_page_token: response.next_page_token,
            })
        })
    }

    /// Collects every video on `channel_id`.
    pub async fn list_channel_videos(&self, channel_id: &str) -> eyre::Result<Vec<RemoteVideo>> {
        let mut videos = Vec::new();
        let mut stream = std::pin::pin!(self.list_channel(channel_id));
        while let Some(video) = stream.next().await {
            videos.push(video.context("fetch video")?);
        }
        Ok(videos)
    }

    /// Uploads a new video using a resumable upload session.
    ///
    /// The session is opened with the video's metadata, after which `content` is streamed
    /// to it in a single request. `content_length` is passed along when known.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.upload`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/guides/using_resumable_upload_protocol>
    #[instrument(skip(self, content), fields(title = %video.snippet.title))]
    pub async fn insert_video(
        &self,
        video: &VideoInsert,
        content: ContentStream,
        content_length: Option<u64>,
    ) -> eyre::Result<UploadedVideo> {
        let url = format!("{}/videos", self.endpoints().youtube_upload);
        let query_params = [("uploadType", "resumable"), ("part", "snippet,status")];

        let session = self
            .send_authenticated(Method::POST, &url, |mut request| {
                request = request
                    .query(&query_params)
                    .header("X-Upload-Content-Type", "video/*")
                    .json(video);
                if let Some(len) = content_length {
                    request = request.header("X-Upload-Content-Length", len);
                }
                request
            })
            .await
            .context("open upload session")?;

        let Some(location) = session.headers().get(http::header::LOCATION) else {
            eyre::bail!("upload session response carries no Location header");
        };
        let location = location
            .to_str()
            .context("upload session location is not valid UTF-8")?
            .to_string();
        tracing::debug!(session = %location, "opened upload session");

        let response = self
            .send_authenticated(Method::PUT, &location, |mut request| {
                request = request.header(http::header::CONTENT_TYPE, "video/*");
                if let Some(len) = content_length {
                    request = request.header(http::header::CONTENT_LENGTH, len);
                }
                request.body(reqwest::Body::wrap_stream(content))
            })
            .await
            .context("upload video content")?;

        let uploaded: UploadedVideo = response
            .json()
            .await
            .context("parse YouTube videos.insert response as JSON")?;

        tracing::debug!(video_id = uploaded.id, "uploaded video");
        Ok(uploaded)
    }

    async fn search_videos_internal(
        &self,
        channel_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<SearchListResponse> {
        let url = format!("{}/search", self.endpoints().youtube);
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "id,snippet"),
            ("channelId", channel_id),
            ("type", "video"),
            ("maxResults", max_results_string.as_str()),
        ];

        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await?;

        let results: SearchListResponse = response
            .json()
            .await
            .context("parse YouTube search API response as JSON")?;

        tracing::debug!(
            channel_id,
            returned_items = results.items.len(),
            more = results.next_page_token.is_some(),
            "fetched channel videos"
        );

        Ok(results)
    }
}
