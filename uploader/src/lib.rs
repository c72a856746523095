//! Publishes recordings from a Google Drive folder to a YouTube channel.
//!
//! Each run lists the recordings waiting in the source folder and the videos already on the
//! channel, and uploads every recording whose file name is not yet a video title. Recordings
//! are moved to the archive folder once uploaded. The run stops at the first error, and
//! running again picks up with whatever is still in the source folder.

use crate::google_api::GoogleClient;
use crate::publish::Publisher;
use crate::reconcile::{RemoteFile, existing_titles, reconcile};
use eyre::Context;

pub mod config;
pub mod credentials;
pub mod google_api;
pub mod oauth;
pub mod publish;
pub mod reconcile;

pub use config::Config;
pub use oauth::AuthorizationCodeSource;

/// What a run found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of files in the source folder.
    pub listed_files: usize,
    /// Number of videos already on the channel.
    pub existing_videos: usize,
    /// Files that had no video with a matching title, in listing order.
    pub pending: Vec<RemoteFile>,
    /// Uploaded files along with the id of the video each became.
    pub published: Vec<(RemoteFile, String)>,
}

/// Authorizes against Google and publishes everything pending.
pub async fn run(
    config: &Config,
    code_source: &AuthorizationCodeSource,
) -> eyre::Result<RunSummary> {
    let client = credentials::obtain_client(config, code_source)
        .await
        .context("set up Google API client")?;
    sync(&client, config).await
}

/// Publishes every recording in the source folder that is not on the channel yet.
///
/// Listings and progress are printed to standard output.
pub async fn sync(client: &GoogleClient, config: &Config) -> eyre::Result<RunSummary> {
    let files = client
        .list_files(&config.source_folder_id)
        .await
        .context("list recordings")?;
    println!("Files in {}:", config.source_folder_id);
    for file in &files {
        println!("{} {}", file.id, file.name);
    }

    let videos = client
        .list_channel_videos(&config.channel_id)
        .await
        .context("list channel videos")?;
    println!("Videos on {}:", config.channel_id);
    for video in &videos {
        println!("{} {}", video.id, video.title);
    }

    let mut summary = RunSummary {
        listed_files: files.len(),
        existing_videos: videos.len(),
        ..Default::default()
    };

    summary.pending = reconcile(files, &existing_titles(&videos));
    println!("{} files to be uploaded:", summary.pending.len());
    for file in &summary.pending {
        println!("{} {}", file.id, file.name);
    }

    if config.dry_run {
        tracing::info!("dry run, not uploading anything");
        return Ok(summary);
    }

    let publisher = Publisher::new(client, config);
    for file in &summary.pending {
        println!("Uploading {}", file.name);
        let video = publisher.publish(file).await?;
        println!("Published {} as {}", file.name, video.id);
        summary.published.push((file.clone(), video.id));
    }

    Ok(summary)
}
