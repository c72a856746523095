//! Client for the slices of the Google Drive v3 and YouTube Data v3 APIs the uploader needs.
//!
//! Both APIs are reached through one [`GoogleClient`], which owns the OAuth token, refreshes it
//! when it goes stale, and writes refreshed tokens back to the on-disk cache.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use recordings_uploader::config::Config;
//! use recordings_uploader::credentials::obtain_client;
//! use recordings_uploader::oauth::AuthorizationCodeSource;
//!
//! # async fn example() -> eyre::Result<()> {
//! let config = Config::new("source-folder", "archive-folder", "UC123")?;
//! let client = obtain_client(&config, &AuthorizationCodeSource::Prompt).await?;
//!
//! for file in client.list_files(&config.source_folder_id).await? {
//!     println!("{} ({} bytes)", file.name, file.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod drive;
pub mod types;
pub mod youtube;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{GoogleClient, TimeBoundAccessToken};
pub use drive::ContentStream;
pub use types::{Page, paged};
pub use youtube::{UploadedVideo, VideoInsert, VideoInsertSnippet, VideoInsertStatus};
