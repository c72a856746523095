//! Run configuration.

use eyre::Context;
use std::path::PathBuf;

/// Name used for the token cache file and in default video descriptions.
pub const APP_NAME: &str = "recordings-uploader";

/// Full Drive access, needed to download recordings and re-parent them.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
/// Needed to upload videos.
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";
/// Needed to search the channel's existing videos.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// Privacy setting applied to newly uploaded videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    /// Only visible to the channel owner.
    #[default]
    Private,
    /// Visible to anyone with the link, but not listed on the channel or in search.
    Unlisted,
    Public,
}

/// Base URLs of the Google APIs the uploader talks to.
///
/// These only differ from [`Endpoints::default`] when pointing the uploader at a stand-in
/// server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Drive v3, e.g. `https://www.googleapis.com/drive/v3`.
    pub drive: String,
    /// YouTube Data v3 for everything but uploads.
    pub youtube: String,
    /// YouTube Data v3 media uploads.
    pub youtube_upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            drive: "https://www.googleapis.com/drive/v3".to_string(),
            youtube: "https://www.googleapis.com/youtube/v3".to_string(),
            youtube_upload: "https://www.googleapis.com/upload/youtube/v3".to_string(),
        }
    }
}

impl Endpoints {
    /// Lays out all APIs under a single base URL, using the same paths Google does.
    pub fn under(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            drive: format!("{base}/drive/v3"),
            youtube: format!("{base}/youtube/v3"),
            youtube_upload: format!("{base}/upload/youtube/v3"),
        }
    }
}

/// Everything a single synchronization run needs to know.
#[derive(Debug, Clone)]
pub struct Config {
    /// Drive folder that new recordings are picked up from.
    pub source_folder_id: String,
    /// Drive folder recordings are moved to once uploaded.
    pub archive_folder_id: String,
    /// Channel that recordings are published to.
    pub channel_id: String,
    /// Tags attached to every uploaded video. May be empty.
    pub upload_tags: Vec<String>,
    /// Description given to every uploaded video.
    pub upload_description: String,
    /// Privacy of newly uploaded videos.
    ///
    /// Channel searches only return public videos, so recordings uploaded as private or
    /// unlisted are not recognized as published if their archive move fails.
    pub privacy_status: PrivacyStatus,
    /// Google OAuth client descriptor (`credentials.json`).
    pub credentials_path: PathBuf,
    /// Where the user's access and refresh tokens are kept between runs.
    pub token_cache_path: PathBuf,
    /// OAuth scopes to request when authorizing for the first time.
    ///
    /// If these change, the cached token must be deleted so that a new one is issued.
    pub scopes: Vec<String>,
    /// List and reconcile only; upload and move nothing.
    pub dry_run: bool,
    /// Where the Google APIs live.
    pub endpoints: Endpoints,
}

impl Config {
    /// Creates a configuration for the given folders and channel with every other option at
    /// its default.
    ///
    /// # Errors
    ///
    /// Fails if the default token cache location cannot be determined because the user has no
    /// home directory. Use [`Config::with_token_cache`] to avoid the lookup.
    pub fn new(
        source_folder_id: impl Into<String>,
        archive_folder_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> eyre::Result<Self> {
        Ok(Self::with_token_cache(
            source_folder_id,
            archive_folder_id,
            channel_id,
            default_token_cache_path()?,
        ))
    }

    /// Like [`Config::new`], but keeps the OAuth token in `token_cache_path`.
    pub fn with_token_cache(
        source_folder_id: impl Into<String>,
        archive_folder_id: impl Into<String>,
        channel_id: impl Into<String>,
        token_cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_folder_id: source_folder_id.into(),
            archive_folder_id: archive_folder_id.into(),
            channel_id: channel_id.into(),
            upload_tags: Vec::new(),
            upload_description: default_description(),
            privacy_status: PrivacyStatus::default(),
            credentials_path: PathBuf::from("credentials.json"),
            token_cache_path: token_cache_path.into(),
            scopes: default_scopes(),
            dry_run: false,
            endpoints: Endpoints::default(),
        }
    }
}

/// `Recorded with recordings-uploader`
pub fn default_description() -> String {
    format!("Recorded with {APP_NAME}")
}

/// The scopes needed to list, download, and move Drive files and to list and upload videos.
pub fn default_scopes() -> Vec<String> {
    [DRIVE_SCOPE, YOUTUBE_UPLOAD_SCOPE, YOUTUBE_SCOPE]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `<home>/.config/recordings-uploader.json`
pub fn default_token_cache_path() -> eyre::Result<PathBuf> {
    token_cache_path_in(dirs::home_dir())
}

fn token_cache_path_in(home: Option<PathBuf>) -> eyre::Result<PathBuf> {
    let home = home
        .ok_or_else(|| eyre::eyre!("no home directory"))
        .context("locate token cache")?;
    Ok(home.join(".config").join(format!("{APP_NAME}.json")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_under_base() {
        let e = Endpoints::under("http://127.0.0.1:8080/");
        assert_eq!(e.drive, "http://127.0.0.1:8080/drive/v3");
        assert_eq!(e.youtube, "http://127.0.0.1:8080/youtube/v3");
        assert_eq!(e.youtube_upload, "http://127.0.0.1:8080/upload/youtube/v3");
    }

    #[test]
    fn privacy_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PrivacyStatus::Unlisted).unwrap(),
            "\"unlisted\""
        );
        assert_eq!(PrivacyStatus::default(), PrivacyStatus::Private);
    }

    #[test]
    fn token_cache_under_home() {
        assert_eq!(
            token_cache_path_in(Some(PathBuf::from("/home/ops"))).unwrap(),
            PathBuf::from("/home/ops/.config/recordings-uploader.json")
        );
        assert!(token_cache_path_in(None).is_err());
    }

    #[test]
    fn explicit_token_cache() {
        let config = Config::with_token_cache("src", "arc", "UC1", "/var/lib/uploader/token.json");
        assert_eq!(
            config.token_cache_path,
            PathBuf::from("/var/lib/uploader/token.json")
        );
        assert_eq!(config.privacy_status, PrivacyStatus::Private);
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
    }
}
