use clap::{Parser, ValueEnum};
use recordings_uploader::config::{Config, PrivacyStatus, default_description};
use recordings_uploader::{AuthorizationCodeSource, run};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recordings-uploader", version)]
#[command(about = "Publish recordings from a Google Drive folder to a YouTube channel")]
struct Args {
    /// Drive folder to pick recordings up from
    #[arg(long, env = "RECORDINGS_UPLOADER_SOURCE_FOLDER", value_name = "FOLDER_ID")]
    source_folder: String,

    /// Drive folder to move recordings to once published
    #[arg(long, env = "RECORDINGS_UPLOADER_ARCHIVE_FOLDER", value_name = "FOLDER_ID")]
    archive_folder: String,

    /// YouTube channel to publish to
    #[arg(long, env = "RECORDINGS_UPLOADER_CHANNEL", value_name = "CHANNEL_ID")]
    channel: String,

    /// Tag for every uploaded video (repeatable, or comma-separated)
    #[arg(
        long = "tag",
        env = "RECORDINGS_UPLOADER_TAGS",
        value_name = "TAG",
        value_delimiter = ','
    )]
    tags: Vec<String>,

    /// Description for every uploaded video
    #[arg(long, env = "RECORDINGS_UPLOADER_DESCRIPTION", default_value_t = default_description())]
    description: String,

    #[arg(long, env = "RECORDINGS_UPLOADER_PRIVACY", value_enum, default_value_t = PrivacyStatus::Private)]
    privacy: PrivacyStatus,

    /// Google OAuth client descriptor
    #[arg(
        long,
        env = "RECORDINGS_UPLOADER_CREDENTIALS",
        default_value = "credentials.json"
    )]
    credentials: PathBuf,

    /// Where to cache the OAuth token [default: ~/.config/recordings-uploader.json]
    #[arg(long, env = "RECORDINGS_UPLOADER_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,

    /// How to obtain an authorization code when no token is cached
    #[arg(long, env = "RECORDINGS_UPLOADER_AUTH_FLOW", value_enum, default_value_t = AuthFlow::Prompt)]
    auth_flow: AuthFlow,

    /// Authorization code obtained out of band; overrides --auth-flow
    #[arg(long, env = "RECORDINGS_UPLOADER_AUTH_CODE", hide_env_values = true)]
    auth_code: Option<String>,

    /// Only list what would be uploaded
    #[arg(long, env = "RECORDINGS_UPLOADER_DRY_RUN")]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AuthFlow {
    /// Print the authorization URL and read the code from standard input
    Prompt,
    /// Open a browser and catch the redirect on a local port
    Browser,
}

impl Args {
    fn into_parts(self) -> eyre::Result<(Config, AuthorizationCodeSource)> {
        let code_source = match (self.auth_code, self.auth_flow) {
            (Some(code), _) => AuthorizationCodeSource::Preset(code),
            (None, AuthFlow::Prompt) => AuthorizationCodeSource::Prompt,
            (None, AuthFlow::Browser) => AuthorizationCodeSource::Loopback,
        };

        // Only look for a home directory when there is no explicit cache location.
        let mut config = match self.token_cache {
            Some(path) => Config::with_token_cache(
                self.source_folder,
                self.archive_folder,
                self.channel,
                path,
            ),
            None => Config::new(self.source_folder, self.archive_folder, self.channel)?,
        };
        config.upload_tags = self
            .tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        config.upload_description = self.description;
        config.privacy_status = self.privacy;
        config.credentials_path = self.credentials;
        config.dry_run = self.dry_run;

        Ok((config, code_source))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let (config, code_source) = Args::parse().into_parts()?;
    let summary = run(&config, &code_source).await?;

    tracing::info!(
        listed_files = summary.listed_files,
        existing_videos = summary.existing_videos,
        pending = summary.pending.len(),
        published = summary.published.len(),
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> (Config, AuthorizationCodeSource) {
        let mut argv = vec![
            "recordings-uploader",
            "--source-folder",
            "src",
            "--archive-folder",
            "arc",
            "--channel",
            "UC1",
        ];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap().into_parts().unwrap()
    }

    #[test]
    fn defaults() {
        let (config, code_source) = parse(&[]);
        assert_eq!(config.source_folder_id, "src");
        assert_eq!(config.archive_folder_id, "arc");
        assert_eq!(config.channel_id, "UC1");
        assert!(config.upload_tags.is_empty());
        assert_eq!(config.upload_description, "Recorded with recordings-uploader");
        assert_eq!(config.privacy_status, PrivacyStatus::Private);
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert!(!config.dry_run);
        assert_eq!(code_source, AuthorizationCodeSource::Prompt);
    }

    #[test]
    fn tags_repeat_and_split() {
        let (config, _) = parse(&["--tag", "a,b", "--tag", "c"]);
        assert_eq!(config.upload_tags, ["a", "b", "c"]);
    }

    #[test]
    fn auth_code_wins_over_flow() {
        let (_, code_source) = parse(&["--auth-flow", "browser", "--auth-code", "xyz"]);
        assert_eq!(code_source, AuthorizationCodeSource::Preset("xyz".into()));
        let (_, code_source) = parse(&["--auth-flow", "browser"]);
        assert_eq!(code_source, AuthorizationCodeSource::Loopback);
    }

    #[test]
    fn overrides() {
        let (config, _) = parse(&[
            "--privacy",
            "unlisted",
            "--description",
            "Weekly sync",
            "--token-cache",
            "/tmp/token.json",
            "--dry-run",
        ]);
        assert_eq!(config.privacy_status, PrivacyStatus::Unlisted);
        assert_eq!(config.upload_description, "Weekly sync");
        assert_eq!(config.token_cache_path, PathBuf::from("/tmp/token.json"));
        assert!(config.dry_run);
    }

    #[test]
    fn folder_and_channel_are_required() {
        assert!(Args::try_parse_from(["recordings-uploader", "--channel", "UC1"]).is_err());
    }
}
