//! Deciding which recordings still need to be published.
//!
//! A recording is considered published when the channel already has a video whose title is
//! exactly the recording's file name. Nothing is normalized: case, whitespace, and file
//! extensions all take part in the comparison.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A file sitting in the storage folder that recordings are picked up from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Drive's identifier for the file.
    pub id: String,
    /// The file name, which doubles as the title of the video it becomes.
    pub name: String,
    /// Size of the file content in bytes.
    ///
    /// Drive only reports sizes for files with binary content, so this is 0 for anything else.
    pub size: u64,
}

/// A file with no video of the same title yet, still to be published this run.
pub type PendingUpload = RemoteFile;

/// A video that is already on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVideo {
    /// YouTube's identifier for the video.
    pub id: String,
    /// Compared against [`RemoteFile::name`] as-is.
    pub title: String,
}

/// Collects the titles of the given videos for use with [`reconcile`].
pub fn existing_titles<'a>(videos: impl IntoIterator<Item = &'a RemoteVideo>) -> HashSet<String> {
    videos.into_iter().map(|v| v.title.clone()).collect()
}

/// Returns the files that have no video with a matching title, in listing order.
///
/// # Arguments
///
/// * `files` - The contents of the source folder, in the order they were listed
/// * `existing_titles` - Titles of the videos already on the channel, see [`existing_titles`]
///
/// Files are checked independently, so two files with the same name are either both kept or
/// both dropped.
pub fn reconcile(
    files: impl IntoIterator<Item = RemoteFile>,
    existing_titles: &HashSet<String>,
) -> Vec<PendingUpload> {
    files
        .into_iter()
        .filter(|f| !existing_titles.contains(f.name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file(id: &str, name: &str) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            size: 0,
        }
    }

    fn titles(ts: &[&str]) -> HashSet<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn no_files_means_nothing_to_do() {
        assert!(reconcile(Vec::<RemoteFile>::new(), &titles(&[])).is_empty());
        assert!(reconcile(Vec::<RemoteFile>::new(), &titles(&["a", "b"])).is_empty());
    }

    #[test]
    fn empty_channel_keeps_everything() {
        let files = vec![file("1", "a"), file("2", "b"), file("3", "c")];
        assert_eq!(reconcile(files.clone(), &titles(&[])), files);
    }

    #[test]
    fn drops_published() {
        let files = vec![file("1", "a"), file("2", "b")];
        assert_eq!(reconcile(files, &titles(&["b"])), vec![file("1", "a")]);
    }

    #[test]
    fn single_published_file() {
        assert!(reconcile(vec![file("1", "a")], &titles(&["a"])).is_empty());
    }

    #[test]
    fn duplicate_names_are_judged_together() {
        let files = vec![file("1", "x"), file("2", "x")];
        assert_eq!(reconcile(files.clone(), &titles(&[])), files);
        assert!(reconcile(files, &titles(&["x"])).is_empty());
    }

    #[test]
    fn matching_is_exact() {
        let files = vec![
            file("1", "Talk.mp4"),
            file("2", "talk.mp4"),
            file("3", " talk.mp4"),
            file("4", "talk"),
        ];
        let kept = reconcile(files, &titles(&["talk.mp4"]));
        let ids: Vec<_> = kept.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["1", "3", "4"]);
    }

    #[test]
    fn keeps_listing_order() {
        let files = vec![
            file("5", "e"),
            file("1", "a"),
            file("4", "d"),
            file("2", "b"),
            file("3", "c"),
        ];
        let kept = reconcile(files, &titles(&["a", "c"]));
        let ids: Vec<_> = kept.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["5", "4", "2"]);
    }

    #[test]
    fn titles_from_videos() {
        let videos = [
            RemoteVideo {
                id: "v1".into(),
                title: "a".into(),
            },
            RemoteVideo {
                id: "v2".into(),
                title: "b".into(),
            },
            RemoteVideo {
                id: "v3".into(),
                title: "a".into(),
            },
        ];
        assert_eq!(existing_titles(&videos), titles(&["a", "b"]));
    }
}
