use crate::{Error, Result};
use std::ffi::OsString;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

const TEMP_FILE_PREFIX: &str = ".ytaudio-tagging-";

#[derive(Clone, Debug, PartialEq)]
pub struct Tags {
    pub artist: String,
    pub title: String,
    pub album: String,
}

impl Tags {
    /// Videos have no album, so the channel name is used for both artist and
    /// album.
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        let author = author.into();
        Self {
            artist: author.clone(),
            title: title.into(),
            album: author,
        }
    }
    fn as_metadata_args(&self) -> Vec<OsString> {
        [
            ("artist", &self.artist),
            ("title", &self.title),
            ("album", &self.album),
        ]
        .into_iter()
        .flat_map(|(key, value)| {
            [
                OsString::from("-metadata"),
                OsString::from(format!("{key}={value}")),
            ]
        })
        .collect()
    }
}

/// Writes artist, title and album tags into an existing audio file in place.
pub trait TagWriter {
    fn write_tags(&self, path: &Path, tags: &Tags) -> impl Future<Output = Result<()>> + Send;
}

/// Tag writer that remuxes the file through the encoder with new ID3 tags,
/// then replaces the original.
#[derive(Clone, Debug)]
pub struct EncoderTagWriter {
    program: PathBuf,
}

impl EncoderTagWriter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
    fn tag_args(&self, source: &Path, tags: &Tags, destination: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-loglevel".into(),
            "8".into(),
            "-hide_banner".into(),
            "-y".into(),
            "-i".into(),
            source.into(),
            "-map".into(),
            "0".into(),
            "-codec".into(),
            "copy".into(),
            "-id3v2_version".into(),
            "3".into(),
        ];
        args.extend(tags.as_metadata_args());
        args.push(destination.into());
        args
    }
}

/// Sibling of `path` that keeps its extension, so the encoder picks the same
/// container.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{TEMP_FILE_PREFIX}{file_name}"))
}

/// Removes the temporary tagging output when dropped, including when the
/// write is abandoned part way through.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        match fs_err::remove_file(&self.0) {
            Ok(()) => debug!("Removed temporary file {}", self.0.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => warn!("Unable to remove temporary file <{e}>"),
        }
    }
}

impl TagWriter for EncoderTagWriter {
    async fn write_tags(&self, path: &Path, tags: &Tags) -> Result<()> {
        // Declared before the child so that the child is killed first on drop.
        let temp_file = TempFile(temp_path_for(path));
        debug!("Writing tags {tags:?} to {}", path.display());
        let mut child = Command::new(&self.program)
            .args(self.tag_args(path, tags, &temp_file.0))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::new_metadata_write_error(path, e))?;
        let status = child
            .wait()
            .await
            .map_err(|e| Error::new_metadata_write_error(path, e))?;
        if !status.success() {
            return Err(Error::new_metadata_write_error(
                path,
                format!("tagging process exited with {status}"),
            ));
        }
        fs_err::tokio::rename(&temp_file.0, path)
            .await
            .map_err(|e| Error::new_metadata_write_error(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tags_use_author_for_album() {
        let tags = Tags::new("Example Artist", "Example Song");
        assert_eq!(
            tags,
            Tags {
                artist: "Example Artist".to_string(),
                title: "Example Song".to_string(),
                album: "Example Artist".to_string(),
            }
        );
    }
    #[test]
    fn test_tag_args() {
        let writer = EncoderTagWriter::new("ffmpeg");
        let tags = Tags::new("Artist", "Song = Title");
        let args = writer.tag_args(Path::new("in.mp3"), &tags, Path::new("tmp.mp3"));
        let args = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(
            args,
            vec![
                "-loglevel",
                "8",
                "-hide_banner",
                "-y",
                "-i",
                "in.mp3",
                "-map",
                "0",
                "-codec",
                "copy",
                "-id3v2_version",
                "3",
                "-metadata",
                "artist=Artist",
                "-metadata",
                "title=Song = Title",
                "-metadata",
                "album=Artist",
                "tmp.mp3",
            ]
        );
    }
    #[test]
    fn test_temp_path_keeps_extension() {
        assert_eq!(
            temp_path_for(Path::new("out/Song.mp3")),
            PathBuf::from("out/.ytaudio-tagging-Song.mp3")
        );
    }
    #[tokio::test]
    async fn test_missing_tagger_reports_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Song.mp3");
        tokio::fs::write(&path, b"audio").await.unwrap();
        let writer = EncoderTagWriter::new("/definitely/not/an/encoder");
        let res = writer.write_tags(&path, &Tags::new("Artist", "Song")).await;
        assert!(matches!(res, Err(Error::MetadataWrite { .. })));
        // Encoded audio is left in place, untagged.
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"audio");
    }
    #[cfg(unix)]
    mod tagger_process {
        use super::*;
        use pretty_assertions::assert_eq;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::OnceLock;

        // Stand-in taggers write to the last argument, the temporary file.
        const TAGGER: &str = "#!/bin/sh\nfor last; do :; done\nprintf 'tagged audio' > \"$last\"\n";
        const FAILING_TAGGER: &str =
            "#!/bin/sh\nfor last; do :; done\nprintf 'half' > \"$last\"\nexit 1\n";

        /// Written once, before any test in this module runs a tagger.
        fn taggers() -> &'static (PathBuf, PathBuf) {
            static TAGGERS: OnceLock<(PathBuf, PathBuf)> = OnceLock::new();
            TAGGERS.get_or_init(|| {
                let dir =
                    std::env::temp_dir().join(format!("ytaudio-tagger-{}", std::process::id()));
                std::fs::create_dir_all(&dir).unwrap();
                let write = |name: &str, contents: &str| {
                    let path = dir.join(name);
                    std::fs::write(&path, contents).unwrap();
                    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                        .unwrap();
                    path
                };
                (
                    write("tagger.sh", TAGGER),
                    write("failing_tagger.sh", FAILING_TAGGER),
                )
            })
        }
        fn dir_entries(dir: &Path) -> Vec<String> {
            let mut entries = std::fs::read_dir(dir)
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            entries.sort();
            entries
        }

        #[tokio::test]
        async fn test_tagged_file_replaces_original() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("Song.mp3");
            tokio::fs::write(&path, b"audio").await.unwrap();
            let writer = EncoderTagWriter::new(&taggers().0);
            writer
                .write_tags(&path, &Tags::new("Artist", "Song"))
                .await
                .unwrap();
            assert_eq!(tokio::fs::read(&path).await.unwrap(), b"tagged audio");
            assert_eq!(dir_entries(dir.path()), vec!["Song.mp3"]);
        }
        #[tokio::test]
        async fn test_failed_tagger_keeps_original_and_removes_temp_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("Song.mp3");
            tokio::fs::write(&path, b"audio").await.unwrap();
            let writer = EncoderTagWriter::new(&taggers().1);
            let res = writer.write_tags(&path, &Tags::new("Artist", "Song")).await;
            assert!(matches!(res, Err(Error::MetadataWrite { .. })), "{res:?}");
            assert_eq!(tokio::fs::read(&path).await.unwrap(), b"audio");
            assert_eq!(dir_entries(dir.path()), vec!["Song.mp3"]);
        }
    }
}
