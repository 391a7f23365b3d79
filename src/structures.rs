use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub const OUTPUT_EXTENSION: &str = "mp3";

/// A single request to convert one video's audio track into a tagged file.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionRequest {
    pub url: String,
    pub format_id: u64,
    pub output_dir: PathBuf,
}

impl ConversionRequest {
    pub fn new(url: impl Into<String>, format_id: u64, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            format_id,
            output_dir: output_dir.into(),
        }
    }
    /// Destination of the encoded file for an already sanitized title.
    /// Relative output directories are resolved against the working directory.
    pub fn destination(&self, sanitized_title: &str) -> Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(destination_in(&cwd, &self.output_dir, sanitized_title))
    }
}

fn destination_in(cwd: &Path, output_dir: &Path, sanitized_title: &str) -> PathBuf {
    cwd.join(output_dir)
        .join(format!("{sanitized_title}.{OUTPUT_EXTENSION}"))
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Author {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FormatDescriptor {
    pub id: u64,
    /// Audio bitrate in kbps, if the source reports one.
    pub audio_bitrate: Option<u64>,
}

/// Video information produced by a `SourceResolver`.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub title: String,
    pub author: Author,
    pub formats: Vec<FormatDescriptor>,
}

impl SourceInfo {
    pub fn find_format(&self, format_id: u64) -> Result<&FormatDescriptor> {
        self.formats
            .iter()
            .find(|format| format.id == format_id)
            .ok_or_else(|| Error::FormatNotFound {
                format_id,
                available: self.formats.iter().map(|format| format.id).collect(),
            })
    }
}

// As this is a simple wrapper type we implement Copy for ease of handling
#[derive(Clone, PartialEq, Eq, Copy, Debug, Default, PartialOrd, Ord)]
pub struct Percentage(pub u8);

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Stage of a single run. There is no idle state: a `Converter` keeps no
/// per-run state, so every run starts in `Resolving` and ends in either
/// `Done` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionState {
    Resolving,
    Transcoding,
    Finalizing,
    Done,
    Failed,
}

#[derive(Debug)]
pub enum ConversionUpdate {
    State(ConversionState),
    Resolved { title: String },
    Progress(Percentage),
    Completed(PathBuf),
    Failed(Error),
}
