//! Extract the audio track of a YouTube video into an mp3 file, using an
//! external encoder process, and tag it with the video's artist and title.
//!
//! The pipeline is driven by a [`Converter`], generic over the collaborators
//! that resolve video information ([`SourceResolver`]), open the audio stream
//! ([`AudioFetcher`]) and write tags ([`TagWriter`]).
// Clippy project config
#![warn(clippy::unwrap_used)]

pub mod config;
pub mod converter;
mod core;
pub mod encoder;
mod error;
pub mod metadata;
pub mod progress;
pub mod sanitize;
pub mod structures;
pub mod youtube_downloader;

pub use converter::Converter;
pub use error::{Error, Result, Stage};
pub use metadata::{EncoderTagWriter, TagWriter, Tags};
pub use structures::{
    Author, ConversionRequest, ConversionState, ConversionUpdate, FormatDescriptor, Percentage,
    SourceInfo,
};
pub use youtube_downloader::native::NativeYoutubeDownloader;
pub use youtube_downloader::{AudioFetcher, FetchedAudio, SourceResolver};
