use crate::structures::{Author, FormatDescriptor, SourceInfo};
use crate::youtube_downloader::{AudioFetcher, FetchedAudio, SourceResolver};
use crate::{Error, Result};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use rusty_ytdl::{
    reqwest, DownloadOptions, RequestOptions, Video, VideoError, VideoFormat, VideoInfo,
    VideoOptions, VideoQuality, VideoSearchOptions,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolver and fetcher backed by rusty_ytdl.
#[derive(Clone)]
pub struct NativeYoutubeDownloader {
    chunk_size_bytes: u64,
    client: reqwest::Client,
}

impl NativeYoutubeDownloader {
    pub fn new(chunk_size_bytes: u64, client: reqwest::Client) -> Self {
        Self {
            chunk_size_bytes,
            client,
        }
    }
    fn video_options(&self, quality: VideoQuality, filter: VideoSearchOptions) -> VideoOptions {
        VideoOptions {
            quality,
            filter,
            download_options: DownloadOptions {
                dl_chunk_size: Some(self.chunk_size_bytes),
            },
            request_options: RequestOptions {
                client: Some(self.client.clone()),
                ..Default::default()
            },
        }
    }
}

impl SourceResolver for NativeYoutubeDownloader {
    async fn resolve(&self, url: &str) -> Result<SourceInfo> {
        let options = self.video_options(VideoQuality::HighestAudio, VideoSearchOptions::Audio);
        let video = Video::new_with_options(url, options)
            .map_err(|e| Error::new_resolution_error(url, e))?;
        let info = video
            .get_info()
            .await
            .map_err(|e| Error::new_resolution_error(url, e))?;
        let info = source_info_from_video_info(info);
        debug!(
            "Resolved <{}> by <{}> with {} formats",
            info.title,
            info.author.name,
            info.formats.len()
        );
        Ok(info)
    }
}

impl AudioFetcher for NativeYoutubeDownloader {
    async fn fetch(&self, url: &str, format: &FormatDescriptor) -> Result<FetchedAudio> {
        let itag = format.id;
        let only_requested_format: Arc<dyn Fn(&VideoFormat) -> bool + Sync + Send> =
            Arc::new(move |candidate| candidate.itag == itag);
        let quality = VideoQuality::Custom(
            VideoSearchOptions::Custom(only_requested_format.clone()),
            Arc::new(|a: &VideoFormat, b: &VideoFormat| a.audio_bitrate.cmp(&b.audio_bitrate)),
        );
        let options =
            self.video_options(quality, VideoSearchOptions::Custom(only_requested_format));
        let video = Video::new_with_options(url, options)
            .map_err(|e| Error::new_resolution_error(url, e))?;
        let stream = video.stream().await.map_err(Error::new_stream_error)?;
        let total_bytes = match stream.content_length() {
            0 => None,
            len => Some(len as u64),
        };
        info!("Opened audio stream for format {itag}, total size bytes {total_bytes:?}");
        let stream = into_futures_stream(stream)
            .map_err(Error::new_stream_error)
            .boxed();
        Ok(FetchedAudio {
            total_bytes,
            stream,
        })
    }
}

fn source_info_from_video_info(info: VideoInfo) -> SourceInfo {
    let VideoInfo {
        video_details,
        formats,
        ..
    } = info;
    SourceInfo {
        title: video_details.title,
        author: Author {
            name: video_details
                .author
                .map(|author| author.name)
                .unwrap_or_default(),
        },
        formats: formats
            .iter()
            .map(|format| FormatDescriptor {
                id: format.itag,
                audio_bitrate: format.audio_bitrate,
            })
            .collect(),
    }
}

/// Helper function to use rusty_ytdl::stream::Stream is if it were a
/// futures::Stream.
// NOTE: Potentially could be upstreamed: https://github.com/Mithronn/rusty_ytdl/issues/34.
fn into_futures_stream(
    youtube_stream: Box<dyn rusty_ytdl::stream::Stream + Send + Sync>,
) -> impl futures::Stream<Item = std::result::Result<Bytes, VideoError>> + Send {
    // Second value of initialisation tuple represents if the previous iteration of
    // the stream errored. If so, stream will close, as no future iterations of
    // the stream are expected to return Ok.
    futures::stream::unfold((youtube_stream, false), |(state, err)| async move {
        if err {
            return None;
        };
        let chunk = state.chunk().await;
        match chunk {
            // Return error value on this iteration, on the next iteration return None.
            Err(e) => Some((Err(e), (state, true))),
            // Happy path
            Ok(Some(bytes)) => Some((Ok(bytes), (state, false))),
            // Stream has closed.
            Ok(None) => None,
        }
    })
}
