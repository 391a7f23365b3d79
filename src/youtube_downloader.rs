use crate::structures::{FormatDescriptor, SourceInfo};
use crate::Result;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::future::Future;

pub mod native;

/// An open audio stream, and its total size in bytes if known up front.
pub struct FetchedAudio {
    pub total_bytes: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

// Custom impl - the stream itself isn't Debug.
impl std::fmt::Debug for FetchedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedAudio")
            .field("total_bytes", &self.total_bytes)
            .field("stream", &"BoxStream<..>")
            .finish()
    }
}

/// Resolves video information, including available formats, for a url.
pub trait SourceResolver {
    fn resolve(&self, url: &str) -> impl Future<Output = Result<SourceInfo>> + Send;
}

/// Opens the audio track of a video as a stream of bytes.
pub trait AudioFetcher {
    fn fetch(
        &self,
        url: &str,
        format: &FormatDescriptor,
    ) -> impl Future<Output = Result<FetchedAudio>> + Send;
}
