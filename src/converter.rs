use crate::core::send_or_error;
use crate::encoder::{pipe_stream, report_progress, Encoder, EncoderProcess};
use crate::error::Stage;
use crate::metadata::{TagWriter, Tags};
use crate::progress::ProgressTracker;
use crate::sanitize::sanitize_title;
use crate::structures::{ConversionRequest, ConversionState, ConversionUpdate, Percentage};
use crate::youtube_downloader::{AudioFetcher, FetchedAudio, SourceResolver};
use crate::{Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the full conversion pipeline for one request at a time:
/// resolve, select format, fetch and transcode concurrently, then tag.
///
/// A `Converter` holds no per-run state, so the same instance can be used for
/// any number of sequential or concurrent runs.
#[derive(Clone)]
pub struct Converter<R, F, W> {
    resolver: R,
    fetcher: F,
    tag_writer: W,
    encoder: Encoder,
    sanitizer: fn(&str) -> String,
    resolve_timeout: Duration,
    fetch_timeout: Duration,
    cancellation: CancellationToken,
}

impl<R, F, W> Converter<R, F, W>
where
    R: SourceResolver + Sync,
    F: AudioFetcher + Sync,
    W: TagWriter + Sync,
{
    pub fn new(resolver: R, fetcher: F, tag_writer: W, encoder: Encoder) -> Self {
        Self {
            resolver,
            fetcher,
            tag_writer,
            encoder,
            sanitizer: sanitize_title,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cancellation: CancellationToken::new(),
        }
    }
    /// Fetch timeout applies to opening the stream and to each chunk.
    pub fn with_timeouts(mut self, resolve_timeout: Duration, fetch_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self.fetch_timeout = fetch_timeout;
        self
    }
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
    pub fn with_sanitizer(mut self, sanitizer: fn(&str) -> String) -> Self {
        self.sanitizer = sanitizer;
        self
    }
    /// Convert a single request, returning the path of the tagged file.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        mut on_progress: impl FnMut(Percentage) + Send,
    ) -> Result<PathBuf> {
        self.convert_with_updates(request, |update| {
            if let ConversionUpdate::Progress(percentage) = update {
                on_progress(percentage)
            }
        })
        .await
    }
    /// As `convert`, but also reports state transitions. Terminal outcomes
    /// are only reported through the returned result.
    pub async fn convert_with_updates(
        &self,
        request: &ConversionRequest,
        mut on_update: impl FnMut(ConversionUpdate) + Send,
    ) -> Result<PathBuf> {
        let result = self.run(request, &mut on_update).await;
        match &result {
            Ok(path) => info!("Converted {} into {}", request.url, path.display()),
            Err(e) => {
                error!("Error converting {} <{e}>", request.url);
                on_update(ConversionUpdate::State(ConversionState::Failed));
            }
        }
        result
    }
    async fn run(
        &self,
        request: &ConversionRequest,
        on_update: &mut (impl FnMut(ConversionUpdate) + Send),
    ) -> Result<PathBuf> {
        transition(on_update, ConversionState::Resolving);
        let info = self
            .cancellable(with_timeout(
                self.resolve_timeout,
                Stage::Resolve,
                self.resolver.resolve(&request.url),
            ))
            .await?;
        let format = *info.find_format(request.format_id)?;
        let title = (self.sanitizer)(&info.title);
        on_update(ConversionUpdate::Resolved {
            title: title.clone(),
        });
        let destination = request.destination(&title)?;
        if !self.encoder.config().overwrite && tokio::fs::try_exists(&destination).await? {
            return Err(Error::OutputExists(destination));
        }
        let bitrate_kbps = format
            .audio_bitrate
            .unwrap_or(self.encoder.config().default_bitrate_kbps);
        let fetched = self
            .cancellable(with_timeout(
                self.fetch_timeout,
                Stage::Fetch,
                self.fetcher.fetch(&request.url, &format),
            ))
            .await?;
        transition(on_update, ConversionState::Transcoding);
        let process = self.encoder.spawn(bitrate_kbps, &destination)?;
        self.transcode(process, fetched, &title, &destination, on_update)
            .await?;
        transition(on_update, ConversionState::Finalizing);
        let tags = Tags::new(info.author.name, title);
        // Cancelling here stops the tag writer but keeps the encoded file.
        self.cancellable(self.tag_writer.write_tags(&destination, &tags))
            .await?;
        transition(on_update, ConversionState::Done);
        Ok(destination)
    }
    /// Pipe the fetched audio into the encoder while bridging its progress
    /// reports, then wait for it to exit. Any failure kills the encoder and
    /// removes the partial output.
    async fn transcode(
        &self,
        process: EncoderProcess,
        fetched: FetchedAudio,
        title: &str,
        destination: &Path,
        on_update: &mut (impl FnMut(ConversionUpdate) + Send),
    ) -> Result<()> {
        let EncoderProcess {
            mut child,
            raw_input,
            progress_report,
        } = process;
        let tracker = ProgressTracker::new();
        if let Some(total_bytes) = fetched.total_bytes {
            tracker.set_total(total_bytes);
        }
        let stream = with_chunk_timeout(fetched.stream, self.fetch_timeout);
        let transfer = async {
            match pipe_stream(stream, raw_input, |len| {
                tracker.add_downloaded(len);
            })
            .await
            {
                // Encoder stopped reading - its exit status explains why.
                Err(Error::Io(e)) if e.kind() == ErrorKind::BrokenPipe => {
                    warn!("Encoder closed its input early");
                    Ok(())
                }
                Err(e) => Err(e),
                Ok(bytes) => {
                    debug!("Finished piping {bytes} bytes to encoder");
                    Ok(())
                }
            }
        };
        let report = report_progress(progress_report, &tracker, title, |percentage| {
            on_update(ConversionUpdate::Progress(percentage))
        });
        let piped = self
            .cancellable(futures::future::try_join(transfer, report))
            .await;
        if let Err(e) = piped {
            abort(&mut child, destination).await;
            return Err(e);
        }
        let status = tokio::select! {
            _ = self.cancellation.cancelled() => None,
            status = child.wait() => Some(status?),
        };
        let Some(status) = status else {
            abort(&mut child, destination).await;
            return Err(Error::Cancelled);
        };
        if !status.success() {
            remove_partial_output(destination).await;
            return Err(Error::TranscodeProcess {
                exit_code: status.code(),
            });
        }
        Ok(())
    }
    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(Error::Cancelled),
            res = fut => res,
        }
    }
}

impl<R, F, W> Converter<R, F, W>
where
    R: SourceResolver + Clone + Send + Sync + 'static,
    F: AudioFetcher + Clone + Send + Sync + 'static,
    W: TagWriter + Clone + Send + Sync + 'static,
{
    /// Run a conversion in the background, as a stream of updates.
    ///
    /// The stream always ends with exactly one `Completed` or `Failed`
    /// update. Dropping the stream does not stop the conversion - use
    /// `with_cancellation` for that.
    pub fn convert_stream(
        &self,
        request: ConversionRequest,
    ) -> impl Stream<Item = ConversionUpdate> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        let converter = self.clone();
        tokio::spawn(async move {
            let result = converter
                .convert_with_updates(&request, |update| send_or_error(&tx, update))
                .await;
            let last = match result {
                Ok(path) => ConversionUpdate::Completed(path),
                Err(e) => ConversionUpdate::Failed(e),
            };
            send_or_error(&tx, last);
        });
        UnboundedReceiverStream::new(rx)
    }
}

fn transition(on_update: &mut impl FnMut(ConversionUpdate), state: ConversionState) {
    debug!("Conversion state: {state:?}");
    on_update(ConversionUpdate::State(state));
}

async fn with_timeout<T>(
    duration: Duration,
    stage: Stage,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| Error::Timeout { stage })?
}

/// Fail with a fetch timeout if the next chunk takes longer than `duration`
/// to arrive.
///
/// The clock only runs while a chunk is being awaited. Time the consumer
/// spends blocked on a slow encoder between polls is not counted.
fn with_chunk_timeout<S>(stream: S, duration: Duration) -> impl Stream<Item = Result<Bytes>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    futures::stream::unfold(Some(stream), move |stream| async move {
        let mut stream = stream?;
        match tokio::time::timeout(duration, stream.next()).await {
            Ok(chunk) => chunk.map(|chunk| (chunk, Some(stream))),
            Err(_) => Some((Err(Error::Timeout { stage: Stage::Fetch }), None)),
        }
    })
}

async fn abort(child: &mut tokio::process::Child, destination: &Path) {
    if let Err(e) = child.kill().await {
        warn!("Unable to kill encoder <{e}>");
    }
    remove_partial_output(destination).await;
}

async fn remove_partial_output(destination: &Path) {
    match fs_err::tokio::remove_file(destination).await {
        Ok(()) => info!("Removed partial output {}", destination.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => (),
        Err(e) => warn!("Unable to remove partial output <{e}>"),
    }
}
