//! Wrapper around the external encoder process (ffmpeg compatible command
//! line).
//!
//! Raw audio is written to the child's stdin and the encoder reports progress
//! on its stdout using `-progress`. Stderr is inherited so that encoder errors
//! remain visible on the invoking terminal.
use crate::progress::ProgressTracker;
use crate::structures::Percentage;
use crate::{Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

pub const DEFAULT_ENCODER: &str = "ffmpeg";
pub const DEFAULT_BITRATE_KBPS: u64 = 128;
// Only fatal errors from the encoder are shown.
const ENCODER_LOGLEVEL: &str = "8";

#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    pub program: PathBuf,
    /// Used when the selected format doesn't report an audio bitrate.
    pub default_bitrate_kbps: u64,
    pub overwrite: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENCODER),
            default_bitrate_kbps: DEFAULT_BITRATE_KBPS,
            overwrite: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

/// A running encoder and its two dedicated channels.
#[derive(Debug)]
pub struct EncoderProcess {
    pub child: Child,
    pub raw_input: ChildStdin,
    pub progress_report: ChildStdout,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
    pub fn program(&self) -> &Path {
        &self.config.program
    }
    fn transcode_args(&self, bitrate_kbps: u64, destination: &Path) -> Vec<OsString> {
        let overwrite_flag = if self.config.overwrite { "-y" } else { "-n" };
        let mut args: Vec<OsString> = [
            "-loglevel",
            ENCODER_LOGLEVEL,
            "-hide_banner",
            "-progress",
            "pipe:1",
            "-i",
            "pipe:0",
            "-vn",
            "-b:a",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(format!("{bitrate_kbps}k").into());
        args.push(overwrite_flag.into());
        args.push(destination.into());
        args
    }
    /// Start encoding raw audio from stdin into `destination`.
    pub fn spawn(&self, bitrate_kbps: u64, destination: &Path) -> Result<EncoderProcess> {
        let args = self.transcode_args(bitrate_kbps, destination);
        debug!("Spawning encoder {:?} with args {:?}", self.program(), args);
        let mut child = Command::new(self.program())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::new_encoder_spawn_error(self.program(), e))?;
        let (Some(raw_input), Some(progress_report)) = (child.stdin.take(), child.stdout.take())
        else {
            // Unreachable when both are configured as piped.
            return Err(Error::new_encoder_spawn_error(
                self.program(),
                std::io::Error::other("encoder channels unavailable"),
            ));
        };
        Ok(EncoderProcess {
            child,
            raw_input,
            progress_report,
        })
    }
}

/// Copy audio into the encoder, one chunk at a time.
///
/// Each write is awaited before the next chunk is pulled, so a slow encoder
/// pauses the upstream stream instead of letting chunks pile up in memory.
/// The writer is shut down once the stream ends, signalling EOF.
pub async fn pipe_stream<S, W>(
    stream: S,
    mut writer: W,
    mut on_chunk: impl FnMut(u64),
) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>>,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        let len = chunk.len() as u64;
        written += len;
        on_chunk(len);
    }
    writer.shutdown().await?;
    Ok(written)
}

/// Treat every chunk of data arriving on the progress channel as a tick, and
/// report the download percentage for each tick once the total is known.
///
/// The content of the channel is not parsed.
pub async fn report_progress<R>(
    progress_report: R,
    tracker: &ProgressTracker,
    title: &str,
    mut on_progress: impl FnMut(Percentage),
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut ticks = ReaderStream::new(progress_report);
    while let Some(tick) = ticks.next().await {
        tick?;
        let Some(percentage) = tracker.percentage() else {
            debug!("Progress tick received before total size known");
            continue;
        };
        info!("Downloading: {} for {title}", percentage);
        on_progress(percentage);
    }
    Ok(())
}
