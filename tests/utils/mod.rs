//! Fake collaborators and stand-in encoder scripts for driving the pipeline
//! without network access or a real encoder.
#![allow(dead_code)]
use bytes::Bytes;
use futures::StreamExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use ytaudio::encoder::{Encoder, EncoderConfig};
use ytaudio::{
    AudioFetcher, Author, Converter, Error, FetchedAudio, FormatDescriptor, Result,
    SourceInfo, SourceResolver, TagWriter, Tags,
};

// Copies stdin into the destination one block at a time, emitting a progress
// report after each block. Arguments are recorded alongside the output.
const COPYING_ENCODER: &str = r#"#!/bin/sh
for last; do :; done
printf '%s\n' "$@" > "$last.args"
: > "$last"
while :; do
    n=$(dd bs=1024 count=1 2>/dev/null | tee -a "$last" | wc -c | tr -d ' ')
    if [ "$n" -eq 0 ]; then
        break
    fi
    printf 'out_time_ms=0\nprogress=continue\n'
done
printf 'progress=end\n'
"#;

const FAILING_ENCODER: &str = r#"#!/bin/sh
for last; do :; done
cat > "$last"
exit 3
"#;

// Starts draining its input late, holding the writer back on a full pipe.
const SLOW_ENCODER: &str = r#"#!/bin/sh
for last; do :; done
sleep 0.6
cat > "$last"
"#;

pub struct Scripts {
    pub copying: PathBuf,
    pub failing: PathBuf,
    pub slow: PathBuf,
}

/// Scripts are written once per test binary, before any test spawns a
/// process, so no script is executed while another thread holds it open for
/// writing.
pub fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("ytaudio-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Scripts {
            copying: write_script(&dir, "copying_encoder.sh", COPYING_ENCODER),
            failing: write_script(&dir, "failing_encoder.sh", FAILING_ENCODER),
            slow: write_script(&dir, "slow_encoder.sh", SLOW_ENCODER),
        }
    })
}

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn example_info() -> SourceInfo {
    SourceInfo {
        title: "Example Song".to_string(),
        author: Author {
            name: "Example Artist".to_string(),
        },
        formats: vec![
            FormatDescriptor {
                id: 18,
                audio_bitrate: Some(96),
            },
            FormatDescriptor {
                id: 140,
                audio_bitrate: Some(128),
            },
        ],
    }
}

pub fn audio_chunks(count: usize, size: usize) -> Vec<Bytes> {
    (0..count)
        .map(|idx| Bytes::from(vec![(idx % 251) as u8; size]))
        .collect()
}

#[derive(Clone)]
pub enum StreamEnd {
    Complete,
    ErrorAfter(usize),
    StallAfter(usize),
}

#[derive(Clone)]
pub struct FakeSource {
    pub info: SourceInfo,
    pub chunks: Vec<Bytes>,
    pub end: StreamEnd,
    pub report_total: bool,
    pub resolve_delay: Option<Duration>,
    /// Network latency before each chunk.
    pub chunk_delay: Option<Duration>,
    pub fetches: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(info: SourceInfo, chunks: Vec<Bytes>) -> Self {
        Self {
            info,
            chunks,
            end: StreamEnd::Complete,
            report_total: true,
            resolve_delay: None,
            chunk_delay: None,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.len() as u64).sum()
    }
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SourceResolver for FakeSource {
    async fn resolve(&self, _url: &str) -> Result<SourceInfo> {
        if let Some(delay) = self.resolve_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.info.clone())
    }
}

impl AudioFetcher for FakeSource {
    async fn fetch(&self, _url: &str, _format: &FormatDescriptor) -> Result<FetchedAudio> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let chunk_delay = self.chunk_delay;
        let chunks = futures::stream::iter(self.chunks.clone())
            .then(move |chunk| async move {
                if let Some(delay) = chunk_delay {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, Error>(chunk)
            })
            .boxed();
        let stream = match self.end {
            StreamEnd::Complete => chunks.boxed(),
            StreamEnd::ErrorAfter(n) => chunks
                .take(n)
                .chain(futures::stream::once(async {
                    Err(Error::new_stream_error("connection reset"))
                }))
                .boxed(),
            StreamEnd::StallAfter(n) => chunks.take(n).chain(futures::stream::pending()).boxed(),
        };
        Ok(FetchedAudio {
            total_bytes: self.report_total.then(|| self.total_bytes()),
            stream,
        })
    }
}

/// Records every tag write, along with the size of the file at that moment.
#[derive(Clone, Default)]
pub struct RecordingTagWriter {
    pub calls: Arc<Mutex<Vec<(PathBuf, Tags, u64)>>>,
    pub fail: bool,
    /// Time taken to write the tags, after the call is recorded.
    pub delay: Option<Duration>,
}

impl RecordingTagWriter {
    pub fn calls(&self) -> Vec<(PathBuf, Tags, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TagWriter for RecordingTagWriter {
    async fn write_tags(&self, path: &Path, tags: &Tags) -> Result<()> {
        let size = tokio::fs::metadata(path).await?.len();
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone(), size));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::new_metadata_write_error(path, "disk full"));
        }
        Ok(())
    }
}

pub fn converter(
    source: &FakeSource,
    tag_writer: &RecordingTagWriter,
    encoder: &Path,
    overwrite: bool,
) -> Converter<FakeSource, FakeSource, RecordingTagWriter> {
    Converter::new(
        source.clone(),
        source.clone(),
        tag_writer.clone(),
        Encoder::new(EncoderConfig {
            program: encoder.to_path_buf(),
            overwrite,
            ..Default::default()
        }),
    )
}
