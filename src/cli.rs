use crate::Cli;
use anyhow::{bail, Result};
use futures::StreamExt;
use std::time::Duration;
use rusty_ytdl::reqwest;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use ytaudio::config::Config;
use ytaudio::encoder::Encoder;
use ytaudio::{
    ConversionRequest, ConversionUpdate, Converter, EncoderTagWriter, Error,
    NativeYoutubeDownloader, SourceResolver, Stage,
};

pub async fn handle_cli_command(cli: Cli, config: Config) -> Result<()> {
    let client = reqwest::Client::builder().use_rustls_tls().build()?;
    let downloader = NativeYoutubeDownloader::new(config.chunk_size_bytes, client);
    match cli {
        Cli {
            url,
            list_formats: true,
            ..
        } => list_formats(&downloader, &url, config.resolve_timeout()).await,
        Cli {
            url,
            itag: Some(itag),
            output_dir,
            ..
        } => {
            tokio::fs::create_dir_all(&output_dir).await?;
            let request = ConversionRequest::new(url, itag, output_dir);
            convert(downloader, request, config).await
        }
        // Blocked by clap, as itag is required unless listing formats.
        Cli { itag: None, .. } => bail!("An itag must be provided to convert a video"),
    }
}

async fn list_formats(
    resolver: &impl SourceResolver,
    url: &str,
    resolve_timeout: Duration,
) -> Result<()> {
    let info = tokio::select! {
        _ = tokio::signal::ctrl_c() => return Err(Error::Cancelled.into()),
        info = tokio::time::timeout(resolve_timeout, resolver.resolve(url)) => {
            info.map_err(|_| Error::Timeout { stage: Stage::Resolve })??
        }
    };
    println!("{} - {}", info.author.name, info.title);
    for format in info.formats {
        match format.audio_bitrate {
            Some(bitrate) => println!("{:>5}  {bitrate} kbps", format.id),
            None => println!("{:>5}  no audio", format.id),
        }
    }
    Ok(())
}

async fn convert(
    downloader: NativeYoutubeDownloader,
    request: ConversionRequest,
    config: Config,
) -> Result<()> {
    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl-C, cancelling conversion");
                cancellation.cancel();
            }
        }
    });
    let converter = Converter::new(
        downloader.clone(),
        downloader,
        EncoderTagWriter::new(&config.encoder_path),
        Encoder::new(config.encoder_config()),
    )
    .with_timeouts(config.resolve_timeout(), config.fetch_timeout())
    .with_cancellation(cancellation);
    let mut updates = std::pin::pin!(converter.convert_stream(request));
    while let Some(update) = updates.next().await {
        match update {
            ConversionUpdate::Resolved { title } => println!("Converting {title}"),
            ConversionUpdate::Completed(path) => {
                println!("Saved to {}", path.display());
                return Ok(());
            }
            ConversionUpdate::Failed(e) => return Err(e.into()),
            ConversionUpdate::State(_) | ConversionUpdate::Progress(_) => (),
        }
    }
    bail!("Conversion ended without a result")
}
