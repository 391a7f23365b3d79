use std::{fmt::Display, path::PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a conversion that can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Fetch,
}

#[derive(Debug)]
pub enum Error {
    Resolution {
        url: String,
        message: String,
    },
    FormatNotFound {
        format_id: u64,
        available: Vec<u64>,
    },
    Timeout {
        stage: Stage,
    },
    Stream(String),
    EncoderSpawn {
        encoder: PathBuf,
        io_error: std::io::Error,
    },
    TranscodeProcess {
        // None if the encoder was terminated by a signal.
        exit_code: Option<i32>,
    },
    MetadataWrite {
        path: PathBuf,
        message: String,
    },
    OutputExists(PathBuf),
    Cancelled,
    DirectoryName,
    Io(std::io::Error),
    TomlDeserialization(toml::de::Error),
}

impl Error {
    pub fn new_resolution_error(url: impl Into<String>, message: impl Display) -> Self {
        Self::Resolution {
            url: url.into(),
            message: message.to_string(),
        }
    }
    pub fn new_stream_error(message: impl Display) -> Self {
        Self::Stream(message.to_string())
    }
    pub fn new_encoder_spawn_error(encoder: impl Into<PathBuf>, io_error: std::io::Error) -> Self {
        Self::EncoderSpawn {
            encoder: encoder.into(),
            io_error,
        }
    }
    pub fn new_metadata_write_error(path: impl Into<PathBuf>, message: impl Display) -> Self {
        Self::MetadataWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Resolve => write!(f, "resolve"),
            Stage::Fetch => write!(f, "fetch"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Resolution { url, message } => {
                write!(f, "Error resolving video information for {url} <{message}>")
            }
            Error::FormatNotFound {
                format_id,
                available,
            } => write!(
                f,
                "Format {format_id} not found. Available formats: {available:?}"
            ),
            Error::Timeout { stage } => write!(f, "Timed out during {stage} stage"),
            Error::Stream(e) => write!(f, "Audio stream interrupted <{e}>"),
            Error::EncoderSpawn { encoder, io_error } => write!(
                f,
                "Error starting encoder {} <{io_error}>. Is it installed and on your PATH?",
                encoder.display()
            ),
            Error::TranscodeProcess {
                exit_code: Some(code),
            } => write!(f, "Encoder exited with status code {code}"),
            Error::TranscodeProcess { exit_code: None } => {
                write!(f, "Encoder was terminated by a signal")
            }
            Error::MetadataWrite { path, message } => write!(
                f,
                "Error writing tags to {}, file has been left untagged <{message}>",
                path.display()
            ),
            Error::OutputExists(path) => write!(
                f,
                "Output file {} already exists and overwriting is disabled",
                path.display()
            ),
            Error::Cancelled => write!(f, "Conversion cancelled"),
            Error::DirectoryName => write!(
                f,
                "Error generating application directory for your host system."
            ),
            Error::Io(e) => write!(f, "Standard io error <{e}>"),
            Error::TomlDeserialization(e) => write!(f, "Toml deserialization error:\n{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::EncoderSpawn { io_error, .. } => Some(io_error),
            Error::Io(e) => Some(e),
            Error::TomlDeserialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}
impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Error::TomlDeserialization(value)
    }
}
