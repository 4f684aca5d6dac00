use std::fmt::{Display, Formatter};

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, MediaFfmpegError>;

/// Error type for filter compilation and transcoding engine operations.
#[derive(Debug)]
pub enum MediaFfmpegError {
    InvalidRenderRequest {
        reason: &'static str,
    },
    DuplicatePin(String),
    UndefinedPin(String),
    DanglingPin(String),
    InvalidFileName(String),
    MissingFile(String),
    EngineUnavailable {
        variant: &'static str,
        reason: String,
    },
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    ExecFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    Utf8(std::string::FromUtf8Error),
    Parse {
        context: &'static str,
        value: String,
    },
}

impl Display for MediaFfmpegError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRenderRequest { reason } => {
                write!(f, "invalid render request: {reason}")
            }
            Self::DuplicatePin(label) => write!(f, "filter pin [{label}] is produced twice"),
            Self::UndefinedPin(label) => {
                write!(f, "filter pin [{label}] is consumed before it is produced")
            }
            Self::DanglingPin(label) => write!(f, "filter pin [{label}] is never consumed"),
            Self::InvalidFileName(name) => write!(f, "invalid virtual file name: {name:?}"),
            Self::MissingFile(name) => write!(f, "virtual file not found: {name}"),
            Self::EngineUnavailable { variant, reason } => {
                write!(f, "{variant} engine unavailable: {reason}")
            }
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::ExecFailed {
                command,
                code,
                stderr,
            } => {
                let code = code.map_or_else(|| "signal".to_string(), |code| code.to_string());
                write!(
                    f,
                    "command failed ({code}): {command}; stderr: {}",
                    stderr.trim()
                )
            }
            Self::Utf8(err) => write!(f, "utf8 decode error: {err}"),
            Self::Parse { context, value } => {
                write!(f, "parse error ({context}): {value}")
            }
        }
    }
}

impl std::error::Error for MediaFfmpegError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Utf8(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::string::FromUtf8Error> for MediaFfmpegError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}
