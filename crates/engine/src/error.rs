use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::render::RenderMode;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which of the two session sources an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSlot {
    Primary,
    Secondary,
}

impl Display for SourceSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => f.write_str("File A"),
            Self::Secondary => f.write_str("File B"),
        }
    }
}

/// Render preconditions that failed before any engine work started.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    NoSource {
        mode: RenderMode,
    },
    MissingSecondarySource {
        mode: RenderMode,
    },
    InvalidTrimRange {
        start: f64,
        end: f64,
    },
    FadeExceedsClip {
        fade_in: f64,
        fade_out: f64,
        segment: f64,
    },
    CrossfadeTooLong {
        crossfade: f64,
        segment: f64,
        secondary: f64,
    },
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSource { mode } => write!(
                f,
                "No file to {}. Please upload a file first.",
                mode.verb()
            ),
            Self::MissingSecondarySource { mode } => write!(
                f,
                "{} aborted: Crossfade is enabled. Please choose File B.",
                mode.title()
            ),
            Self::InvalidTrimRange { .. } => f.write_str("Invalid trim range."),
            Self::FadeExceedsClip { .. } => {
                f.write_str("Fade in/out is longer than the selected clip.")
            }
            Self::CrossfadeTooLong { .. } => {
                f.write_str("Crossfade must be shorter than both clips.")
            }
        }
    }
}

/// Errors produced by session commands, probing and rendering.
#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationFailure),
    UnsupportedFile {
        slot: SourceSlot,
        name: String,
    },
    Probe {
        slot: SourceSlot,
        reason: String,
    },
    EngineInit(media_ffmpeg::MediaFfmpegError),
    Execution(media_ffmpeg::MediaFfmpegError),
    InvalidEqBand {
        band: usize,
    },
    SourceIo {
        context: &'static str,
        name: String,
        source: std::io::Error,
    },
    SettingsIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    SettingsSerialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidSettings {
        reason: String,
    },
    Output {
        file_name: String,
        source: std::io::Error,
    },
    Media(media_ffmpeg::MediaFfmpegError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(failure) => write!(f, "{failure}"),
            Self::UnsupportedFile { slot, name } => write!(
                f,
                "Unsupported file format for {slot}: {name}. Use MP3, MP4, M4A, M4R, OGG, FLAC or MOV."
            ),
            Self::Probe { slot, reason } => {
                write!(f, "Could not read duration for {slot}. ({reason})")
            }
            Self::EngineInit(err) => write!(f, "transcoding engine failed to load: {err}"),
            Self::Execution(err) => write!(f, "render failed: {err}"),
            Self::InvalidEqBand { band } => write!(f, "equalizer band out of range: {band}"),
            Self::SourceIo {
                context,
                name,
                source,
            } => write!(f, "{context}: {name} ({source})"),
            Self::SettingsIo {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::SettingsSerialization { path, source } => write!(
                f,
                "settings serialization/deserialization failed at {} ({source})",
                path.display()
            ),
            Self::InvalidSettings { reason } => write!(f, "invalid settings: {reason}"),
            Self::Output { file_name, source } => {
                write!(f, "could not deliver {file_name} ({source})")
            }
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EngineInit(err) | Self::Execution(err) | Self::Media(err) => Some(err),
            Self::SourceIo { source, .. } => Some(source),
            Self::SettingsIo { source, .. } => Some(source),
            Self::SettingsSerialization { source, .. } => Some(source),
            Self::Output { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for EngineError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}

impl From<ValidationFailure> for EngineError {
    fn from(value: ValidationFailure) -> Self {
        Self::Validation(value)
    }
}
