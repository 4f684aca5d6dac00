use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{MediaFfmpegError, Result};

const AUDIO_BITRATE: &str = "192k";
const AUDIO_SAMPLE_RATE: &str = "44100";

/// Output container selected for preview/export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputContainer {
    #[default]
    Mp3,
    M4a,
    M4r,
    Mp4,
}

impl OutputContainer {
    pub const ALL: [Self; 4] = [Self::Mp3, Self::M4a, Self::M4r, Self::Mp4];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::M4r => "m4r",
            Self::Mp4 => "mp4",
        }
    }

    /// MIME type used for playback and download.
    pub fn mime_type(self) -> &'static str {
        mime_for_extension(self.extension())
    }

    /// Audio codec arguments for this container.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::OutputContainer;
    ///
    /// assert_eq!(
    ///     OutputContainer::Mp3.codec_args(),
    ///     ["-c:a", "libmp3lame", "-b:a", "192k", "-ar", "44100"]
    /// );
    /// assert!(OutputContainer::M4a.codec_args().contains(&"+faststart".to_string()));
    /// ```
    pub fn codec_args(self) -> Vec<String> {
        codec_args_for_extension(self.extension())
    }
}

impl Display for OutputContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputContainer {
    type Err = MediaFfmpegError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|container| container.extension() == normalized)
            .ok_or_else(|| MediaFfmpegError::Parse {
                context: "output container",
                value: value.to_string(),
            })
    }
}

/// Codec arguments keyed by extension: MP3 for `mp3`, AAC with fast start
/// for everything else.
pub fn codec_args_for_extension(extension: &str) -> Vec<String> {
    let args: &[&str] = if extension.eq_ignore_ascii_case("mp3") {
        &["-c:a", "libmp3lame", "-b:a", AUDIO_BITRATE, "-ar", AUDIO_SAMPLE_RATE]
    } else {
        &[
            "-c:a",
            "aac",
            "-b:a",
            AUDIO_BITRATE,
            "-ar",
            AUDIO_SAMPLE_RATE,
            "-movflags",
            "+faststart",
        ]
    };
    args.iter().map(|arg| arg.to_string()).collect()
}

/// MIME type keyed by extension, `application/octet-stream` when unknown.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "m4r" | "mp4" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
