use std::fmt::Debug;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::time::format_time;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Media bytes plus the metadata the editor needs about them.
pub trait MediaSource: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    fn mime_type(&self) -> &str;

    /// Reads up to `len` leading bytes.
    fn read_head(&self, len: usize) -> std::io::Result<Vec<u8>>;

    fn read_all(&self) -> std::io::Result<Vec<u8>>;

    /// Duration reported by container metadata, when it can be read cheaply.
    fn native_duration(&self) -> Option<f64> {
        None
    }
}

/// Shared handle to a loaded source.
pub type SourceHandle = Arc<dyn MediaSource>;

/// Source backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
    mime: &'static str,
    ffprobe: Option<PathBuf>,
}

impl FileSource {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = std::fs::metadata(&path).map_err(|source| EngineError::SourceIo {
            context: "read source metadata",
            name: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            mime: mime_for_name(&name),
            path,
            name,
            size: metadata.len(),
            ffprobe: None,
        })
    }

    /// Reads native durations with the given `ffprobe` binary.
    pub fn with_ffprobe(mut self, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffprobe = Some(ffprobe.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mime_type(&self) -> &str {
        self.mime
    }

    fn read_head(&self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut head = Vec::with_capacity(len);
        File::open(&self.path)?
            .take(len as u64)
            .read_to_end(&mut head)?;
        Ok(head)
    }

    fn read_all(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    fn native_duration(&self) -> Option<f64> {
        let ffprobe = self.ffprobe.as_deref()?;
        match media_ffmpeg::probe_container_duration(ffprobe, &self.path) {
            Ok(Some(seconds)) if seconds.is_finite() && seconds > 0.0 => Some(seconds),
            Ok(_) => None,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "native duration unavailable");
                None
            }
        }
    }
}

/// Source held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
    native_duration: Option<f64>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        Self {
            mime: mime_for_name(&name).to_string(),
            name,
            bytes: bytes.into(),
            native_duration: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn with_native_duration(mut self, seconds: f64) -> Self {
        self.native_duration = Some(seconds);
        self
    }
}

impl MediaSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn mime_type(&self) -> &str {
        &self.mime
    }

    fn read_head(&self, len: usize) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes[..len.min(self.bytes.len())].to_vec())
    }

    fn read_all(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }

    fn native_duration(&self) -> Option<f64> {
        self.native_duration
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
    }
}

/// Display summary of an accepted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,
    /// Size in mebibytes with two decimals.
    pub size_mb: String,
    /// `mm:ss`, or `-` while the duration is unknown.
    pub duration: String,
}

impl SourceSummary {
    pub fn describe(source: &dyn MediaSource, duration: f64) -> Self {
        let duration = if duration.is_finite() && duration > 0.0 {
            format_time(duration)
        } else {
            "-".to_string()
        };
        Self {
            name: source.name().to_string(),
            size_mb: format!("{:.2}", source.size() as f64 / BYTES_PER_MEGABYTE),
            duration,
        }
    }
}

fn mime_for_name(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "m4r" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::{FileSource, MediaSource, MemorySource, SourceSummary};

    #[test]
    fn memory_source_reads_head_without_overrunning() {
        let source = MemorySource::new("clip.ogg", b"OggS\0\x02".to_vec());
        assert_eq!(source.mime_type(), "audio/ogg");
        assert_eq!(source.read_head(4).expect("head"), b"OggS");
        assert_eq!(source.read_head(64).expect("head").len(), 6);
    }

    #[test]
    fn memory_source_ignores_unusable_native_duration() {
        let source = MemorySource::new("a.mp3", Vec::new()).with_native_duration(f64::NAN);
        assert_eq!(source.native_duration(), None);
        let source = MemorySource::new("a.mp3", Vec::new()).with_native_duration(12.5);
        assert_eq!(source.native_duration(), Some(12.5));
    }

    #[test]
    fn summary_formats_size_and_duration() {
        let source = MemorySource::new("song.mp3", vec![0_u8; 1_572_864]);
        assert_eq!(
            SourceSummary::describe(&source, 225.4),
            SourceSummary {
                name: "song.mp3".to_string(),
                size_mb: "1.50".to_string(),
                duration: "03:45".to_string(),
            }
        );
        assert_eq!(SourceSummary::describe(&source, 0.0).duration, "-");
    }

    #[test]
    fn file_source_reads_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "clipmix-source-{}-{}.flac",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::write(&path, b"fLaC-body").expect("write temp file");

        let source = FileSource::open(&path).expect("open");
        assert_eq!(source.size(), 9);
        assert_eq!(source.mime_type(), "audio/flac");
        assert_eq!(source.read_head(4).expect("head"), b"fLaC");
        assert_eq!(source.native_duration(), None);

        std::fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn missing_file_is_a_source_error() {
        assert!(FileSource::open("/nonexistent/clipmix/input.mp3").is_err());
    }
}
