use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

/// Bytes of a finished render plus how to present them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMedia {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
    pub run_id: u64,
}

/// Where rendered media goes: the preview player or a download.
pub trait OutputSink: Send {
    /// Stops any media that is currently playing.
    fn pause_playback(&mut self) {}

    fn present_preview(&mut self, media: &RenderedMedia) -> std::io::Result<()>;

    /// Frees a preview that is no longer shown.
    fn release_preview(&mut self, media: &RenderedMedia);

    fn download(&mut self, media: &RenderedMedia) -> std::io::Result<()>;
}

/// Writes previews and downloads into a directory.
///
/// A released preview file is removed again.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, media: &RenderedMedia) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&media.file_name);
        std::fs::write(&path, &media.bytes)?;
        Ok(path)
    }
}

impl OutputSink for DirectorySink {
    fn pause_playback(&mut self) {
        debug!("no playback to pause");
    }

    fn present_preview(&mut self, media: &RenderedMedia) -> std::io::Result<()> {
        let path = self.write(media)?;
        info!(path = %path.display(), mime = media.mime, "preview written");
        Ok(())
    }

    fn release_preview(&mut self, media: &RenderedMedia) {
        let path = self.dir.join(&media.file_name);
        if let Err(err) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), %err, "could not remove released preview");
        }
    }

    fn download(&mut self, media: &RenderedMedia) -> std::io::Result<()> {
        let path = self.write(media)?;
        info!(path = %path.display(), bytes = media.bytes.len(), "export written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{DirectorySink, OutputSink, RenderedMedia};

    fn media(name: &str) -> RenderedMedia {
        RenderedMedia {
            file_name: name.to_string(),
            mime: "audio/mpeg",
            bytes: Arc::from(b"FAKE".as_slice()),
            run_id: 1,
        }
    }

    #[test]
    fn directory_sink_writes_and_releases_previews() {
        let dir = std::env::temp_dir().join(format!(
            "clipmix-sink-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        let mut sink = DirectorySink::new(&dir);

        let preview = media("song_preview.mp3");
        sink.present_preview(&preview).expect("preview written");
        assert_eq!(
            std::fs::read(dir.join("song_preview.mp3")).expect("read"),
            b"FAKE"
        );
        sink.release_preview(&preview);
        assert!(!dir.join("song_preview.mp3").exists());

        sink.download(&media("song_edited.mp3")).expect("export written");
        assert!(dir.join("song_edited.mp3").exists());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
