use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::error::{MediaFfmpegError, Result};
use crate::probe::{parse_duration_from_logs, parse_progress_time};
use crate::transcoder::{
    EngineEvents, EngineLoader, EngineVariant, LogHandler, ProgressHandler, TranscodeEngine,
};

const STDERR_TAIL_LINES: usize = 20;

static WORKDIR_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Engine backed by the `ffmpeg` executable.
///
/// A private working directory plays the role of the virtual filesystem and
/// is removed when the engine is dropped.
#[derive(Debug)]
pub struct FfmpegProcessEngine {
    binary: PathBuf,
    workdir: PathBuf,
    variant: EngineVariant,
    events: EngineEvents,
    expected_seconds: Option<f64>,
}

impl FfmpegProcessEngine {
    pub fn new(binary: impl Into<PathBuf>, variant: EngineVariant) -> Result<Self> {
        let workdir = std::env::temp_dir().join(format!(
            "clipmix-{}-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or(0),
            WORKDIR_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&workdir).map_err(|source| MediaFfmpegError::Io {
            context: "create engine working directory",
            source,
        })?;
        debug!(workdir = %workdir.display(), %variant, "ffmpeg engine ready");

        Ok(Self {
            binary: binary.into(),
            workdir,
            variant,
            events: EngineEvents::default(),
            expected_seconds: None,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !valid {
            return Err(MediaFfmpegError::InvalidFileName(name.to_string()));
        }
        Ok(self.workdir.join(name))
    }

    fn variant_args(&self) -> &'static [&'static str] {
        match self.variant {
            EngineVariant::MultiThreaded => &[],
            EngineVariant::SingleThreaded => &["-filter_threads", "1"],
        }
    }

    fn drain_diagnostics(&mut self, mut stderr: impl Read, transcript: &mut Vec<String>) -> Result<()> {
        let mut total_seconds = self.expected_seconds;
        let mut pending = Vec::new();
        let mut buffer = [0_u8; 4096];
        loop {
            let read = match stderr.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(MediaFfmpegError::Io {
                        context: "read ffmpeg diagnostics",
                        source,
                    });
                }
            };
            for &byte in &buffer[..read] {
                if byte == b'\n' || byte == b'\r' {
                    self.handle_line(&pending, &mut total_seconds, transcript);
                    pending.clear();
                } else {
                    pending.push(byte);
                }
            }
        }
        self.handle_line(&pending, &mut total_seconds, transcript);
        Ok(())
    }

    fn handle_line(&mut self, raw: &[u8], total_seconds: &mut Option<f64>, transcript: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        trace!(line, "ffmpeg");
        self.events.emit_log(line);

        if total_seconds.is_none() {
            *total_seconds = parse_duration_from_logs(line)
                .ok()
                .filter(|seconds| *seconds > 0.0);
        }
        if let (Some(total), Some(position)) = (*total_seconds, parse_progress_time(line)) {
            self.events.emit_progress(position / total);
        }

        if transcript.len() == STDERR_TAIL_LINES {
            transcript.remove(0);
        }
        transcript.push(line.to_string());
    }
}

impl TranscodeEngine for FfmpegProcessEngine {
    fn variant(&self) -> EngineVariant {
        self.variant
    }

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        fs::write(path, bytes).map_err(|source| MediaFfmpegError::Io {
            context: "write engine file",
            source,
        })
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        fs::read(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                MediaFfmpegError::MissingFile(name.to_string())
            } else {
                MediaFfmpegError::Io {
                    context: "read engine file",
                    source,
                }
            }
        })
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_file(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                MediaFfmpegError::MissingFile(name.to_string())
            } else {
                MediaFfmpegError::Io {
                    context: "delete engine file",
                    source,
                }
            }
        })
    }

    fn exec(&mut self, args: &[String]) -> Result<()> {
        let command_line = format!(
            "{} {} {}",
            self.binary.display(),
            self.variant_args().join(" "),
            args.join(" ")
        );
        debug!(command = %command_line, "running ffmpeg");

        let mut child = Command::new(&self.binary)
            .current_dir(&self.workdir)
            .args(self.variant_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MediaFfmpegError::Io {
                context: "spawn ffmpeg",
                source,
            })?;

        let mut transcript = Vec::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = child.stderr.take() {
            self.drain_diagnostics(stderr, &mut transcript)?;
        }
        let status = child.wait().map_err(|source| MediaFfmpegError::Io {
            context: "wait for ffmpeg",
            source,
        })?;

        if !status.success() {
            return Err(MediaFfmpegError::ExecFailed {
                command: command_line,
                code: status.code(),
                stderr: transcript.join("\n"),
            });
        }
        self.events.emit_progress(1.0);
        Ok(())
    }

    fn set_progress_handler(&mut self, handler: Option<ProgressHandler>) {
        self.events.set_progress(handler);
    }

    fn set_log_handler(&mut self, handler: Option<LogHandler>) {
        self.events.set_log(handler);
    }

    fn set_expected_duration(&mut self, seconds: Option<f64>) {
        self.expected_seconds = seconds.filter(|seconds| seconds.is_finite() && *seconds > 0.0);
    }
}

impl Drop for FfmpegProcessEngine {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.workdir) {
            debug!(workdir = %self.workdir.display(), %err, "engine working directory not removed");
        }
    }
}

/// Loads [`FfmpegProcessEngine`]s after checking that the binary runs.
#[derive(Debug, Clone)]
pub struct FfmpegLoader {
    binary: PathBuf,
}

impl FfmpegLoader {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegLoader {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl EngineLoader for FfmpegLoader {
    fn load(&self, variant: EngineVariant) -> Result<Box<dyn TranscodeEngine>> {
        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-version"])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| MediaFfmpegError::EngineUnavailable {
                variant: variant.name(),
                reason: format!("{}: {source}", self.binary.display()),
            })?;
        if !output.status.success() {
            return Err(MediaFfmpegError::EngineUnavailable {
                variant: variant.name(),
                reason: format!("{} -version exited with {}", self.binary.display(), output.status),
            });
        }

        let version = String::from_utf8_lossy(&output.stdout);
        if variant == EngineVariant::MultiThreaded && version.contains("--disable-pthreads") {
            return Err(MediaFfmpegError::EngineUnavailable {
                variant: variant.name(),
                reason: "ffmpeg was built without thread support".to_string(),
            });
        }

        Ok(Box::new(FfmpegProcessEngine::new(&self.binary, variant)?))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use super::FfmpegProcessEngine;
    use crate::{EngineLoader, EngineVariant, FfmpegLoader, MediaFfmpegError, TranscodeEngine};

    fn engine() -> FfmpegProcessEngine {
        FfmpegProcessEngine::new("ffmpeg", EngineVariant::SingleThreaded)
            .expect("temp dir must be writable")
    }

    #[test]
    fn virtual_files_live_in_private_workdir() {
        let mut engine = engine();
        engine.write_file("inputA", b"abc").expect("write");
        assert!(engine.workdir().join("inputA").exists());
        assert_eq!(engine.read_file("inputA").expect("read"), b"abc");

        engine.delete_file("inputA").expect("delete");
        assert!(matches!(
            engine.read_file("inputA"),
            Err(MediaFfmpegError::MissingFile(name)) if name == "inputA"
        ));
        assert!(matches!(
            engine.delete_file("inputA"),
            Err(MediaFfmpegError::MissingFile(_))
        ));
    }

    #[test]
    fn file_names_cannot_escape_workdir() {
        let mut engine = engine();
        for name in ["", "..", "../x", "a/b", "a\\b"] {
            assert!(matches!(
                engine.write_file(name, b"x"),
                Err(MediaFfmpegError::InvalidFileName(_))
            ));
        }
    }

    #[test]
    fn dropping_engine_removes_workdir() {
        let engine = engine();
        let workdir = engine.workdir().to_path_buf();
        assert!(workdir.exists());
        drop(engine);
        assert!(!workdir.exists());
    }

    #[test]
    fn diagnostics_feed_log_and_progress_subscribers() {
        let mut engine = engine();
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let progress = Arc::new(Mutex::new(Vec::<f64>::new()));

        let sink = Arc::clone(&lines);
        engine.set_log_handler(Some(Box::new(move |line| {
            sink.lock().expect("lock lines").push(line.to_string())
        })));
        let sink = Arc::clone(&progress);
        engine.set_progress_handler(Some(Box::new(move |fraction| {
            sink.lock().expect("lock progress").push(fraction)
        })));

        let stderr = Cursor::new(
            "  Duration: 00:00:10.00, start: 0.000000\n\
size=  1kB time=00:00:02.50 bitrate=1kbits/s\r\
size=  2kB time=00:00:05.00 bitrate=1kbits/s\r\n"
                .as_bytes()
                .to_vec(),
        );
        let mut transcript = Vec::new();
        engine
            .drain_diagnostics(stderr, &mut transcript)
            .expect("in-memory read");

        assert_eq!(lines.lock().expect("lock lines").len(), 3);
        assert_eq!(*progress.lock().expect("lock progress"), vec![0.25, 0.5]);
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn expected_duration_overrides_input_duration_for_progress() {
        let mut engine = engine();
        let progress = Arc::new(Mutex::new(Vec::<f64>::new()));
        let sink = Arc::clone(&progress);
        engine.set_progress_handler(Some(Box::new(move |fraction| {
            sink.lock().expect("lock progress").push(fraction)
        })));
        engine.set_expected_duration(Some(2.0));

        let stderr = Cursor::new(
            "  Duration: 00:01:40.00, start: 0.000000\n\
size=  1kB time=00:00:01.00 bitrate=1kbits/s\r"
                .as_bytes()
                .to_vec(),
        );
        engine
            .drain_diagnostics(stderr, &mut Vec::new())
            .expect("in-memory read");
        assert_eq!(*progress.lock().expect("lock progress"), vec![0.5]);

        engine.set_expected_duration(None);
        let stderr = Cursor::new(
            "  Duration: 00:01:40.00, start: 0.000000\n\
size=  1kB time=00:00:10.00 bitrate=1kbits/s\r"
                .as_bytes()
                .to_vec(),
        );
        engine
            .drain_diagnostics(stderr, &mut Vec::new())
            .expect("in-memory read");
        assert_eq!(*progress.lock().expect("lock progress"), vec![0.5, 0.1]);
    }

    #[test]
    fn loader_reports_missing_binary_as_unavailable() {
        let loader = FfmpegLoader::new("/nonexistent/clipmix-ffmpeg");
        let result = loader.load(EngineVariant::SingleThreaded);
        assert!(matches!(
            result,
            Err(MediaFfmpegError::EngineUnavailable {
                variant: "single-threaded",
                ..
            })
        ));
    }
}
