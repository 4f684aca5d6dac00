use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{MediaFfmpegError, Result};
use crate::transcoder::{
    EngineEvents, EngineLoader, EngineVariant, LogHandler, ProgressHandler, TranscodeEngine,
};

/// Duration reported by mock probes unless configured otherwise.
pub const MOCK_PROBE_SECONDS: f64 = 10.0;
/// Bytes written as the output of every successful mock render.
pub const MOCK_OUTPUT_BYTES: &[u8] = b"FAKE";

/// One engine call recorded by [`MockJournal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Write(String),
    Read(String),
    Delete(String),
    Exec(Vec<String>),
    /// Output length announced before a render, in whole milliseconds.
    ExpectDuration { millis: u64 },
}

/// Shared record of every call made against mock engines.
#[derive(Debug, Clone, Default)]
pub struct MockJournal(Arc<Mutex<Vec<MockOp>>>);

impl MockJournal {
    pub fn ops(&self) -> Vec<MockOp> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Argument lists of every `exec` call, oldest first.
    pub fn execs(&self) -> Vec<Vec<String>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MockOp::Exec(args) => Some(args),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn record(&self, op: MockOp) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

/// In-memory engine that honours the engine contract without transcoding.
///
/// Inspect-only invocations (`-hide_banner -i <file>`) log a `Duration:` line
/// and fail like the real engine does when no output is requested. Every
/// other invocation reports progress and writes [`MOCK_OUTPUT_BYTES`] to its
/// last argument.
#[derive(Debug)]
pub struct MockEngine {
    variant: EngineVariant,
    files: HashMap<String, Vec<u8>>,
    events: EngineEvents,
    journal: MockJournal,
    probe_seconds: f64,
    fail_renders: bool,
}

impl MockEngine {
    pub fn new(variant: EngineVariant) -> Self {
        Self {
            variant,
            files: HashMap::new(),
            events: EngineEvents::default(),
            journal: MockJournal::default(),
            probe_seconds: MOCK_PROBE_SECONDS,
            fail_renders: false,
        }
    }

    pub fn with_journal(mut self, journal: MockJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_probe_seconds(mut self, seconds: f64) -> Self {
        self.probe_seconds = seconds;
        self
    }

    /// Makes every render invocation exit with a failure status.
    pub fn with_failing_renders(mut self, fail: bool) -> Self {
        self.fail_renders = fail;
        self
    }

    /// Names currently stored in the virtual filesystem, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        names
    }
}

impl TranscodeEngine for MockEngine {
    fn variant(&self) -> EngineVariant {
        self.variant
    }

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.journal.record(MockOp::Write(name.to_string()));
        self.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        self.journal.record(MockOp::Read(name.to_string()));
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| MediaFfmpegError::MissingFile(name.to_string()))
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        self.journal.record(MockOp::Delete(name.to_string()));
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MediaFfmpegError::MissingFile(name.to_string()))
    }

    fn exec(&mut self, args: &[String]) -> Result<()> {
        self.journal.record(MockOp::Exec(args.to_vec()));

        if args.len() == 3 && args.iter().any(|arg| arg == "-i") {
            self.events.emit_log(&format!(
                "  Duration: {}, start: 0.000000, bitrate: 128 kb/s",
                format_clock(self.probe_seconds)
            ));
            return Err(MediaFfmpegError::ExecFailed {
                command: args.join(" "),
                code: Some(1),
                stderr: "At least one output file must be specified".to_string(),
            });
        }

        if self.fail_renders {
            return Err(MediaFfmpegError::ExecFailed {
                command: args.join(" "),
                code: Some(1),
                stderr: "mock render failure".to_string(),
            });
        }

        for fraction in [0.1, 0.6, 1.0] {
            self.events.emit_progress(fraction);
        }
        let output = args
            .last()
            .ok_or(MediaFfmpegError::InvalidRenderRequest {
                reason: "invocation has no output",
            })?;
        self.files.insert(output.clone(), MOCK_OUTPUT_BYTES.to_vec());
        Ok(())
    }

    fn set_progress_handler(&mut self, handler: Option<ProgressHandler>) {
        self.events.set_progress(handler);
    }

    fn set_log_handler(&mut self, handler: Option<LogHandler>) {
        self.events.set_log(handler);
    }

    fn set_expected_duration(&mut self, seconds: Option<f64>) {
        if let Some(seconds) = seconds.filter(|seconds| seconds.is_finite() && *seconds >= 0.0) {
            self.journal.record(MockOp::ExpectDuration {
                millis: (seconds * 1000.0).round() as u64,
            });
        }
    }
}

/// Loader producing [`MockEngine`]s that share one journal.
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    journal: MockJournal,
    unavailable: Vec<EngineVariant>,
    probe_seconds: Option<f64>,
    fail_renders: bool,
    load_delay: Option<Duration>,
    loads: Arc<AtomicUsize>,
}

impl MockLoader {
    pub fn new(journal: MockJournal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Makes loading `variant` fail.
    pub fn without_variant(mut self, variant: EngineVariant) -> Self {
        self.unavailable.push(variant);
        self
    }

    pub fn with_probe_seconds(mut self, seconds: f64) -> Self {
        self.probe_seconds = Some(seconds);
        self
    }

    pub fn with_failing_renders(mut self) -> Self {
        self.fail_renders = true;
        self
    }

    /// Sleeps inside every `load` call.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Number of `load` calls made so far, failed ones included.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EngineLoader for MockLoader {
    fn load(&self, variant: EngineVariant) -> Result<Box<dyn TranscodeEngine>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            std::thread::sleep(delay);
        }
        if self.unavailable.contains(&variant) {
            return Err(MediaFfmpegError::EngineUnavailable {
                variant: variant.name(),
                reason: "disabled in mock loader".to_string(),
            });
        }

        let engine = MockEngine::new(variant)
            .with_journal(self.journal.clone())
            .with_probe_seconds(self.probe_seconds.unwrap_or(MOCK_PROBE_SECONDS))
            .with_failing_renders(self.fail_renders);
        Ok(Box::new(engine))
    }
}

fn format_clock(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hours = (seconds / 3600.0).floor();
    let minutes = ((seconds - hours * 3600.0) / 60.0).floor();
    let rest = seconds - hours * 3600.0 - minutes * 60.0;
    format!("{hours:02}:{minutes:02}:{rest:05.2}")
}
