use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroUsize;

use crate::error::Result;

/// Callback receiving fractional completion in `[0, 1]`.
pub type ProgressHandler = Box<dyn FnMut(f64) + Send>;
/// Callback receiving one diagnostic line.
pub type LogHandler = Box<dyn FnMut(&str) + Send>;

/// Threading flavour of a loaded engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineVariant {
    MultiThreaded,
    SingleThreaded,
}

impl EngineVariant {
    pub fn name(self) -> &'static str {
        match self {
            Self::MultiThreaded => "multi-threaded",
            Self::SingleThreaded => "single-threaded",
        }
    }
}

impl Display for EngineVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Transcoding engine with a private virtual filesystem.
///
/// The filesystem is shared state: callers must not run two invocations
/// against one engine at the same time.
pub trait TranscodeEngine: Send {
    fn variant(&self) -> EngineVariant;

    fn write_file(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;

    fn delete_file(&mut self, name: &str) -> Result<()>;

    /// Runs one invocation; fails on a non-zero exit status.
    fn exec(&mut self, args: &[String]) -> Result<()>;

    /// Replaces the progress subscription; `None` unsubscribes.
    fn set_progress_handler(&mut self, handler: Option<ProgressHandler>);

    /// Replaces the log subscription; `None` unsubscribes.
    fn set_log_handler(&mut self, handler: Option<LogHandler>);

    /// Length in seconds of the output the next invocations write.
    ///
    /// Engines that derive progress from timestamps divide by it; `None`
    /// falls back to the first input's duration.
    fn set_expected_duration(&mut self, _seconds: Option<f64>) {}
}

/// Creates engines of a requested variant.
pub trait EngineLoader: Send + Sync {
    fn load(&self, variant: EngineVariant) -> Result<Box<dyn TranscodeEngine>>;
}

/// What the host process offers to a loading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub parallel_threads: bool,
}

impl HostCapabilities {
    /// Detects whether more than one hardware thread is available.
    pub fn detect() -> Self {
        let threads = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            parallel_threads: threads > 1,
        }
    }

    /// Variants to try, preferred first.
    pub fn load_order(self) -> &'static [EngineVariant] {
        if self.parallel_threads {
            &[EngineVariant::MultiThreaded, EngineVariant::SingleThreaded]
        } else {
            &[EngineVariant::SingleThreaded]
        }
    }
}

/// Single-slot progress/log subscriptions shared by engine implementations.
#[derive(Default)]
pub struct EngineEvents {
    progress: Option<ProgressHandler>,
    log: Option<LogHandler>,
}

impl EngineEvents {
    pub fn set_progress(&mut self, handler: Option<ProgressHandler>) {
        self.progress = handler;
    }

    pub fn set_log(&mut self, handler: Option<LogHandler>) {
        self.log = handler;
    }

    /// Forwards `fraction` clamped to `[0, 1]`; non-finite values are dropped.
    pub fn emit_progress(&mut self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        if let Some(handler) = self.progress.as_mut() {
            handler(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn emit_log(&mut self, line: &str) {
        if let Some(handler) = self.log.as_mut() {
            handler(line);
        }
    }
}

impl Debug for EngineEvents {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEvents")
            .field("progress", &self.progress.is_some())
            .field("log", &self.log.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{EngineEvents, EngineVariant, HostCapabilities};

    #[test]
    fn replacing_progress_handler_drops_previous_subscriber() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let mut events = EngineEvents::default();

        let sink = Arc::clone(&first);
        events.set_progress(Some(Box::new(move |fraction| {
            sink.lock().expect("lock first").push(fraction)
        })));
        events.emit_progress(0.25);

        let sink = Arc::clone(&second);
        events.set_progress(Some(Box::new(move |fraction| {
            sink.lock().expect("lock second").push(fraction)
        })));
        events.emit_progress(1.5);
        events.emit_progress(f64::NAN);

        assert_eq!(*first.lock().expect("lock first"), vec![0.25]);
        assert_eq!(*second.lock().expect("lock second"), vec![1.0]);
    }

    #[test]
    fn load_order_prefers_multi_threaded_only_with_parallel_host() {
        let parallel = HostCapabilities {
            parallel_threads: true,
        };
        let serial = HostCapabilities {
            parallel_threads: false,
        };

        assert_eq!(
            parallel.load_order(),
            [EngineVariant::MultiThreaded, EngineVariant::SingleThreaded]
        );
        assert_eq!(serial.load_order(), [EngineVariant::SingleThreaded]);
    }
}
