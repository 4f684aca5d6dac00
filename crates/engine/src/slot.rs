use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use media_ffmpeg::{EngineLoader, HostCapabilities, MediaFfmpegError, TranscodeEngine};
use tracing::{info, warn};

use crate::error::{EngineError, Result};

/// Loaded engine shared by every render; the mutex serializes invocations.
pub type SharedEngine = Arc<Mutex<Box<dyn TranscodeEngine>>>;

static PROCESS_SLOT: OnceLock<Arc<EngineSlot>> = OnceLock::new();

/// Lazily loaded transcoding engine.
///
/// The first caller of [`EngineSlot::get_or_init`] loads the engine while
/// holding the slot lock, so concurrent first callers wait for that load
/// instead of starting their own. Later callers get the same engine.
pub struct EngineSlot {
    loader: Box<dyn EngineLoader>,
    host: HostCapabilities,
    engine: Mutex<Option<SharedEngine>>,
}

impl EngineSlot {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            host: HostCapabilities::detect(),
            engine: Mutex::new(None),
        }
    }

    /// Overrides the detected host capabilities.
    pub fn with_host(mut self, host: HostCapabilities) -> Self {
        self.host = host;
        self
    }

    /// Returns the process-wide slot, creating it with `make` on first use.
    ///
    /// Later calls ignore `make`.
    pub fn process_wide(make: impl FnOnce() -> EngineSlot) -> Arc<EngineSlot> {
        Arc::clone(PROCESS_SLOT.get_or_init(|| Arc::new(make())))
    }

    pub fn is_loaded(&self) -> bool {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the loaded engine, loading it first if needed.
    pub fn get_or_init(&self) -> Result<SharedEngine> {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine: SharedEngine = Arc::new(Mutex::new(self.load()?));
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    fn load(&self) -> Result<Box<dyn TranscodeEngine>> {
        let order = self.host.load_order();
        let mut last_error = None;
        for (attempt, variant) in order.iter().enumerate() {
            match self.loader.load(*variant) {
                Ok(engine) => {
                    info!(%variant, "transcoding engine loaded");
                    return Ok(engine);
                }
                Err(err) => {
                    if attempt + 1 < order.len() {
                        warn!(%variant, %err, "engine variant unavailable, falling back");
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(EngineError::EngineInit(last_error.unwrap_or_else(|| {
            MediaFfmpegError::EngineUnavailable {
                variant: "none",
                reason: "no engine variant to try".to_string(),
            }
        })))
    }
}

impl Debug for EngineSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSlot")
            .field("host", &self.host)
            .field(
                "loaded",
                &self.engine.try_lock().map(|engine| engine.is_some()).ok(),
            )
            .finish()
    }
}

/// Locks a shared engine, recovering from a panicked holder.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, Box<dyn TranscodeEngine>> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use media_ffmpeg::{EngineVariant, HostCapabilities, MockJournal, MockLoader};

    use super::{EngineSlot, lock_engine};
    use crate::error::EngineError;

    const PARALLEL: HostCapabilities = HostCapabilities {
        parallel_threads: true,
    };

    #[test]
    fn falls_back_to_single_threaded_variant() {
        let loader =
            MockLoader::new(MockJournal::default()).without_variant(EngineVariant::MultiThreaded);
        let slot = EngineSlot::new(loader.clone()).with_host(PARALLEL);

        let engine = slot.get_or_init().expect("fallback variant loads");
        assert_eq!(lock_engine(&engine).variant(), EngineVariant::SingleThreaded);
        assert_eq!(loader.load_count(), 2);
    }

    #[test]
    fn serial_host_never_tries_multi_threaded_variant() {
        let loader = MockLoader::new(MockJournal::default());
        let slot = EngineSlot::new(loader.clone()).with_host(HostCapabilities {
            parallel_threads: false,
        });

        let engine = slot.get_or_init().expect("loads");
        assert_eq!(lock_engine(&engine).variant(), EngineVariant::SingleThreaded);
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn total_failure_reports_engine_init_and_retries_later() {
        let loader = MockLoader::new(MockJournal::default())
            .without_variant(EngineVariant::MultiThreaded)
            .without_variant(EngineVariant::SingleThreaded);
        let slot = EngineSlot::new(loader.clone()).with_host(PARALLEL);

        assert!(matches!(slot.get_or_init(), Err(EngineError::EngineInit(_))));
        assert!(!slot.is_loaded());
        assert!(slot.get_or_init().is_err());
        assert_eq!(loader.load_count(), 4);
    }

    #[test]
    fn concurrent_first_callers_share_one_load() {
        let loader = MockLoader::new(MockJournal::default()).with_load_delay(Duration::from_millis(50));
        let slot = Arc::new(EngineSlot::new(loader.clone()).with_host(PARALLEL));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || slot.get_or_init().expect("loads"))
            })
            .collect();
        let engines: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect();

        assert_eq!(loader.load_count(), 1);
        assert!(engines.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
