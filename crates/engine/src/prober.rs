use std::sync::{Arc, Mutex, PoisonError};

use media_ffmpeg::{TranscodeEngine, parse_duration_from_logs, probe_args};
use tracing::debug;

use crate::error::{EngineError, Result, SourceSlot};
use crate::slot::{EngineSlot, lock_engine};
use crate::source::MediaSource;

/// Resolves source durations, preferring container metadata over the engine.
#[derive(Debug, Clone, Copy)]
pub struct DurationProber<'a> {
    engines: &'a EngineSlot,
}

impl<'a> DurationProber<'a> {
    pub fn new(engines: &'a EngineSlot) -> Self {
        Self { engines }
    }

    /// Returns the duration of `source` in seconds.
    ///
    /// Native metadata answers without touching the engine. Otherwise the
    /// source is written to `vfs_name` and the engine's diagnostics are
    /// parsed.
    pub fn probe(&self, source: &dyn MediaSource, vfs_name: &str, slot: SourceSlot) -> Result<f64> {
        if let Some(seconds) = source.native_duration() {
            debug!(name = source.name(), seconds, "duration from container metadata");
            return Ok(seconds);
        }

        let engine = self.engines.get_or_init()?;
        let mut engine = lock_engine(&engine);
        probe_with_engine(&mut **engine, source, vfs_name, slot)
    }
}

/// Writes `source` to `vfs_name`, runs an inspect-only invocation and reads
/// the `Duration:` line from its diagnostics.
///
/// The invocation exits with a failure because it names no output; that is
/// expected and not reported.
pub fn probe_with_engine(
    engine: &mut dyn TranscodeEngine,
    source: &dyn MediaSource,
    vfs_name: &str,
    slot: SourceSlot,
) -> Result<f64> {
    if let Err(err) = engine.delete_file(vfs_name) {
        debug!(vfs_name, %err, "no stale file to remove");
    }
    let bytes = source.read_all().map_err(|err| EngineError::SourceIo {
        context: "read source bytes",
        name: source.name().to_string(),
        source: err,
    })?;
    engine
        .write_file(vfs_name, &bytes)
        .map_err(|err| EngineError::Probe {
            slot,
            reason: err.to_string(),
        })?;

    let logs = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&logs);
    engine.set_log_handler(Some(Box::new(move |line| {
        let mut logs = sink.lock().unwrap_or_else(PoisonError::into_inner);
        logs.push_str(line);
        logs.push('\n');
    })));
    if let Err(err) = engine.exec(&probe_args(vfs_name)) {
        debug!(vfs_name, %err, "inspect-only invocation exited");
    }
    engine.set_log_handler(None);

    let logs = logs.lock().unwrap_or_else(PoisonError::into_inner);
    let seconds = parse_duration_from_logs(&logs).map_err(|err| EngineError::Probe {
        slot,
        reason: err.to_string(),
    })?;
    if seconds <= 0.0 {
        return Err(EngineError::Probe {
            slot,
            reason: format!("engine reported a duration of {seconds}s"),
        });
    }
    debug!(name = source.name(), seconds, "duration from engine diagnostics");
    Ok(seconds)
}
