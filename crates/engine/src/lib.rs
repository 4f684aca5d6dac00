//! Editing session for clipmix: trim, EQ, fades and crossfade over one or
//! two sources, rendered through a shared transcoding engine.

pub mod api;
pub mod bridge;
pub mod error;
pub mod output;
pub mod prober;
pub mod render;
pub mod session;
pub mod settings;
pub mod signature;
pub mod slot;
pub mod source;
pub mod time;

pub use api::{Command, EngineErrorEvent, EngineErrorKind, Event, Session};
pub use bridge::{SessionClient, SessionEventReceiver, spawn_session_bridge};
pub use error::{EngineError, Result, SourceSlot, ValidationFailure};
pub use output::{DirectorySink, OutputSink, RenderedMedia};
pub use prober::{DurationProber, probe_with_engine};
pub use render::{
    ProgressObserver, RenderMode, RenderOrchestrator, RenderOutcome, RenderStage, RunCounter,
};
pub use session::{EditSession, SessionSnapshot};
pub use settings::{EditorSettings, EqPreset, SettingsStore, migrate_legacy_eq};
pub use slot::{EngineSlot, SharedEngine, lock_engine};
pub use source::{FileSource, MediaSource, MemorySource, SourceHandle, SourceSummary};
pub use time::{format_time, parse_time};
