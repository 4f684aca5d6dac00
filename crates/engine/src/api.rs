use media_ffmpeg::{OutputContainer, PRIMARY_INPUT, SECONDARY_INPUT};
use tracing::{info, warn};

use crate::error::{EngineError, Result, SourceSlot};
use crate::output::{OutputSink, RenderedMedia};
use crate::render::{RenderOrchestrator, RenderOutcome};
use crate::session::{EditSession, SessionSnapshot};
use crate::settings::{EditorSettings, EqPreset, SettingsStore};
use crate::signature;
use crate::source::{SourceHandle, SourceSummary};

/// Commands accepted by a [`Session`].
#[derive(Debug, Clone)]
pub enum Command {
    LoadPrimary {
        source: SourceHandle,
    },
    /// Loads the source crossfaded in after the primary segment.
    LoadSecondary {
        source: SourceHandle,
    },
    SetTrimStart {
        seconds: f64,
    },
    SetTrimEnd {
        seconds: f64,
    },
    /// Sets the trim start from `mm:ss`; unparsable text leaves it unchanged.
    SetTrimStartText {
        text: String,
    },
    /// Sets the trim end from `mm:ss`; unparsable text leaves it unchanged.
    SetTrimEndText {
        text: String,
    },
    SetFadeIn {
        seconds: f64,
    },
    SetFadeOut {
        seconds: f64,
    },
    /// Zero disables the crossfade and drops the secondary source.
    SetCrossfade {
        seconds: f64,
    },
    SetEqBand {
        band: usize,
        gain: f64,
    },
    ApplyPreset {
        preset: EqPreset,
    },
    SaveCustomPreset,
    SetOutput {
        container: OutputContainer,
    },
    /// Renders a preview.
    ///
    /// `run_id` comes from the session's run counter when the request was
    /// issued; `None` takes a fresh id on arrival.
    Preview {
        run_id: Option<u64>,
    },
    Export,
    /// Clears both sources and the trim window and releases the preview.
    StartOver,
}

/// Events emitted by a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionChanged(SessionSnapshot),
    SourceLoaded {
        slot: SourceSlot,
        summary: SourceSummary,
    },
    Progress {
        percent: u8,
    },
    PreviewReady(RenderedMedia),
    PreviewDiscarded {
        run_id: u64,
    },
    Exported(RenderedMedia),
    StartedOver,
    Error(EngineErrorEvent),
}

/// Category of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Validation,
    UnsupportedFile,
    Probe,
    EngineInit,
    Execution,
    Settings,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::Validation(_) => Self::Validation,
            EngineError::UnsupportedFile { .. } => Self::UnsupportedFile,
            EngineError::Probe { .. } => Self::Probe,
            EngineError::EngineInit(_) => Self::EngineInit,
            EngineError::Execution(_) => Self::Execution,
            EngineError::SettingsIo { .. }
            | EngineError::SettingsSerialization { .. }
            | EngineError::InvalidSettings { .. } => Self::Settings,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// One editing session: state, renderer, output sink and optional settings file.
#[derive(Debug)]
pub struct Session<S> {
    edit: EditSession,
    renderer: RenderOrchestrator,
    sink: S,
    settings: Option<SettingsStore>,
}

impl<S> Session<S>
where
    S: OutputSink,
{
    pub fn new(renderer: RenderOrchestrator, sink: S) -> Self {
        Self {
            edit: EditSession::new(),
            renderer,
            sink,
            settings: None,
        }
    }

    /// Applies preferences without persisting later changes.
    pub fn with_settings(mut self, settings: &EditorSettings) -> Self {
        self.edit.apply_settings(settings);
        self
    }

    /// Applies stored preferences and saves later preference changes back.
    pub fn with_settings_store(mut self, store: SettingsStore) -> Self {
        self.edit.apply_settings(&store.load_or_default());
        self.settings = Some(store);
        self
    }

    pub fn edit(&self) -> &EditSession {
        &self.edit
    }

    pub fn renderer(&self) -> &RenderOrchestrator {
        &self.renderer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::LoadPrimary { source } => self.load_primary(source),
            Command::LoadSecondary { source } => self.load_secondary(source),
            Command::SetTrimStart { seconds } => {
                self.edit.set_trim_start(seconds);
                Ok(self.changed())
            }
            Command::SetTrimEnd { seconds } => {
                self.edit.set_trim_end(seconds);
                Ok(self.changed())
            }
            Command::SetTrimStartText { text } => {
                self.edit.set_trim_start_text(&text);
                Ok(self.changed())
            }
            Command::SetTrimEndText { text } => {
                self.edit.set_trim_end_text(&text);
                Ok(self.changed())
            }
            Command::SetFadeIn { seconds } => {
                self.edit.set_fade_in(seconds);
                Ok(self.preferences_changed())
            }
            Command::SetFadeOut { seconds } => {
                self.edit.set_fade_out(seconds);
                Ok(self.preferences_changed())
            }
            Command::SetCrossfade { seconds } => {
                self.edit.set_crossfade(seconds);
                Ok(self.preferences_changed())
            }
            Command::SetEqBand { band, gain } => {
                self.edit.set_eq_band(band, gain)?;
                Ok(self.preferences_changed())
            }
            Command::ApplyPreset { preset } => {
                self.edit.apply_preset(preset);
                Ok(self.preferences_changed())
            }
            Command::SaveCustomPreset => {
                self.edit.save_custom_preset();
                Ok(self.preferences_changed())
            }
            Command::SetOutput { container } => {
                self.edit.set_output(container);
                Ok(self.preferences_changed())
            }
            Command::Preview { run_id } => self.preview(run_id),
            Command::Export => self.export(),
            Command::StartOver => self.start_over(),
        }
    }

    fn load_primary(&mut self, source: SourceHandle) -> Result<Vec<Event>> {
        if !signature::accepts(source.as_ref()) {
            return Err(EngineError::UnsupportedFile {
                slot: SourceSlot::Primary,
                name: source.name().to_string(),
            });
        }
        let duration = self.probe_or_unknown(&source, PRIMARY_INPUT, SourceSlot::Primary);
        self.edit.set_primary(source.clone(), duration);
        info!(name = source.name(), duration = self.edit.duration_a(), "primary source loaded");

        Ok(vec![
            Event::SourceLoaded {
                slot: SourceSlot::Primary,
                summary: SourceSummary::describe(source.as_ref(), self.edit.duration_a()),
            },
            Event::SessionChanged(self.edit.snapshot()),
        ])
    }

    fn load_secondary(&mut self, source: SourceHandle) -> Result<Vec<Event>> {
        if !signature::accepts(source.as_ref()) {
            return Err(EngineError::UnsupportedFile {
                slot: SourceSlot::Secondary,
                name: source.name().to_string(),
            });
        }
        let duration = self.probe_or_unknown(&source, SECONDARY_INPUT, SourceSlot::Secondary);
        self.edit.set_secondary(source.clone(), duration);
        info!(name = source.name(), duration = self.edit.duration_b(), "secondary source loaded");

        Ok(vec![
            Event::SourceLoaded {
                slot: SourceSlot::Secondary,
                summary: SourceSummary::describe(source.as_ref(), self.edit.duration_b()),
            },
            Event::SessionChanged(self.edit.snapshot()),
        ])
    }

    /// Probes a newly loaded source; failures leave the duration unknown.
    fn probe_or_unknown(
        &self,
        source: &SourceHandle,
        vfs_name: &str,
        slot: SourceSlot,
    ) -> Option<f64> {
        match self.renderer.probe_duration(source.as_ref(), vfs_name, slot) {
            Ok(seconds) => Some(seconds),
            Err(err) => {
                warn!(name = source.name(), %err, "duration unknown after load");
                None
            }
        }
    }

    fn preview(&mut self, run_id: Option<u64>) -> Result<Vec<Event>> {
        let run_id = run_id.unwrap_or_else(|| self.renderer.runs().begin());
        let outcome = self
            .renderer
            .preview_run(&mut self.edit, &mut self.sink, run_id)?;
        Ok(self.rendered(outcome))
    }

    fn export(&mut self) -> Result<Vec<Event>> {
        let outcome = self.renderer.export(&mut self.edit, &mut self.sink)?;
        Ok(self.rendered(outcome))
    }

    fn rendered(&self, outcome: RenderOutcome) -> Vec<Event> {
        let event = match outcome {
            RenderOutcome::Presented(media) => Event::PreviewReady(media),
            RenderOutcome::Discarded { run_id } => Event::PreviewDiscarded { run_id },
            RenderOutcome::Exported(media) => Event::Exported(media),
        };
        vec![Event::SessionChanged(self.edit.snapshot()), event]
    }

    fn start_over(&mut self) -> Result<Vec<Event>> {
        self.edit.reset();
        self.renderer.release_preview(&mut self.sink);
        info!("session reset");
        Ok(vec![
            Event::StartedOver,
            Event::SessionChanged(self.edit.snapshot()),
        ])
    }

    fn changed(&self) -> Vec<Event> {
        vec![Event::SessionChanged(self.edit.snapshot())]
    }

    fn preferences_changed(&self) -> Vec<Event> {
        if let Some(store) = self.settings.as_ref() {
            if let Err(err) = store.save(&self.edit.to_settings()) {
                warn!(%err, "could not save settings");
            }
        }
        self.changed()
    }
}
