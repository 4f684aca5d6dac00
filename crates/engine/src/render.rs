use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use media_ffmpeg::{
    CrossfadeSpec, PRIMARY_INPUT, RenderRequest, SECONDARY_INPUT, TranscodeEngine, compile_render,
};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result, SourceSlot, ValidationFailure};
use crate::output::{OutputSink, RenderedMedia};
use crate::prober::DurationProber;
use crate::session::EditSession;
use crate::slot::{EngineSlot, lock_engine};
use crate::source::MediaSource;

/// Shortest trim window that can be rendered, in seconds.
pub const MIN_SEGMENT_SECONDS: f64 = 0.01;
/// Slack allowed when comparing fade lengths with the trim window.
pub const FADE_TOLERANCE_SECONDS: f64 = 1e-6;

const FALLBACK_BASE_NAME: &str = "output";

/// Receives render progress as an integer percentage.
pub type ProgressObserver = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Preview,
    Export,
}

impl RenderMode {
    pub(crate) fn verb(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Export => "export",
        }
    }

    pub(crate) fn title(self) -> &'static str {
        match self {
            Self::Preview => "Preview",
            Self::Export => "Export",
        }
    }

    fn file_suffix(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Export => "edited",
        }
    }
}

/// Steps of one render run. `Failed` can follow any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Idle,
    Validating,
    EngineReady,
    Writing,
    Executing,
    ReadingOutput,
    Done,
    Failed,
}

impl Display for RenderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::EngineReady => "engine-ready",
            Self::Writing => "writing",
            Self::Executing => "executing",
            Self::ReadingOutput => "reading-output",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Monotonic preview generation shared between a session and its callers.
#[derive(Debug, Clone, Default)]
pub struct RunCounter(Arc<AtomicU64>);

impl RunCounter {
    /// Starts a new generation and returns its id.
    pub fn begin(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, run_id: u64) -> bool {
        self.current() == run_id
    }
}

/// What a finished render did with its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Presented(RenderedMedia),
    /// A newer preview was requested while this one ran.
    Discarded { run_id: u64 },
    Exported(RenderedMedia),
}

/// Validated parameters of one render.
#[derive(Debug, Clone)]
struct RenderPlan {
    request: RenderRequest,
    primary: Arc<dyn MediaSource>,
    secondary: Option<Arc<dyn MediaSource>>,
}

/// Runs previews and exports of an [`EditSession`] against the shared engine.
pub struct RenderOrchestrator {
    engines: Arc<EngineSlot>,
    runs: RunCounter,
    progress: Option<ProgressObserver>,
    stage: RenderStage,
    current_preview: Option<RenderedMedia>,
}

impl RenderOrchestrator {
    pub fn new(engines: Arc<EngineSlot>) -> Self {
        Self {
            engines,
            runs: RunCounter::default(),
            progress: None,
            stage: RenderStage::Idle,
            current_preview: None,
        }
    }

    /// Shares a run counter with request issuers, see [`RenderOrchestrator::preview_run`].
    pub fn with_run_counter(mut self, runs: RunCounter) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_progress_observer(mut self, observer: ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    pub fn runs(&self) -> &RunCounter {
        &self.runs
    }

    pub fn stage(&self) -> RenderStage {
        self.stage
    }

    pub fn current_preview(&self) -> Option<&RenderedMedia> {
        self.current_preview.as_ref()
    }

    pub fn engines(&self) -> &EngineSlot {
        &self.engines
    }

    /// Resolves a source duration, see [`DurationProber::probe`].
    pub fn probe_duration(
        &self,
        source: &dyn MediaSource,
        vfs_name: &str,
        slot: SourceSlot,
    ) -> Result<f64> {
        DurationProber::new(&self.engines).probe(source, vfs_name, slot)
    }

    /// Renders a preview under a fresh run id.
    pub fn preview(
        &mut self,
        session: &mut EditSession,
        sink: &mut dyn OutputSink,
    ) -> Result<RenderOutcome> {
        let run_id = self.runs.begin();
        self.preview_run(session, sink, run_id)
    }

    /// Renders a preview for a run id taken earlier with [`RunCounter::begin`].
    ///
    /// The result is discarded when a newer run has begun by the time it is
    /// ready.
    pub fn preview_run(
        &mut self,
        session: &mut EditSession,
        sink: &mut dyn OutputSink,
        run_id: u64,
    ) -> Result<RenderOutcome> {
        sink.pause_playback();
        let media = self.run(RenderMode::Preview, session, run_id)?;

        if !self.runs.is_current(run_id) {
            info!(run_id, latest = self.runs.current(), "discarding stale preview");
            return Ok(RenderOutcome::Discarded { run_id });
        }
        self.release_preview(sink);
        sink.present_preview(&media)
            .map_err(|source| EngineError::Output {
                file_name: media.file_name.clone(),
                source,
            })?;
        self.current_preview = Some(media.clone());
        info!(file_name = %media.file_name, run_id, "preview ready");
        Ok(RenderOutcome::Presented(media))
    }

    pub fn export(
        &mut self,
        session: &mut EditSession,
        sink: &mut dyn OutputSink,
    ) -> Result<RenderOutcome> {
        let media = self.run(RenderMode::Export, session, self.runs.current())?;
        sink.download(&media).map_err(|source| EngineError::Output {
            file_name: media.file_name.clone(),
            source,
        })?;
        info!(file_name = %media.file_name, bytes = media.bytes.len(), "export ready");
        Ok(RenderOutcome::Exported(media))
    }

    /// Releases the preview currently on display, if any.
    pub fn release_preview(&mut self, sink: &mut dyn OutputSink) {
        if let Some(previous) = self.current_preview.take() {
            debug!(file_name = %previous.file_name, "releasing previous preview");
            sink.release_preview(&previous);
        }
    }

    fn run(
        &mut self,
        mode: RenderMode,
        session: &mut EditSession,
        run_id: u64,
    ) -> Result<RenderedMedia> {
        self.report_progress(0.0);
        let result = self.run_stages(mode, session, run_id);
        match &result {
            Ok(_) => self.enter(mode, RenderStage::Done),
            Err(err) => {
                self.enter(mode, RenderStage::Failed);
                warn!(mode = mode.verb(), %err, "render failed");
            }
        }
        self.report_progress(0.0);
        self.enter(mode, RenderStage::Idle);
        result
    }

    fn run_stages(
        &mut self,
        mode: RenderMode,
        session: &mut EditSession,
        run_id: u64,
    ) -> Result<RenderedMedia> {
        self.enter(mode, RenderStage::Validating);
        let plan = self.validate(mode, session)?;

        self.enter(mode, RenderStage::EngineReady);
        let engine = self.engines.get_or_init()?;
        let mut engine = lock_engine(&engine);

        self.enter(mode, RenderStage::Writing);
        let compiled = compile_render(&plan.request)?;
        write_inputs(&mut **engine, &plan)?;

        self.enter(mode, RenderStage::Executing);
        let observer = self.progress.clone();
        engine.set_progress_handler(Some(Box::new(move |fraction| {
            if let Some(observer) = observer.as_ref() {
                observer(percent(fraction));
            }
        })));
        engine.set_expected_duration(Some(plan.request.output_duration()));
        debug!(args = ?compiled.args, "running render");
        let executed = engine.exec(&compiled.args);
        engine.set_expected_duration(None);
        executed.map_err(EngineError::Execution)?;

        self.enter(mode, RenderStage::ReadingOutput);
        let bytes = engine
            .read_file(&plan.request.output_name)
            .map_err(EngineError::Execution)?;

        Ok(RenderedMedia {
            file_name: plan.request.output_name,
            mime: plan.request.container.mime_type(),
            bytes: Arc::from(bytes),
            run_id,
        })
    }

    /// Checks render preconditions, probing unknown durations on the way.
    ///
    /// Missing sources are reported before any engine work.
    fn validate(&self, mode: RenderMode, session: &mut EditSession) -> Result<RenderPlan> {
        let primary = session
            .source_a()
            .cloned()
            .ok_or(ValidationFailure::NoSource { mode })?;
        let crossfade = session.crossfade();
        let secondary = if session.crossfade_enabled() {
            Some(
                session
                    .source_b()
                    .cloned()
                    .ok_or(ValidationFailure::MissingSecondarySource { mode })?,
            )
        } else {
            None
        };

        if session.duration_a() <= 0.0 {
            let seconds = self.probe_duration(primary.as_ref(), PRIMARY_INPUT, SourceSlot::Primary)?;
            session.set_primary_duration(seconds);
        }
        session.clamp_times();

        let segment = session.segment_duration();
        if segment <= MIN_SEGMENT_SECONDS {
            return Err(ValidationFailure::InvalidTrimRange {
                start: session.trim_start(),
                end: session.trim_end(),
            }
            .into());
        }
        let (fade_in, fade_out) = (session.fade_in(), session.fade_out());
        if fade_in + fade_out > segment + FADE_TOLERANCE_SECONDS {
            return Err(ValidationFailure::FadeExceedsClip {
                fade_in,
                fade_out,
                segment,
            }
            .into());
        }

        let crossfade = match secondary.as_ref() {
            Some(source) => {
                if session.duration_b() <= 0.0 {
                    let seconds =
                        self.probe_duration(source.as_ref(), SECONDARY_INPUT, SourceSlot::Secondary)?;
                    session.set_secondary_duration(seconds);
                }
                let secondary_duration = session.duration_b();
                if crossfade > segment || crossfade > secondary_duration {
                    return Err(ValidationFailure::CrossfadeTooLong {
                        crossfade,
                        segment,
                        secondary: secondary_duration,
                    }
                    .into());
                }
                Some(CrossfadeSpec {
                    duration: crossfade,
                    secondary_duration,
                })
            }
            None => None,
        };

        let container = session.output();
        let output_name = format!(
            "{}_{}.{}",
            base_name(primary.name()),
            mode.file_suffix(),
            container.extension()
        );
        Ok(RenderPlan {
            request: RenderRequest {
                trim_start: session.trim_start(),
                trim_end: session.trim_end(),
                eq: session.eq_gains(),
                fade_in,
                fade_out,
                crossfade,
                container,
                output_name,
            },
            primary,
            secondary,
        })
    }

    fn enter(&mut self, mode: RenderMode, stage: RenderStage) {
        debug!(mode = mode.verb(), from = %self.stage, to = %stage, "render stage");
        self.stage = stage;
    }

    fn report_progress(&self, fraction: f64) {
        if let Some(observer) = self.progress.as_ref() {
            observer(percent(fraction));
        }
    }
}

impl Debug for RenderOrchestrator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOrchestrator")
            .field("engines", &self.engines)
            .field("runs", &self.runs)
            .field("progress", &self.progress.is_some())
            .field("stage", &self.stage)
            .field("current_preview", &self.current_preview)
            .finish()
    }
}

/// Clears stale virtual files, then writes the sources the render reads.
fn write_inputs(engine: &mut dyn TranscodeEngine, plan: &RenderPlan) -> Result<()> {
    for name in [PRIMARY_INPUT, SECONDARY_INPUT, plan.request.output_name.as_str()] {
        if let Err(err) = engine.delete_file(name) {
            debug!(name, %err, "nothing to delete");
        }
    }

    let mut inputs = vec![(PRIMARY_INPUT, &plan.primary)];
    if let Some(secondary) = plan.secondary.as_ref() {
        inputs.push((SECONDARY_INPUT, secondary));
    }
    for (vfs_name, source) in inputs {
        let bytes = source.read_all().map_err(|err| EngineError::SourceIo {
            context: "read source bytes",
            name: source.name().to_string(),
            source: err,
        })?;
        engine
            .write_file(vfs_name, &bytes)
            .map_err(EngineError::Execution)?;
    }
    Ok(())
}

/// Name of `file_name` without its last extension, or `output` when empty.
pub fn base_name(file_name: &str) -> &str {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !extension.is_empty() && !extension.contains('/') => stem,
        _ => file_name,
    };
    if stem.is_empty() {
        FALLBACK_BASE_NAME
    } else {
        stem
    }
}

fn percent(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}
