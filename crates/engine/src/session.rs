use media_ffmpeg::{EqGains, OutputContainer};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::settings::{EditorSettings, EqPreset};
use crate::source::SourceHandle;
use crate::time::{format_time, parse_time};

/// Mutable editing state: sources, trim window, fades, crossfade, EQ and
/// output container.
///
/// Trim bounds are kept inside `[0, duration_a]` and ordered whenever the
/// primary duration is known. Fade and crossfade lengths are checked against
/// the trim window at render time.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    source_a: Option<SourceHandle>,
    source_b: Option<SourceHandle>,
    duration_a: f64,
    duration_b: f64,
    trim_start: f64,
    trim_end: f64,
    fade_in: f64,
    fade_out: f64,
    crossfade: f64,
    eq_gains: EqGains,
    eq_preset: EqPreset,
    custom_eq: Option<EqGains>,
    output: OutputContainer,
}

/// Immutable view of an [`EditSession`] for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub duration_a: f64,
    pub duration_b: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub start_text: String,
    pub end_text: String,
    pub fade_in: f64,
    pub fade_out: f64,
    pub crossfade: f64,
    pub eq: [f64; media_ffmpeg::EQ_BAND_COUNT],
    pub eq_preset: EqPreset,
    pub output: OutputContainer,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session with persisted preferences applied.
    pub fn with_settings(settings: &EditorSettings) -> Self {
        let mut session = Self::default();
        session.apply_settings(settings);
        session
    }

    pub fn source_a(&self) -> Option<&SourceHandle> {
        self.source_a.as_ref()
    }

    pub fn source_b(&self) -> Option<&SourceHandle> {
        self.source_b.as_ref()
    }

    pub fn duration_a(&self) -> f64 {
        self.duration_a
    }

    pub fn duration_b(&self) -> f64 {
        self.duration_b
    }

    pub fn trim_start(&self) -> f64 {
        self.trim_start
    }

    pub fn trim_end(&self) -> f64 {
        self.trim_end
    }

    pub fn fade_in(&self) -> f64 {
        self.fade_in
    }

    pub fn fade_out(&self) -> f64 {
        self.fade_out
    }

    pub fn crossfade(&self) -> f64 {
        self.crossfade
    }

    pub fn crossfade_enabled(&self) -> bool {
        self.crossfade > 0.0
    }

    pub fn eq_gains(&self) -> EqGains {
        self.eq_gains
    }

    pub fn eq_preset(&self) -> EqPreset {
        self.eq_preset
    }

    pub fn output(&self) -> OutputContainer {
        self.output
    }

    /// Length of the trim window.
    pub fn segment_duration(&self) -> f64 {
        (self.trim_end - self.trim_start).max(0.0)
    }

    /// Installs the primary source; the trim window resets to the whole clip.
    pub fn set_primary(&mut self, source: SourceHandle, duration: Option<f64>) {
        debug!(name = source.name(), ?duration, "primary source set");
        self.source_a = Some(source);
        self.duration_a = 0.0;
        self.trim_start = 0.0;
        self.trim_end = 0.0;
        if let Some(duration) = duration {
            self.set_primary_duration(duration);
        }
    }

    /// Records a probed primary duration and resets the trim window to it.
    pub fn set_primary_duration(&mut self, duration: f64) {
        if !is_known_duration(duration) {
            return;
        }
        self.duration_a = duration;
        self.trim_start = 0.0;
        self.trim_end = duration;
    }

    pub fn set_secondary(&mut self, source: SourceHandle, duration: Option<f64>) {
        debug!(name = source.name(), ?duration, "secondary source set");
        self.source_b = Some(source);
        self.duration_b = duration.filter(|duration| is_known_duration(*duration)).unwrap_or(0.0);
    }

    pub fn set_secondary_duration(&mut self, duration: f64) {
        if is_known_duration(duration) {
            self.duration_b = duration;
        }
    }

    pub fn clear_secondary(&mut self) {
        self.source_b = None;
        self.duration_b = 0.0;
    }

    /// Sets the trim start; non-finite values are ignored.
    pub fn set_trim_start(&mut self, seconds: f64) -> bool {
        if !seconds.is_finite() {
            return false;
        }
        self.trim_start = seconds;
        self.clamp_times();
        true
    }

    /// Sets the trim end; non-finite values are ignored.
    pub fn set_trim_end(&mut self, seconds: f64) -> bool {
        if !seconds.is_finite() {
            return false;
        }
        self.trim_end = seconds;
        self.clamp_times();
        true
    }

    /// Sets the trim start from `mm:ss`; unparsable text keeps the old value.
    pub fn set_trim_start_text(&mut self, text: &str) -> bool {
        parse_time(text).is_some_and(|seconds| self.set_trim_start(seconds))
    }

    /// Sets the trim end from `mm:ss`; unparsable text keeps the old value.
    pub fn set_trim_end_text(&mut self, text: &str) -> bool {
        parse_time(text).is_some_and(|seconds| self.set_trim_end(seconds))
    }

    /// Clamps the trim window into `[0, duration_a]` and orders it.
    ///
    /// Does nothing while the primary duration is unknown.
    pub fn clamp_times(&mut self) {
        if !is_known_duration(self.duration_a) {
            return;
        }
        self.trim_start = self.trim_start.clamp(0.0, self.duration_a);
        self.trim_end = self.trim_end.clamp(0.0, self.duration_a);
        if self.trim_end < self.trim_start {
            std::mem::swap(&mut self.trim_start, &mut self.trim_end);
        }
    }

    pub fn set_fade_in(&mut self, seconds: f64) -> bool {
        match non_negative(seconds) {
            Some(seconds) => {
                self.fade_in = seconds;
                true
            }
            None => false,
        }
    }

    pub fn set_fade_out(&mut self, seconds: f64) -> bool {
        match non_negative(seconds) {
            Some(seconds) => {
                self.fade_out = seconds;
                true
            }
            None => false,
        }
    }

    /// Sets the crossfade length; returning to zero drops the secondary source.
    pub fn set_crossfade(&mut self, seconds: f64) -> bool {
        let Some(seconds) = non_negative(seconds) else {
            return false;
        };
        self.crossfade = seconds;
        if seconds == 0.0 {
            self.clear_secondary();
        }
        true
    }

    /// Sets one band and switches the preset to custom.
    pub fn set_eq_band(&mut self, band: usize, gain: f64) -> Result<()> {
        if !gain.is_finite() || !self.eq_gains.set(band, gain) {
            return Err(EngineError::InvalidEqBand { band });
        }
        self.eq_preset = EqPreset::Custom;
        Ok(())
    }

    pub fn set_eq_gains(&mut self, gains: EqGains) {
        self.eq_gains = gains;
        self.eq_preset = EqPreset::Custom;
    }

    /// Applies a preset; `Custom` restores the saved custom gains if any.
    pub fn apply_preset(&mut self, preset: EqPreset) {
        let gains = match preset {
            EqPreset::Custom => self.custom_eq,
            builtin => builtin.gains(),
        };
        if let Some(gains) = gains {
            self.eq_gains = gains;
        }
        self.eq_preset = preset;
    }

    /// Stores the current gains as the custom preset.
    pub fn save_custom_preset(&mut self) {
        self.custom_eq = Some(self.eq_gains);
        self.eq_preset = EqPreset::Custom;
    }

    pub fn set_output(&mut self, output: OutputContainer) {
        self.output = output;
    }

    /// Clears sources, durations and the trim window; preferences survive.
    pub fn reset(&mut self) {
        self.source_a = None;
        self.source_b = None;
        self.duration_a = 0.0;
        self.duration_b = 0.0;
        self.trim_start = 0.0;
        self.trim_end = 0.0;
    }

    pub fn apply_settings(&mut self, settings: &EditorSettings) {
        self.eq_gains = settings.eq_gains();
        self.eq_preset = settings.eq_preset;
        self.custom_eq = settings.custom_gains();
        self.set_fade_in(settings.fade_in);
        self.set_fade_out(settings.fade_out);
        self.set_crossfade(settings.crossfade);
        match settings.output_format.parse() {
            Ok(output) => self.output = output,
            Err(err) => debug!(%err, "keeping output container"),
        }
    }

    pub fn to_settings(&self) -> EditorSettings {
        EditorSettings {
            eq: self.eq_gains.as_slice().to_vec(),
            eq_preset: self.eq_preset,
            custom_eq: self.custom_eq.map(|gains| gains.as_slice().to_vec()),
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            crossfade: self.crossfade,
            output_format: self.output.extension().to_string(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            primary: self.source_a.as_ref().map(|source| source.name().to_string()),
            secondary: self.source_b.as_ref().map(|source| source.name().to_string()),
            duration_a: self.duration_a,
            duration_b: self.duration_b,
            trim_start: self.trim_start,
            trim_end: self.trim_end,
            start_text: format_time(self.trim_start),
            end_text: format_time(self.trim_end),
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            crossfade: self.crossfade,
            eq: self.eq_gains.0,
            eq_preset: self.eq_preset,
            output: self.output,
        }
    }
}

fn is_known_duration(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0
}

fn non_negative(seconds: f64) -> Option<f64> {
    seconds.is_finite().then(|| seconds.max(0.0))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use media_ffmpeg::{EqGains, OutputContainer};

    use super::EditSession;
    use crate::settings::{EditorSettings, EqPreset};
    use crate::source::{MemorySource, SourceHandle};

    fn source(name: &str) -> SourceHandle {
        Arc::new(MemorySource::new(name, b"ID3".to_vec()))
    }

    fn loaded(duration: f64) -> EditSession {
        let mut session = EditSession::new();
        session.set_primary(source("song.mp3"), Some(duration));
        session
    }

    #[test]
    fn loading_primary_resets_trim_to_whole_clip() {
        let session = loaded(10.0);
        assert_eq!(session.trim_start(), 0.0);
        assert_eq!(session.trim_end(), 10.0);
        assert_eq!(session.segment_duration(), 10.0);
    }

    #[test]
    fn trim_bounds_are_clamped_and_swapped() {
        let mut session = loaded(10.0);
        session.set_trim_end(25.0);
        assert_eq!(session.trim_end(), 10.0);

        session.set_trim_start(8.0);
        session.set_trim_end(3.0);
        assert_eq!((session.trim_start(), session.trim_end()), (3.0, 8.0));

        session.set_trim_start(-4.0);
        assert_eq!(session.trim_start(), 0.0);
    }

    #[test]
    fn trim_is_left_alone_until_duration_is_known() {
        let mut session = EditSession::new();
        session.set_primary(source("clip.mov"), None);
        session.set_trim_end(42.0);
        assert_eq!(session.trim_end(), 42.0);
    }

    #[test]
    fn unparsable_trim_text_keeps_previous_value() {
        let mut session = loaded(120.0);
        assert!(session.set_trim_end_text("01:30"));
        assert!(!session.set_trim_end_text("1:75"));
        assert_eq!(session.trim_end(), 90.0);
        assert_eq!(session.snapshot().end_text, "01:30");
    }

    #[test]
    fn disabling_crossfade_drops_secondary_source() {
        let mut session = loaded(10.0);
        session.set_crossfade(2.0);
        session.set_secondary(source("b.mp3"), Some(6.0));
        assert!(session.source_b().is_some());

        session.set_crossfade(0.0);
        assert!(session.source_b().is_none());
        assert_eq!(session.duration_b(), 0.0);
    }

    #[test]
    fn negative_fades_clamp_to_zero_and_nan_is_ignored() {
        let mut session = loaded(10.0);
        assert!(session.set_fade_in(-2.0));
        assert_eq!(session.fade_in(), 0.0);
        session.set_fade_out(1.5);
        assert!(!session.set_fade_out(f64::NAN));
        assert_eq!(session.fade_out(), 1.5);
    }

    #[test]
    fn editing_a_band_switches_to_custom_preset() {
        let mut session = EditSession::new();
        session.apply_preset(EqPreset::Rock);
        assert_eq!(session.eq_gains().get(1), Some(4.0));

        session.set_eq_band(0, -3.0).expect("valid band");
        assert_eq!(session.eq_preset(), EqPreset::Custom);
        assert!(session.set_eq_band(10, 1.0).is_err());
    }

    #[test]
    fn custom_preset_restores_saved_gains() {
        let mut session = EditSession::new();
        session.set_eq_band(4, 5.0).expect("valid band");
        session.save_custom_preset();
        session.apply_preset(EqPreset::Flat);
        assert_eq!(session.eq_gains(), EqGains::FLAT);

        session.apply_preset(EqPreset::Custom);
        assert_eq!(session.eq_gains().get(4), Some(5.0));
    }

    #[test]
    fn reset_keeps_preferences() {
        let mut session = loaded(10.0);
        session.set_fade_in(1.0);
        session.set_crossfade(2.0);
        session.set_secondary(source("b.mp3"), Some(5.0));
        session.set_output(OutputContainer::M4a);
        session.apply_preset(EqPreset::Jazz);

        session.reset();

        assert!(session.source_a().is_none());
        assert!(session.source_b().is_none());
        assert_eq!(session.duration_a(), 0.0);
        assert_eq!((session.trim_start(), session.trim_end()), (0.0, 0.0));
        assert_eq!(session.fade_in(), 1.0);
        assert_eq!(session.crossfade(), 2.0);
        assert_eq!(session.output(), OutputContainer::M4a);
        assert_eq!(session.eq_preset(), EqPreset::Jazz);
    }

    #[test]
    fn settings_round_trip_through_session() {
        let settings = EditorSettings {
            eq: vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0],
            eq_preset: EqPreset::Custom,
            custom_eq: None,
            fade_in: 0.5,
            fade_out: 1.0,
            crossfade: 0.0,
            output_format: "m4r".to_string(),
        };
        let session = EditSession::with_settings(&settings);
        assert_eq!(session.output(), OutputContainer::M4r);
        assert_eq!(session.to_settings(), settings);
    }
}
