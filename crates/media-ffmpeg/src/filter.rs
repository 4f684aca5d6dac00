/// Number of equalizer bands.
pub const EQ_BAND_COUNT: usize = 10;

/// Equalizer band center frequencies in Hz, in chain order.
pub const EQ_BAND_FREQUENCIES: [u32; EQ_BAND_COUNT] =
    [31, 62, 125, 250, 500, 1000, 2000, 4000, 8000, 16000];

/// Gains whose magnitude is at or below this value do not produce a stage.
pub const EQ_GAIN_EPSILON: f64 = 0.0001;

/// Gains in dB for each band of [`EQ_BAND_FREQUENCIES`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EqGains(pub [f64; EQ_BAND_COUNT]);

impl EqGains {
    /// All bands at 0 dB.
    pub const FLAT: Self = Self([0.0; EQ_BAND_COUNT]);

    /// Builds gains from a slice holding exactly one value per band.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::EqGains;
    ///
    /// assert!(EqGains::from_slice(&[0.0; 10]).is_some());
    /// assert!(EqGains::from_slice(&[0.0; 5]).is_none());
    /// ```
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let gains: [f64; EQ_BAND_COUNT] = values.try_into().ok()?;
        Some(Self(gains))
    }

    /// Returns the gain of band `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Updates band `index`; returns `false` when the band does not exist.
    pub fn set(&mut self, index: usize, gain: f64) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = gain;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns `true` when no band would emit an equalizer stage.
    pub fn is_flat(&self) -> bool {
        self.0.iter().all(|gain| !is_audible_gain(*gain))
    }
}

fn is_audible_gain(gain: f64) -> bool {
    gain.is_finite() && gain.abs() > EQ_GAIN_EPSILON
}

/// Builds the equalizer chain for the audible bands, ascending by frequency.
///
/// # Example
/// ```
/// use media_ffmpeg::{EqGains, build_eq_filter};
///
/// let mut gains = EqGains::FLAT;
/// assert_eq!(build_eq_filter(&gains), "");
///
/// gains.set(1, 3.0);
/// assert_eq!(build_eq_filter(&gains), "equalizer=f=62:width_type=q:width=1:g=3");
/// ```
pub fn build_eq_filter(gains: &EqGains) -> String {
    EQ_BAND_FREQUENCIES
        .iter()
        .zip(gains.0.iter())
        .filter(|(_, gain)| is_audible_gain(**gain))
        .map(|(frequency, gain)| format!("equalizer=f={frequency}:width_type=q:width=1:g={gain}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds fade-in/fade-out stages for a clip of `duration_seconds`.
///
/// A fade-out longer than the clip starts at `0`.
///
/// # Example
/// ```
/// use media_ffmpeg::build_fade_filter;
///
/// assert_eq!(
///     build_fade_filter(10.0, 1.0, 2.0),
///     "afade=t=in:st=0:d=1,afade=t=out:st=8:d=2"
/// );
/// assert_eq!(build_fade_filter(f64::NAN, 0.0, 2.0), "");
/// ```
pub fn build_fade_filter(duration_seconds: f64, fade_in: f64, fade_out: f64) -> String {
    let mut stages = Vec::with_capacity(2);
    if fade_in.is_finite() && fade_in > 0.0 {
        stages.push(format!("afade=t=in:st=0:d={fade_in}"));
    }
    if fade_out.is_finite()
        && fade_out > 0.0
        && duration_seconds.is_finite()
        && duration_seconds > 0.0
    {
        let start = (duration_seconds - fade_out).max(0.0);
        stages.push(format!("afade=t=out:st={start}:d={fade_out}"));
    }
    stages.join(",")
}

/// Builds the trim stage followed by a timestamp reset.
pub fn build_trim_filter(start_seconds: f64, end_seconds: f64) -> String {
    format!("atrim=start={start_seconds}:end={end_seconds},asetpts=PTS-STARTPTS")
}

/// Joins filter stages with `,`, skipping empty parts.
pub fn join_filters<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
