use std::fmt::{Display, Formatter};

use crate::codec::OutputContainer;
use crate::error::{MediaFfmpegError, Result};
use crate::filter::{EqGains, build_eq_filter, build_fade_filter, build_trim_filter, join_filters};
use crate::graph::FilterGraph;

/// Virtual file holding the primary source.
pub const PRIMARY_INPUT: &str = "inputA";
/// Virtual file holding the secondary (crossfade) source.
pub const SECONDARY_INPUT: &str = "inputB";
/// Terminal pin of the crossfade graph.
pub const MIXED_OUTPUT_PIN: &str = "outa";

const PRIMARY_PIN: &str = "a0";
const SECONDARY_PIN: &str = "a1";
const CROSSFADE_PIN: &str = "ac";

/// Crossfade into a second source appended after the primary segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeSpec {
    /// Overlap length in seconds.
    pub duration: f64,
    /// Full length of the secondary source in seconds.
    pub secondary_duration: f64,
}

/// Edit parameters for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub trim_start: f64,
    pub trim_end: f64,
    pub eq: EqGains,
    pub fade_in: f64,
    pub fade_out: f64,
    pub crossfade: Option<CrossfadeSpec>,
    pub container: OutputContainer,
    pub output_name: String,
}

impl RenderRequest {
    /// Length of the primary trim segment.
    pub fn segment_duration(&self) -> f64 {
        (self.trim_end - self.trim_start).max(0.0)
    }

    /// Length of the rendered output, including the crossfaded tail.
    pub fn output_duration(&self) -> f64 {
        let segment = self.segment_duration();
        match self.crossfade {
            Some(crossfade) => segment + crossfade.secondary_duration - crossfade.duration,
            None => segment,
        }
    }
}

/// Audio filter expression of a compiled render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    /// Single-input chain passed with `-af`.
    Chain(String),
    /// Multi-input graph passed with `-filter_complex`.
    Graph(FilterGraph),
}

impl Display for FilterExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chain(chain) => f.write_str(chain),
            Self::Graph(graph) => write!(f, "{graph}"),
        }
    }
}

/// Filter expression plus the full engine argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRender {
    pub filter: FilterExpression,
    pub args: Vec<String>,
}

impl CompiledRender {
    /// Virtual files the engine reads for this render.
    pub fn input_names(&self) -> &'static [&'static str] {
        match self.filter {
            FilterExpression::Chain(_) => &[PRIMARY_INPUT],
            FilterExpression::Graph(_) => &[PRIMARY_INPUT, SECONDARY_INPUT],
        }
    }
}

/// Compiles edit parameters into the engine invocation.
///
/// # Example
/// ```
/// use media_ffmpeg::{EqGains, OutputContainer, RenderRequest, compile_render};
///
/// let compiled = compile_render(&RenderRequest {
///     trim_start: 0.0,
///     trim_end: 8.0,
///     eq: EqGains::FLAT,
///     fade_in: 1.0,
///     fade_out: 1.0,
///     crossfade: None,
///     container: OutputContainer::Mp3,
///     output_name: "song_edited.mp3".to_string(),
/// })
/// .expect("valid request");
///
/// assert_eq!(
///     compiled.filter.to_string(),
///     "atrim=start=0:end=8,asetpts=PTS-STARTPTS,afade=t=in:st=0:d=1,afade=t=out:st=7:d=1"
/// );
/// assert_eq!(compiled.args.last().map(String::as_str), Some("song_edited.mp3"));
/// ```
pub fn compile_render(request: &RenderRequest) -> Result<CompiledRender> {
    validate_request(request)?;

    let eq = build_eq_filter(&request.eq);
    // Fades are timed against the primary segment, also after a crossfade.
    let fades = build_fade_filter(request.segment_duration(), request.fade_in, request.fade_out);
    let primary_trim = build_trim_filter(request.trim_start, request.trim_end);

    let mut args = vec!["-hide_banner".to_string(), "-y".to_string()];
    let filter = match request.crossfade {
        None => {
            let chain = join_filters(&[primary_trim.as_str(), eq.as_str(), fades.as_str()]);
            args.extend(["-i", PRIMARY_INPUT, "-vn", "-af"].map(str::to_string));
            args.push(chain.clone());
            FilterExpression::Chain(chain)
        }
        Some(crossfade) => {
            let secondary_trim = build_trim_filter(0.0, crossfade.secondary_duration);
            let graph = build_crossfade_graph(
                &join_filters(&[primary_trim.as_str(), eq.as_str()]),
                &join_filters(&[secondary_trim.as_str(), eq.as_str()]),
                crossfade.duration,
                &fades,
            )?;
            args.extend(
                ["-i", PRIMARY_INPUT, "-i", SECONDARY_INPUT, "-vn", "-filter_complex"]
                    .map(str::to_string),
            );
            args.push(graph.to_string());
            args.push("-map".to_string());
            args.push(format!("[{MIXED_OUTPUT_PIN}]"));
            FilterExpression::Graph(graph)
        }
    };
    args.extend(request.container.codec_args());
    args.push(request.output_name.clone());

    Ok(CompiledRender { filter, args })
}

/// Arguments for an inspect-only invocation that prints container metadata.
pub fn probe_args(input_name: &str) -> Vec<String> {
    ["-hide_banner", "-i", input_name].map(str::to_string).to_vec()
}

fn build_crossfade_graph(
    primary_chain: &str,
    secondary_chain: &str,
    crossfade_seconds: f64,
    post_filters: &str,
) -> Result<FilterGraph> {
    let mut graph = FilterGraph::default();
    graph.push(&["0:a"], primary_chain, &[PRIMARY_PIN])?;
    graph.push(&["1:a"], secondary_chain, &[SECONDARY_PIN])?;
    graph.push(
        &[PRIMARY_PIN, SECONDARY_PIN],
        &format!("acrossfade=d={crossfade_seconds}:c1=tri:c2=tri"),
        &[CROSSFADE_PIN],
    )?;
    graph.push(&[CROSSFADE_PIN], post_filters, &[MIXED_OUTPUT_PIN])?;
    graph.ensure_terminal(MIXED_OUTPUT_PIN)?;
    Ok(graph)
}

fn validate_request(request: &RenderRequest) -> Result<()> {
    if !request.trim_start.is_finite() || request.trim_start < 0.0 {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "trim start must be a non-negative number",
        });
    }
    if !request.trim_end.is_finite() || request.trim_end <= request.trim_start {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "trim end must be after trim start",
        });
    }
    if !request.fade_in.is_finite()
        || !request.fade_out.is_finite()
        || request.fade_in < 0.0
        || request.fade_out < 0.0
    {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "fade lengths must be non-negative numbers",
        });
    }
    if let Some(crossfade) = request.crossfade {
        if !crossfade.duration.is_finite() || crossfade.duration <= 0.0 {
            return Err(MediaFfmpegError::InvalidRenderRequest {
                reason: "crossfade length must be positive",
            });
        }
        if !crossfade.secondary_duration.is_finite() || crossfade.secondary_duration <= 0.0 {
            return Err(MediaFfmpegError::InvalidRenderRequest {
                reason: "secondary source duration must be positive",
            });
        }
        if crossfade.duration > request.segment_duration()
            || crossfade.duration > crossfade.secondary_duration
        {
            return Err(MediaFfmpegError::InvalidRenderRequest {
                reason: "crossfade must be shorter than both clips",
            });
        }
    }
    if request.output_name.trim().is_empty() {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "output name is empty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        CrossfadeSpec, FilterExpression, MIXED_OUTPUT_PIN, RenderRequest, compile_render,
        probe_args,
    };
    use crate::{EqGains, MediaFfmpegError, OutputContainer};

    fn base_request() -> RenderRequest {
        RenderRequest {
            trim_start: 0.0,
            trim_end: 8.0,
            eq: EqGains::FLAT,
            fade_in: 0.0,
            fade_out: 0.0,
            crossfade: None,
            container: OutputContainer::Mp3,
            output_name: "clip_edited.mp3".to_string(),
        }
    }

    #[test]
    fn single_input_render_uses_af_chain_and_drops_video() {
        let mut request = base_request();
        request.trim_start = 1.5;
        request.eq.set(5, 4.0);
        request.fade_in = 1.0;
        request.fade_out = 2.0;

        let compiled = compile_render(&request).expect("valid request");
        assert_eq!(
            compiled.args,
            [
                "-hide_banner",
                "-y",
                "-i",
                "inputA",
                "-vn",
                "-af",
                "atrim=start=1.5:end=8,asetpts=PTS-STARTPTS,equalizer=f=1000:width_type=q:width=1:g=4,afade=t=in:st=0:d=1,afade=t=out:st=4.5:d=2",
                "-c:a",
                "libmp3lame",
                "-b:a",
                "192k",
                "-ar",
                "44100",
                "clip_edited.mp3",
            ]
        );
        assert_eq!(compiled.input_names(), ["inputA"]);
    }

    #[test]
    fn crossfade_render_wires_both_trimmed_chains_into_acrossfade() {
        let mut request = base_request();
        request.trim_start = 2.0;
        request.eq.set(1, 3.0);
        request.fade_out = 1.0;
        request.container = OutputContainer::M4a;
        request.output_name = "clip_edited.m4a".to_string();
        request.crossfade = Some(CrossfadeSpec {
            duration: 1.0,
            secondary_duration: 10.0,
        });

        let compiled = compile_render(&request).expect("valid request");
        let FilterExpression::Graph(graph) = &compiled.filter else {
            panic!("crossfade must compile to a filter graph");
        };

        assert_eq!(
            graph.to_string(),
            "[0:a]atrim=start=2:end=8,asetpts=PTS-STARTPTS,equalizer=f=62:width_type=q:width=1:g=3[a0]; \
[1:a]atrim=start=0:end=10,asetpts=PTS-STARTPTS,equalizer=f=62:width_type=q:width=1:g=3[a1]; \
[a0][a1]acrossfade=d=1:c1=tri:c2=tri[ac]; \
[ac]afade=t=out:st=5:d=1[outa]"
        );

        let crossfade = graph.producer_of("ac").expect("crossfade chain");
        assert_eq!(crossfade.inputs, ["a0", "a1"]);
        assert_eq!(
            graph.producer_of("a0").map(|chain| chain.inputs.clone()),
            Some(vec!["0:a".to_string()])
        );
        assert_eq!(
            graph.producer_of("a1").map(|chain| chain.inputs.clone()),
            Some(vec!["1:a".to_string()])
        );

        let graph_text = graph.to_string();
        assert_eq!(
            &compiled.args[..9],
            [
                "-hide_banner",
                "-y",
                "-i",
                "inputA",
                "-i",
                "inputB",
                "-vn",
                "-filter_complex",
                graph_text.as_str(),
            ]
        );
        assert_eq!(compiled.args[9], "-map");
        assert_eq!(compiled.args[10], format!("[{MIXED_OUTPUT_PIN}]"));
        assert!(compiled.args.contains(&"aac".to_string()));
        assert_eq!(compiled.input_names(), ["inputA", "inputB"]);
    }

    #[test]
    fn crossfade_without_post_fades_passes_mix_through() {
        let mut request = base_request();
        request.crossfade = Some(CrossfadeSpec {
            duration: 0.5,
            secondary_duration: 3.0,
        });

        let compiled = compile_render(&request).expect("valid request");
        assert!(compiled.filter.to_string().ends_with("[ac]anull[outa]"));
    }

    #[test]
    fn compile_rejects_inverted_trim_range() {
        let mut request = base_request();
        request.trim_start = 9.0;

        let result = compile_render(&request);
        assert!(matches!(
            result,
            Err(MediaFfmpegError::InvalidRenderRequest {
                reason: "trim end must be after trim start"
            })
        ));
    }

    #[test]
    fn compile_rejects_crossfade_longer_than_secondary_clip() {
        let mut request = base_request();
        request.crossfade = Some(CrossfadeSpec {
            duration: 4.0,
            secondary_duration: 3.0,
        });

        assert!(matches!(
            compile_render(&request),
            Err(MediaFfmpegError::InvalidRenderRequest {
                reason: "crossfade must be shorter than both clips"
            })
        ));
    }

    #[test]
    fn probe_args_request_no_output() {
        assert_eq!(probe_args("inputB"), ["-hide_banner", "-i", "inputB"]);
    }
}
