//! FFmpeg-facing layer for clipmix: filter-graph compilation, codec
//! selection, diagnostic parsing and the transcoding engine boundary.

mod codec;
mod compile;
mod error;
mod filter;
mod graph;
mod mock;
mod probe;
mod process;
mod transcoder;

pub use codec::{OutputContainer, codec_args_for_extension, mime_for_extension};
pub use compile::{
    CompiledRender, CrossfadeSpec, FilterExpression, MIXED_OUTPUT_PIN, PRIMARY_INPUT,
    RenderRequest, SECONDARY_INPUT, compile_render, probe_args,
};
pub use error::{MediaFfmpegError, Result};
pub use filter::{
    EQ_BAND_COUNT, EQ_BAND_FREQUENCIES, EQ_GAIN_EPSILON, EqGains, build_eq_filter,
    build_fade_filter, build_trim_filter, join_filters,
};
pub use graph::{FilterChain, FilterGraph, PASSTHROUGH_FILTER};
pub use mock::{MOCK_OUTPUT_BYTES, MOCK_PROBE_SECONDS, MockEngine, MockJournal, MockLoader, MockOp};
pub use probe::{parse_duration_from_logs, parse_progress_time, probe_container_duration};
pub use process::{FfmpegLoader, FfmpegProcessEngine};
pub use transcoder::{
    EngineEvents, EngineLoader, EngineVariant, HostCapabilities, LogHandler, ProgressHandler,
    TranscodeEngine,
};
