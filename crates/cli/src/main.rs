use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::Parser;
use engine::{
    Command, DirectorySink, EngineSlot, EqPreset, Event, FileSource, RenderOrchestrator, Session,
    SettingsStore, SourceHandle, parse_time,
};
use media_ffmpeg::{EQ_BAND_COUNT, FfmpegLoader, MockJournal, MockLoader, OutputContainer};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "clipmix", version, about = "Trim, equalize, fade and crossfade audio")]
struct Cli {
    /// Primary input file.
    input: PathBuf,

    /// Second file crossfaded in after the trimmed primary segment.
    #[arg(long)]
    second: Option<PathBuf>,

    /// Trim start as mm:ss.
    #[arg(long)]
    start: Option<String>,

    /// Trim end as mm:ss.
    #[arg(long)]
    end: Option<String>,

    /// Fade-in length in seconds.
    #[arg(long)]
    fade_in: Option<f64>,

    /// Fade-out length in seconds.
    #[arg(long)]
    fade_out: Option<f64>,

    /// Crossfade length in seconds; requires --second.
    #[arg(long)]
    crossfade: Option<f64>,

    /// Ten comma-separated equalizer gains in dB, 31 Hz to 16 kHz.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    eq: Option<Vec<f64>>,

    /// Equalizer preset: flat, rock, jazz, classical or custom.
    #[arg(long)]
    preset: Option<EqPreset>,

    /// Output container: mp3, m4a, m4r or mp4.
    #[arg(long)]
    format: Option<OutputContainer>,

    /// Render a preview instead of an export.
    #[arg(long, default_value_t = false)]
    preview: bool,

    /// Directory receiving rendered files.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// ffmpeg binary used for rendering.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe binary used to read container durations.
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Replace ffmpeg with an in-memory engine that writes placeholder output.
    #[arg(long, default_value_t = false)]
    mock_engine: bool,

    /// JSON file holding editor preferences.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write preference changes back to the settings file.
    #[arg(long, default_value_t = false, requires = "settings")]
    save_settings: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let start = cli.start.as_deref().map(parse_trim).transpose()?;
    let end = cli.end.as_deref().map(parse_trim).transpose()?;
    if let Some(gains) = cli.eq.as_ref() {
        if gains.len() != EQ_BAND_COUNT {
            bail!("--eq takes {EQ_BAND_COUNT} gains, got {}", gains.len());
        }
    }

    let mut session = build_session(&cli);

    let mut commands = Vec::new();
    if let Some(preset) = cli.preset {
        commands.push(Command::ApplyPreset { preset });
    }
    if let Some(gains) = cli.eq.as_ref() {
        commands.extend(
            gains
                .iter()
                .enumerate()
                .map(|(band, gain)| Command::SetEqBand { band, gain: *gain }),
        );
    }
    if let Some(seconds) = cli.fade_in {
        commands.push(Command::SetFadeIn { seconds });
    }
    if let Some(seconds) = cli.fade_out {
        commands.push(Command::SetFadeOut { seconds });
    }
    if let Some(seconds) = cli.crossfade {
        commands.push(Command::SetCrossfade { seconds });
    }
    if let Some(container) = cli.format {
        commands.push(Command::SetOutput { container });
    }
    commands.push(Command::LoadPrimary {
        source: open_source(&cli, &cli.input)?,
    });
    if let Some(second) = cli.second.as_ref() {
        commands.push(Command::LoadSecondary {
            source: open_source(&cli, second)?,
        });
    }
    if let Some(seconds) = start {
        commands.push(Command::SetTrimStart { seconds });
    }
    if let Some(seconds) = end {
        commands.push(Command::SetTrimEnd { seconds });
    }
    commands.push(if cli.preview {
        Command::Preview { run_id: None }
    } else {
        Command::Export
    });

    for command in commands {
        debug!(?command, "applying");
        let events = session.handle_command(command)?;
        for event in events {
            report(&cli, event);
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn parse_trim(text: &str) -> anyhow::Result<f64> {
    parse_time(text).with_context(|| format!("invalid time '{text}', expected mm:ss"))
}

fn build_session(cli: &Cli) -> Session<DirectorySink> {
    let mock = cli.mock_engine;
    let ffmpeg = cli.ffmpeg.clone();
    let engines = EngineSlot::process_wide(move || {
        if mock {
            EngineSlot::new(MockLoader::new(MockJournal::default()))
        } else {
            EngineSlot::new(FfmpegLoader::new(ffmpeg))
        }
    });

    let renderer =
        RenderOrchestrator::new(engines).with_progress_observer(Arc::new(|percent: u8| {
            debug!(percent, "render progress");
        }));
    let session = Session::new(renderer, DirectorySink::new(&cli.out_dir));

    match cli.settings.as_ref() {
        Some(path) if cli.save_settings => session.with_settings_store(SettingsStore::new(path)),
        Some(path) => session.with_settings(&SettingsStore::new(path).load_or_default()),
        None => session,
    }
}

fn open_source(cli: &Cli, path: &Path) -> anyhow::Result<SourceHandle> {
    let source = FileSource::open(path)
        .with_context(|| format!("open input '{}'", path.display()))?;
    let source = if cli.mock_engine {
        source
    } else {
        source.with_ffprobe(&cli.ffprobe)
    };
    Ok(Arc::new(source))
}

fn report(cli: &Cli, event: Event) {
    match event {
        Event::SourceLoaded { slot, summary } => info!(
            %slot,
            name = %summary.name,
            size_mb = %summary.size_mb,
            duration = %summary.duration,
            "source loaded"
        ),
        Event::PreviewReady(media) | Event::Exported(media) => {
            eprintln!("wrote {}", cli.out_dir.join(&media.file_name).display());
        }
        Event::PreviewDiscarded { run_id } => debug!(run_id, "preview discarded"),
        Event::SessionChanged(snapshot) => debug!(
            start = %snapshot.start_text,
            end = %snapshot.end_text,
            "session changed"
        ),
        Event::Progress { .. } | Event::StartedOver | Event::Error(_) => {}
    }
}
