use std::path::Path;
use std::process::Command;

use crate::error::{MediaFfmpegError, Result};

const DURATION_MARKER: &str = "Duration:";
const TIME_MARKER: &str = "time=";

/// Extracts the first `Duration: HH:MM:SS(.frac)` found in engine diagnostics.
///
/// # Example
/// ```
/// use media_ffmpeg::parse_duration_from_logs;
///
/// let logs = "Input #0, mp3, from 'inputA':\n  Duration: 00:03:45.12, start: 0.000000, bitrate: 128 kb/s";
/// let seconds = parse_duration_from_logs(logs).expect("duration line present");
/// assert!((seconds - 225.12).abs() < 0.01);
/// ```
pub fn parse_duration_from_logs(logs: &str) -> Result<f64> {
    logs.match_indices(DURATION_MARKER)
        .find_map(|(index, _)| {
            let rest = &logs[index + DURATION_MARKER.len()..];
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() {
                return None;
            }
            parse_clock(trimmed)
        })
        .filter(|seconds| seconds.is_finite())
        .ok_or_else(|| MediaFfmpegError::Parse {
            context: "duration marker",
            value: tail_for_display(logs),
        })
}

/// Extracts the `time=HH:MM:SS(.frac)` position from one ffmpeg stats line.
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let (index, _) = line.match_indices(TIME_MARKER).last()?;
    parse_clock(&line[index + TIME_MARKER.len()..]).filter(|seconds| seconds.is_finite())
}

/// Reads the container duration via `ffprobe`, `None` when it is not reported.
pub fn probe_container_duration(ffprobe: &Path, path: &Path) -> Result<Option<f64>> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe duration probe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::ExecFailed {
            command: format!("ffprobe duration probe: {}", path.display()),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    let value = stdout.trim();
    if value.is_empty() || value == "N/A" {
        return Ok(None);
    }
    let duration = value.parse::<f64>().map_err(|_| MediaFfmpegError::Parse {
        context: "format duration seconds",
        value: value.to_string(),
    })?;
    Ok(Some(duration))
}

/// Parses `HH:MM:SS` with an optional fractional part on the seconds field.
fn parse_clock(input: &str) -> Option<f64> {
    let (hours, rest) = take_digits(input)?;
    let rest = rest.strip_prefix(':')?;
    let (minutes, rest) = take_digits(rest)?;
    let rest = rest.strip_prefix(':')?;
    let (whole_seconds, rest) = take_digits(rest)?;

    let mut seconds_text = whole_seconds.to_string();
    if let Some(fraction) = rest.strip_prefix('.').and_then(|rest| take_digits(rest)) {
        seconds_text.push('.');
        seconds_text.push_str(fraction.0);
    }

    let hours = hours.parse::<f64>().ok()?;
    let minutes = minutes.parse::<f64>().ok()?;
    let seconds = seconds_text.parse::<f64>().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn take_digits(input: &str) -> Option<(&str, &str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    Some(input.split_at(end))
}

fn tail_for_display(logs: &str) -> String {
    let trimmed = logs.trim();
    if trimmed.is_empty() {
        return "no diagnostic output".to_string();
    }
    let start = trimmed
        .char_indices()
        .rev()
        .nth(199)
        .map_or(0, |(index, _)| index);
    trimmed[start..].to_string()
}
