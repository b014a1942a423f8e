//! Subtitle interchange: SubRip (SRT) parsing/generation and WebVTT export.

use std::path::Path;

use burnin_common::clock::{ms_to_secs, secs_to_ms};
use burnin_common::error::{BurnError, BurnResult};

use crate::cue::{Cue, CueStore};

/// Generate SRT subtitle content from cues.
///
/// Cues are numbered sequentially from 1 in store order; cue ids are not
/// written.
pub fn generate_srt(cues: &CueStore) -> String {
    let mut output = String::new();

    for (i, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start),
            format_srt_time(cue.end),
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from cues.
pub fn generate_vtt(cues: &CueStore) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for cue in cues {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(cue.start),
            format_vtt_time(cue.end),
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

/// Parse SRT content into a cue store.
///
/// Each block's sequence number becomes the cue id. Blocks without a
/// sequence number get the 1-based block position as id. A UTF-8 BOM and
/// CRLF line endings are accepted.
pub fn parse_srt(content: &str) -> BurnResult<CueStore> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut store = CueStore::new();
    let mut lines = content.lines().enumerate().peekable();

    loop {
        // Skip blank separator lines
        while lines.peek().is_some_and(|(_, l)| l.trim().is_empty()) {
            lines.next();
        }

        let Some((line_no, first)) = lines.next() else {
            break;
        };
        let first = first.trim();

        let (id, (timing_no, timing)) = if first.contains("-->") {
            ((store.len() + 1).to_string(), (line_no, first))
        } else {
            if first.parse::<u64>().is_err() {
                return Err(BurnError::subtitle(
                    line_no + 1,
                    format!("expected a sequence number, found {first:?}"),
                ));
            }
            let next = lines.next().ok_or_else(|| {
                BurnError::subtitle(line_no + 2, "missing timestamp line after sequence number")
            })?;
            (first.to_string(), (next.0, next.1.trim()))
        };

        let (start, end) = parse_timing_line(timing)
            .map_err(|message| BurnError::subtitle(timing_no + 1, message))?;

        let mut text_lines = Vec::new();
        while let Some((_, line)) = lines.next_if(|(_, l)| !l.trim().is_empty()) {
            text_lines.push(line.trim_end_matches('\r'));
        }

        store.push(Cue::new(id, start, end, text_lines.join("\n")));
    }

    Ok(store)
}

/// Load cues from a `.srt` file or a JSON cue array (`.json`).
pub fn load_cues(path: &Path) -> BurnResult<CueStore> {
    if !path.exists() {
        return Err(BurnError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("srt") => {}
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            let content = std::fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&content)?);
        }
        _ => {
            return Err(BurnError::unsupported(format!(
                "Unsupported cue file {} (expected .srt or .json)",
                path.display()
            )))
        }
    }
    let content = std::fs::read_to_string(path)?;
    let store = parse_srt(&content)?;
    tracing::debug!(path = %path.display(), cues = store.len(), "Loaded SRT cues");
    Ok(store)
}

/// On-disk cue formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueFormat {
    Srt,
    Vtt,
    Json,
}

impl CueFormat {
    /// Pick a format from the file extension, defaulting to SRT.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("vtt") => CueFormat::Vtt,
            Some(ext) if ext.eq_ignore_ascii_case("json") => CueFormat::Json,
            _ => CueFormat::Srt,
        }
    }
}

/// Save cues to a file; the extension picks the format.
pub fn save_cues(cues: &CueStore, path: &Path) -> BurnResult<()> {
    write_cues(cues, path, CueFormat::from_path(path))
}

/// Write cues to `path` in `format`, whatever the file is named.
pub fn write_cues(cues: &CueStore, path: &Path, format: CueFormat) -> BurnResult<()> {
    let content = match format {
        CueFormat::Srt => generate_srt(cues),
        CueFormat::Vtt => generate_vtt(cues),
        CueFormat::Json => serde_json::to_string_pretty(cues)?,
    };
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), ?format, cues = cues.len(), "Wrote cues");
    Ok(())
}

/// Parse "HH:MM:SS,mmm --> HH:MM:SS,mmm" (trailing cue settings ignored).
fn parse_timing_line(line: &str) -> Result<(f64, f64), String> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| format!("invalid timestamp line: {line:?}"))?;
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| format!("missing end timestamp: {line:?}"))?;

    let start = parse_srt_timestamp(start.trim())?;
    let end = parse_srt_timestamp(end)?;
    Ok((ms_to_secs(start), ms_to_secs(end)))
}

/// Parse "HH:MM:SS,mmm" (or "MM:SS,mmm", "." separator tolerated) to milliseconds.
fn parse_srt_timestamp(ts: &str) -> Result<u64, String> {
    let (clock, millis) = ts
        .split_once([',', '.'])
        .ok_or_else(|| format!("invalid timestamp: {ts:?}"))?;

    let fields: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return Err(format!("invalid timestamp: {ts:?}")),
    };

    let number = |field: &str| {
        field
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid timestamp: {ts:?}"))
    };
    let millis_digits = millis.trim();
    if millis_digits.is_empty() || millis_digits.len() > 3 {
        return Err(format!("invalid milliseconds in timestamp: {ts:?}"));
    }
    // ",5" means 500ms, ",05" means 50ms
    let scale = 10u64.pow(3 - millis_digits.len() as u32);

    let overflow = || format!("timestamp out of range: {ts:?}");
    let mut total = 0u64;
    for (value, unit) in [
        (number(hours)?, 3_600_000),
        (number(minutes)?, 60_000),
        (number(seconds)?, 1000),
        (number(millis_digits)?, scale),
    ] {
        total = value
            .checked_mul(unit)
            .and_then(|ms| total.checked_add(ms))
            .ok_or_else(overflow)?;
    }
    Ok(total)
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub fn format_srt_time(secs: f64) -> String {
    let total_ms = secs_to_ms(secs);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
pub fn format_vtt_time(secs: f64) -> String {
    let total_ms = secs_to_ms(secs);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
