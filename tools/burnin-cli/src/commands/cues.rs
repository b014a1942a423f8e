//! Validate and convert cue files.

use std::path::PathBuf;

use burnin_cue_model::srt::{format_srt_time, load_cues, write_cues, CueFormat};

pub fn run(path: PathBuf, vtt: Option<PathBuf>, srt: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Checking cues at: {}", path.display());

    let cues = load_cues(&path).map_err(|e| anyhow::anyhow!("Failed to load cues: {e}"))?;

    println!("  Cues: {}", cues.len());
    if let Some(end) = cues.duration_hint() {
        println!("  Last cue ends at: {}", format_srt_time(end));
    }

    let invalid = cues.invalid_cues();
    if invalid.is_empty() {
        println!("\nAll cues are valid.");
    } else {
        println!("\nCues that will never be shown:");
        for id in &invalid {
            println!("  - {id}");
        }
        println!("\n{} issue(s) found.", invalid.len());
    }

    if let Some(out) = vtt {
        write_cues(&cues, &out, CueFormat::Vtt)?;
        println!("Wrote WebVTT: {}", out.display());
    }
    if let Some(out) = srt {
        write_cues(&cues, &out, CueFormat::Srt)?;
        println!("Wrote SRT: {}", out.display());
    }

    Ok(())
}
