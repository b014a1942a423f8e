//! Burn cues into a video.

use std::path::PathBuf;
use std::sync::Arc;

use burnin_common::config::AppConfig;
use burnin_cue_model::srt::load_cues;
use burnin_cue_model::style::SubtitleStyle;
use burnin_render_engine::{
    BurnOutcome, BurnProgress, BurnSession, BurnStage, EncodeSettings, FfmpegBackend, FontLibrary,
    MediaBackend,
};

pub struct BurnArgs {
    pub video: PathBuf,
    pub cues: PathBuf,
    pub style: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub fps: Option<u32>,
}

pub async fn run(config: &AppConfig, args: BurnArgs) -> anyhow::Result<()> {
    let cues = load_cues(&args.cues)
        .map_err(|e| anyhow::anyhow!("Failed to load cues: {e}"))?;
    let style = match &args.style {
        Some(path) => SubtitleStyle::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load style: {e}"))?,
        None => SubtitleStyle::default(),
    };

    let mut settings = EncodeSettings::from_defaults(&config.encoding)?;
    if let Some(format) = &args.format {
        settings.format = format.parse()?;
    }
    if let Some(fps) = args.fps {
        settings.frame_rate = fps;
    }
    settings.validate()?;

    let backend = FfmpegBackend::from_config(&config.encoding);
    if !backend.is_available() || !backend.probe_available() {
        anyhow::bail!("ffmpeg/ffprobe not found. Run `burnin check` for details.");
    }
    let info = backend
        .probe(&args.video)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open source: {e}"))?;

    let output_path = args.output.unwrap_or_else(|| {
        args.video
            .with_extension(format!("burned.{}", settings.format.extension()))
    });

    println!("Burning subtitles into: {}", args.video.display());
    println!(
        "  Source: {}x{}, {:.2}s",
        info.width, info.height, info.duration_secs
    );
    println!("  Cues: {}", cues.len());
    println!("  Format: {} @ {} fps", settings.format, settings.frame_rate);
    println!("  Output: {}", output_path.display());

    let invalid = cues.invalid_cues();
    if !invalid.is_empty() {
        println!(
            "  Skipping {} cue(s) with empty or reversed ranges",
            invalid.len()
        );
    }

    let fonts = FontLibrary::from_config(&config.fonts);
    let session = Arc::new(BurnSession::new(
        Arc::new(backend),
        Arc::new(fonts),
        settings,
    ));

    let interrupt = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received");
                session.cancel();
            }
        })
    };

    let progress_cb: Box<dyn Fn(BurnProgress) + Send> = Box::new(|p| match p.stage {
        BurnStage::Rendering => print!(
            "\r  Progress: {:.1}% ({} frames, {:.1}s)  ",
            p.fraction * 100.0,
            p.frames_rendered,
            p.presentation_secs,
        ),
        BurnStage::Finalizing => print!("\r  Finalizing...                          "),
        _ => {}
    });

    let result = session
        .start(&args.video, &cues, &style, Some(progress_cb))
        .await;
    interrupt.abort();

    match result {
        Ok(BurnOutcome::Completed(artifact)) => {
            artifact.write_to(&output_path)?;
            println!(
                "\nBurn complete: {} ({} frames, {:.2}s, {})",
                output_path.display(),
                artifact.frame_count,
                artifact.duration_secs,
                artifact.mime_type()
            );
            Ok(())
        }
        Ok(BurnOutcome::Cancelled) => {
            println!("\nBurn cancelled; no output written.");
            Ok(())
        }
        Err(e) => {
            let stage = e.stage().map(|s| s.as_str()).unwrap_or("setup");
            Err(anyhow::anyhow!("Burn failed during {stage}: {e}"))
        }
    }
}
