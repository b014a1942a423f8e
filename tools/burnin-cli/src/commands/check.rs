//! Check the external toolchain and installed fonts.

use burnin_common::config::{config_file_path, AppConfig};
use burnin_render_engine::{FfmpegBackend, FontLibrary, MediaBackend};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Burnin System Check");
    println!("{}", "=".repeat(50));
    println!("Config: {}", config_file_path().display());

    let backend = FfmpegBackend::from_config(&config.encoding);
    let ffmpeg_ok = backend.is_available();
    let ffprobe_ok = backend.probe_available();
    report(ffmpeg_ok, &format!("ffmpeg: {}", config.encoding.ffmpeg));
    report(ffprobe_ok, &format!("ffprobe: {}", config.encoding.ffprobe));
    println!(
        "     Supported formats: {}",
        backend
            .supported_formats()
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    println!();
    let fonts = FontLibrary::from_config(&config.fonts);
    for dir in fonts.search_dirs() {
        let marker = if dir.is_dir() { "OK" } else { "--" };
        println!("[{marker}] Font directory: {}", dir.display());
    }
    let font_count = fonts.font_files().len();
    if font_count > 0 {
        println!("[OK] Fonts found: {font_count}");
    } else {
        println!("[WARN] No fonts found; text will use the built-in block face");
    }
    if let Some(family) = &config.fonts.fallback_family {
        println!("     Fallback family: {family}");
    }

    println!();
    if ffmpeg_ok && ffprobe_ok {
        println!("ffmpeg is available. Burnin is ready.");
    } else {
        println!("ffmpeg or ffprobe is missing. Install ffmpeg or set its path in the config.");
    }

    Ok(())
}

fn report(ok: bool, label: &str) {
    if ok {
        println!("[OK] {label}");
    } else {
        println!("[MISSING] {label}");
    }
}
