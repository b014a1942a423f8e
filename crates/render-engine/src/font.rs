//! Font faces, glyph rasterization and font discovery.
//!
//! A [`GlyphFace`] is a font at one pixel size. Real faces come from
//! TrueType/OpenType files via `fontdue`; [`BlockFace`] is a built-in
//! face with fixed-advance block glyphs, used when no font file resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use fontdue::{Font, FontSettings};
use walkdir::WalkDir;

use burnin_common::config::FontConfig;
use burnin_common::error::{BurnError, BurnResult};
use burnin_cue_model::style::FontWeight;

use crate::surface::CoverageMask;

/// Measures rendered text width.
pub trait TextMeasure {
    /// Advance width of `text` in pixels.
    fn measure(&self, text: &str) -> f32;
}

/// A rasterized glyph positioned relative to the pen and baseline.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub mask: CoverageMask,
    /// Horizontal offset of the mask from the pen position.
    pub left: i32,
    /// Distance from the baseline up to the top row of the mask.
    pub top: i32,
    /// Pen advance in pixels.
    pub advance: f32,
}

/// A font face at a fixed pixel size.
pub trait GlyphFace: TextMeasure + Send + Sync {
    /// Pixel size the face was built for.
    fn size(&self) -> f32;

    /// Distance from baseline to the top of the tallest glyphs (positive).
    fn ascent(&self) -> f32;

    /// Distance from baseline to the bottom of descenders (negative).
    fn descent(&self) -> f32;

    fn rasterize(&self, ch: char) -> Glyph;

    /// Kerning adjustment between two adjacent characters.
    fn kern(&self, _left: char, _right: char) -> f32 {
        0.0
    }

    /// Whether the face itself is a bold design.
    fn is_bold(&self) -> bool;
}

/// One line of text rendered to a single coverage mask.
#[derive(Debug, Clone)]
pub struct LineRaster {
    pub mask: CoverageMask,
    /// Offset of the mask's left edge from the pen start (zero or negative).
    pub origin_x: i32,
    /// Row of the baseline inside the mask.
    pub baseline: i32,
}

/// Render `text` into one coverage mask.
///
/// `embolden` smears each glyph horizontally for faces without a bold design.
pub fn rasterize_line(face: &dyn GlyphFace, text: &str, embolden: bool) -> LineRaster {
    let smear = if embolden {
        (face.size() / 24.0).round().max(1.0) as i32
    } else {
        0
    };

    let mut placed = Vec::new();
    let mut pen = 0.0f32;
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if let Some(p) = prev {
            pen += face.kern(p, ch);
        }
        let glyph = face.rasterize(ch);
        let x = pen.round() as i32 + glyph.left;
        pen += glyph.advance;
        prev = Some(ch);
        if glyph.mask.width() > 0 && glyph.mask.height() > 0 {
            placed.push((x, glyph));
        }
    }

    let mut above = face.ascent().ceil().max(0.0) as i32;
    let mut below = (-face.descent()).ceil().max(0.0) as i32;
    let mut min_x = 0;
    let mut max_x = pen.ceil() as i32;
    for (x, glyph) in &placed {
        above = above.max(glyph.top);
        below = below.max(glyph.mask.height() as i32 - glyph.top);
        min_x = min_x.min(*x);
        max_x = max_x.max(x + glyph.mask.width() as i32 + smear);
    }

    let width = (max_x - min_x).max(1) as usize;
    let height = (above + below).max(1) as usize;
    let mut mask = CoverageMask::new(width, height);
    for (x, glyph) in &placed {
        let top = above - glyph.top;
        for dx in 0..=smear {
            mask.stamp(&glyph.mask, x - min_x + dx, top);
        }
    }

    LineRaster {
        mask,
        origin_x: min_x,
        baseline: above,
    }
}

/// A TrueType/OpenType face rendered by `fontdue`.
pub struct FontdueFace {
    font: Arc<Font>,
    size: f32,
    bold: bool,
    ascent: f32,
    descent: f32,
}

impl FontdueFace {
    pub fn new(font: Arc<Font>, size: f32, bold: bool) -> Self {
        let (ascent, descent) = match font.horizontal_line_metrics(size) {
            Some(lm) => (lm.ascent, lm.descent),
            None => (size * 0.8, -size * 0.2),
        };
        Self {
            font,
            size,
            bold,
            ascent,
            descent,
        }
    }

    /// Parse font bytes and build a face at `size` pixels.
    pub fn from_bytes(bytes: &[u8], size: f32, bold: bool) -> BurnResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| BurnError::config(format!("Failed to parse font: {e}")))?;
        Ok(Self::new(Arc::new(font), size, bold))
    }
}

impl TextMeasure for FontdueFace {
    fn measure(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            if let Some(p) = prev {
                width += self.kern(p, ch);
            }
            width += self.font.metrics(ch, self.size).advance_width;
            prev = Some(ch);
        }
        width
    }
}

impl GlyphFace for FontdueFace {
    fn size(&self) -> f32 {
        self.size
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn descent(&self) -> f32 {
        self.descent
    }

    fn rasterize(&self, ch: char) -> Glyph {
        let (metrics, bitmap) = self.font.rasterize(ch, self.size);
        Glyph {
            mask: CoverageMask::from_raw(metrics.width, metrics.height, bitmap),
            left: metrics.xmin,
            top: metrics.height as i32 + metrics.ymin,
            advance: metrics.advance_width,
        }
    }

    fn kern(&self, left: char, right: char) -> f32 {
        self.font
            .horizontal_kern(left, right, self.size)
            .unwrap_or(0.0)
    }

    fn is_bold(&self) -> bool {
        self.bold
    }
}

/// Built-in face: every visible character is a solid block with a fixed
/// advance of `0.6 * size`. Deterministic across machines.
#[derive(Debug, Clone, Copy)]
pub struct BlockFace {
    size: f32,
}

impl BlockFace {
    pub fn new(size: f32) -> Self {
        Self { size }
    }

    fn advance(&self) -> f32 {
        self.size * 0.6
    }
}

impl TextMeasure for BlockFace {
    fn measure(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.advance()
    }
}

impl GlyphFace for BlockFace {
    fn size(&self) -> f32 {
        self.size
    }

    fn ascent(&self) -> f32 {
        self.size * 0.8
    }

    fn descent(&self) -> f32 {
        -self.size * 0.2
    }

    fn rasterize(&self, ch: char) -> Glyph {
        if ch.is_whitespace() || ch.is_control() {
            return Glyph {
                mask: CoverageMask::default(),
                left: 0,
                top: 0,
                advance: self.advance(),
            };
        }
        let width = (self.size * 0.5).round().max(1.0) as usize;
        let height = (self.size * 0.7).round().max(1.0) as usize;
        Glyph {
            mask: CoverageMask::from_raw(width, height, vec![255; width * height]),
            left: (self.size * 0.05).round() as i32,
            top: height as i32,
            advance: self.advance(),
        }
    }

    fn is_bold(&self) -> bool {
        false
    }
}

/// Resolves style font families to faces.
///
/// Font directories are indexed on first use. Parsed fonts are cached by
/// path and shared between faces of different sizes.
pub struct FontLibrary {
    search_dirs: Vec<PathBuf>,
    fallback_family: Option<String>,
    index: OnceLock<Vec<PathBuf>>,
    cache: Mutex<HashMap<PathBuf, Arc<Font>>>,
}

impl FontLibrary {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            fallback_family: None,
            index: OnceLock::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &FontConfig) -> Self {
        Self::new(config.search_dirs.clone()).with_fallback_family(config.fallback_family.clone())
    }

    /// A library with no font directories: always resolves to [`BlockFace`].
    pub fn builtin() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_fallback_family(mut self, family: Option<String>) -> Self {
        self.fallback_family = family;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// All font files found under the search directories.
    pub fn font_files(&self) -> &[PathBuf] {
        self.index.get_or_init(|| scan_font_dirs(&self.search_dirs))
    }

    /// Resolve a CSS-style family list (`"Arial, sans-serif"`) to a face.
    ///
    /// Tries each listed family, then the configured fallback family, then
    /// the built-in block face.
    pub fn resolve(&self, family: &str, weight: FontWeight, size: f32) -> Arc<dyn GlyphFace> {
        let bold = weight.is_bold();
        let candidates = family
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .chain(self.fallback_family.clone());

        for candidate in candidates {
            let Some((path, is_bold_file)) = self.find_file(&candidate, bold) else {
                continue;
            };
            match self.load(&path) {
                Ok(font) => {
                    tracing::debug!(
                        family = %candidate,
                        path = %path.display(),
                        bold = is_bold_file,
                        "Resolved font"
                    );
                    return Arc::new(FontdueFace::new(font, size, is_bold_file));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable font");
                }
            }
        }

        tracing::warn!(
            family = %family,
            "No installed font matches; using built-in block glyphs"
        );
        Arc::new(BlockFace::new(size))
    }

    /// Find the file for `family`, preferring a bold cut when `bold` is set.
    /// Returns the path and whether it is a bold cut.
    fn find_file(&self, family: &str, bold: bool) -> Option<(PathBuf, bool)> {
        let wanted = normalize_name(family);
        if wanted.is_empty() {
            return None;
        }

        let mut regular = None;
        let mut bold_cut = None;
        for path in self.font_files() {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let stem = normalize_name(stem);
            let Some(rest) = stem.strip_prefix(&wanted) else {
                continue;
            };
            match rest {
                "" | "regular" | "book" | "roman" | "r" => {
                    regular.get_or_insert_with(|| path.clone());
                }
                "bold" | "bd" | "b" => {
                    bold_cut.get_or_insert_with(|| path.clone());
                }
                _ => {}
            }
        }

        if bold {
            if let Some(path) = bold_cut {
                return Some((path, true));
            }
        }
        regular.map(|path| (path, false))
    }

    fn load(&self, path: &Path) -> BurnResult<Arc<Font>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(font) = cache.get(path) {
            return Ok(font.clone());
        }
        let bytes = std::fs::read(path)?;
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| {
            BurnError::config(format!("Failed to parse font {}: {e}", path.display()))
        })?;
        let font = Arc::new(font);
        cache.insert(path.to_path_buf(), font.clone());
        Ok(font)
    }
}

impl Default for FontLibrary {
    fn default() -> Self {
        Self::from_config(&FontConfig::default())
    }
}

fn scan_font_dirs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| {
            WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
        })
        .collect();
    files.sort();
    tracing::debug!(dirs = dirs.len(), fonts = files.len(), "Indexed font directories");
    files
}

/// Lowercase ASCII alphanumerics only: "DejaVu Sans" and "DejaVuSans" match.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_face_metrics() {
        let face = BlockFace::new(20.0);
        assert_eq!(face.measure("abcd"), 48.0);
        assert_eq!(face.measure(""), 0.0);
        let glyph = face.rasterize('x');
        assert_eq!(glyph.mask.width(), 10);
        assert_eq!(glyph.mask.height(), 14);
        assert!(face.rasterize(' ').mask.is_empty());
    }

    #[test]
    fn test_rasterize_line_places_glyphs_on_baseline() {
        let face = BlockFace::new(20.0);
        let line = rasterize_line(&face, "a b", false);

        assert_eq!(line.origin_x, 0);
        assert_eq!(line.baseline, 16);
        // glyph body sits just above the baseline, nothing below it
        assert_eq!(line.mask.get(5, 15), 255);
        assert_eq!(line.mask.get(5, 16), 0);
        // the space leaves a gap
        assert_eq!(line.mask.get(15, 10), 0);
        assert_eq!(line.mask.get(30, 10), 255);
    }

    #[test]
    fn test_embolden_widens_glyphs() {
        let face = BlockFace::new(24.0);
        let plain = rasterize_line(&face, "i", false);
        let bold = rasterize_line(&face, "i", true);
        let ink = |r: &LineRaster| (0..r.mask.width()).filter(|&x| r.mask.get(x, 10) > 0).count();
        assert_eq!(ink(&bold), ink(&plain) + 1);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("DejaVu Sans"), "dejavusans");
        assert_eq!(normalize_name("DejaVuSans-Bold"), "dejavusansbold");
    }

    #[test]
    fn test_library_finds_regular_and_bold_cuts() {
        let dir = std::env::temp_dir().join(format!("burnin-fonts-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        for name in ["DejaVuSans.ttf", "nested/DejaVuSans-Bold.ttf", "DejaVuSansMono.ttf", "notes.txt"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let library = FontLibrary::new(vec![dir.clone()]);
        assert_eq!(library.font_files().len(), 3);

        let (regular, is_bold) = library.find_file("DejaVu Sans", false).unwrap();
        assert!(regular.ends_with("DejaVuSans.ttf"));
        assert!(!is_bold);
        let (bold, is_bold) = library.find_file("dejavu sans", true).unwrap();
        assert!(bold.ends_with("DejaVuSans-Bold.ttf"));
        assert!(is_bold);
        assert!(library.find_file("Helvetica", false).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unresolvable_family_falls_back_to_block_face() {
        let library = FontLibrary::builtin();
        let face = library.resolve("Arial, sans-serif", FontWeight::BOLD, 32.0);
        assert_eq!(face.size(), 32.0);
        assert!(!face.is_bold());
        assert_eq!(face.measure("ab"), BlockFace::new(32.0).measure("ab"));
    }
}
