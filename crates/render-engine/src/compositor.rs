//! Frame compositor: draws the active cue's text onto a decoded frame.
//!
//! Per line, top line first, the draw order is always
//! background box → outline → fill.

use std::sync::Arc;

use burnin_cue_model::cue::Cue;
use burnin_cue_model::style::{Rgba, SubtitleStyle};

use crate::font::{rasterize_line, FontLibrary, GlyphFace};
use crate::layout::{layout_text, TextBlock};
use crate::surface::{CoverageMask, Surface};

/// One laid-out line with its coverage masks in surface coordinates.
#[derive(Debug, Clone)]
struct RenderedLine {
    background: Option<(f32, f32, f32, f32)>,
    outline: Option<(CoverageMask, i32, i32)>,
    fill: CoverageMask,
    left: i32,
    top: i32,
}

/// Rendered cue text, reused while the same text stays on screen.
#[derive(Debug, Clone)]
struct RenderedCue {
    text: String,
    frame_size: (u32, u32),
    lines: Vec<RenderedLine>,
}

/// Composites styled cue text onto frames.
///
/// The style is captured at construction; rendered text is cached per cue
/// text and frame size, since a cue usually spans many consecutive frames.
pub struct FrameCompositor {
    style: SubtitleStyle,
    face: Arc<dyn GlyphFace>,
    embolden: bool,
    cached: Option<RenderedCue>,
}

impl FrameCompositor {
    pub fn new(style: SubtitleStyle, face: Arc<dyn GlyphFace>) -> Self {
        let embolden = style.font_weight.is_bold() && !face.is_bold();
        Self {
            style,
            face,
            embolden,
            cached: None,
        }
    }

    /// Resolve the style's font through `fonts` and build a compositor.
    pub fn with_library(style: SubtitleStyle, fonts: &FontLibrary) -> Self {
        let face = fonts.resolve(&style.font_family, style.font_weight, style.font_size);
        Self::new(style, face)
    }

    pub fn style(&self) -> &SubtitleStyle {
        &self.style
    }

    /// Lay out `text` for a frame of the given size without drawing.
    pub fn layout(&self, text: &str, frame_width: u32, frame_height: u32) -> TextBlock {
        layout_text(
            text,
            &self.style,
            self.face.as_ref(),
            frame_width,
            frame_height,
        )
    }

    /// Draw `cue` onto `surface`. With no cue the surface is left untouched.
    pub fn composite(&mut self, surface: &mut Surface, cue: Option<&Cue>) {
        let Some(cue) = cue else {
            return;
        };

        let frame_size = (surface.width(), surface.height());
        let fresh = match &self.cached {
            Some(cached) => cached.text != cue.text || cached.frame_size != frame_size,
            None => true,
        };
        if fresh {
            self.cached = Some(self.render(&cue.text, frame_size));
        }
        let Some(rendered) = &self.cached else {
            return;
        };

        let background = self.style.background_fill().unwrap_or(Rgba::TRANSPARENT);
        let outline_color = self
            .style
            .outline()
            .map(|(color, _)| color)
            .unwrap_or(Rgba::TRANSPARENT);

        for line in &rendered.lines {
            if let Some((x, y, w, h)) = line.background {
                surface.blend_rect(x, y, w, h, background);
            }
            if let Some((mask, left, top)) = &line.outline {
                surface.blend_mask(mask, *left, *top, outline_color);
            }
            surface.blend_mask(&line.fill, line.left, line.top, self.style.color);
        }
    }

    fn render(&self, text: &str, (width, height): (u32, u32)) -> RenderedCue {
        let block = self.layout(text, width, height);
        let face = self.face.as_ref();
        let has_background = self.style.background_fill().is_some();
        let outline_radius = self.style.outline().map(|(_, w)| w / 2.0);
        // Text is vertically centred on the line's middle
        let baseline_shift = (face.ascent() + face.descent()) / 2.0;

        let lines = block
            .lines
            .iter()
            .filter(|line| !line.text.is_empty())
            .map(|line| {
                let raster = rasterize_line(face, &line.text, self.embolden);
                let baseline = line.center_y + baseline_shift;
                let left = line.left.round() as i32 + raster.origin_x;
                let top = baseline.round() as i32 - raster.baseline;

                let outline = outline_radius.map(|radius| {
                    let pad = radius.ceil() as usize;
                    let mut grown = CoverageMask::new(
                        raster.mask.width() + 2 * pad,
                        raster.mask.height() + 2 * pad,
                    );
                    grown.stamp(&raster.mask, pad as i32, pad as i32);
                    (grown.dilate(radius), left - pad as i32, top - pad as i32)
                });

                RenderedLine {
                    background: has_background
                        .then(|| line.background_rect(self.style.padding, block.line_height)),
                    outline,
                    fill: raster.mask,
                    left,
                    top,
                }
            })
            .collect();

        RenderedCue {
            text: text.to_string(),
            frame_size: (width, height),
            lines,
        }
    }
}
