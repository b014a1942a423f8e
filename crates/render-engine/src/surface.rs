//! RGBA8 pixel surface and 8-bit coverage masks.

use burnin_common::error::{BurnError, BurnResult};
use burnin_cue_model::style::Rgba;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A frame-sized RGBA8 buffer, row-major, no padding between rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Allocate a transparent surface.
    ///
    /// Fails with `SurfaceUnavailable` for a zero dimension or a size whose
    /// byte length does not fit in memory.
    pub fn new(width: u32, height: u32) -> BurnResult<Self> {
        if width == 0 || height == 0 {
            return Err(BurnError::surface(format!(
                "cannot create a {width}x{height} surface"
            )));
        }
        let len = frame_len(width, height).ok_or_else(|| {
            BurnError::surface(format!("surface {width}x{height} is too large"))
        })?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel bytes (RGBA8).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel bytes, used by decoders writing frames in place.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some(Rgba::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Rgba) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Source-over blend `color` onto the rectangle, clipped to the surface.
    ///
    /// Edges are snapped to the nearest pixel boundary.
    pub fn blend_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        if color.a == 0 || width <= 0.0 || height <= 0.0 {
            return;
        }
        let x0 = clamp_edge(x, self.width);
        let x1 = clamp_edge(x + width, self.width);
        let y0 = clamp_edge(y, self.height);
        let y1 = clamp_edge(y + height, self.height);

        for py in y0..y1 {
            for px in x0..x1 {
                let i = self.offset(px, py);
                blend_pixel(&mut self.data[i..i + BYTES_PER_PIXEL], color, 255);
            }
        }
    }

    /// Source-over blend `color`, modulated by `mask` coverage, with the
    /// mask's top-left corner at `(left, top)`. Out-of-bounds parts are clipped.
    pub fn blend_mask(&mut self, mask: &CoverageMask, left: i32, top: i32, color: Rgba) {
        if color.a == 0 {
            return;
        }
        for my in 0..mask.height {
            let sy = top as i64 + my as i64;
            if sy < 0 || sy >= self.height as i64 {
                continue;
            }
            for mx in 0..mask.width {
                let sx = left as i64 + mx as i64;
                if sx < 0 || sx >= self.width as i64 {
                    continue;
                }
                let coverage = mask.get(mx, my);
                if coverage == 0 {
                    continue;
                }
                let i = self.offset(sx as u32, sy as u32);
                blend_pixel(&mut self.data[i..i + BYTES_PER_PIXEL], color, coverage);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }
}

/// Byte length of one RGBA8 frame, or `None` on overflow.
pub fn frame_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

fn clamp_edge(v: f32, limit: u32) -> u32 {
    if !v.is_finite() {
        return if v > 0.0 { limit } else { 0 };
    }
    v.round().clamp(0.0, limit as f32) as u32
}

/// Porter-Duff source-over for one RGBA8 pixel, straight alpha.
fn blend_pixel(dst: &mut [u8], color: Rgba, coverage: u8) {
    let sa = (color.a as f32 / 255.0) * (coverage as f32 / 255.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }

    let channel = |s: u8, d: u8| -> u8 {
        let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    dst[0] = channel(color.r, dst[0]);
    dst[1] = channel(color.g, dst[1]);
    dst[2] = channel(color.b, dst[2]);
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// 8-bit coverage bitmap (0 = empty, 255 = fully covered).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageMask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl CoverageMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap an existing row-major coverage buffer.
    ///
    /// A buffer of the wrong length yields an empty mask.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Self {
        if data.len() != width * height {
            return Self::default();
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&c| c == 0)
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data[y * self.width + x]
    }

    /// Union `other` into this mask at `(left, top)`, keeping the max coverage.
    pub fn stamp(&mut self, other: &CoverageMask, left: i32, top: i32) {
        for oy in 0..other.height {
            let y = top as i64 + oy as i64;
            if y < 0 || y >= self.height as i64 {
                continue;
            }
            for ox in 0..other.width {
                let x = left as i64 + ox as i64;
                if x < 0 || x >= self.width as i64 {
                    continue;
                }
                let i = y as usize * self.width + x as usize;
                self.data[i] = self.data[i].max(other.get(ox, oy));
            }
        }
    }

    /// Grow the covered area by `radius` pixels (circular max filter).
    ///
    /// Used to turn glyph coverage into an outline stroke.
    pub fn dilate(&self, radius: f32) -> CoverageMask {
        if radius <= 0.0 || self.data.is_empty() {
            return self.clone();
        }
        let r = radius.ceil() as i64;
        let r2 = radius * radius;
        let offsets: Vec<(i64, i64)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| (dx * dx + dy * dy) as f32 <= r2 + 0.25)
            .collect();

        let mut out = CoverageMask::new(self.width, self.height);
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                let mut best = 0u8;
                for &(dx, dy) in &offsets {
                    let (sx, sy) = (x + dx, y + dy);
                    if sx < 0 || sy < 0 {
                        continue;
                    }
                    best = best.max(self.get(sx as usize, sy as usize));
                    if best == 255 {
                        break;
                    }
                }
                out.data[y as usize * self.width + x as usize] = best;
            }
        }
        out
    }
}
