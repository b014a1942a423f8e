//! Subtitle style descriptor.
//!
//! The serialized form uses the field names of the editor's style record
//! (`fontFamily`, `backgroundOpacity`, ...) so an exported style loads as-is.

use std::fmt;
use std::str::FromStr;

use burnin_common::error::{BurnError, BurnResult};
use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color.
///
/// Parsed from CSS-style strings: `#rgb`, `#rrggbb`, `#rrggbbaa`,
/// a handful of named colors, or `transparent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Scale alpha by `opacity` in [0, 1].
    pub fn with_opacity(self, opacity: f32) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        Self {
            a: (self.a as f32 * opacity).round() as u8,
            ..self
        }
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::opaque(255, 0, 0),
            "green" => Self::opaque(0, 128, 0),
            "lime" => Self::opaque(0, 255, 0),
            "blue" => Self::opaque(0, 0, 255),
            "yellow" => Self::opaque(255, 255, 0),
            "cyan" => Self::opaque(0, 255, 255),
            "magenta" => Self::opaque(255, 0, 255),
            "gray" | "grey" => Self::opaque(128, 128, 128),
            "orange" => Self::opaque(255, 165, 0),
            _ => return None,
        };
        Some(color)
    }
}

impl FromStr for Rgba {
    type Err = BurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(color) = Self::named(&lower) {
            return Ok(color);
        }

        let hex = lower.strip_prefix('#').unwrap_or(&lower);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BurnError::config(format!("Invalid color: {s:?}")));
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let parsed = match hex.len() {
            3 => nibble(0).and_then(|r| Ok(Self::opaque(r, nibble(1)?, nibble(2)?))),
            6 => byte(0).and_then(|r| Ok(Self::opaque(r, byte(2)?, byte(4)?))),
            8 => byte(0).and_then(|r| Ok(Self::new(r, byte(2)?, byte(4)?, byte(6)?))),
            _ => return Err(BurnError::config(format!("Invalid color: {s:?}"))),
        };
        parsed.map_err(|e| BurnError::config(format!("Invalid color {s:?}: {e}")))
    }
}

impl TryFrom<String> for Rgba {
    type Error = BurnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.a {
            0 => f.write_str("transparent"),
            255 => write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b),
            a => write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, a),
        }
    }
}

/// CSS-style font weight (100..=900).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FontWeightRepr", into = "String")]
pub struct FontWeight(u16);

#[derive(Deserialize)]
#[serde(untagged)]
enum FontWeightRepr {
    Number(u16),
    Name(String),
}

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const BOLD: FontWeight = FontWeight(700);

    pub fn new(weight: u16) -> BurnResult<Self> {
        if !(1..=1000).contains(&weight) {
            return Err(BurnError::config(format!("Font weight out of range: {weight}")));
        }
        Ok(Self(weight))
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Weights of 600 and above render bold.
    pub fn is_bold(self) -> bool {
        self.0 >= 600
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl FromStr for FontWeight {
    type Err = BurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "regular" => Ok(Self::NORMAL),
            "bold" => Ok(Self::BOLD),
            "bolder" => Ok(Self(900)),
            "lighter" => Ok(Self(300)),
            other => other
                .parse::<u16>()
                .map_err(|_| BurnError::config(format!("Invalid font weight: {s:?}")))
                .and_then(Self::new),
        }
    }
}

impl TryFrom<FontWeightRepr> for FontWeight {
    type Error = BurnError;

    fn try_from(value: FontWeightRepr) -> Result<Self, Self::Error> {
        match value {
            FontWeightRepr::Number(n) => Self::new(n),
            FontWeightRepr::Name(name) => name.parse(),
        }
    }
}

impl From<FontWeight> for String {
    fn from(value: FontWeight) -> Self {
        match value.0 {
            400 => "normal".to_string(),
            700 => "bold".to_string(),
            n => n.to_string(),
        }
    }
}

/// Vertical placement of the cue block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Horizontal alignment of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlignment {
    Left,
    #[default]
    Center,
    Right,
}

/// Visual parameters for rendering cue text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtitleStyle {
    /// Font family name, resolved against installed fonts.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    pub font_weight: FontWeight,
    /// Text fill color.
    pub color: Rgba,
    /// Background box color; `transparent` disables the box.
    pub background_color: Rgba,
    /// Background box opacity [0.0, 1.0].
    pub background_opacity: f32,
    /// Outline color.
    pub border_color: Rgba,
    /// Outline stroke width in pixels (0 = no outline).
    pub border_width: f32,
    pub position: VerticalPosition,
    pub alignment: HorizontalAlignment,
    /// Distance from the frame edges, and background box padding, in pixels.
    pub padding: f32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 32.0,
            font_weight: FontWeight::BOLD,
            color: Rgba::WHITE,
            background_color: Rgba::BLACK,
            background_opacity: 0.6,
            border_color: Rgba::BLACK,
            border_width: 2.0,
            position: VerticalPosition::Bottom,
            alignment: HorizontalAlignment::Center,
            padding: 20.0,
        }
    }
}

impl SubtitleStyle {
    /// Check the style invariants.
    pub fn validate(&self) -> BurnResult<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(BurnError::config(format!(
                "fontSize must be > 0 (got {})",
                self.font_size
            )));
        }
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(BurnError::config(format!(
                "padding must be >= 0 (got {})",
                self.padding
            )));
        }
        if !(0.0..=1.0).contains(&self.background_opacity) {
            return Err(BurnError::config(format!(
                "backgroundOpacity must be within [0, 1] (got {})",
                self.background_opacity
            )));
        }
        if !self.border_width.is_finite() || self.border_width < 0.0 {
            return Err(BurnError::config(format!(
                "borderWidth must be >= 0 (got {})",
                self.border_width
            )));
        }
        Ok(())
    }

    /// Line advance: 1.2 × font size.
    pub fn line_height(&self) -> f32 {
        self.font_size * 1.2
    }

    /// Effective background fill, or `None` when the box is invisible.
    pub fn background_fill(&self) -> Option<Rgba> {
        let fill = self.background_color.with_opacity(self.background_opacity);
        (!fill.is_transparent()).then_some(fill)
    }

    /// Outline color and width, or `None` when no outline is drawn.
    pub fn outline(&self) -> Option<(Rgba, f32)> {
        (self.border_width > 0.0 && !self.border_color.is_transparent())
            .then_some((self.border_color, self.border_width))
    }

    /// Load a style from a JSON file and validate it.
    pub fn load(path: &std::path::Path) -> BurnResult<Self> {
        if !path.exists() {
            return Err(BurnError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let style: Self = serde_json::from_str(&content)?;
        style.validate()?;
        Ok(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#fff".parse::<Rgba>().unwrap(), Rgba::WHITE);
        assert_eq!("#FF8000".parse::<Rgba>().unwrap(), Rgba::opaque(255, 128, 0));
        assert_eq!(
            "#00000080".parse::<Rgba>().unwrap(),
            Rgba::new(0, 0, 0, 128)
        );
        assert_eq!("yellow".parse::<Rgba>().unwrap(), Rgba::opaque(255, 255, 0));
        assert!("transparent".parse::<Rgba>().unwrap().is_transparent());
        assert!("#12345".parse::<Rgba>().is_err());
        assert!("#ggg".parse::<Rgba>().is_err());
    }

    #[test]
    fn test_color_display_roundtrip() {
        for raw in ["#ff8000", "#00000080", "transparent"] {
            let color: Rgba = raw.parse().unwrap();
            assert_eq!(color.to_string(), raw);
        }
    }

    #[test]
    fn test_font_weight_parsing() {
        assert!("bold".parse::<FontWeight>().unwrap().is_bold());
        assert!(!"normal".parse::<FontWeight>().unwrap().is_bold());
        assert!("600".parse::<FontWeight>().unwrap().is_bold());
        assert!("heavy".parse::<FontWeight>().is_err());
    }

    #[test]
    fn test_style_deserializes_editor_record() {
        let json = r##"{
            "fontFamily": "Inter",
            "fontSize": 42,
            "fontWeight": "bold",
            "color": "#ffffff",
            "backgroundColor": "#000000",
            "backgroundOpacity": 0.7,
            "borderColor": "#000000",
            "borderWidth": 3,
            "position": "top",
            "alignment": "left",
            "padding": 16
        }"##;
        let style: SubtitleStyle = serde_json::from_str(json).unwrap();
        assert_eq!(style.font_family, "Inter");
        assert_eq!(style.font_size, 42.0);
        assert!(style.font_weight.is_bold());
        assert_eq!(style.position, VerticalPosition::Top);
        assert_eq!(style.alignment, HorizontalAlignment::Left);
        assert!(style.validate().is_ok());
    }

    #[test]
    fn test_numeric_font_weight_deserializes() {
        let style: SubtitleStyle = serde_json::from_str(r#"{"fontWeight": 300}"#).unwrap();
        assert_eq!(style.font_weight.value(), 300);
        assert_eq!(style.font_size, SubtitleStyle::default().font_size);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut style = SubtitleStyle {
            font_size: 0.0,
            ..SubtitleStyle::default()
        };
        assert!(style.validate().is_err());

        style.font_size = 24.0;
        style.background_opacity = 1.5;
        assert!(style.validate().is_err());

        style.background_opacity = 0.5;
        style.padding = -1.0;
        assert!(style.validate().is_err());
    }

    #[test]
    fn test_transparent_background_disables_box() {
        let style = SubtitleStyle {
            background_color: Rgba::TRANSPARENT,
            ..SubtitleStyle::default()
        };
        assert!(style.background_fill().is_none());

        let zero_opacity = SubtitleStyle {
            background_opacity: 0.0,
            ..SubtitleStyle::default()
        };
        assert!(zero_opacity.background_fill().is_none());

        let fill = SubtitleStyle::default().background_fill().unwrap();
        assert_eq!(fill.a, 153);
    }

    #[test]
    fn test_line_height() {
        let style = SubtitleStyle {
            font_size: 50.0,
            ..SubtitleStyle::default()
        };
        assert!((style.line_height() - 60.0).abs() < 1e-4);
    }
}
