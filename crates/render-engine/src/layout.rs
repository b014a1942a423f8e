//! Text layout: greedy word wrap and line placement on a frame.

use burnin_cue_model::style::{HorizontalAlignment, SubtitleStyle, VerticalPosition};

use crate::font::TextMeasure;

/// Greedy word wrap.
///
/// Words (split on any whitespace) are joined by a single space while the
/// measured line stays within `max_width`. A word wider than `max_width`
/// gets a line of its own and is never split. Empty or whitespace-only input
/// yields a single empty line.
pub fn wrap(text: &str, max_width: f32, measure: &dyn TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure.measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    lines.push(current);
    lines
}

/// Wrap each explicit line of `text` separately.
///
/// Blank lines inside the text are kept as empty lines.
pub fn wrap_paragraphs(text: &str, max_width: f32, measure: &dyn TextMeasure) -> Vec<String> {
    let mut lines: Vec<String> = text
        .lines()
        .flat_map(|paragraph| wrap(paragraph, max_width, measure))
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// A wrapped line positioned on the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    /// Measured advance width.
    pub width: f32,
    /// X of the line's left edge.
    pub left: f32,
    /// Y of the line's vertical centre.
    pub center_y: f32,
}

impl PlacedLine {
    /// Background box `(x, y, width, height)`: the text extent plus
    /// `padding / 2` on each side, one line-height tall.
    pub fn background_rect(&self, padding: f32, line_height: f32) -> (f32, f32, f32, f32) {
        (
            self.left - padding / 2.0,
            self.center_y - line_height / 2.0,
            self.width + padding,
            line_height,
        )
    }
}

/// Lines of one cue laid out on a frame, top line first.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<PlacedLine>,
    pub line_height: f32,
}

/// Wrap `text` to the frame and place every line according to `style`.
pub fn layout_text(
    text: &str,
    style: &SubtitleStyle,
    measure: &dyn TextMeasure,
    frame_width: u32,
    frame_height: u32,
) -> TextBlock {
    let (width, height) = (frame_width as f32, frame_height as f32);
    let max_width = (width - 2.0 * style.padding).max(0.0);
    let line_height = style.line_height();
    let lines = wrap_paragraphs(text, max_width, measure);

    let count = lines.len() as f32;
    let half_block = count * line_height / 2.0;
    let anchor_y = match style.position {
        VerticalPosition::Top => style.padding + half_block,
        VerticalPosition::Center => height / 2.0,
        VerticalPosition::Bottom => height - style.padding - half_block,
    };
    let anchor_x = match style.alignment {
        HorizontalAlignment::Left => style.padding,
        HorizontalAlignment::Center => width / 2.0,
        HorizontalAlignment::Right => width - style.padding,
    };

    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let line_width = measure.measure(&text);
            let left = match style.alignment {
                HorizontalAlignment::Left => anchor_x,
                HorizontalAlignment::Center => anchor_x - line_width / 2.0,
                HorizontalAlignment::Right => anchor_x - line_width,
            };
            PlacedLine {
                text,
                width: line_width,
                left,
                center_y: anchor_y + (i as f32 - (count - 1.0) / 2.0) * line_height,
            }
        })
        .collect();

    TextBlock { lines, line_height }
}
