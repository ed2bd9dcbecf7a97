//! Safe-zone subtitle layout.
//!
//! Text size is estimated from the font size rather than measured, so the
//! estimate is deliberately on the wide side. Every region produced here is
//! guaranteed to lie inside the safe rectangle derived from the margins.
//!
//! # Placement
//!
//! 1. **Sanitize** the cue text to plain renderable characters.
//! 2. **Wrap** at word boundaries to the safe width (hard-split overlong words).
//! 3. **Anchor** the block's bottom edge on the bottom safe boundary.
//! 4. **Clamp** the block top to the top safe boundary, truncating lines
//!    that cannot fit.
//! 5. **Centre** every line horizontally inside the safe rectangle.

use reelcut_project_model::media::{FrameSize, Rect};
use reelcut_project_model::request::SafeTextMargins;
use reelcut_project_model::subtitle::{SubtitleCue, SubtitleTrack};

/// Estimated advance of an average glyph, in ems.
const GLYPH_ADVANCE_EM: f64 = 0.6;

/// Line pitch, in ems.
const LINE_HEIGHT_EM: f64 = 1.3;

/// Marker appended to the last kept line when a cue is truncated.
const ELLIPSIS: char = '…';

/// Estimated font metrics for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub font_size: f64,
    pub glyph_advance: f64,
    pub line_height: f64,
}

impl TextMetrics {
    pub fn for_frame(frame: FrameSize, font_size_ratio: f64) -> Self {
        let font_size = (frame.height as f64 * font_size_ratio).round().max(1.0);
        Self {
            font_size,
            glyph_advance: font_size * GLYPH_ADVANCE_EM,
            line_height: font_size * LINE_HEIGHT_EM,
        }
    }

    /// Estimated rendered width of `text`.
    pub fn text_width(&self, text: &str) -> f64 {
        text_units(text) * self.glyph_advance
    }
}

/// One rendered line and the region it occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub region: Rect,
}

/// A cue after layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub lines: Vec<PlacedLine>,
    /// Lines were dropped to stay inside the safe zone.
    pub truncated: bool,
}

impl PlacedCue {
    /// Bounding box of all lines.
    pub fn bounds(&self) -> Option<Rect> {
        let first = self.lines.first()?;
        let (mut x0, mut y0) = (first.region.x, first.region.y);
        let (mut x1, mut y1) = (first.region.right(), first.region.bottom());
        for line in &self.lines[1..] {
            x0 = x0.min(line.region.x);
            y0 = y0.min(line.region.y);
            x1 = x1.max(line.region.right());
            y1 = y1.max(line.region.bottom());
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Lays out cues for one frame size and margin set.
#[derive(Debug, Clone)]
pub struct SubtitleLayout {
    safe: Rect,
    metrics: TextMetrics,
}

impl SubtitleLayout {
    pub fn new(frame: FrameSize, margins: &SafeTextMargins, font_size_ratio: f64) -> Self {
        Self {
            safe: margins.safe_rect(frame),
            metrics: TextMetrics::for_frame(frame, font_size_ratio),
        }
    }

    pub fn safe_rect(&self) -> Rect {
        self.safe
    }

    pub fn metrics(&self) -> TextMetrics {
        self.metrics
    }

    /// Width budget of one line in glyph units.
    pub fn max_units_per_line(&self) -> f64 {
        (self.safe.width / self.metrics.glyph_advance).floor()
    }

    /// Number of lines that fit between the safe boundaries.
    pub fn max_lines(&self) -> usize {
        (self.safe.height / self.metrics.line_height).floor() as usize
    }

    /// Lay out every well-formed cue, in track order.
    ///
    /// Cues with `end <= start` or with no renderable text are dropped with a warning.
    pub fn layout_track(&self, track: &SubtitleTrack) -> Vec<PlacedCue> {
        track
            .cues
            .iter()
            .enumerate()
            .filter_map(|(index, cue)| {
                if !cue.is_well_formed() {
                    tracing::warn!(
                        index,
                        start_secs = cue.start_secs,
                        end_secs = cue.end_secs,
                        "Dropping subtitle cue that ends before it starts"
                    );
                    return None;
                }
                let placed = self.layout_cue(cue);
                if placed.is_none() {
                    tracing::warn!(index, "Dropping subtitle cue with no renderable text");
                }
                placed
            })
            .collect()
    }

    /// Lay out a single cue. `None` when nothing renderable remains.
    pub fn layout_cue(&self, cue: &SubtitleCue) -> Option<PlacedCue> {
        let text = sanitize_text(&cue.text);
        let max_units = self.max_units_per_line();
        let max_lines = self.max_lines();
        if text.is_empty() || max_units < 1.0 || max_lines == 0 {
            return None;
        }

        let mut lines = wrap_text(&text, max_units);
        let truncated = lines.len() > max_lines;
        if truncated {
            tracing::warn!(
                lines = lines.len(),
                max_lines,
                start_secs = cue.start_secs,
                "Subtitle cue taller than the safe zone, truncating"
            );
            lines.truncate(max_lines);
            if let Some(last) = lines.last_mut() {
                append_ellipsis(last, max_units);
            }
        }

        let block_height = lines.len() as f64 * self.metrics.line_height;
        let top = (self.safe.bottom() - block_height).max(self.safe.y);

        let placed = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let width = self.metrics.text_width(&text).min(self.safe.width);
                let region = Rect::new(
                    self.safe.x + (self.safe.width - width) / 2.0,
                    top + i as f64 * self.metrics.line_height,
                    width,
                    self.metrics.line_height,
                );
                PlacedLine { text, region }
            })
            .collect();

        Some(PlacedCue {
            start_secs: cue.start_secs,
            end_secs: cue.end_secs,
            lines: placed,
            truncated,
        })
    }
}

/// Reduce cue text to plain renderable characters.
///
/// Strips `<i>`-style markup and `{\an8}`-style override blocks, turns line
/// breaks, tabs and other control characters into spaces, and collapses runs
/// of whitespace.
pub fn sanitize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'\\') => {
                // Drop the override block; an unterminated block is dropped to the end.
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                }
            }
            '<' if chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '/') =>
            {
                let rest: String = chars.clone().collect();
                match rest.find('>') {
                    Some(end) => {
                        for _ in 0..=rest[..end].chars().count() {
                            chars.next();
                        }
                    }
                    None => out.push(c),
                }
            }
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedy word wrap to `max_units` glyph units per line.
pub fn wrap_text(text: &str, max_units: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_units = 0.0;

    for word in text.split_whitespace() {
        let word_units = text_units(word);

        if word_units > max_units {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_units = 0.0;
            }
            let mut chunks = hard_split(word, max_units);
            // The tail of a split word may share its line with following words.
            if let Some(tail) = chunks.pop() {
                lines.extend(chunks);
                current_units = text_units(&tail);
                current = tail;
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_units = word_units;
        } else if current_units + 1.0 + word_units <= max_units {
            current.push(' ');
            current.push_str(word);
            current_units += 1.0 + word_units;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
            current_units = word_units;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn hard_split(word: &str, max_units: f64) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut units = 0.0;
    for c in word.chars() {
        let w = char_units(c);
        if units + w > max_units && !chunk.is_empty() {
            chunks.push(std::mem::take(&mut chunk));
            units = 0.0;
        }
        chunk.push(c);
        units += w;
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

fn append_ellipsis(line: &mut String, max_units: f64) {
    while !line.is_empty() && text_units(line) + 1.0 > max_units {
        line.pop();
    }
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
    line.push(ELLIPSIS);
}

fn text_units(text: &str) -> f64 {
    text.chars().map(char_units).sum()
}

/// Relative advance of a character, in average-glyph units.
///
/// Capitals, digits and the wide Latin letters run well past the average
/// advance in the bold sans faces used for captions. CJK and fullwidth
/// forms are nearly square.
fn char_units(c: char) -> f64 {
    match c {
        'M' | 'W' => 1.8,
        'm' | 'w' | '@' | '%' | '&' => 1.6,
        c if c.is_uppercase() => 1.4,
        '0'..='9' => 1.2,
        c => match c as u32 {
            0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x20000..=0x3FFFD => 1.8,
            _ => 1.0,
        },
    }
}
