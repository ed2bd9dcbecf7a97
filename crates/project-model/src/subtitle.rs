//! Subtitle cues and SRT/WebVTT interchange.
//!
//! A track keeps cues in the order they appear in the source file. Nothing
//! here re-sorts or rejects overlapping cues; cues whose end is not after
//! their start are kept as parsed and filtered by the renderer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            text: text.into(),
        }
    }

    /// `end > start`.
    pub fn is_well_formed(&self) -> bool {
        self.end_secs > self.start_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// An ordered sequence of cues (file order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub cues: Vec<SubtitleCue>,
}

impl SubtitleTrack {
    pub fn new(cues: Vec<SubtitleCue>) -> Self {
        Self { cues }
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    /// Load a subtitle file, picking the parser from the extension (SRT by default).
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let track = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("vtt") => Self::parse_vtt(&content),
            _ => Self::parse_srt(&content),
        };
        tracing::debug!(path = %path.display(), cues = track.len(), "Loaded subtitle track");
        Ok(track)
    }

    /// Parse SubRip content. Malformed blocks are skipped.
    pub fn parse_srt(content: &str) -> Self {
        let mut cues = Vec::new();
        for block in blocks(content) {
            let mut lines = block.iter().copied();
            let Some(mut first) = lines.next() else {
                continue;
            };
            // Leading numeric index is optional.
            if !first.contains("-->") {
                match lines.next() {
                    Some(next) => first = next,
                    None => continue,
                }
            }
            match parse_timing_line(first) {
                Some((start, end)) => {
                    let text = lines.collect::<Vec<_>>().join("\n");
                    cues.push(SubtitleCue::new(start, end, text));
                }
                None => {
                    tracing::warn!(line = first, "Skipping subtitle block with unreadable timing");
                }
            }
        }
        Self { cues }
    }

    /// Parse WebVTT content. Header, NOTE, STYLE and REGION blocks are skipped.
    pub fn parse_vtt(content: &str) -> Self {
        let mut cues = Vec::new();
        for block in blocks(content) {
            let Some(first) = block.first() else {
                continue;
            };
            if first.starts_with("WEBVTT")
                || first.starts_with("NOTE")
                || first.starts_with("STYLE")
                || first.starts_with("REGION")
            {
                continue;
            }
            let Some(timing_idx) = block.iter().position(|line| line.contains("-->")) else {
                continue;
            };
            match parse_timing_line(block[timing_idx]) {
                Some((start, end)) => {
                    let text = block[timing_idx + 1..].join("\n");
                    cues.push(SubtitleCue::new(start, end, text));
                }
                None => {
                    tracing::warn!(
                        line = block[timing_idx],
                        "Skipping subtitle block with unreadable timing"
                    );
                }
            }
        }
        Self { cues }
    }

    /// Render the track as SubRip.
    pub fn to_srt(&self) -> String {
        let mut output = String::new();

        for (i, cue) in self.cues.iter().enumerate() {
            output.push_str(&format!("{}\n", i + 1));
            output.push_str(&format!(
                "{} --> {}\n",
                format_srt_time(cue.start_secs),
                format_srt_time(cue.end_secs),
            ));
            output.push_str(&cue.text);
            output.push_str("\n\n");
        }

        output
    }
}

/// Split content into blank-line separated blocks of trimmed-right lines.
fn blocks(content: &str) -> Vec<Vec<&str>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut out = Vec::new();
    let mut current = Vec::new();
    for line in content.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Parse `start --> end [settings]`.
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// Parse `HH:MM:SS,mmm`, `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.replace(',', ".");
    let parts: Vec<&str> = raw.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *s),
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };
    let seconds = seconds.parse::<f64>().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let whole = hours.checked_mul(3600)?.checked_add(minutes * 60)?;
    let total = whole as f64 + seconds;
    // Interchange formats carry millisecond precision.
    Some((total * 1000.0).round() / 1000.0)
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SRT: &str = "1\n00:00:00,500 --> 00:00:02,000\nHello there\n\n2\n00:00:02,500 --> 00:00:04,250\nSecond line\nwraps here\n\n";

    #[test]
    fn test_parse_srt() {
        let track = SubtitleTrack::parse_srt(SAMPLE_SRT);
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues[0], SubtitleCue::new(0.5, 2.0, "Hello there"));
        assert_eq!(track.cues[1].text, "Second line\nwraps here");
        assert!((track.cues[1].end_secs - 4.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_srt_handles_crlf_bom_and_missing_index() {
        let content = "\u{feff}00:00:01,000 --> 00:00:02,000\r\nNo index\r\n\r\n";
        let track = SubtitleTrack::parse_srt(content);
        assert_eq!(track.cues, vec![SubtitleCue::new(1.0, 2.0, "No index")]);
    }

    #[test]
    fn test_parse_srt_skips_garbage_blocks() {
        let content = "1\nnot a timing line\ntext\n\n2\n00:00:03,000 --> 00:00:04,000\nok\n";
        let track = SubtitleTrack::parse_srt(content);
        assert_eq!(track.len(), 1);
        assert_eq!(track.cues[0].text, "ok");
    }

    #[test]
    fn test_parse_srt_keeps_inverted_cues_for_renderer() {
        let content = "1\n00:00:05,000 --> 00:00:04,000\nbackwards\n";
        let track = SubtitleTrack::parse_srt(content);
        assert_eq!(track.len(), 1);
        assert!(!track.cues[0].is_well_formed());
    }

    #[test]
    fn test_parse_vtt() {
        let content = "WEBVTT\n\nNOTE a comment\n\nintro\n00:01.000 --> 00:02.500 align:center\nHi\n\n00:00:03.000 --> 00:00:04.000\nThere\n";
        let track = SubtitleTrack::parse_vtt(content);
        assert_eq!(
            track.cues,
            vec![SubtitleCue::new(1.0, 2.5, "Hi"), SubtitleCue::new(3.0, 4.0, "There")]
        );
    }

    #[test]
    fn test_srt_generation() {
        let track = SubtitleTrack::new(vec![
            SubtitleCue::new(0.0, 2.5, "Hello world"),
            SubtitleCue::new(3.0, 5.0, "This is a test"),
        ]);

        let srt = track.to_srt();
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:02,500\nHello world"));
        assert!(srt.contains("2\n00:00:03,000 --> 00:00:05,000\nThis is a test"));
        assert_eq!(SubtitleTrack::parse_srt(&srt), track);
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3661.5), "01:01:01,500");
        assert_eq!(format_srt_time(1.9996), "00:00:02,000");
        assert_eq!(parse_timestamp("01:01:01,500"), Some(3661.5));
        assert_eq!(parse_timestamp("1:75.0"), None);
    }

    #[test]
    fn test_oversized_hours_are_rejected() {
        assert_eq!(parse_timestamp("9999999999999999:00:00,000"), None);
        assert_eq!(parse_timestamp("18446744073709551615:59:59,999"), None);
        assert_eq!(parse_timestamp("1000:00:00,000"), Some(3_600_000.0));

        let srt = "1\n9999999999999999:00:00,000 --> 9999999999999999:00:01,000\nBad\n\n2\n00:00:01,000 --> 00:00:02,000\nGood\n";
        let track = SubtitleTrack::parse_srt(srt);
        assert_eq!(track.len(), 1);
        assert_eq!(track.cues[0].text, "Good");
    }

    #[test]
    fn test_load_picks_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let vtt = dir.path().join("subs.vtt");
        std::fs::write(&vtt, "WEBVTT\n\n00:00.000 --> 00:01.000\nA\n").unwrap();
        assert_eq!(SubtitleTrack::load(&vtt).unwrap().len(), 1);

        let missing = dir.path().join("missing.srt");
        assert!(matches!(
            SubtitleTrack::load(&missing),
            Err(ModelError::IoError { .. })
        ));
    }
}
