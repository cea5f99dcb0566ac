//! Caption Format Exporters and Parsers
//!
//! Supports exporting and importing captions in:
//! - SRT (SubRip)
//! - VTT (WebVTT)
//!
//! Export numbers entries from 1 in start-time order. Caption text is
//! written verbatim; a caption containing a blank line will break the
//! numbering of every entry after it when the file is read back.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Caption;
use crate::core::{
    generation::CaptionSegment,
    timecode::{format_srt_timestamp, format_vtt_timestamp, parse_timestamp},
    CoreError, TimeSec,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during subtitle parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

impl From<ParseError> for CoreError {
    fn from(err: ParseError) -> Self {
        CoreError::ParseError(err.to_string())
    }
}

// =============================================================================
// Subtitle Format
// =============================================================================

/// Supported subtitle file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Srt => "application/x-subrip",
            Self::Vtt => "text/vtt",
        }
    }

    /// Default download file name
    pub fn file_name(&self) -> String {
        format!("captions.{}", self.extension())
    }

    /// Guesses the format from a file path's extension
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for SubtitleFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" | "webvtt" => Ok(Self::Vtt),
            other => Err(ParseError::InvalidFormat(format!(
                "unknown subtitle format '{other}'"
            ))),
        }
    }
}

/// Exports captions in the given format
pub fn export(captions: &[Caption], format: SubtitleFormat) -> String {
    match format {
        SubtitleFormat::Srt => export_srt(captions),
        SubtitleFormat::Vtt => export_vtt(captions),
    }
}

/// Parses subtitle text in the given format
pub fn parse(content: &str, format: SubtitleFormat) -> Result<Vec<CaptionSegment>, ParseError> {
    match format {
        SubtitleFormat::Srt => parse_srt(content),
        SubtitleFormat::Vtt => parse_vtt(content),
    }
}

// =============================================================================
// Export
// =============================================================================

fn ordered_by_start(captions: &[Caption]) -> Vec<&Caption> {
    let mut ordered: Vec<&Caption> = captions.iter().collect();
    ordered.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    ordered
}

fn write_entries(
    output: &mut String,
    captions: &[Caption],
    format_timestamp: fn(TimeSec) -> String,
) {
    for (index, caption) in ordered_by_start(captions).into_iter().enumerate() {
        // Sequence number
        output.push_str(&format!("{}\n", index + 1));

        // Timestamps
        let start = format_timestamp(caption.start_time);
        let end = format_timestamp(caption.end_time);
        output.push_str(&format!("{} --> {}\n", start, end));

        // Text
        output.push_str(&caption.text);
        output.push_str("\n\n");
    }
}

/// Exports captions to SRT format.
///
/// Every entry is `<index>\n<start> --> <end>\n<text>\n\n`.
pub fn export_srt(captions: &[Caption]) -> String {
    let mut output = String::new();
    write_entries(&mut output, captions, format_srt_timestamp);
    output
}

/// Exports captions to WebVTT format.
///
/// Same segmentation as SRT behind a `WEBVTT` header, with `.` before the
/// milliseconds.
pub fn export_vtt(captions: &[Caption]) -> String {
    let mut output = String::from("WEBVTT\n\n");
    write_entries(&mut output, captions, format_vtt_timestamp);
    output
}

// =============================================================================
// SRT Parsing
// =============================================================================

/// Parses SRT (SubRip) content into caption segments
///
/// # SRT Format
///
/// ```text
/// 1
/// 00:00:01,000 --> 00:00:04,000
/// First caption text
///
/// 2
/// 00:00:05,500 --> 00:00:08,000
/// Second caption text
/// with multiple lines
/// ```
pub fn parse_srt(content: &str) -> Result<Vec<CaptionSegment>, ParseError> {
    let content = content.trim_start_matches('\u{FEFF}');
    let mut segments = Vec::new();
    let mut lines = content.lines().peekable();

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(first) = lines.next() else {
            break;
        };

        // Sequence number is optional in files written by some tools
        let timestamp_line = if first.contains("-->") {
            first
        } else {
            lines.next().ok_or(ParseError::UnexpectedEnd)?
        };
        let (start, end) = parse_timestamp_line(timestamp_line)?;

        let text = collect_text(&mut lines, |l| l.to_string())?;
        segments.push(CaptionSegment::new(&text, start, end));
    }

    Ok(segments)
}

// =============================================================================
// VTT Parsing
// =============================================================================

/// Parses WebVTT content into caption segments
///
/// # VTT Format
///
/// ```text
/// WEBVTT
///
/// 00:00:01.000 --> 00:00:04.000
/// First caption text
///
/// intro
/// 00:00:05.500 --> 00:00:08.000 align:center
/// <b>Second</b> caption text
/// ```
pub fn parse_vtt(content: &str) -> Result<Vec<CaptionSegment>, ParseError> {
    let content = content.trim_start_matches('\u{FEFF}');
    let mut segments = Vec::new();
    let mut lines = content.lines().peekable();

    match lines.next() {
        Some(header) if header.starts_with("WEBVTT") => {}
        _ => {
            return Err(ParseError::InvalidFormat(
                "VTT file must start with WEBVTT".to_string(),
            ))
        }
    }

    // Header metadata runs until the first blank line
    while lines.peek().is_some_and(|l| !l.trim().is_empty()) {
        lines.next();
    }

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(first) = lines.next() else {
            break;
        };

        if is_vtt_block(first) {
            // NOTE, STYLE and REGION blocks carry no cues
            while lines.peek().is_some_and(|l| !l.trim().is_empty()) {
                lines.next();
            }
            continue;
        }

        let timestamp_line = if first.contains("-->") {
            first
        } else {
            // Cue identifier
            lines.next().ok_or(ParseError::UnexpectedEnd)?
        };
        let (start, end) = parse_timestamp_line(timestamp_line)?;

        let text = collect_text(&mut lines, strip_vtt_tags)?;
        segments.push(CaptionSegment::new(&text, start, end));
    }

    Ok(segments)
}

fn is_vtt_block(line: &str) -> bool {
    let keyword = line.split_whitespace().next().unwrap_or("");
    matches!(keyword, "NOTE" | "STYLE" | "REGION")
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Parses `start --> end [cue settings]`
fn parse_timestamp_line(line: &str) -> Result<(TimeSec, TimeSec), ParseError> {
    let Some((start_part, end_part)) = line.split_once("-->") else {
        return Err(ParseError::InvalidFormat(format!(
            "Expected 'start --> end' format: {}",
            line
        )));
    };

    let start_str = start_part.trim();
    let end_str = end_part.split_whitespace().next().unwrap_or("");

    let start = parse_cue_timestamp(start_str)?;
    let end = parse_cue_timestamp(end_str)?;
    Ok((start, end))
}

fn parse_cue_timestamp(ts: &str) -> Result<TimeSec, ParseError> {
    if !ts.contains(':') {
        return Err(ParseError::InvalidTimestamp(ts.to_string()));
    }
    parse_timestamp(ts).ok_or_else(|| ParseError::InvalidTimestamp(ts.to_string()))
}

fn collect_text<'a, I>(
    lines: &mut std::iter::Peekable<I>,
    clean: impl Fn(&str) -> String,
) -> Result<String, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let mut text_lines = Vec::new();
    while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
        text_lines.push(clean(line));
    }

    if text_lines.is_empty() {
        return Err(ParseError::MissingData("Caption text".to_string()));
    }
    Ok(text_lines.join("\n"))
}

/// Strips VTT formatting tags (`<b>`, `<c.yellow>`, `<00:00:01.000>`)
fn strip_vtt_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_world() -> Vec<Caption> {
        vec![
            Caption::create(0.0, 1.5, "Hello"),
            Caption::create(2.0, 3.25, "World"),
        ]
    }

    // -------------------------------------------------------------------------
    // Export Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_export_srt_exact_output() {
        let srt = export_srt(&hello_world());
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n\
             2\n00:00:02,000 --> 00:00:03,250\nWorld\n\n"
        );
    }

    #[test]
    fn test_export_srt_orders_by_start() {
        let mut captions = hello_world();
        captions.reverse();

        let srt = export_srt(&captions);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,500\nHello\n"));
        assert!(srt.contains("2\n00:00:02,000 --> 00:00:03,250\nWorld\n"));
    }

    #[test]
    fn test_export_srt_empty() {
        assert_eq!(export_srt(&[]), "");
    }

    #[test]
    fn test_export_srt_keeps_multiline_text() {
        let captions = vec![Caption::create(1.0, 2.0, "Line one\nLine two")];
        let srt = export_srt(&captions);
        assert_eq!(srt, "1\n00:00:01,000 --> 00:00:02,000\nLine one\nLine two\n\n");
    }

    #[test]
    fn test_export_vtt() {
        let vtt = export_vtt(&hello_world());
        assert_eq!(
            vtt,
            "WEBVTT\n\n\
             1\n00:00:00.000 --> 00:00:01.500\nHello\n\n\
             2\n00:00:02.000 --> 00:00:03.250\nWorld\n\n"
        );
    }

    #[test]
    fn test_export_dispatches_on_format() {
        let captions = hello_world();
        assert_eq!(export(&captions, SubtitleFormat::Srt), export_srt(&captions));
        assert!(export(&captions, SubtitleFormat::Vtt).starts_with("WEBVTT"));
    }

    // -------------------------------------------------------------------------
    // SRT Parsing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_srt_basic() {
        let srt = r#"1
00:00:01,000 --> 00:00:04,000
Hello World

2
00:00:05,500 --> 00:00:08,000
Second caption
"#;

        let segments = parse_srt(srt).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_time, 1.0);
        assert_eq!(segments[0].end_time, 4.0);
        assert_eq!(segments[0].text, "Hello World");
        assert_eq!(segments[1].start_time, 5.5);
        assert_eq!(segments[1].text, "Second caption");
    }

    #[test]
    fn test_parse_srt_multiline_and_crlf() {
        let srt = "1\r\n00:00:00,000 --> 00:00:05,000\r\nLine one\r\nLine two\r\n";
        let segments = parse_srt(srt).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Line one\nLine two");
    }

    #[test]
    fn test_parse_srt_reads_exported_text() {
        let segments = parse_srt(&export_srt(&hello_world())).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].end_time, 3.25);
    }

    #[test]
    fn test_parse_srt_invalid_timestamp() {
        let srt = "1\n00:00:xx,000 --> 00:00:04,000\nText\n";
        assert!(matches!(
            parse_srt(srt),
            Err(ParseError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_srt_missing_text() {
        let srt = "1\n00:00:01,000 --> 00:00:04,000\n\n";
        assert!(matches!(parse_srt(srt), Err(ParseError::MissingData(_))));
    }

    #[test]
    fn test_parse_srt_truncated() {
        assert_eq!(parse_srt("1\n"), Err(ParseError::UnexpectedEnd));
    }

    // -------------------------------------------------------------------------
    // VTT Parsing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_vtt_with_identifiers_settings_and_tags() {
        let vtt = r#"WEBVTT
Kind: captions

NOTE written by hand

intro
00:00:01.000 --> 00:00:04.000 align:center
<b>Hello</b> World

01:05.500 --> 01:08.000
Second
"#;

        let segments = parse_vtt(vtt).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello World");
        assert_eq!(segments[0].end_time, 4.0);
        assert_eq!(segments[1].start_time, 65.5);
    }

    #[test]
    fn test_parse_vtt_requires_header() {
        assert!(matches!(
            parse_vtt("00:00:01.000 --> 00:00:02.000\nText\n"),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_error_converts_to_core_error() {
        let err: CoreError = ParseError::UnexpectedEnd.into();
        assert!(matches!(err, CoreError::ParseError(_)));
    }

    // -------------------------------------------------------------------------
    // Format Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_subtitle_format_from_path() {
        use std::path::Path;
        assert_eq!(
            SubtitleFormat::from_path(Path::new("out/captions.VTT")),
            Some(SubtitleFormat::Vtt)
        );
        assert_eq!(
            SubtitleFormat::from_path(Path::new("captions.srt")),
            Some(SubtitleFormat::Srt)
        );
        assert_eq!(SubtitleFormat::from_path(Path::new("captions.txt")), None);
        assert_eq!(SubtitleFormat::Srt.file_name(), "captions.srt");
    }
}
