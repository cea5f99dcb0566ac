//! Time Utilities
//!
//! Pure conversions between seconds and the timestamp formats used by the
//! editor (clock display) and by subtitle files (SRT/WebVTT).

use super::TimeSec;

/// Absorbs binary floating point error when flooring to milliseconds,
/// e.g. `0.29 * 1000.0 == 289.99999999999994`.
const MILLIS_EPSILON: f64 = 1e-6;

/// Converts seconds to whole milliseconds using floor division.
///
/// Negative and non-finite input maps to zero.
pub fn to_millis(seconds: TimeSec) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0 + MILLIS_EPSILON).floor() as u64
}

/// Splits milliseconds into (hours, minutes, seconds, millis)
fn split_millis(total_ms: u64) -> (u64, u64, u64, u64) {
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    (hours, mins, secs, ms)
}

/// Formats seconds as `HH:MM:SS<sep>mmm`
fn format_with_separator(seconds: TimeSec, separator: char) -> String {
    let (hours, mins, secs, ms) = split_millis(to_millis(seconds));
    format!("{:02}:{:02}:{:02}{}{:03}", hours, mins, secs, separator, ms)
}

/// Formats seconds as SRT timestamp (00:00:00,000)
pub fn format_srt_timestamp(seconds: TimeSec) -> String {
    format_with_separator(seconds, ',')
}

/// Formats seconds as VTT timestamp (00:00:00.000)
pub fn format_vtt_timestamp(seconds: TimeSec) -> String {
    format_with_separator(seconds, '.')
}

/// Formats seconds as a short clock label (`M:SS`).
///
/// Minutes are not wrapped into hours, matching the timeline ruler.
pub fn format_clock(seconds: TimeSec) -> String {
    let total_secs = to_millis(seconds) / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Parses a timestamp into seconds.
///
/// Accepts `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, `MM:SS.mmm` and plain seconds.
pub fn parse_timestamp(text: &str) -> Option<TimeSec> {
    let normalized = text.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    let parse_part = |s: &str| -> Option<f64> {
        let value: f64 = s.parse().ok()?;
        (value.is_finite() && value >= 0.0).then_some(value)
    };

    match parts.len() {
        1 => parse_part(parts[0]),
        2 => {
            let minutes = parse_part(parts[0])?;
            let seconds = parse_part(parts[1])?;
            Some(minutes * 60.0 + seconds)
        }
        3 => {
            let hours = parse_part(parts[0])?;
            let minutes = parse_part(parts[1])?;
            let seconds = parse_part(parts[2])?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        _ => None,
    }
}
