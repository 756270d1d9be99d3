// Minimal SubRip-style cue file reader.
//
// Parses just enough structure to host a session: blank-line-separated
// blocks with an `HH:MM:SS,mmm --> HH:MM:SS,mmm` timing row followed by
// text rows. Anything fancier is the document model's business, not the
// sync client's.

use std::path::Path;

use anyhow::{bail, Context, Result};
use cuesync_common::types::CueLine;

pub fn read(path: &Path) -> Result<Vec<CueLine>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cue file {}", path.display()))?;
    parse(&contents)
}

pub fn parse(contents: &str) -> Result<Vec<CueLine>> {
    let normalized = contents.replace("\r\n", "\n");
    let mut lines = Vec::new();

    for block in normalized.split("\n\n").filter(|b| !b.trim().is_empty()) {
        let mut rows = block.lines().filter(|l| !l.trim().is_empty());
        let first = rows.next().unwrap_or("");
        // The numeric counter row is optional.
        let timing_row = if first.contains("-->") {
            first
        } else {
            rows.next().with_context(|| format!("cue block has no timing row: {block:?}"))?
        };

        let (start_ms, end_ms) = parse_timing(timing_row)?;
        let text = rows.collect::<Vec<_>>().join("\n");
        lines.push(CueLine::new(start_ms, end_ms, text));
    }

    Ok(lines)
}

fn parse_timing(row: &str) -> Result<(f64, f64)> {
    let (start, end) =
        row.split_once("-->").with_context(|| format!("bad timing row: {row}"))?;
    Ok((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

fn parse_timestamp(value: &str) -> Result<f64> {
    // HH:MM:SS,mmm (a '.' millisecond separator is tolerated)
    let normalized = value.replace('.', ",");
    let (clock, millis) = normalized.split_once(',').unwrap_or((normalized.as_str(), "0"));

    let mut parts = clock.split(':');
    let (hours, minutes, seconds) = match (parts.next(), parts.next(), parts.next(), parts.next())
    {
        (Some(h), Some(m), Some(s), None) => (h, m, s),
        _ => bail!("bad timestamp: {value}"),
    };

    let hours: f64 = hours.trim().parse().with_context(|| format!("bad hours in `{value}`"))?;
    let minutes: f64 =
        minutes.trim().parse().with_context(|| format!("bad minutes in `{value}`"))?;
    let seconds: f64 =
        seconds.trim().parse().with_context(|| format!("bad seconds in `{value}`"))?;
    let millis: f64 =
        millis.trim().parse().with_context(|| format!("bad milliseconds in `{value}`"))?;

    Ok((hours * 3600.0 + minutes * 60.0 + seconds) * 1000.0 + millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_blocks_with_multiline_text() {
        let srt = "1\n00:00:01,000 --> 00:00:02,500\nHello\nthere\n\n2\n00:00:03,000 --> 00:00:04,000\nSecond cue\n";
        let lines = parse(srt).expect("parse");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start_ms, 1000.0);
        assert_eq!(lines[0].end_ms, 2500.0);
        assert_eq!(lines[0].text, "Hello\nthere");
        assert_eq!(lines[1].text, "Second cue");
    }

    #[test]
    fn counter_row_is_optional() {
        let srt = "00:01:00,000 --> 00:01:01,000\nNo counter\n";
        let lines = parse(srt).expect("parse");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start_ms, 60_000.0);
    }

    #[test]
    fn tolerates_dot_millisecond_separator_and_crlf() {
        let srt = "1\r\n00:00:01.250 --> 00:00:02.000\r\nDotted\r\n";
        let lines = parse(srt).expect("parse");
        assert_eq!(lines[0].start_ms, 1250.0);
    }

    #[test]
    fn rejects_blocks_without_a_timing_row() {
        assert!(parse("1\njust text\n").is_err());
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse("1\n00:00 --> 00:00:01,000\nx\n").is_err());
    }
}
