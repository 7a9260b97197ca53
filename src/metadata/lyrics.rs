//! LRC and plain-text lyrics parsing.
//!
//! A file parses as synchronized only if at least one line carries a
//! `[mm:ss.xx]` timestamp; otherwise the whole file is kept as
//! unsynchronized plain text. `#`-prefixed and empty lines are
//! metadata/padding and never become lyric content. A line with
//! multiple timestamps (`[00:01.00][00:05.00]text`) repeats its text
//! at each offset; two timestamps landing on the exact same
//! millisecond append rather than replace.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedLine {
    pub offset_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLyrics {
    Unsynchronized(String),
    Synchronized(Vec<SyncedLine>),
}

pub fn parse(content: &str) -> ParsedLyrics {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut synced: Vec<SyncedLine> = Vec::new();
    let mut any_timestamp = false;
    let mut plain_lines: Vec<&str> = Vec::new();

    for raw_line in content.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (timestamps, text) = extract_timestamps(line);
        if timestamps.is_empty() {
            plain_lines.push(line);
            continue;
        }

        any_timestamp = true;
        for offset_ms in timestamps {
            if let Some(existing) = synced.iter_mut().find(|l| l.offset_ms == offset_ms) {
                existing.text.push(' ');
                existing.text.push_str(text);
            } else {
                synced.push(SyncedLine {
                    offset_ms,
                    text: text.to_string(),
                });
            }
        }
    }

    if any_timestamp {
        synced.sort_by_key(|l| l.offset_ms);
        ParsedLyrics::Synchronized(synced)
    } else {
        while plain_lines.last().is_some_and(|l| l.is_empty()) {
            plain_lines.pop();
        }
        ParsedLyrics::Unsynchronized(plain_lines.join("\n"))
    }
}

/// Pulls every `[mm:ss.xx]`/`[mm:ss]` tag off the front of a line,
/// returning their millisecond offsets and the remaining text.
fn extract_timestamps(line: &str) -> (Vec<u64>, &str) {
    let mut rest = line;
    let mut offsets = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(end) = stripped.find(']') else { break };
        let tag = &stripped[..end];
        match parse_timestamp(tag) {
            Some(ms) => {
                offsets.push(ms);
                rest = &stripped[end + 1..];
            }
            None => break,
        }
    }
    (offsets, rest)
}

fn parse_timestamp(tag: &str) -> Option<u64> {
    let (minutes, remainder) = tag.split_once(':')?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: f64 = remainder.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(minutes * 60_000 + (seconds * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_with_no_timestamps_stays_unsynchronized() {
        match parse("line one\nline two") {
            ParsedLyrics::Unsynchronized(text) => assert_eq!(text, "line one\nline two"),
            _ => panic!("expected unsynchronized lyrics"),
        }
    }

    #[test]
    fn single_timestamp_per_line_parses_in_order() {
        let lyrics = parse("[00:01.00]first\n[00:02.50]second");
        match lyrics {
            ParsedLyrics::Synchronized(lines) => {
                assert_eq!(lines[0], SyncedLine { offset_ms: 1000, text: "first".into() });
                assert_eq!(lines[1], SyncedLine { offset_ms: 2500, text: "second".into() });
            }
            _ => panic!("expected synchronized lyrics"),
        }
    }

    #[test]
    fn repeated_timestamp_tag_duplicates_text_at_each_offset() {
        let lyrics = parse("[00:01.00][00:05.00]chorus");
        match lyrics {
            ParsedLyrics::Synchronized(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].text, "chorus");
                assert_eq!(lines[1].text, "chorus");
            }
            _ => panic!("expected synchronized lyrics"),
        }
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let lyrics = parse("#this is a comment\n\n[00:01.00]line");
        match lyrics {
            ParsedLyrics::Synchronized(lines) => assert_eq!(lines.len(), 1),
            _ => panic!("expected synchronized lyrics"),
        }
    }

    #[test]
    fn bom_is_stripped() {
        let lyrics = parse("\u{feff}[00:01.00]line");
        assert!(matches!(lyrics, ParsedLyrics::Synchronized(_)));
    }

    #[test]
    fn trailing_blank_lines_are_trimmed_from_unsynchronized_text() {
        match parse("line one\n\n\n") {
            ParsedLyrics::Unsynchronized(text) => assert_eq!(text, "line one"),
            _ => panic!("expected unsynchronized lyrics"),
        }
    }
}
