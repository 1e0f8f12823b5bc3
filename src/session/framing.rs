//! Marker framing over an unstructured PTY byte stream.
//!
//! A remote interactive shell has no message boundaries. Every command is
//! therefore written as a single line
//!
//! ```text
//! echo '<STA''RT>'; <command>; echo '<EN''D>' $?
//! ```
//!
//! and its output is whatever the shell prints between a line holding exactly
//! `<START>` and a line holding `<END>` followed by the exit status. Each
//! marker is split across two quoted halves, so the PTY echo of the input line
//! never carries a literal marker, however the terminal wraps or redraws it.
//!
//! Every command gets its own marker pair (`..._<token>_<n>__`). Marker lines
//! from an earlier command, such as the late end line of a command that timed
//! out, are recognised by the shared token prefix and discarded instead of
//! completing the wrong frame.
//!
//! # Cleaning
//!
//! 1. Escape sequences (CSI cursor/color codes, OSC strings, charset
//!    selection, keypad modes) and stray control characters are removed.
//!    [`StreamCleaner`] does this per chunk, holding back an escape sequence
//!    or UTF-8 character that is split across chunks.
//! 2. The text is split into lines.
//! 3. Lines that echo the injected command itself are dropped.
//! 4. Only lines between the markers are kept. When `<START>` never shows up
//!    (the channel was still mid-output from an earlier interaction) capture
//!    falls back to the beginning of the read, or to the last stale marker
//!    line. That fallback is best effort: stray output from the earlier
//!    command may leak into the frame.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// CSI, OSC, DCS/PM/APC strings, charset selection and single-character escapes.
static ESCAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-?]*[ -/]*[@-~]",
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?",
        r"|\x1b[PX^_][^\x1b]*(?:\x1b\\)?",
        r"|\x1b[()*+][0-9A-Za-z]",
        r"|\x1b[=>78]",
        r"|\x1b[@-Z\\-_]",
    ))
    .expect("escape pattern is valid")
});

/// Control characters left over after escape removal (keeps `\t` and `\n`).
static CONTROL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0b-\x1f\x7f]")
        .expect("control pattern is valid")
});

/// Longest unterminated escape sequence held back for the next chunk
const MAX_HELD_ESCAPE: usize = 256;

/// Remove terminal escape sequences and control characters.
pub fn strip_control_sequences(input: &str) -> String {
    let without_escapes = ESCAPE_RE.replace_all(input, "");
    CONTROL_RE.replace_all(&without_escapes, "").into_owned()
}

/// Append the decodable prefix of `bytes` to `out`, leaving an incomplete
/// trailing UTF-8 sequence in `bytes`. Invalid bytes become U+FFFD.
fn decode_utf8(bytes: &mut Vec<u8>, out: &mut String) {
    let mut consumed = 0;
    loop {
        match std::str::from_utf8(&bytes[consumed..]) {
            Ok(valid) => {
                out.push_str(valid);
                consumed = bytes.len();
                break;
            }
            Err(error) => {
                let valid_end = consumed + error.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&bytes[consumed..valid_end]));
                match error.error_len() {
                    Some(invalid) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        consumed = valid_end + invalid;
                    }
                    None => {
                        consumed = valid_end;
                        break;
                    }
                }
            }
        }
    }
    bytes.drain(..consumed);
}

/// Whether the escape sequence at the start of `sequence` has its terminator.
fn escape_complete(sequence: &[u8]) -> bool {
    match sequence.get(1) {
        None => false,
        Some(b'[') => sequence[2..].iter().any(|b| (0x40..=0x7e).contains(b)),
        Some(b']') => sequence[2..].contains(&0x07),
        Some(b'P' | b'X' | b'^' | b'_') => false,
        Some(b'(' | b')' | b'*' | b'+') => sequence.len() >= 3,
        Some(_) => true,
    }
}

/// Index where an unterminated trailing escape sequence starts, or the
/// length of `text` when there is none.
fn held_escape_start(text: &str) -> usize {
    let bytes = text.as_bytes();
    let window = bytes.len().saturating_sub(MAX_HELD_ESCAPE);
    match bytes[window..].iter().rposition(|&b| b == 0x1b) {
        Some(offset) if !escape_complete(&bytes[window + offset..]) => window + offset,
        _ => bytes.len(),
    }
}

/// Incremental [`strip_control_sequences`] over a chunked byte stream.
///
/// Each chunk is cleaned once; only a split UTF-8 character or escape
/// sequence is carried to the next call.
#[derive(Debug, Default)]
pub struct StreamCleaner {
    bytes: Vec<u8>,
    text: String,
}

impl StreamCleaner {
    /// Cleaned text made available by `chunk`.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.bytes.extend_from_slice(chunk);
        decode_utf8(&mut self.bytes, &mut self.text);
        let held = self.text.split_off(held_escape_start(&self.text));
        let ready = std::mem::replace(&mut self.text, held);
        strip_control_sequences(&ready)
    }

    /// Clean whatever is still held back.
    pub fn finish(&mut self) -> String {
        if !self.bytes.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.bytes));
            self.bytes.clear();
        }
        strip_control_sequences(&std::mem::take(&mut self.text))
    }
}

/// `'head''tail'`: concatenated by the shell, never literal in its echo.
fn split_quoted(marker: &str) -> String {
    let (head, tail) = marker.split_at(marker.len() / 2);
    format!("'{}''{}'", head, tail)
}

/// The per-session sentinel token and prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    token: String,
    prompt: String,
    issued: u64,
}

impl Markers {
    /// Markers derived from a fresh v4 uuid.
    pub fn generate() -> Self {
        Self::from_token(&Uuid::new_v4().simple().to_string())
    }

    pub(crate) fn from_token(token: &str) -> Self {
        Self {
            token: token.to_string(),
            prompt: format!("__SSHR_PROMPT_{}__", token),
            issued: 0,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// A fresh marker pair for the next command.
    pub fn next_frame(&mut self) -> FrameMarkers {
        self.issued += 1;
        FrameMarkers::new(&self.token, self.issued, &self.prompt)
    }

    /// Shell setup line: sentinel prompt, no prompt hooks, no color.
    ///
    /// The sentinel is split across two quoted words so the echo of this line
    /// cannot be mistaken for the prompt itself.
    pub fn setup_line(&self) -> String {
        format!(
            "export TERM=dumb NO_COLOR=1 PAGER=cat GIT_PAGER=cat SYSTEMD_PAGER=; unset PROMPT_COMMAND; PS1={}; PS2=''\n",
            split_quoted(&self.prompt)
        )
    }
}

/// Start and end markers of one framed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMarkers {
    start: String,
    end: String,
    start_family: String,
    end_family: String,
    start_echo: String,
    end_echo: String,
    prompt: String,
}

impl FrameMarkers {
    fn new(token: &str, sequence: u64, prompt: &str) -> Self {
        let start_family = format!("__SSHR_START_{}_", token);
        let end_family = format!("__SSHR_END_{}_", token);
        let start = format!("{}{}__", start_family, sequence);
        let end = format!("{}{}__", end_family, sequence);
        Self {
            start_echo: format!("echo {}", split_quoted(&start)),
            end_echo: format!("echo {}", split_quoted(&end)),
            start,
            end,
            start_family,
            end_family,
            prompt: prompt.to_string(),
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The single line written to the shell for `command`.
    pub fn wrap(&self, command: &str) -> String {
        format!("{}; {}; {} $?\n", self.start_echo, command, self.end_echo)
    }

    fn is_echo_line(&self, line: &str) -> bool {
        line.contains(&self.start_echo) || line.contains(&self.end_echo)
    }

    fn is_prompt_line(&self, line: &str) -> bool {
        line.trim().strip_prefix(&self.prompt).is_some_and(|rest| rest.trim().is_empty())
    }

    /// A marker line printed for another command on this channel.
    fn is_stale_marker(&self, line: &str) -> bool {
        let trimmed = line.trim();
        (line.contains(&self.end_family) && !line.contains(&self.end))
            || (trimmed.starts_with(&self.start_family) && trimmed != self.start)
    }
}

/// Watches newly cleaned text for a terminated line carrying the end marker.
pub(crate) struct EndLineWatch {
    end: String,
    line: String,
}

impl EndLineWatch {
    pub(crate) fn new(markers: &FrameMarkers) -> Self {
        Self {
            end: markers.end.clone(),
            line: String::new(),
        }
    }

    /// Feed the next cleaned fragment; true once the end line is complete.
    pub(crate) fn feed(&mut self, fresh: &str) -> bool {
        let mut rest = fresh;
        while let Some(newline) = rest.find('\n') {
            self.line.push_str(&rest[..newline]);
            if self.line.contains(&self.end) {
                return true;
            }
            self.line.clear();
            rest = &rest[newline + 1..];
        }
        self.line.push_str(rest);
        false
    }
}

/// Watches newly cleaned text for the sentinel prompt.
pub(crate) struct PromptWatch {
    prompt: String,
    tail: String,
}

impl PromptWatch {
    pub(crate) fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            tail: String::new(),
        }
    }

    pub(crate) fn feed(&mut self, fresh: &str) -> bool {
        self.tail.push_str(fresh);
        if self.tail.contains(&self.prompt) {
            return true;
        }
        if self.tail.len() > self.prompt.len() {
            let mut cut = self.tail.len() - self.prompt.len();
            while !self.tail.is_char_boundary(cut) {
                cut -= 1;
            }
            self.tail.drain(..cut);
        }
        false
    }
}

/// Command output extracted from a cleaned read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Payload lines between the markers
    pub lines: Vec<String>,
    /// Exit status printed after the end marker
    pub exit_code: Option<i32>,
    /// Whether the start marker was observed
    pub saw_start: bool,
    /// Whether a terminated end-marker line was observed
    pub complete: bool,
    /// Marker lines from earlier commands that were discarded
    pub stale_markers: usize,
}

impl Frame {
    pub fn output(&self) -> String {
        self.lines.join("\n")
    }
}

/// Scan cleaned text for the frame delimited by `markers`.
pub fn extract_frame(cleaned: &str, markers: &FrameMarkers) -> Frame {
    let mut frame = Frame::default();
    let segments: Vec<&str> = cleaned.split('\n').collect();
    let last_index = segments.len().saturating_sub(1);

    for (index, line) in segments.iter().enumerate() {
        if markers.is_echo_line(line) || markers.is_prompt_line(line) {
            continue;
        }

        if line.trim() == markers.start {
            frame.saw_start = true;
            frame.lines.clear();
            continue;
        }

        if markers.is_stale_marker(line) {
            frame.stale_markers += 1;
            // Anything before it belongs to the earlier command
            if !frame.saw_start {
                frame.lines.clear();
            }
            continue;
        }

        if let Some(position) = line.find(&markers.end) {
            // The status is only trustworthy once its line is terminated
            if index == last_index {
                break;
            }
            let before = &line[..position];
            if !before.trim().is_empty() {
                frame.lines.push(before.to_string());
            }
            frame.exit_code = line[position + markers.end.len()..]
                .split_whitespace()
                .next()
                .and_then(|status| status.parse::<i32>().ok());
            frame.complete = true;
            break;
        }

        frame.lines.push(line.to_string());
    }

    if !frame.complete {
        // An unterminated tail may still grow; never report it as payload yet
        while frame.lines.last().is_some_and(|l| l.trim().is_empty()) {
            frame.lines.pop();
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> FrameMarkers {
        Markers::from_token("abc123").next_frame()
    }

    mod stripping {
        use super::*;

        #[test]
        fn test_strips_color_codes() {
            assert_eq!(strip_control_sequences("\x1b[31mred\x1b[0m"), "red");
            assert_eq!(strip_control_sequences("\x1b[1;32mok\x1b[m"), "ok");
        }

        #[test]
        fn test_strips_cursor_movement() {
            assert_eq!(strip_control_sequences("a\x1b[2K\x1b[1Gb"), "ab");
            assert_eq!(strip_control_sequences("\x1b[?2004hprompt"), "prompt");
        }

        #[test]
        fn test_strips_osc_title() {
            assert_eq!(
                strip_control_sequences("\x1b]0;user@host: ~\x07text"),
                "text"
            );
            assert_eq!(strip_control_sequences("\x1b]2;title\x1b\\text"), "text");
        }

        #[test]
        fn test_strips_carriage_returns_and_bells() {
            assert_eq!(strip_control_sequences("line\r\nnext\x07"), "line\nnext");
        }

        #[test]
        fn test_keeps_tabs_and_unicode() {
            assert_eq!(strip_control_sequences("a\tb ✓ é"), "a\tb ✓ é");
        }

        #[test]
        fn test_strips_charset_and_keypad() {
            assert_eq!(strip_control_sequences("\x1b(B\x1b=x\x1b>"), "x");
        }
    }

    mod stream_cleaning {
        use super::*;

        fn clean_in_chunks(raw: &[u8], size: usize) -> String {
            let mut cleaner = StreamCleaner::default();
            let mut out = String::new();
            for chunk in raw.chunks(size) {
                out.push_str(&cleaner.push(chunk));
            }
            out.push_str(&cleaner.finish());
            out
        }

        #[test]
        fn test_escape_split_across_chunks() {
            let mut cleaner = StreamCleaner::default();
            assert_eq!(cleaner.push(b"ok \x1b[01;3"), "ok ");
            assert_eq!(cleaner.push(b"2mgreen\x1b"), "green");
            assert_eq!(cleaner.push(b"[0m done\r\n"), " done\n");
        }

        #[test]
        fn test_osc_split_across_chunks() {
            let mut cleaner = StreamCleaner::default();
            assert_eq!(cleaner.push(b"\x1b]0;user@ho"), "");
            assert_eq!(cleaner.push(b"st\x07$ "), "$ ");
        }

        #[test]
        fn test_utf8_split_across_chunks() {
            let bytes = "✓ é".as_bytes();
            let mut cleaner = StreamCleaner::default();
            let mut out = cleaner.push(&bytes[..1]);
            assert_eq!(out, "");
            out.push_str(&cleaner.push(&bytes[1..4]));
            out.push_str(&cleaner.push(&bytes[4..]));
            assert_eq!(out, "✓ é");
        }

        #[test]
        fn test_invalid_bytes_replaced() {
            let mut cleaner = StreamCleaner::default();
            assert_eq!(cleaner.push(b"a\xffb"), "a\u{fffd}b");
        }

        #[test]
        fn test_finish_flushes_held_tail() {
            let mut cleaner = StreamCleaner::default();
            assert_eq!(cleaner.push(b"partial \x1b["), "partial ");
            assert_eq!(cleaner.finish(), "[");
        }

        #[test]
        fn test_chunked_matches_whole_buffer() {
            let raw = "\x1b]0;t@h\x07$ ls\r\n\x1b[01;34mdir\x1b[0m  ✓ file\r\n\x1b(B\x1b[mnext\r\n"
                .as_bytes();
            let whole = strip_control_sequences(&String::from_utf8_lossy(raw));
            for size in [1, 2, 3, 5, 7, 64] {
                assert_eq!(clean_in_chunks(raw, size), whole, "chunk size {}", size);
            }
        }
    }

    mod marker_generation {
        use super::*;

        #[test]
        fn test_generated_markers_are_unique() {
            let mut a = Markers::generate();
            let mut b = Markers::generate();
            assert_ne!(a.prompt(), b.prompt());
            assert_ne!(a.next_frame().start(), b.next_frame().start());
        }

        #[test]
        fn test_each_command_gets_its_own_pair() {
            let mut session = Markers::from_token("abc123");
            let first = session.next_frame();
            let second = session.next_frame();
            assert_ne!(first.start(), second.start());
            assert_ne!(first.end(), second.end());
            assert!(!second.end().contains(first.end()));
            assert!(!first.end().contains(second.end()));
        }

        #[test]
        fn test_end_marker_not_inside_start_marker() {
            let m = markers();
            assert!(!m.start().contains(m.end()));
            assert!(!m.end().contains(m.start()));
        }

        #[test]
        fn test_wrap_is_single_line() {
            let m = markers();
            let line = m.wrap("ls -la");
            assert_eq!(
                line,
                "echo '__SSHR_STAR''T_abc123_1__'; ls -la; echo '__SSHR_END''_abc123_1__' $?\n"
            );
            assert_eq!(line.matches('\n').count(), 1);
        }

        #[test]
        fn test_wrap_hides_literal_markers() {
            let m = markers();
            let line = m.wrap("ls");
            assert!(!line.contains(m.start()));
            assert!(!line.contains(m.end()));
            let joined = line.replace("''", "").replace('\'', "");
            assert!(joined.contains(m.start()));
            assert!(joined.contains(m.end()));
        }

        #[test]
        fn test_setup_line_hides_literal_prompt() {
            let m = Markers::from_token("abc123");
            let line = m.setup_line();
            assert!(!line.contains(m.prompt()));
            assert!(line.contains("TERM=dumb"));
            assert!(line.contains("unset PROMPT_COMMAND"));
            // Shell concatenation of the two quoted halves restores the sentinel
            let joined = line.replace("''", "");
            assert!(joined.contains(m.prompt()));
        }
    }

    mod watches {
        use super::*;

        #[test]
        fn test_end_line_needs_terminator() {
            let m = markers();
            let mut watch = EndLineWatch::new(&m);
            assert!(!watch.feed("out\n"));
            assert!(!watch.feed(&m.end()[..6]));
            assert!(!watch.feed(&format!("{} 0", &m.end()[6..])));
            assert!(watch.feed("\n"));
        }

        #[test]
        fn test_echo_line_does_not_end_frame() {
            let m = markers();
            let mut watch = EndLineWatch::new(&m);
            assert!(!watch.feed(&m.wrap("sleep 5")));
        }

        #[test]
        fn test_prompt_split_across_fragments() {
            let prompt = Markers::from_token("abc123").prompt().to_string();
            let mut watch = PromptWatch::new(&prompt);
            assert!(!watch.feed("banner line\n"));
            assert!(!watch.feed(&prompt[..10]));
            assert!(watch.feed(&prompt[10..]));
        }
    }

    mod extraction {
        use super::*;

        fn stream(m: &FrameMarkers, command: &str, body: &str, status: i32) -> String {
            format!(
                "{prompt} {echo}\r\n{start}\r\n{body}{end} {status}\r\n{prompt} ",
                prompt = m.prompt(),
                echo = m.wrap(command).trim_end(),
                start = m.start(),
                end = m.end(),
            )
        }

        #[test]
        fn test_extracts_payload_lines() {
            let m = markers();
            let raw = stream(&m, "cat f", "one\r\n\x1b[32mtwo\x1b[0m\r\nthree\r\n", 0);
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(frame.complete);
            assert!(frame.saw_start);
            assert_eq!(frame.lines, vec!["one", "two", "three"]);
            assert_eq!(frame.exit_code, Some(0));
        }

        #[test]
        fn test_no_marker_or_echo_text_in_output() {
            let m = markers();
            let raw = stream(&m, "echo hi", "hi\r\n", 0);
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            let output = frame.output();
            assert_eq!(output, "hi");
            assert!(!output.contains("__SSHR_"));
        }

        #[test]
        fn test_empty_output() {
            let m = markers();
            let raw = stream(&m, "true", "", 0);
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(frame.complete);
            assert!(frame.lines.is_empty());
        }

        #[test]
        fn test_nonzero_exit_status() {
            let m = markers();
            let raw = stream(&m, "gti status", "bash: gti: command not found\r\n", 127);
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert_eq!(frame.exit_code, Some(127));
            assert_eq!(frame.lines, vec!["bash: gti: command not found"]);
        }

        #[test]
        fn test_output_without_trailing_newline() {
            let m = markers();
            let raw = stream(&m, "printf foo", "foo", 0);
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(frame.complete);
            assert_eq!(frame.lines, vec!["foo"]);
        }

        #[test]
        fn test_incomplete_until_end_line_terminated() {
            let m = markers();
            let partial = format!("{}\r\nout\r\n{} 1", m.start(), m.end());
            let frame = extract_frame(&strip_control_sequences(&partial), &m);
            assert!(!frame.complete);

            let full = format!("{}27\r\n", partial);
            let frame = extract_frame(&strip_control_sequences(&full), &m);
            assert!(frame.complete);
            assert_eq!(frame.exit_code, Some(127));
        }

        #[test]
        fn test_echo_line_alone_is_not_completion() {
            let m = markers();
            let raw = format!("{} {}\r\n", m.prompt(), m.wrap("sleep 5").trim_end());
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(!frame.complete);
            assert!(frame.lines.is_empty());
        }

        #[test]
        fn test_wrapped_echo_is_not_completion() {
            let m = markers();
            let long = format!("echo {}", "x".repeat(600));
            let echo = m.wrap(&long);
            // Terminal wrapping splits the echoed line at arbitrary columns
            let wrapped: Vec<String> = echo
                .trim_end()
                .as_bytes()
                .chunks(80)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect();
            let raw = format!("{}\r\n", wrapped.join("\r\n"));
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(!frame.complete);

            let mut watch = EndLineWatch::new(&m);
            assert!(!watch.feed(&strip_control_sequences(&raw)));
        }

        #[test]
        fn test_missing_start_falls_back_to_beginning() {
            let m = markers();
            let raw = format!("late output\r\nmore\r\n{} 0\r\n", m.end());
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(frame.complete);
            assert!(!frame.saw_start);
            assert_eq!(frame.lines, vec!["late output", "more"]);
        }

        #[test]
        fn test_stale_end_line_is_discarded() {
            let mut session = Markers::from_token("abc123");
            let earlier = session.next_frame();
            let current = session.next_frame();
            let raw = format!(
                "late tail\r\n{} 0\r\n{}{}",
                earlier.end(),
                earlier.prompt(),
                stream(&current, "whoami", "tester\r\n", 0),
            );
            let frame = extract_frame(&strip_control_sequences(&raw), &current);
            assert!(frame.complete);
            assert_eq!(frame.stale_markers, 1);
            assert_eq!(frame.lines, vec!["tester"]);
            assert_eq!(frame.exit_code, Some(0));
        }

        #[test]
        fn test_stale_end_without_start_drops_earlier_output() {
            let mut session = Markers::from_token("abc123");
            let earlier = session.next_frame();
            let current = session.next_frame();
            let raw = format!(
                "late tail\r\n{} 0\r\nfresh\r\n{} 0\r\n",
                earlier.end(),
                current.end()
            );
            let frame = extract_frame(&strip_control_sequences(&raw), &current);
            assert!(frame.complete);
            assert!(!frame.saw_start);
            assert_eq!(frame.lines, vec!["fresh"]);
        }

        #[test]
        fn test_output_mentioning_markers_partially_is_kept() {
            let m = markers();
            let raw = stream(&m, "echo __SSHR_", "__SSHR_\r\n", 0);
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert_eq!(frame.lines, vec!["__SSHR_"]);
        }

        #[test]
        fn test_unparseable_status() {
            let m = markers();
            let raw = format!("{}\r\nx\r\n{}\r\n", m.start(), m.end());
            let frame = extract_frame(&strip_control_sequences(&raw), &m);
            assert!(frame.complete);
            assert_eq!(frame.exit_code, None);
        }
    }
}
