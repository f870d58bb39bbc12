//! Terminal stream interpreter.
//!
//! Turns raw output bytes into styled text runs and attribute directives.
//! Only the color subset of SGR is rendered; other recognized control
//! sequences are consumed without output. All state that must survive a read
//! boundary lives in [`ParserState`], which is threaded through every call, so
//! feeding a stream in arbitrary chunks yields the same runs (modulo splitting
//! of equally-styled runs) as feeding it at once.

use sshterm_core::{Attributes, Color, ControlDirective, Segment, StyledRun};

const ESC: u8 = 0x1B;

/// Final bytes that end a control sequence.
pub const TERMINATORS: &[u8] = b"HfABCDEFGJKSTm@";

/// Which bytes end a control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencePolicy {
    /// Only the bytes in [`TERMINATORS`]
    #[default]
    Strict,
    /// Any CSI final byte (0x40-0x7E); sequences outside the recognized set
    /// are consumed without output
    AnyFinalByte,
}

impl SequencePolicy {
    /// Whether `byte` ends a pending control sequence.
    pub fn is_terminator(self, byte: u8) -> bool {
        match self {
            SequencePolicy::Strict => TERMINATORS.contains(&byte),
            SequencePolicy::AnyFinalByte => (0x40..=0x7E).contains(&byte),
        }
    }
}

/// Position of the scanner relative to control sequences.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Ground,
    /// `ESC` seen, next byte decides
    Escape,
    /// Inside `ESC [`, holding the parameter bytes so far
    Sequence(Vec<u8>),
}

/// Interpreter state carried across chunk boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParserState {
    attrs: Attributes,
    mode: Mode,
    /// Leading bytes of a UTF-8 character cut off by the end of the last chunk
    text_tail: Vec<u8>,
}

impl ParserState {
    /// Fresh state with default attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes applied to the next run.
    pub fn attributes(&self) -> Attributes {
        self.attrs
    }

    /// Whether a control sequence (or a lone `ESC`) is waiting for more bytes.
    pub fn has_pending_sequence(&self) -> bool {
        self.mode != Mode::Ground
    }

    /// Parameter bytes of the pending control sequence.
    pub fn pending_parameters(&self) -> &[u8] {
        match &self.mode {
            Mode::Sequence(params) => params,
            _ => &[],
        }
    }

    /// Whether the last chunk ended inside a multi-byte character.
    pub fn has_partial_character(&self) -> bool {
        !self.text_tail.is_empty()
    }
}

/// Stream interpreter configured with a [`SequencePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interpreter {
    policy: SequencePolicy,
}

impl Interpreter {
    /// Create an interpreter.
    pub fn new(policy: SequencePolicy) -> Self {
        Self { policy }
    }

    /// The sequence policy in use.
    pub fn policy(&self) -> SequencePolicy {
        self.policy
    }

    /// Interpret one chunk.
    ///
    /// Returns the ordered segments produced by `bytes` and the state to pass
    /// with the next chunk. Never fails: invalid UTF-8 becomes U+FFFD, unknown
    /// SGR codes become [`ControlDirective::Ignored`], and unsupported control
    /// bytes are dropped.
    pub fn interpret(&self, bytes: &[u8], state: ParserState) -> (Vec<Segment>, ParserState) {
        let mut scan = Scan {
            policy: self.policy,
            attrs: state.attrs,
            mode: state.mode,
            run: state.text_tail,
            out: Vec::new(),
        };

        for &byte in bytes {
            scan.advance(byte);
        }

        scan.finish()
    }
}

/// Interpret one chunk with the strict terminator set.
pub fn interpret(bytes: &[u8], state: ParserState) -> (Vec<Segment>, ParserState) {
    Interpreter::default().interpret(bytes, state)
}

/// Merge adjacent text runs that share attributes.
pub fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let (Some(Segment::Text(last)), Segment::Text(run)) = (merged.last_mut(), &segment) {
            if last.attrs == run.attrs {
                last.text.push_str(&run.text);
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

/// Progress through the parameters of an extended color (`38;5;n`, `48;2;r;g;b`).
#[derive(Clone, Copy)]
enum Extended {
    None,
    Selector,
    Remaining(u8),
}

struct Scan {
    policy: SequencePolicy,
    attrs: Attributes,
    mode: Mode,
    run: Vec<u8>,
    out: Vec<Segment>,
}

impl Scan {
    fn advance(&mut self, byte: u8) {
        match self.mode {
            Mode::Ground => self.ground(byte),
            Mode::Escape => {
                if byte == b'[' {
                    self.flush_run();
                    self.mode = Mode::Sequence(Vec::new());
                } else {
                    // lone ESC is a dropped control byte
                    self.mode = Mode::Ground;
                    self.ground(byte);
                }
            }
            Mode::Sequence(ref mut params) => {
                if self.policy.is_terminator(byte) {
                    let params = std::mem::take(params);
                    self.mode = Mode::Ground;
                    if byte == b'm' {
                        self.select_graphic_rendition(&params);
                    }
                } else {
                    params.push(byte);
                }
            }
        }
    }

    fn ground(&mut self, byte: u8) {
        match byte {
            ESC => self.mode = Mode::Escape,
            b'\n' | b'\r' | b'\t' => self.run.push(byte),
            0x00..=0x1F => {}
            _ => self.run.push(byte),
        }
    }

    fn select_graphic_rendition(&mut self, params: &[u8]) {
        let params = String::from_utf8_lossy(params);
        let mut extended = Extended::None;

        for code in params.split(';') {
            let directive = match extended {
                Extended::Selector => {
                    extended = match code {
                        "5" => Extended::Remaining(1),
                        "2" => Extended::Remaining(3),
                        _ => Extended::None,
                    };
                    ControlDirective::Ignored
                }
                Extended::Remaining(n) => {
                    extended = if n > 1 {
                        Extended::Remaining(n - 1)
                    } else {
                        Extended::None
                    };
                    ControlDirective::Ignored
                }
                Extended::None => {
                    if matches!(code.parse::<u16>(), Ok(38 | 48)) {
                        extended = Extended::Selector;
                    }
                    sgr_directive(code)
                }
            };

            self.attrs = self.attrs.apply(&directive);
            self.out.push(Segment::Directive(directive));
        }
    }

    /// Emit the pending run, replacing any incomplete trailing character.
    fn flush_run(&mut self) {
        self.emit_run(false);
    }

    fn emit_run(&mut self, keep_tail: bool) {
        if self.run.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut self.run);
        let (text, tail) = decode_lossy(&bytes, keep_tail);
        if !text.is_empty() {
            self.out.push(Segment::Text(StyledRun::new(text, self.attrs)));
        }
        self.run = tail;
    }

    fn finish(mut self) -> (Vec<Segment>, ParserState) {
        self.emit_run(true);
        let state = ParserState {
            attrs: self.attrs,
            mode: self.mode,
            text_tail: self.run,
        };
        (self.out, state)
    }
}

/// Directive for a single standalone SGR parameter.
fn sgr_directive(code: &str) -> ControlDirective {
    if code.is_empty() {
        return ControlDirective::Reset;
    }
    match code.parse::<u16>() {
        Ok(0) => ControlDirective::Reset,
        Ok(39) => ControlDirective::SetForeground(Color::Default),
        Ok(49) => ControlDirective::SetBackground(Color::Default),
        Ok(n) => Color::from_foreground_code(n)
            .map(ControlDirective::SetForeground)
            .or_else(|| Color::from_background_code(n).map(ControlDirective::SetBackground))
            .unwrap_or(ControlDirective::Ignored),
        Err(_) => ControlDirective::Ignored,
    }
}

/// Decode with U+FFFD substitution, the same way `String::from_utf8_lossy`
/// does. With `keep_tail`, an incomplete character at the very end is
/// returned undecoded instead of being replaced.
fn decode_lossy(bytes: &[u8], keep_tail: bool) -> (String, Vec<u8>) {
    let mut text = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                return (text, Vec::new());
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                text.push_str(&String::from_utf8_lossy(valid));
                match err.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None if keep_tail => return (text, after.to_vec()),
                    None => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        return (text, Vec::new());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshterm_core::style::plain_text;

    fn red() -> Attributes {
        Attributes::new(Color::Red, Color::Default)
    }

    fn runs(segments: &[Segment]) -> Vec<StyledRun> {
        segments.iter().filter_map(Segment::as_run).cloned().collect()
    }

    fn feed_chunks(chunks: &[&[u8]]) -> (Vec<Segment>, ParserState) {
        let mut state = ParserState::new();
        let mut all = Vec::new();
        for chunk in chunks {
            let (segments, next) = interpret(chunk, state);
            all.extend(segments);
            state = next;
        }
        (coalesce(all), state)
    }

    #[test]
    fn test_plain_text_is_one_run() {
        let (segments, state) = interpret(b"hello world", ParserState::new());
        assert_eq!(segments, vec![Segment::Text(StyledRun::plain("hello world"))]);
        assert!(!state.has_pending_sequence());
    }

    #[test]
    fn test_empty_input() {
        let (segments, state) = interpret(b"", ParserState::new());
        assert!(segments.is_empty());
        assert_eq!(state, ParserState::new());
    }

    #[test]
    fn test_foreground_color() {
        let (segments, state) = interpret(b"\x1b[31mRED", ParserState::new());
        assert_eq!(
            segments,
            vec![
                Segment::Directive(ControlDirective::SetForeground(Color::Red)),
                Segment::Text(StyledRun::new("RED", red())),
            ]
        );
        assert_eq!(state.attributes(), red());
    }

    #[test]
    fn test_bright_foreground_and_background() {
        let (segments, state) = interpret(b"\x1b[94;42mX", ParserState::new());
        assert_eq!(
            segments[..2],
            [
                Segment::Directive(ControlDirective::SetForeground(Color::BrightBlue)),
                Segment::Directive(ControlDirective::SetBackground(Color::Green)),
            ]
        );
        assert_eq!(
            state.attributes(),
            Attributes::new(Color::BrightBlue, Color::Green)
        );
    }

    #[test]
    fn test_reset_restores_defaults() {
        for reset in [&b"\x1b[0m"[..], b"\x1b[m", b"\x1b[00m"] {
            let (_, state) = interpret(b"\x1b[31;44m", ParserState::new());
            let (segments, state) = interpret(reset, state);
            assert_eq!(segments, vec![Segment::Directive(ControlDirective::Reset)]);
            assert!(state.attributes().is_default());
        }
    }

    #[test]
    fn test_reset_from_default_state() {
        let (_, state) = interpret(b"\x1b[0m", ParserState::new());
        assert!(state.attributes().is_default());
    }

    #[test]
    fn test_unknown_code_is_ignored() {
        let (_, state) = interpret(b"\x1b[32m", ParserState::new());
        let before = state.attributes();
        let (segments, state) = interpret(b"\x1b[999mhi", state);
        assert_eq!(
            segments,
            vec![
                Segment::Directive(ControlDirective::Ignored),
                Segment::Text(StyledRun::new("hi", before)),
            ]
        );
        assert_eq!(state.attributes(), before);
    }

    #[test]
    fn test_non_numeric_parameter_is_ignored() {
        let (segments, state) = interpret(b"\x1b[?1;31mx", ParserState::new());
        assert_eq!(segments[0], Segment::Directive(ControlDirective::Ignored));
        assert_eq!(state.attributes(), red());
    }

    #[test]
    fn test_compound_parameters() {
        // bold is not rendered, red still applies
        let (segments, state) = interpret(b"\x1b[1;31mx", ParserState::new());
        assert_eq!(
            segments[..2],
            [
                Segment::Directive(ControlDirective::Ignored),
                Segment::Directive(ControlDirective::SetForeground(Color::Red)),
            ]
        );
        assert_eq!(state.attributes(), red());
    }

    #[test]
    fn test_default_color_codes() {
        let (_, state) = interpret(b"\x1b[31;41m", ParserState::new());
        let (_, state) = interpret(b"\x1b[39m", state);
        assert_eq!(state.attributes(), Attributes::new(Color::Default, Color::Red));
        let (_, state) = interpret(b"\x1b[49m", state);
        assert!(state.attributes().is_default());
    }

    #[test]
    fn test_extended_color_parameters_are_skipped() {
        // 31 is a palette index here, not a standalone code
        let (segments, state) = interpret(b"\x1b[38;5;31mx", ParserState::new());
        assert_eq!(
            segments[..3],
            [
                Segment::Directive(ControlDirective::Ignored),
                Segment::Directive(ControlDirective::Ignored),
                Segment::Directive(ControlDirective::Ignored),
            ]
        );
        assert!(state.attributes().is_default());

        let (_, state) = interpret(b"\x1b[48;2;40;41;42;33m", ParserState::new());
        assert_eq!(
            state.attributes(),
            Attributes::new(Color::Yellow, Color::Default)
        );
    }

    #[test]
    fn test_bright_background_not_recognized() {
        let (segments, state) = interpret(b"\x1b[101m", ParserState::new());
        assert_eq!(segments, vec![Segment::Directive(ControlDirective::Ignored)]);
        assert!(state.attributes().is_default());
    }

    #[test]
    fn test_non_sgr_sequences_are_consumed() {
        let (segments, state) = interpret(b"a\x1b[2J\x1b[1;1Hb\x1b[Kc", ParserState::new());
        assert_eq!(plain_text(&segments), "abc");
        assert!(segments.iter().all(|s| s.as_run().is_some()));
        assert!(!state.has_pending_sequence());
    }

    #[test]
    fn test_attribute_change_splits_runs() {
        let (segments, _) = interpret(b"ab\x1b[31mcd\x1b[0mef", ParserState::new());
        assert_eq!(
            runs(&segments),
            vec![
                StyledRun::plain("ab"),
                StyledRun::new("cd", red()),
                StyledRun::plain("ef"),
            ]
        );
    }

    #[test]
    fn test_control_bytes_are_stripped() {
        let (segments, _) = interpret(b"A\x07B", ParserState::new());
        assert_eq!(segments, vec![Segment::Text(StyledRun::plain("AB"))]);
    }

    #[test]
    fn test_whitespace_controls_are_kept() {
        let (segments, _) = interpret(b"a\tb\r\nc\x00\x08d", ParserState::new());
        assert_eq!(plain_text(&segments), "a\tb\r\ncd");
    }

    #[test]
    fn test_lone_escape_is_dropped() {
        let (segments, _) = interpret(b"a\x1b]0;title\x07b", ParserState::new());
        assert_eq!(plain_text(&segments), "a]0;titleb");

        let (segments, _) = interpret(b"x\x1b\x1b[31my", ParserState::new());
        assert_eq!(
            runs(&segments),
            vec![StyledRun::plain("x"), StyledRun::new("y", red())]
        );
    }

    #[test]
    fn test_split_sequence() {
        let (first, state) = interpret(b"\x1b[", ParserState::new());
        assert!(first.is_empty());
        assert!(state.has_pending_sequence());

        let (second, state) = interpret(b"31mRED", state);
        let (whole, whole_state) = interpret(b"\x1b[31mRED", ParserState::new());
        assert_eq!(second, whole);
        assert_eq!(state, whole_state);
    }

    #[test]
    fn test_split_after_escape() {
        let (chunked, _) = feed_chunks(&[b"ab\x1b", b"[32mcd"]);
        let (whole, _) = feed_chunks(&[b"ab\x1b[32mcd"]);
        assert_eq!(chunked, whole);
    }

    #[test]
    fn test_unterminated_sequence_is_buffered() {
        let (segments, state) = interpret(b"text\x1b[12;3", ParserState::new());
        assert_eq!(plain_text(&segments), "text");
        assert_eq!(state.pending_parameters(), b"12;3");

        let (segments, state) = interpret(b"4mafter", state);
        assert_eq!(plain_text(&segments), "after");
        assert!(!state.has_pending_sequence());
    }

    #[test]
    fn test_strict_policy_accumulates_until_known_terminator() {
        // 'h' and 'l' are not terminators in the strict set
        let (segments, state) = interpret(b"\x1b[?25lhidden\x1b[0mshown", ParserState::new());
        assert_eq!(plain_text(&segments), "shown");
        assert!(!state.has_pending_sequence());
    }

    #[test]
    fn test_any_final_byte_policy() {
        let interpreter = Interpreter::new(SequencePolicy::AnyFinalByte);
        let (segments, _) =
            interpreter.interpret(b"\x1b[?2004hprompt$ \x1b[31mx", ParserState::new());
        assert_eq!(plain_text(&segments), "prompt$ x");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (segments, _) = interpret(b"a\xffb\xc3(c", ParserState::new());
        assert_eq!(plain_text(&segments), "a\u{FFFD}b\u{FFFD}(c");
    }

    #[test]
    fn test_split_utf8_character() {
        let euro = "€".as_bytes();
        let (first, state) = interpret(&[b'a', euro[0], euro[1]], ParserState::new());
        assert_eq!(plain_text(&first), "a");
        assert!(state.has_partial_character());

        let (second, state) = interpret(&[euro[2], b'b'], state);
        assert_eq!(plain_text(&second), "€b");
        assert!(!state.has_partial_character());
    }

    #[test]
    fn test_incomplete_character_before_sequence_is_replaced() {
        let (segments, _) = interpret(b"\xe2\x82\x1b[31mx", ParserState::new());
        assert_eq!(plain_text(&segments), "\u{FFFD}x");
    }

    #[test]
    fn test_attributes_persist_across_chunks() {
        let (_, state) = interpret(b"\x1b[33m", ParserState::new());
        let (segments, _) = interpret(b"still yellow", state);
        assert_eq!(
            runs(&segments),
            vec![StyledRun::new(
                "still yellow",
                Attributes::new(Color::Yellow, Color::Default)
            )]
        );
    }

    #[test]
    fn test_coalesce_merges_equal_neighbours() {
        let merged = coalesce(vec![
            Segment::Text(StyledRun::plain("a")),
            Segment::Text(StyledRun::plain("b")),
            Segment::Text(StyledRun::new("c", red())),
            Segment::Directive(ControlDirective::Reset),
            Segment::Text(StyledRun::plain("d")),
            Segment::Text(StyledRun::plain("e")),
        ]);
        assert_eq!(
            merged,
            vec![
                Segment::Text(StyledRun::plain("ab")),
                Segment::Text(StyledRun::new("c", red())),
                Segment::Directive(ControlDirective::Reset),
                Segment::Text(StyledRun::plain("de")),
            ]
        );
    }

    #[test]
    fn test_byte_by_byte_matches_whole() {
        let input = "pre\x1b[31mré\x1b[1;44md\x1b[2K\x07\x1b[0m€nd".as_bytes();
        let chunks: Vec<&[u8]> = input.chunks(1).collect();
        let (chunked, chunked_state) = feed_chunks(&chunks);
        let (whole, whole_state) = feed_chunks(&[input]);
        assert_eq!(chunked, whole);
        assert_eq!(chunked_state, whole_state);
    }
}
