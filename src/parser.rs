use bytes::{Buf, BufMut, Bytes, BytesMut};
use memchr::memchr;
use std::{error::Error as StdError, fmt, mem, str};

use crate::Event;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const COLON: u8 = b':';
const SPACE: u8 = b' ';

/// Longest line accepted unless configured otherwise. Same as the token limit
/// of a conventional line scanner.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Which lines of an event stream are accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Grammar {
    /// Only `id:`, `event:`, `data:` and blank lines. Everything else,
    /// comments and `retry:` included, ends the stream with a violation.
    ///
    /// The value of a field starts after the colon and exactly one
    /// separating byte.
    #[default]
    Strict,

    /// Like [`Grammar::Strict`], but comment lines and `retry:` fields are
    /// skipped, and the separator after the colon is only dropped when it is
    /// a space.
    Lenient,
}

/// Inner Error kind that contains possible errors occuring during parsing.
#[derive(Clone, Debug)]
pub enum Error {
    Violation(Bytes),
    Utf8 {
        line: Bytes,
        source: str::Utf8Error,
    },
    LineTooLong(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Violation(line) => {
                write!(f, "Unrecognized line: {:?}", String::from_utf8_lossy(line))
            }
            Self::Utf8 { source, .. } => write!(f, "Invalid UTF8: {}", source),
            Self::LineTooLong(max) => write!(f, "line exceeds the {} byte limit", max),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Utf8 { ref source, .. } => Some(source),
            _ => None,
        }
    }
}

enum Field {
    Id,
    Event,
    Data,
}

#[derive(Default)]
struct EventBuilder {
    id: String,
    name: String,
    data: BytesMut,
}

impl EventBuilder {
    fn build_and_clear(&mut self) -> Event {
        Event {
            id: mem::take(&mut self.id),
            name: mem::take(&mut self.name),
            data: self.data.split().freeze(),
        }
    }
}

pub(crate) struct Parser {
    buf: BytesMut,
    builder: EventBuilder,
    grammar: Grammar,
    max_line_len: usize,
}

impl Parser {
    pub(crate) fn new(grammar: Grammar, max_line_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            builder: EventBuilder::default(),
            grammar,
            max_line_len,
        }
    }

    pub(crate) fn put(&mut self, bs: impl Buf) {
        self.buf.put(bs)
    }

    /// Consumes buffered lines until an event is complete or more input is
    /// needed.
    pub(crate) fn next(&mut self) -> Option<Result<Event, Error>> {
        loop {
            let line = match self.parse_line() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            };

            if line.is_empty() {
                return Some(Ok(self.builder.build_and_clear()));
            }

            if let Err(err) = self.apply(line) {
                return Some(Err(err));
            }
        }
    }

    /// Called once the input has ended. An unterminated last line is still
    /// checked, but the event in progress is thrown away.
    pub(crate) fn finish(&mut self) -> Result<(), Error> {
        let tail = strip_cr(self.buf.split().freeze());
        let result = if tail.is_empty() {
            Ok(())
        } else {
            self.apply(tail)
        };
        self.builder = EventBuilder::default();
        result
    }

    fn apply(&mut self, line: Bytes) -> Result<(), Error> {
        let (field, prefix_len) = if line.starts_with(b"id:") {
            (Field::Id, 3)
        } else if line.starts_with(b"event:") {
            (Field::Event, 6)
        } else if line.starts_with(b"data:") {
            (Field::Data, 5)
        } else if self.grammar == Grammar::Lenient
            && (line.first() == Some(&COLON) || line.starts_with(b"retry:"))
        {
            return Ok(());
        } else {
            return Err(Error::Violation(line));
        };

        let value = self.value(&line[prefix_len..]);
        match field {
            Field::Id => self.builder.id = utf8(&line, value)?,
            Field::Event => self.builder.name = utf8(&line, value)?,
            Field::Data => self.builder.data.extend_from_slice(value),
        }

        Ok(())
    }

    fn value<'a>(&self, rest: &'a [u8]) -> &'a [u8] {
        match self.grammar {
            Grammar::Strict => rest.get(1..).unwrap_or_default(),
            Grammar::Lenient => rest.strip_prefix(&[SPACE]).unwrap_or(rest),
        }
    }

    fn parse_line(&mut self) -> Result<Option<Bytes>, Error> {
        match memchr(LF, &self.buf) {
            Some(i) if i > self.max_line_len => Err(Error::LineTooLong(self.max_line_len)),
            Some(i) => {
                let line = self.buf.split_to(i).freeze();
                self.buf.advance(1);
                Ok(Some(strip_cr(line)))
            }
            None if self.buf.len() > self.max_line_len => {
                Err(Error::LineTooLong(self.max_line_len))
            }
            None => Ok(None),
        }
    }

    #[cfg(test)]
    /// Helper fn for tests.
    fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

fn strip_cr(mut line: Bytes) -> Bytes {
    if line.last() == Some(&CR) {
        line.truncate(line.len() - 1);
    }
    line
}

fn utf8(line: &Bytes, value: &[u8]) -> Result<String, Error> {
    str::from_utf8(value)
        .map(String::from)
        .map_err(|source| Error::Utf8 {
            line: line.clone(),
            source,
        })
}

#[cfg(test)]
impl From<&str> for Parser {
    fn from(s: &str) -> Self {
        let mut p = Parser::new(Grammar::Strict, DEFAULT_MAX_LINE_LEN);
        p.put(s.as_bytes());
        p
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn lenient(s: &str) -> Parser {
        let mut p = Parser::new(Grammar::Lenient, DEFAULT_MAX_LINE_LEN);
        p.put(s.as_bytes());
        p
    }

    #[test]
    fn single_lf_should_be_empty_line() {
        let mut p = Parser::from("\n");
        assert_eq!(p.parse_line().expect("no error"), Some(Bytes::new()));
        assert!(p.bytes().is_empty());
    }

    #[test]
    fn buf_cleared_line_ending_with_crlf() {
        let mut p = Parser::from("\r\n");
        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev, Event::default());
        assert!(p.bytes().is_empty());
    }

    #[test]
    fn unterminated_line_stays_buffered() {
        let mut p = Parser::from("data: partial");
        assert!(p.next().is_none());
        assert_eq!(p.bytes(), b"data: partial");
    }

    #[test]
    fn parse_push_then_anonymous_event() {
        let mut p = Parser::from("id: 1\nevent: push\ndata: hello\n\ndata: world\n\n");

        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.id, "1");
        assert_eq!(ev.name, "push");
        assert_eq!(ev.data, &b"hello"[..]);

        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.id, "");
        assert_eq!(ev.name, "");
        assert_eq!(ev.data, &b"world"[..]);

        assert!(p.next().is_none());
    }

    #[test]
    fn data_lines_are_concatenated_without_delimiter() {
        let mut p = Parser::from("data: {\"a\":\ndata: 1}\n\n");
        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.data, &b"{\"a\":1}"[..]);
    }

    #[test]
    fn last_id_and_name_win() {
        let mut p = Parser::from("id: 1\nevent: a\nid: 2\nevent: b\n\n");
        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.id, "2");
        assert_eq!(ev.name, "b");
        assert!(ev.data.is_empty());
    }

    #[test]
    fn blank_line_delivers_empty_event() {
        let mut p = Parser::from("\n\n");
        assert_eq!(p.next().expect("Event").expect("Parses"), Event::default());
        assert_eq!(p.next().expect("Event").expect("Parses"), Event::default());
        assert!(p.next().is_none());
    }

    #[test]
    fn colon_as_last_char_in_row() {
        let mut p = Parser::from("id:\nevent:\ndata:\n\n");
        let ev = p.next().expect("Expected an event").expect("Should parse");
        assert_eq!(ev, Event::default());
    }

    #[test]
    fn strict_skips_exactly_one_separator() {
        let mut p = Parser::from("data:xyz\ndata:  two\n\n");
        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.data, &b"yz two"[..]);
    }

    #[test]
    fn garbage_line_is_a_violation() {
        let mut p = Parser::from("data: kept\ngarbage\ndata: never\n\n");
        match p.next() {
            Some(Err(Error::Violation(line))) => assert_eq!(line, &b"garbage"[..]),
            other => panic!("expected violation, got {:?}", other),
        }
    }

    #[test]
    fn strict_rejects_comments_and_retry() {
        let mut p = Parser::from(": keep-alive\n");
        assert!(matches!(p.next(), Some(Err(Error::Violation(_)))));

        let mut p = Parser::from("retry: 1000\n");
        assert!(matches!(p.next(), Some(Err(Error::Violation(_)))));
    }

    #[test]
    fn lenient_skips_comments_and_retry() {
        let mut p = lenient(": keep-alive\nretry: 1000\ndata: ok\n\n");
        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.data, &b"ok"[..]);
        assert!(p.next().is_none());
    }

    #[test]
    fn lenient_only_drops_a_space() {
        let mut p = lenient("data:test\n\ndata: test\n\n");
        assert_eq!(p.next().expect("Event").expect("Parses").data, &b"test"[..]);
        assert_eq!(p.next().expect("Event").expect("Parses").data, &b"test"[..]);
    }

    #[test]
    fn lenient_still_rejects_unknown_fields() {
        let mut p = lenient("foo: bar\n");
        assert!(matches!(p.next(), Some(Err(Error::Violation(_)))));
    }

    #[test]
    fn invalid_utf8_in_id() {
        let mut p = Parser::new(Grammar::Strict, DEFAULT_MAX_LINE_LEN);
        p.put(&b"id: \xff\xfe\n\n"[..]);
        assert!(matches!(p.next(), Some(Err(Error::Utf8 { .. }))));
    }

    #[test]
    fn data_keeps_raw_bytes() {
        let mut p = Parser::new(Grammar::Strict, DEFAULT_MAX_LINE_LEN);
        p.put(&b"data: \xff\n\n"[..]);
        let ev = p.next().expect("Event").expect("Parses");
        assert_eq!(ev.data, &b"\xff"[..]);
    }

    #[test]
    fn fed_one_byte_at_a_time() {
        let input = b"id: 7\ndata: a\ndata: b\n\n";
        let mut p = Parser::new(Grammar::Strict, DEFAULT_MAX_LINE_LEN);
        let mut events = Vec::new();
        for b in input.iter() {
            p.put(&[*b][..]);
            while let Some(ev) = p.next() {
                events.push(ev.expect("Parses"));
            }
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "7");
        assert_eq!(events[0].data, &b"ab"[..]);
    }

    #[test]
    fn finish_discards_partial_event() {
        let mut p = Parser::from("data: one\n\ndata: two\n");
        assert!(p.next().expect("Event").is_ok());
        assert!(p.next().is_none());
        assert!(p.finish().is_ok());
        assert!(p.next().is_none());
    }

    #[test]
    fn finish_checks_unterminated_tail() {
        let mut p = Parser::from("data: one\ngarbage");
        assert!(p.next().is_none());
        assert!(matches!(p.finish(), Err(Error::Violation(_))));

        let mut p = Parser::from("data: one\ndata: two");
        assert!(p.next().is_none());
        assert!(p.finish().is_ok());
    }

    #[test]
    fn lone_cr_at_end_is_a_blank_tail() {
        let mut p = Parser::from("data: a\n\ndata: b\n\r");
        assert_eq!(p.next().expect("Event").expect("Parses").data, &b"a"[..]);
        assert!(p.next().is_none());
        assert!(p.finish().is_ok());
        assert!(p.next().is_none());
    }

    #[test]
    fn line_too_long() {
        let mut p = Parser::new(Grammar::Strict, 8);
        p.put(&b"data: 0123456789"[..]);
        assert!(matches!(p.next(), Some(Err(Error::LineTooLong(8)))));

        let mut p = Parser::new(Grammar::Strict, 8);
        p.put(&b"data: 0123456789\n\n"[..]);
        assert!(matches!(p.next(), Some(Err(Error::LineTooLong(8)))));
    }

    #[test]
    fn test_memchr_finds_lf_after_cr() {
        let bs = &b"abcd\r\n"[..];
        assert_eq!(memchr(LF, bs), Some(5));
        assert_eq!(strip_cr(Bytes::from_static(b"abcd\r")), &b"abcd"[..]);
    }
}
