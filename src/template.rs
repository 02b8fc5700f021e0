//! Replacement template language.
//!
//! | Syntax                  | Expands to                          |
//! |-------------------------|-------------------------------------|
//! | `\N`, `$N`              | group N (all following digits)      |
//! | `\g<N>`, `${N}`         | group N                             |
//! | `\g<name>`, `${name}`   | the named group                     |
//! | `$&`                    | the whole match                     |
//! | `\\`, `$$`              | a literal `\` or `$`                |
//! | `\n`, `\r`, `\t`        | newline, carriage return, tab       |
//! | `\` + any other char    | that char                           |
//!
//! A `$` not followed by a reference, and a trailing lone `\`, are literal.
//! Groups that did not participate expand to nothing; references to groups
//! the pattern does not define are an `ExpansionError`.

use crate::encoding::Encoding;
use crate::errors::{Error, Result};
use crate::matches::Match;
use crate::pattern::Pattern;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(Vec<u8>),
    Index(usize),
    Name(String),
}

/// A parsed replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    /// Parses a template whose literal text is inserted as UTF-8.
    pub fn parse(template: &str) -> Result<Self> {
        Self::parse_for(template, Encoding::Utf8)
    }

    /// Parses a template for insertion into text of `encoding`.
    ///
    /// For single-byte text, literal characters up to U+00FF are stored as the
    /// Latin-1 byte of the same value; anything wider is an error.
    pub fn parse_for(template: &str, encoding: Encoding) -> Result<Self> {
        let mut parser = Parser {
            chars: template.char_indices().peekable(),
            source: template,
            encoding,
            literal: Vec::new(),
            pieces: Vec::new(),
        };
        parser.run()?;
        Ok(Self {
            pieces: parser.pieces,
        })
    }

    /// `true` if the template contains no group references.
    pub fn is_literal(&self) -> bool {
        self.pieces.iter().all(|p| matches!(p, Piece::Literal(_)))
    }

    /// Checks every reference against the groups `pattern` defines.
    pub fn validate_against(&self, pattern: &Pattern) -> Result<()> {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(_) => {}
                Piece::Index(index) if *index >= pattern.group_count() => {
                    return Err(undefined_index(*index));
                }
                Piece::Index(_) => {}
                Piece::Name(name) => {
                    pattern.group_index(name).ok_or_else(|| undefined_name(name))?;
                }
            }
        }
        Ok(())
    }

    /// Expands the template against one match into a newly owned buffer.
    pub fn expand<M: Match + ?Sized>(&self, m: &M) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for piece in &self.pieces {
            let index = match piece {
                Piece::Literal(bytes) => {
                    out.extend_from_slice(bytes);
                    continue;
                }
                Piece::Index(index) => *index,
                Piece::Name(name) => m.group_index_from_name(name).ok_or_else(|| undefined_name(name))?,
            };
            if index >= m.group_count() {
                return Err(undefined_index(index));
            }
            let group = m.group(index)?;
            out.extend_from_slice(m.text_for_group(&group));
        }
        Ok(out)
    }
}

fn undefined_index(index: usize) -> Error {
    Error::Expansion(format!("reference to undefined group {index}"))
}

fn undefined_name(name: &str) -> Error {
    Error::Expansion(format!("reference to undefined group name '{name}'"))
}

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
    source: &'a str,
    encoding: Encoding,
    literal: Vec<u8>,
    pieces: Vec<Piece>,
}

impl Parser<'_> {
    fn run(&mut self) -> Result<()> {
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => self.backslash()?,
                '$' => self.dollar()?,
                c => self.push_char(c)?,
            }
        }
        self.flush();
        Ok(())
    }

    fn backslash(&mut self) -> Result<()> {
        let Some(&(_, next)) = self.chars.peek() else {
            return self.push_char('\\');
        };
        match next {
            '0'..='9' => {
                let index = self.digits()?;
                self.reference(Piece::Index(index));
            }
            'g' => {
                self.chars.next();
                if self.eat('<') {
                    let piece = self.bracketed('>')?;
                    self.reference(piece);
                } else {
                    self.push_char('g')?;
                }
            }
            'n' | 'r' | 't' => {
                self.chars.next();
                let escaped = match next {
                    'n' => '\n',
                    'r' => '\r',
                    _ => '\t',
                };
                self.push_char(escaped)?;
            }
            other => {
                self.chars.next();
                self.push_char(other)?;
            }
        }
        Ok(())
    }

    fn dollar(&mut self) -> Result<()> {
        match self.chars.peek().map(|&(_, c)| c) {
            Some('$') => {
                self.chars.next();
                self.push_char('$')
            }
            Some('&') => {
                self.chars.next();
                self.reference(Piece::Index(0));
                Ok(())
            }
            Some('0'..='9') => {
                let index = self.digits()?;
                self.reference(Piece::Index(index));
                Ok(())
            }
            Some('{') => {
                self.chars.next();
                let piece = self.bracketed('}')?;
                self.reference(piece);
                Ok(())
            }
            _ => self.push_char('$'),
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn digits(&mut self) -> Result<usize> {
        let mut digits = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.chars.next();
        }
        digits
            .parse()
            .map_err(|_| Error::Expansion(format!("group number {digits} is out of range")))
    }

    /// Reads a group name or number up to `close`, the opening bracket already consumed.
    fn bracketed(&mut self, close: char) -> Result<Piece> {
        let start = match self.chars.peek() {
            Some(&(i, _)) => i,
            None => self.source.len(),
        };
        let end = loop {
            match self.chars.next() {
                Some((i, c)) if c == close => break i,
                Some(_) => {}
                None => {
                    return Err(Error::Expansion(format!(
                        "unterminated group reference in '{}'",
                        self.source
                    )));
                }
            }
        };
        let name = &self.source[start..end];
        if name.is_empty() {
            return Err(Error::Expansion("empty group reference".to_string()));
        }
        if name.bytes().all(|b| b.is_ascii_digit()) {
            let index = name
                .parse()
                .map_err(|_| Error::Expansion(format!("group number {name} is out of range")))?;
            return Ok(Piece::Index(index));
        }
        Ok(Piece::Name(name.to_string()))
    }

    fn push_char(&mut self, c: char) -> Result<()> {
        match self.encoding {
            Encoding::Utf8 => {
                let mut buf = [0u8; 4];
                self.literal.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Encoding::Ansi => {
                let byte = u8::try_from(u32::from(c)).map_err(|_| {
                    Error::Expansion(format!("{c:?} cannot be written to single-byte text"))
                })?;
                self.literal.push(byte);
            }
        }
        Ok(())
    }

    fn reference(&mut self, piece: Piece) {
        self.flush();
        self.pieces.push(piece);
    }

    fn flush(&mut self) {
        if !self.literal.is_empty() {
            self.pieces.push(Piece::Literal(std::mem::take(&mut self.literal)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::Utf8Match;
    use crate::pattern::Flags;

    fn expand(pattern: &str, text: &str, template: &str) -> Result<Vec<u8>> {
        let regex = regex::Regex::new(pattern).unwrap();
        let captures = regex.captures(text).unwrap();
        let m = Utf8Match::new(text.as_bytes(), &regex, captures);
        Template::parse(template)?.expand(&m)
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(expand(r"(\w+)@(\w+)", "user@host", r"\2@\1").unwrap(), b"host@user");
        assert_eq!(expand(r"(\w+)@(\w+)", "user@host", "$2@$1").unwrap(), b"host@user");
        assert_eq!(expand(r"(\w+)@(\w+)", "user@host", "[$&]").unwrap(), b"[user@host]");
        assert_eq!(expand(r"(\w+)@(\w+)", "user@host", r"\g<2>-${1}0").unwrap(), b"host-user0");
    }

    #[test]
    fn test_named_references() {
        let pattern = r"(?P<user>\w+)@(?P<host>\w+)";
        assert_eq!(expand(pattern, "user@host", r"\g<host>.${user}").unwrap(), b"host.user");
    }

    #[test]
    fn test_escapes_and_literals() {
        assert_eq!(expand("x", "x", r"a\\b$$c\$d").unwrap(), br"a\b$c$d");
        assert_eq!(expand("x", "x", r"1\n2\t3\r").unwrap(), b"1\n2\t3\r");
        assert_eq!(expand("x", "x", r"cost: $ 5 \").unwrap(), br"cost: $ 5 \");
        assert_eq!(expand("x", "x", r"\gx").unwrap(), b"gx");
    }

    #[test]
    fn test_embedded_nul_is_kept() {
        let out = expand("(x)", "x", "a\0$1").unwrap();
        assert_eq!(out, b"a\0x");
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_unmatched_group_expands_empty() {
        assert_eq!(expand(r"a(x)?b", "ab", "<$1>").unwrap(), b"<>");
    }

    #[test]
    fn test_undefined_references_fail() {
        assert!(matches!(expand(r"(\w+)", "abc", r"\2"), Err(Error::Expansion(_))));
        assert!(matches!(expand(r"(\w+)", "abc", "${nope}"), Err(Error::Expansion(_))));
        assert!(matches!(Template::parse(r"\g<open"), Err(Error::Expansion(_))));
        assert!(matches!(Template::parse("${}"), Err(Error::Expansion(_))));
    }

    #[test]
    fn test_validate_against_pattern() {
        let pattern = Pattern::compile(r"(?P<k>\w+)=(\w+)", Flags::NORMAL, Encoding::Utf8).unwrap();
        Template::parse(r"\2=${k}").unwrap().validate_against(&pattern).unwrap();
        assert!(Template::parse(r"\3").unwrap().validate_against(&pattern).is_err());
        assert!(Template::parse(r"\g<v>").unwrap().validate_against(&pattern).is_err());
    }

    #[test]
    fn test_ansi_literals_are_latin1() {
        let template = Template::parse_for("caf\u{e9}", Encoding::Ansi).unwrap();
        assert!(template.is_literal());
        assert_eq!(template.pieces, vec![Piece::Literal(b"caf\xE9".to_vec())]);
        assert!(Template::parse_for("\u{20ac}", Encoding::Ansi).is_err());
    }
}
