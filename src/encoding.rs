//! Forward traversal of a byte buffer in logical text units.
//!
//! A unit is one byte for single-byte ("ANSI") text and one decoded code point
//! for UTF-8 text. Whatever the unit width, every iterator reports the byte
//! offset of its position in the original buffer, so spans computed while
//! walking units can be handed straight back to a byte-addressed host buffer.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The encoding tag of a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// One byte per character, no decoding.
    Ansi,
    /// Variable-width UTF-8.
    #[default]
    #[serde(alias = "utf-8")]
    #[value(alias = "utf-8")]
    Utf8,
}

impl Encoding {
    /// Creates an iterator over `text[start..end]` for this encoding.
    ///
    /// `end` is clamped to the buffer length and `start` to `end`.
    pub fn iter<'a>(self, text: &'a [u8], start: usize, end: usize) -> Box<dyn EncodingIterator + 'a> {
        match self {
            Encoding::Ansi => Box::new(AnsiIterator::new(text, start, end)),
            Encoding::Utf8 => Box::new(Utf8Iterator::new(text, start, end)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Ansi => "ANSI",
            Encoding::Utf8 => "UTF-8",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One logical unit of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// The byte value (ANSI) or Unicode scalar value (UTF-8).
    pub value: u32,
    /// Byte offset of the unit's first byte.
    pub offset: usize,
    /// Number of bytes the unit occupies.
    pub len: usize,
}

impl Unit {
    /// Byte offset just past this unit.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// The unit as a `char`. ANSI bytes map to the Latin-1 code point of the same value.
    pub fn as_char(&self) -> Option<char> {
        char::from_u32(self.value)
    }
}

/// Uniform forward traversal over encoded text.
pub trait EncodingIterator {
    /// Byte offset of the next unit to be read (or the end bound once exhausted).
    fn position(&self) -> usize;

    /// Decodes the unit at the current position and moves past it.
    ///
    /// Returns `Ok(None)` at the end bound. On a decode error the position is
    /// left unchanged.
    fn next_unit(&mut self) -> Result<Option<Unit>>;

    /// Skips one unit. Returns `false` if the iterator was already exhausted.
    fn advance(&mut self) -> Result<bool> {
        Ok(self.next_unit()?.is_some())
    }
}

/// Single-byte iterator: the logical position is the byte offset.
#[derive(Debug, Clone)]
pub struct AnsiIterator<'a> {
    text: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> AnsiIterator<'a> {
    pub fn new(text: &'a [u8], start: usize, end: usize) -> Self {
        let end = end.min(text.len());
        Self {
            text,
            pos: start.min(end),
            end,
        }
    }
}

impl EncodingIterator for AnsiIterator<'_> {
    fn position(&self) -> usize {
        self.pos
    }

    fn next_unit(&mut self) -> Result<Option<Unit>> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let unit = Unit {
            value: self.text[self.pos] as u32,
            offset: self.pos,
            len: 1,
        };
        self.pos += 1;
        Ok(Some(unit))
    }
}

impl Iterator for AnsiIterator<'_> {
    type Item = Result<Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit().transpose()
    }
}

/// UTF-8 iterator: each unit is one code point, positions stay on code point boundaries.
#[derive(Debug, Clone)]
pub struct Utf8Iterator<'a> {
    text: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Utf8Iterator<'a> {
    /// Creates an iterator over `text[start..end]`.
    ///
    /// `start` must be a code point boundary; a continuation byte there is
    /// reported as malformed by the first call to `next_unit`.
    pub fn new(text: &'a [u8], start: usize, end: usize) -> Self {
        let end = end.min(text.len());
        Self {
            text,
            pos: start.min(end),
            end,
        }
    }

    fn malformed(&self) -> Error {
        Error::Encoding {
            encoding: Encoding::Utf8.name(),
            offset: self.pos,
        }
    }
}

impl EncodingIterator for Utf8Iterator<'_> {
    fn position(&self) -> usize {
        self.pos
    }

    fn next_unit(&mut self) -> Result<Option<Unit>> {
        if self.pos >= self.end {
            return Ok(None);
        }
        let lead = self.text[self.pos];
        let (len, init, min) = match lead {
            0x00..=0x7F => {
                let unit = Unit {
                    value: lead as u32,
                    offset: self.pos,
                    len: 1,
                };
                self.pos += 1;
                return Ok(Some(unit));
            }
            0xC2..=0xDF => (2, (lead & 0x1F) as u32, 0x80),
            0xE0..=0xEF => (3, (lead & 0x0F) as u32, 0x800),
            0xF0..=0xF4 => (4, (lead & 0x07) as u32, 0x1_0000),
            _ => return Err(self.malformed()),
        };

        // Never decode past the declared end, even if the buffer continues.
        if self.end - self.pos < len {
            return Err(self.malformed());
        }

        let mut value = init;
        for &byte in &self.text[self.pos + 1..self.pos + len] {
            if byte & 0xC0 != 0x80 {
                return Err(self.malformed());
            }
            value = (value << 6) | (byte & 0x3F) as u32;
        }
        if value < min || value > 0x10_FFFF || (0xD800..=0xDFFF).contains(&value) {
            return Err(self.malformed());
        }

        let unit = Unit {
            value,
            offset: self.pos,
            len,
        };
        self.pos += len;
        Ok(Some(unit))
    }
}

impl Iterator for Utf8Iterator<'_> {
    type Item = Result<Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_unit().transpose()
    }
}

/// Walks the whole buffer once, failing at the first malformed sequence.
pub fn validate(text: &[u8], encoding: Encoding) -> Result<()> {
    let mut iter = encoding.iter(text, 0, text.len());
    while iter.advance()? {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(encoding: Encoding, text: &[u8]) -> Result<Vec<Unit>> {
        let mut iter = encoding.iter(text, 0, text.len());
        let mut units = Vec::new();
        while let Some(unit) = iter.next_unit()? {
            units.push(unit);
        }
        Ok(units)
    }

    #[test]
    fn test_ansi_units_are_bytes() {
        let units = collect(Encoding::Ansi, b"a\xE9b").unwrap();
        let offsets: Vec<usize> = units.iter().map(|u| u.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(units[1].as_char(), Some('é'));
    }

    #[test]
    fn test_utf8_offsets_track_bytes_not_units() {
        let text = "aé€😀b".as_bytes();
        let mut iter = Utf8Iterator::new(text, 0, text.len());
        let mut offsets = Vec::new();
        while let Some(unit) = iter.next_unit().unwrap() {
            offsets.push((unit.offset, unit.as_char().unwrap()));
        }
        assert_eq!(offsets, vec![(0, 'a'), (1, 'é'), (3, '€'), (6, '😀'), (10, 'b')]);
        assert_eq!(iter.position(), text.len());
    }

    #[test]
    fn test_utf8_respects_end_bound() {
        // The 3-byte euro sign straddles the declared end.
        let text = "a€".as_bytes();
        let mut iter = Utf8Iterator::new(text, 0, 2);
        assert!(iter.advance().unwrap());
        let err = iter.next_unit().unwrap_err();
        assert!(matches!(err, Error::Encoding { offset: 1, .. }));
        assert_eq!(iter.position(), 1);
    }

    #[test]
    fn test_utf8_rejects_malformed_sequences() {
        for bad in [
            &b"ab\x80"[..],         // stray continuation byte
            &b"\xC0\xAF"[..],       // overlong
            &b"\xED\xA0\x80"[..],   // surrogate
            &b"\xF4\x90\x80\x80"[..], // above U+10FFFF
            &b"\xE2\x28\xA1"[..],   // bad continuation
        ] {
            assert!(
                matches!(validate(bad, Encoding::Utf8), Err(Error::Encoding { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_ansi_never_fails() {
        validate(b"\x80\xFF\x00", Encoding::Ansi).unwrap();
    }

    #[test]
    fn test_start_is_clamped() {
        let mut iter = Encoding::Utf8.iter(b"abc", 10, 2);
        assert_eq!(iter.position(), 2);
        assert!(!iter.advance().unwrap());
    }

    #[test]
    fn test_std_iterator_impl() {
        let values: Vec<u32> = AnsiIterator::new(b"xyz", 1, 3)
            .map(|u| u.unwrap().value)
            .collect();
        assert_eq!(values, vec![b'y' as u32, b'z' as u32]);
    }
}
