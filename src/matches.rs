//! Backend-agnostic view of one match occurrence.
//!
//! Replace logic is written once against the [`Match`] trait. Each encoding
//! has its own implementation wrapping the captures of the regex engine that
//! serves it; both report group spans as byte offsets into the original buffer.

use crate::encoding::Encoding;
use crate::errors::{Error, Result};
use crate::pattern::group_index;
use crate::template::Template;
use std::collections::BTreeMap;
use std::ops::Range;

/// Sentinel offset carried by groups that did not participate in a match.
pub const UNMATCHED: usize = usize::MAX;

/// The span of one capture group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDetail {
    /// Byte offset of the first byte of the group, or [`UNMATCHED`].
    pub start: usize,
    /// Byte offset just past the group, or [`UNMATCHED`].
    pub end: usize,
    /// `false` for an optional group that took no part in the match.
    pub matched: bool,
}

impl GroupDetail {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            matched: true,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            start: UNMATCHED,
            end: UNMATCHED,
            matched: false,
        }
    }

    pub fn span(&self) -> Option<Range<usize>> {
        self.matched.then(|| self.start..self.end)
    }

    fn from_span(span: Option<(usize, usize)>) -> Self {
        match span {
            Some((start, end)) => Self::new(start, end),
            None => Self::unmatched(),
        }
    }
}

/// One match occurrence.
///
/// A `Match` borrows the text and the engine state of a single iteration
/// step and cannot be kept past it.
pub trait Match {
    /// The original, undecoded text buffer.
    fn text(&self) -> &[u8];

    /// Encoding of the text; template literals are written in it.
    fn encoding(&self) -> Encoding;

    /// Number of groups, including group 0.
    fn group_count(&self) -> usize;

    /// Name of the group at `index`, if it is a named group.
    fn group_name(&self, index: usize) -> Option<&str>;

    /// The group at `index`; group 0 is the whole match.
    fn group(&self, index: usize) -> Result<GroupDetail>;

    /// Index of the named group, or `None` if the pattern defines no such name.
    fn group_index_from_name(&self, name: &str) -> Option<usize>;

    /// The named group. An unknown name is `GroupNotFound`; a known name that
    /// did not participate yields an unmatched detail.
    fn group_by_name(&self, name: &str) -> Result<GroupDetail> {
        let index = self
            .group_index_from_name(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))?;
        self.group(index)
    }

    /// The bytes of the original buffer covered by `group`; empty if unmatched.
    fn text_for_group(&self, group: &GroupDetail) -> &[u8] {
        match group.span() {
            Some(span) => &self.text()[span],
            None => &[],
        }
    }

    /// Expands a replacement template against this match into a new buffer.
    ///
    /// The returned buffer's length is authoritative; it may contain NUL bytes.
    fn expand(&self, template: &str) -> Result<Vec<u8>> {
        Template::parse_for(template, self.encoding())?.expand(self)
    }

    fn start(&self, index: usize) -> Result<Option<usize>> {
        Ok(self.group(index)?.span().map(|s| s.start))
    }

    fn end(&self, index: usize) -> Result<Option<usize>> {
        Ok(self.group(index)?.span().map(|s| s.end))
    }

    fn span(&self, index: usize) -> Result<Option<Range<usize>>> {
        Ok(self.group(index)?.span())
    }

    fn start_by_name(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.group_by_name(name)?.span().map(|s| s.start))
    }

    fn end_by_name(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.group_by_name(name)?.span().map(|s| s.end))
    }

    fn span_by_name(&self, name: &str) -> Result<Option<Range<usize>>> {
        Ok(self.group_by_name(name)?.span())
    }

    /// Text of the group at `index`, `None` if it did not participate.
    fn group_text(&self, index: usize) -> Result<Option<&[u8]>> {
        let group = self.group(index)?;
        Ok(group.matched.then(|| self.text_for_group(&group)))
    }

    /// Text of every group from 1 upwards.
    fn groups(&self) -> Vec<Option<&[u8]>> {
        (1..self.group_count())
            .map(|i| self.group_text(i).ok().flatten())
            .collect()
    }

    /// Text of every named group, keyed by name.
    fn group_dict(&self) -> BTreeMap<&str, Option<&[u8]>> {
        (1..self.group_count())
            .filter_map(|i| {
                let name = self.group_name(i)?;
                Some((name, self.group_text(i).ok().flatten()))
            })
            .collect()
    }
}

/// A match from the byte engine over single-byte text.
pub struct AnsiMatch<'r, 't> {
    text: &'t [u8],
    regex: &'r regex::bytes::Regex,
    captures: regex::bytes::Captures<'t>,
}

impl<'r, 't> AnsiMatch<'r, 't> {
    pub fn new(text: &'t [u8], regex: &'r regex::bytes::Regex, captures: regex::bytes::Captures<'t>) -> Self {
        Self {
            text,
            regex,
            captures,
        }
    }
}

impl Match for AnsiMatch<'_, '_> {
    fn text(&self) -> &[u8] {
        self.text
    }

    fn encoding(&self) -> Encoding {
        Encoding::Ansi
    }

    fn group_count(&self) -> usize {
        self.captures.len()
    }

    fn group_name(&self, index: usize) -> Option<&str> {
        self.regex.capture_names().nth(index).flatten()
    }

    fn group(&self, index: usize) -> Result<GroupDetail> {
        if index >= self.captures.len() {
            return Err(Error::GroupNotFound(index.to_string()));
        }
        Ok(GroupDetail::from_span(
            self.captures.get(index).map(|m| (m.start(), m.end())),
        ))
    }

    fn group_index_from_name(&self, name: &str) -> Option<usize> {
        group_index(self.regex.capture_names(), name)
    }
}

/// A match from the Unicode engine over UTF-8 text.
///
/// The engine searches a `&str` view of the same bytes, so its offsets are
/// already byte offsets into the original buffer.
pub struct Utf8Match<'r, 't> {
    text: &'t [u8],
    regex: &'r regex::Regex,
    captures: regex::Captures<'t>,
}

impl<'r, 't> Utf8Match<'r, 't> {
    pub fn new(text: &'t [u8], regex: &'r regex::Regex, captures: regex::Captures<'t>) -> Self {
        Self {
            text,
            regex,
            captures,
        }
    }
}

impl Match for Utf8Match<'_, '_> {
    fn text(&self) -> &[u8] {
        self.text
    }

    fn encoding(&self) -> Encoding {
        Encoding::Utf8
    }

    fn group_count(&self) -> usize {
        self.captures.len()
    }

    fn group_name(&self, index: usize) -> Option<&str> {
        self.regex.capture_names().nth(index).flatten()
    }

    fn group(&self, index: usize) -> Result<GroupDetail> {
        if index >= self.captures.len() {
            return Err(Error::GroupNotFound(index.to_string()));
        }
        Ok(GroupDetail::from_span(
            self.captures.get(index).map(|m| (m.start(), m.end())),
        ))
    }

    fn group_index_from_name(&self, name: &str) -> Option<usize> {
        group_index(self.regex.capture_names(), name)
    }
}
