use crate::encoding::Encoding;
use crate::errors::{Error, Result};
use crate::matches::Match;
use crate::pattern::{Flags, Pattern};
use crate::search::{CancelFlag, Flow, SearchStatus, Searcher};
use crate::template::Template;
use std::ops::Range;

/// One edit: delete `start..end` from the original buffer and insert `replacement`.
///
/// Offsets are byte offsets into the unmodified text the entry was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceEntry {
    pub start: usize,
    pub end: usize,
    pub replacement: Vec<u8>,
}

impl ReplaceEntry {
    pub fn new(start: usize, end: usize, replacement: impl Into<Vec<u8>>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }

    /// Length of the replacement text in bytes.
    pub fn len(&self) -> usize {
        self.replacement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacement.is_empty()
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// The result of a replace pass that compiled and ran to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// At least one match; the entries are ordered and non-overlapping.
    Replaced(Vec<ReplaceEntry>),
    /// The pattern matched nowhere.
    NoMatches,
    /// The cancel flag was raised; the entries found so far are still valid edits.
    Cancelled(Vec<ReplaceEntry>),
}

impl ReplaceOutcome {
    pub fn entries(&self) -> &[ReplaceEntry] {
        match self {
            ReplaceOutcome::Replaced(entries) | ReplaceOutcome::Cancelled(entries) => entries,
            ReplaceOutcome::NoMatches => &[],
        }
    }

    pub fn into_entries(self) -> Vec<ReplaceEntry> {
        match self {
            ReplaceOutcome::Replaced(entries) | ReplaceOutcome::Cancelled(entries) => entries,
            ReplaceOutcome::NoMatches => Vec::new(),
        }
    }
}

/// Turns every match of a pattern into a [`ReplaceEntry`].
///
/// The default conversion deletes the whole match and inserts the expanded
/// replacement template. [`Replacer::replace_with`] takes any closure
/// instead, so a caller can build replacement text from the match plus
/// whatever state the closure captures.
#[derive(Debug, Clone)]
pub struct Replacer {
    searcher: Searcher,
}

impl Replacer {
    pub fn new(encoding: Encoding, flags: Flags) -> Self {
        Self {
            searcher: Searcher::new(encoding, flags),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.searcher = self.searcher.with_cancel(cancel);
        self
    }

    /// Replaces every match of `pattern` in `text` with the expansion of `template`.
    pub fn replace(&self, text: &[u8], pattern: &str, template: &str) -> Result<ReplaceOutcome> {
        let pattern = self.searcher.compile(pattern)?;
        let template = Template::parse_for(template, pattern.encoding())?;
        self.replace_compiled(text, &pattern, |_, m| expand_match(m, &template))
    }

    /// Runs a replace pass with a custom conversion function.
    ///
    /// Errors returned by `converter` abort the pass and are propagated.
    pub fn replace_with<F>(&self, text: &[u8], pattern: &str, converter: F) -> Result<ReplaceOutcome>
    where
        F: FnMut(&[u8], &dyn Match) -> Result<ReplaceEntry>,
    {
        let pattern = self.searcher.compile(pattern)?;
        self.replace_compiled(text, &pattern, converter)
    }

    /// Runs a replace pass with an already compiled pattern.
    pub fn replace_compiled<F>(&self, text: &[u8], pattern: &Pattern, mut converter: F) -> Result<ReplaceOutcome>
    where
        F: FnMut(&[u8], &dyn Match) -> Result<ReplaceEntry>,
    {
        let mut entries: Vec<ReplaceEntry> = Vec::new();
        let mut previous_end = 0;

        let outcome = self.searcher.for_each_compiled(text, pattern, |m| {
            let entry = converter(text, m)?;
            if entry.start < previous_end || entry.end < entry.start || entry.end > text.len() {
                return Err(Error::EntryOrder {
                    start: entry.start,
                    end: entry.end,
                    previous_end,
                });
            }
            previous_end = entry.end;
            entries.push(entry);
            Ok(Flow::Continue)
        })?;

        Ok(match outcome.status {
            SearchStatus::NoMatches => ReplaceOutcome::NoMatches,
            SearchStatus::Cancelled => ReplaceOutcome::Cancelled(entries),
            SearchStatus::Completed | SearchStatus::Stopped => ReplaceOutcome::Replaced(entries),
        })
    }
}

/// The default conversion: the whole match becomes the deletion span and
/// the expanded template the insertion.
pub fn expand_match(m: &dyn Match, template: &Template) -> Result<ReplaceEntry> {
    let whole = m.group(0)?;
    let replacement = template.expand(m)?;
    Ok(ReplaceEntry::new(whole.start, whole.end, replacement))
}

/// Applies ordered entries to `text` in one left-to-right splice.
pub fn apply_entries(text: &[u8], entries: &[ReplaceEntry]) -> Vec<u8> {
    if entries.is_empty() {
        return text.to_vec();
    }

    let grown: usize = entries.iter().map(ReplaceEntry::len).sum();
    let mut out = Vec::with_capacity(text.len() + grown);
    let mut cursor = 0;
    for entry in entries {
        out.extend_from_slice(&text[cursor..entry.start]);
        out.extend_from_slice(&entry.replacement);
        cursor = entry.end;
    }
    out.extend_from_slice(&text[cursor..]);
    out
}

/// Applies ordered entries to a live buffer, last entry first, so earlier
/// offsets stay valid while later spans change length.
pub fn apply_entries_in_place(buffer: &mut Vec<u8>, entries: &[ReplaceEntry]) {
    for entry in entries.iter().rev() {
        buffer.splice(entry.span(), entry.replacement.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::GroupDetail;

    fn replace(text: &str, pattern: &str, template: &str) -> String {
        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(text.as_bytes(), pattern, template)
            .unwrap();
        String::from_utf8(apply_entries(text.as_bytes(), outcome.entries())).unwrap()
    }

    /// Straightforward reference: rebuild the string piece by piece with an offset shift.
    fn splice_with_shift(text: &str, entries: &[ReplaceEntry]) -> String {
        let mut out = text.to_string();
        let mut shift: isize = 0;
        for entry in entries {
            let start = (entry.start as isize + shift) as usize;
            let end = (entry.end as isize + shift) as usize;
            let replacement = String::from_utf8(entry.replacement.clone()).unwrap();
            out.replace_range(start..end, &replacement);
            shift += entry.len() as isize - (entry.end - entry.start) as isize;
        }
        out
    }

    #[test]
    fn test_simple_replace() {
        assert_eq!(replace("banana", "a", "b"), "bbnbnb");
    }

    #[test]
    fn test_group_swap() {
        assert_eq!(replace("user@host", r"(\w+)@(\w+)", r"\2@\1"), "host@user");
        assert_eq!(replace("a@b, c@d", r"(?P<l>\w+)@(?P<r>\w+)", "${r}@${l}"), "b@a, d@c");
    }

    #[test]
    fn test_zero_width_pattern_terminates() {
        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"abc", r"\b", "|")
            .unwrap();
        assert_eq!(outcome.entries().len(), 2);
        assert_eq!(apply_entries(b"abc", outcome.entries()), b"|abc|");

        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"abc", "", "-")
            .unwrap();
        assert!(outcome.entries().len() <= 4);
        assert_eq!(apply_entries(b"abc", outcome.entries()), b"-a-b-c-");
    }

    #[test]
    fn test_empty_match_after_non_empty_match() {
        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"baaa", "a*", "-")
            .unwrap();
        let spans: Vec<_> = outcome.entries().iter().map(ReplaceEntry::span).collect();
        assert_eq!(spans, vec![0..0, 1..4, 4..4]);
        assert_eq!(apply_entries(b"baaa", outcome.entries()), b"-b--");
    }

    #[test]
    fn test_matches_reference_splice() {
        for (text, pattern, template) in [
            ("banana", "a", "b"),
            ("user@host", r"(\w+)@(\w+)", r"\2@\1"),
            ("the cat sat", r"\w+", "<$&>"),
            ("aaa", "a", ""),
            ("x1y22z333", r"\d+", "#"),
            ("abc", "", "-"),
            ("baaa", "a*", "-"),
        ] {
            let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
                .replace(text.as_bytes(), pattern, template)
                .unwrap();
            let entries = outcome.entries();
            assert!(entries.windows(2).all(|w| w[0].end <= w[1].start));

            let spliced = String::from_utf8(apply_entries(text.as_bytes(), entries)).unwrap();
            assert_eq!(spliced, splice_with_shift(text, entries), "{pattern} on {text}");

            let mut live = text.as_bytes().to_vec();
            apply_entries_in_place(&mut live, entries);
            assert_eq!(live, spliced.as_bytes());
        }
    }

    #[test]
    fn test_no_matches_outcome() {
        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"banana", "z", "y")
            .unwrap();
        assert_eq!(outcome, ReplaceOutcome::NoMatches);
        assert!(outcome.entries().is_empty());
    }

    #[test]
    fn test_compile_error_outcome() {
        let err = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"banana", "(a", "y")
            .unwrap_err();
        assert!(matches!(err, Error::PatternCompile(_)));
    }

    #[test]
    fn test_literal_and_ignorecase() {
        let outcome = Replacer::new(Encoding::Utf8, Flags::LITERAL)
            .replace(b"a.b and axb", "a.b", "X")
            .unwrap();
        assert_eq!(outcome.entries(), &[ReplaceEntry::new(0, 3, "X")]);

        let outcome = Replacer::new(Encoding::Ansi, Flags::IGNORECASE)
            .replace(b"xabcx", "ABC", "-")
            .unwrap();
        assert_eq!(outcome.entries(), &[ReplaceEntry::new(1, 4, "-")]);
    }

    #[test]
    fn test_literal_template_in_literal_mode() {
        // Template syntax still applies to the replacement in literal mode.
        let outcome = Replacer::new(Encoding::Utf8, Flags::LITERAL)
            .replace(b"1+1", "+", "[$&]")
            .unwrap();
        assert_eq!(apply_entries(b"1+1", outcome.entries()), b"1[+]1");
    }

    #[test]
    fn test_expansion_error_propagates() {
        let err = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"user@host", r"(\w+)@(\w+)", r"\3")
            .unwrap_err();
        assert!(matches!(err, Error::Expansion(_)));
    }

    #[test]
    fn test_custom_converter_with_state() {
        let mut counter = 0;
        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace_with(b"a-b-c", r"(?P<letter>\w)", |text, m| {
                counter += 1;
                let group: GroupDetail = m.group_by_name("letter")?;
                let mut replacement = text[group.start..group.end].to_ascii_uppercase();
                replacement.extend_from_slice(counter.to_string().as_bytes());
                Ok(ReplaceEntry::new(group.start, group.end, replacement))
            })
            .unwrap();
        assert_eq!(apply_entries(b"a-b-c", outcome.entries()), b"A1-B2-C3");
    }

    #[test]
    fn test_converter_errors_propagate() {
        let err = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace_with(b"abc", "b", |_, m| {
                m.group_by_name("missing")?;
                unreachable!()
            })
            .unwrap_err();
        assert!(matches!(err, Error::GroupNotFound(_)));
    }

    #[test]
    fn test_out_of_order_entries_are_rejected() {
        let err = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace_with(b"aaa", "a", |_, _| Ok(ReplaceEntry::new(0, 1, "x")))
            .unwrap_err();
        assert!(matches!(err, Error::EntryOrder { start: 0, previous_end: 1, .. }));
    }

    #[test]
    fn test_malformed_utf8_returns_no_partial_result() {
        let err = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(b"a\xC3(a", "a", "b")
            .unwrap_err();
        assert!(matches!(err, Error::Encoding { offset: 1, .. }));
    }

    #[test]
    fn test_ansi_offsets_and_latin1_template() {
        let text = b"na\xEFve na\xEFve";
        let outcome = Replacer::new(Encoding::Ansi, Flags::NORMAL)
            .replace(text, "\u{ef}", "i\u{e9}")
            .unwrap();
        assert_eq!(
            outcome.entries(),
            &[ReplaceEntry::new(2, 3, b"i\xE9".to_vec()), ReplaceEntry::new(8, 9, b"i\xE9".to_vec())]
        );
        assert_eq!(apply_entries(text, outcome.entries()), b"nai\xE9ve nai\xE9ve");
    }

    #[test]
    fn test_ansi_escaped_latin1_pattern() {
        let outcome = Replacer::new(Encoding::Ansi, Flags::NORMAL)
            .replace(b"caf\xE9", "caf\\\u{e9}", "X")
            .unwrap();
        assert_eq!(outcome, ReplaceOutcome::Replaced(vec![ReplaceEntry::new(0, 4, "X")]));
    }

    #[test]
    fn test_utf8_offsets_are_bytes() {
        let text = "größe größe".as_bytes();
        let outcome = Replacer::new(Encoding::Utf8, Flags::NORMAL)
            .replace(text, "ß", "ss")
            .unwrap();
        let spans: Vec<_> = outcome.entries().iter().map(ReplaceEntry::span).collect();
        assert_eq!(spans, vec![4..6, 12..14]);
        assert_eq!(apply_entries(text, outcome.entries()), "grösse grösse".as_bytes());
    }

    #[test]
    fn test_cancel_keeps_partial_entries() {
        let cancel = CancelFlag::new();
        let replacer = Replacer::new(Encoding::Utf8, Flags::NORMAL).with_cancel(cancel.clone());
        let outcome = replacer
            .replace_with(b"aaaa", "a", |_, m| {
                cancel.cancel();
                expand_match(m, &Template::parse("b")?)
            })
            .unwrap();
        assert_eq!(outcome, ReplaceOutcome::Cancelled(vec![ReplaceEntry::new(0, 1, "b")]));
    }
}
