use crate::encoding::{self, Encoding};
use crate::errors::{Error, Result};
use crate::matches::{AnsiMatch, Match, Utf8Match};
use crate::pattern::{Compiled, Flags, Pattern};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared stop request, polled between match steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a visitor wants after seeing a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How a search pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Every match in the text was visited.
    Completed,
    /// The pattern compiled and the text was scanned, but nothing matched.
    NoMatches,
    /// The visitor returned [`Flow::Stop`].
    Stopped,
    /// The cancel flag was raised mid-pass.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Number of matches handed to the visitor.
    pub matches: usize,
    pub status: SearchStatus,
}

/// A whole-match span collected by [`Searcher::find_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    /// 1-based line of `start`.
    pub line: usize,
    pub text: Vec<u8>,
}

/// Drives ordered, non-overlapping matching over a text buffer.
///
/// Matches are found strictly left to right. After a match the search resumes
/// at its end; after an empty match it resumes one logical unit further on,
/// so every pass terminates.
#[derive(Debug, Clone)]
pub struct Searcher {
    encoding: Encoding,
    flags: Flags,
    cancel: Option<CancelFlag>,
}

impl Searcher {
    pub fn new(encoding: Encoding, flags: Flags) -> Self {
        Self {
            encoding,
            flags,
            cancel: None,
        }
    }

    /// Makes the pass poll `cancel` before every match step.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn compile(&self, pattern: &str) -> Result<Pattern> {
        Pattern::compile(pattern, self.flags, self.encoding)
    }

    /// Compiles `pattern` and hands every match in `text` to `visit`.
    pub fn for_each_match<F>(&self, text: &[u8], pattern: &str, visit: F) -> Result<SearchOutcome>
    where
        F: FnMut(&dyn Match) -> Result<Flow>,
    {
        let pattern = self.compile(pattern)?;
        self.for_each_compiled(text, &pattern, visit)
    }

    /// Like [`Searcher::for_each_match`] with an already compiled pattern.
    ///
    /// UTF-8 text is validated in full before the first match step; a
    /// malformed sequence fails the pass without visiting anything.
    pub fn for_each_compiled<F>(&self, text: &[u8], pattern: &Pattern, mut visit: F) -> Result<SearchOutcome>
    where
        F: FnMut(&dyn Match) -> Result<Flow>,
    {
        let outcome = match pattern.compiled() {
            Compiled::Ansi(re) => self.drive(
                text,
                Encoding::Ansi,
                |at| re.captures_at(text, at).map(|caps| AnsiMatch::new(text, re, caps)),
                &mut visit,
            )?,
            Compiled::Utf8(re) => {
                encoding::validate(text, Encoding::Utf8)?;
                let haystack = std::str::from_utf8(text).map_err(|e| Error::Encoding {
                    encoding: Encoding::Utf8.name(),
                    offset: e.valid_up_to(),
                })?;
                self.drive(
                    text,
                    Encoding::Utf8,
                    |at| re.captures_at(haystack, at).map(|caps| Utf8Match::new(text, re, caps)),
                    &mut visit,
                )?
            }
        };

        tracing::debug!(
            pattern = pattern.as_str(),
            encoding = %pattern.encoding(),
            matches = outcome.matches,
            status = ?outcome.status,
            "search pass finished"
        );
        Ok(outcome)
    }

    /// Collects the whole-match span of every match, with its line number.
    pub fn find_all(&self, text: &[u8], pattern: &str) -> Result<Vec<MatchSpan>> {
        let pattern = self.compile(pattern)?;
        self.find_all_compiled(text, &pattern)
    }

    /// Like [`Searcher::find_all`] with an already compiled pattern.
    pub fn find_all_compiled(&self, text: &[u8], pattern: &Pattern) -> Result<Vec<MatchSpan>> {
        let mut spans = Vec::new();
        let mut line = 1;
        let mut counted_to = 0;
        self.for_each_compiled(text, pattern, |m| {
            let whole = m.group(0)?;
            line += text[counted_to..whole.start].iter().filter(|&&b| b == b'\n').count();
            counted_to = whole.start;
            spans.push(MatchSpan {
                start: whole.start,
                end: whole.end,
                line,
                text: m.text_for_group(&whole).to_vec(),
            });
            Ok(Flow::Continue)
        })?;
        Ok(spans)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    fn drive<M: Match>(
        &self,
        text: &[u8],
        encoding: Encoding,
        mut find_at: impl FnMut(usize) -> Option<M>,
        visit: &mut dyn FnMut(&dyn Match) -> Result<Flow>,
    ) -> Result<SearchOutcome> {
        let mut at = 0;
        let mut matches = 0;

        let status = loop {
            if self.is_cancelled() {
                break SearchStatus::Cancelled;
            }
            let Some(m) = find_at(at) else {
                break if matches == 0 {
                    SearchStatus::NoMatches
                } else {
                    SearchStatus::Completed
                };
            };
            let whole = m.group(0)?;

            matches += 1;
            let view: &dyn Match = &m;
            if visit(view)? == Flow::Stop {
                break SearchStatus::Stopped;
            }

            at = if whole.start == whole.end {
                match next_boundary(text, encoding, whole.end)? {
                    Some(next) => next,
                    None => break SearchStatus::Completed,
                }
            } else {
                whole.end
            };
        };

        Ok(SearchOutcome { matches, status })
    }
}

/// Byte offset one logical unit past `pos`, or `None` at the end of the text.
fn next_boundary(text: &[u8], encoding: Encoding, pos: usize) -> Result<Option<usize>> {
    let mut iter = encoding.iter(text, pos, text.len());
    Ok(if iter.advance()? {
        Some(iter.position())
    } else {
        None
    })
}
