use crate::encoding::Encoding;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use std::fmt::Write;

bitflags! {
    /// Search flags. The bit values follow the host scripting API's numbering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        /// Case-insensitive matching.
        const IGNORECASE = 2;
        /// Locale-aware classes. Accepted for compatibility; the backend has no locale tables.
        const LOCALE = 4;
        /// `^` and `$` match at line boundaries.
        const MULTILINE = 8;
        /// `.` also matches `\n`.
        const DOTALL = 16;
        /// Match the pattern verbatim. Takes precedence over regex syntax.
        const LITERAL = 0x8000_0000;
    }
}

impl Flags {
    pub const NORMAL: Flags = Flags::empty();

    /// Looks up a flag by its lowercase name, as used in rule files.
    pub fn from_rule_name(name: &str) -> Option<Flags> {
        match name.trim().to_lowercase().as_str() {
            "ignorecase" | "i" => Some(Flags::IGNORECASE),
            "locale" | "l" => Some(Flags::LOCALE),
            "multiline" | "m" => Some(Flags::MULTILINE),
            "dotall" | "s" => Some(Flags::DOTALL),
            "literal" => Some(Flags::LITERAL),
            _ => None,
        }
    }
}

pub(crate) enum Compiled {
    Ansi(regex::bytes::Regex),
    Utf8(regex::Regex),
}

/// A compiled search pattern bound to one encoding.
///
/// Named groups use the backend's syntax: `(?P<name>...)` or `(?<name>...)`.
pub struct Pattern {
    source: String,
    flags: Flags,
    compiled: Compiled,
}

impl Pattern {
    /// Compiles `source` for text in `encoding`.
    ///
    /// With `Flags::LITERAL` the source is escaped first, so the result is an
    /// exact-substring automaton. `IGNORECASE` still applies in that mode.
    pub fn compile(source: &str, flags: Flags, encoding: Encoding) -> Result<Self> {
        let literal = flags.contains(Flags::LITERAL);
        if flags.contains(Flags::LOCALE) {
            tracing::debug!(pattern = source, "locale flag has no effect on this backend");
        }

        let compiled = match encoding {
            Encoding::Ansi => {
                let translated = ansi_source(source, literal)?;
                let regex = regex::bytes::RegexBuilder::new(&translated)
                    .unicode(false)
                    .case_insensitive(flags.contains(Flags::IGNORECASE))
                    .multi_line(!literal && flags.contains(Flags::MULTILINE))
                    .dot_matches_new_line(!literal && flags.contains(Flags::DOTALL))
                    .build()?;
                Compiled::Ansi(regex)
            }
            Encoding::Utf8 => {
                let escaped;
                let source = if literal {
                    escaped = regex::escape(source);
                    escaped.as_str()
                } else {
                    source
                };
                let regex = regex::RegexBuilder::new(source)
                    .case_insensitive(flags.contains(Flags::IGNORECASE))
                    .multi_line(!literal && flags.contains(Flags::MULTILINE))
                    .dot_matches_new_line(!literal && flags.contains(Flags::DOTALL))
                    .build()?;
                Compiled::Utf8(regex)
            }
        };

        Ok(Self {
            source: source.to_string(),
            flags,
            compiled,
        })
    }

    /// The pattern as the caller wrote it.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn encoding(&self) -> Encoding {
        match self.compiled {
            Compiled::Ansi(_) => Encoding::Ansi,
            Compiled::Utf8(_) => Encoding::Utf8,
        }
    }

    /// Number of groups, including the implicit whole-match group 0.
    pub fn group_count(&self) -> usize {
        match &self.compiled {
            Compiled::Ansi(re) => re.captures_len(),
            Compiled::Utf8(re) => re.captures_len(),
        }
    }

    /// Group names by index; `None` for unnamed groups (and always for group 0).
    pub fn group_names(&self) -> Vec<Option<&str>> {
        match &self.compiled {
            Compiled::Ansi(re) => re.capture_names().collect(),
            Compiled::Utf8(re) => re.capture_names().collect(),
        }
    }

    /// Resolves a group name to its index.
    pub fn group_index(&self, name: &str) -> Option<usize> {
        group_index(self.group_names().into_iter(), name)
    }

    pub(crate) fn compiled(&self) -> &Compiled {
        &self.compiled
    }
}

pub(crate) fn group_index<'a>(mut names: impl Iterator<Item = Option<&'a str>>, name: &str) -> Option<usize> {
    names.position(|n| n == Some(name))
}

/// Rewrites a pattern for the byte engine running with Unicode disabled.
///
/// Characters in U+0080..=U+00FF become `\xHH` so they match the single
/// Latin-1 byte rather than their UTF-8 encoding. An escaped one (`\é`)
/// reuses the open backslash. Capture group names are copied unchanged.
fn ansi_source(source: &str, literal: bool) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut buf = [0u8; 4];

    if literal {
        for ch in source.chars() {
            match u32::from(ch) {
                0..=0x7F => out.push_str(&regex::escape(ch.encode_utf8(&mut buf))),
                code @ 0x80..=0xFF => {
                    let _ = write!(out, "\\x{code:02X}");
                }
                _ => return Err(Error::UnsupportedPatternChar { ch }),
            }
        }
        return Ok(out);
    }

    let mut escaped = false;
    let mut in_group_name = false;
    // Offset in `out` just past the last unescaped `(`.
    let mut group_open = None;
    for ch in source.chars() {
        if in_group_name {
            out.push(ch);
            in_group_name = ch != '>';
            continue;
        }
        match u32::from(ch) {
            code @ 0x80..=0xFF => {
                if !escaped {
                    out.push('\\');
                }
                let _ = write!(out, "x{code:02X}");
                escaped = false;
            }
            0x100.. => return Err(Error::UnsupportedPatternChar { ch }),
            _ => {
                out.push(ch);
                if !escaped {
                    match ch {
                        '(' => group_open = Some(out.len()),
                        '<' => {
                            in_group_name = group_open
                                .is_some_and(|open| matches!(&out[open..], "?P<" | "?<"));
                        }
                        _ => {}
                    }
                }
                escaped = !escaped && ch == '\\';
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern_is_compile_error() {
        let err = Pattern::compile("(unclosed", Flags::NORMAL, Encoding::Utf8).err().unwrap();
        assert!(matches!(err, Error::PatternCompile(_)));
        let err = Pattern::compile("[z-a]", Flags::NORMAL, Encoding::Ansi).err().unwrap();
        assert!(matches!(err, Error::PatternCompile(_)));
    }

    #[test]
    fn test_literal_flag_disables_syntax() {
        // Invalid as a regex, fine as a literal.
        let pattern = Pattern::compile("(a.b", Flags::LITERAL, Encoding::Utf8).unwrap();
        assert_eq!(pattern.group_count(), 1);
        assert_eq!(pattern.as_str(), "(a.b");
        Pattern::compile("(a.b", Flags::LITERAL, Encoding::Ansi).unwrap();
    }

    #[test]
    fn test_group_names_resolve() {
        let pattern = Pattern::compile(r"(?P<user>\w+)@(\w+)", Flags::NORMAL, Encoding::Utf8).unwrap();
        assert_eq!(pattern.group_count(), 3);
        assert_eq!(pattern.group_index("user"), Some(1));
        assert_eq!(pattern.group_index("host"), None);
        assert_eq!(pattern.group_names(), vec![None, Some("user"), None]);
    }

    #[test]
    fn test_ansi_source_translates_latin1() {
        assert_eq!(ansi_source("caf\u{e9}", false).unwrap(), r"caf\xE9");
        assert_eq!(ansi_source("a.b", true).unwrap(), r"a\.b");
        assert!(matches!(
            ansi_source("\u{20ac}", false),
            Err(Error::UnsupportedPatternChar { ch: '\u{20ac}' })
        ));
    }

    #[test]
    fn test_ansi_source_escaped_latin1() {
        assert_eq!(ansi_source("caf\\\u{e9}", false).unwrap(), r"caf\xE9");
        assert_eq!(ansi_source("[\\\u{e9}]", false).unwrap(), r"[\xE9]");
        // An escaped backslash does not escape the next character.
        assert_eq!(ansi_source("\\\\\u{e9}", false).unwrap(), r"\\\xE9");

        let pattern = Pattern::compile("caf\\\u{e9}", Flags::NORMAL, Encoding::Ansi).unwrap();
        let Compiled::Ansi(re) = pattern.compiled() else {
            panic!("expected the byte engine");
        };
        assert_eq!(re.find(b"un caf\xE9").map(|m| m.range()), Some(3..7));
    }

    #[test]
    fn test_ansi_source_keeps_group_names() {
        assert_eq!(
            ansi_source("(?P<caf\u{e9}>\u{e9}+)", false).unwrap(),
            "(?P<caf\u{e9}>\\xE9+)"
        );
        assert_eq!(ansi_source("(?<n>\u{e9})<\u{e9}", false).unwrap(), r"(?<n>\xE9)<\xE9");
        // A literal `<` after an escaped paren is not a name.
        assert_eq!(ansi_source("\\(?<\u{e9}", false).unwrap(), r"\(?<\xE9");
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(Flags::from_rule_name("IgnoreCase"), Some(Flags::IGNORECASE));
        assert_eq!(Flags::from_rule_name("dotall"), Some(Flags::DOTALL));
        assert_eq!(Flags::from_rule_name("verbose"), None);
        assert_eq!(Flags::LITERAL.bits(), 0x8000_0000);
    }
}
