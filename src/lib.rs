//! `rerep` is a regex search-and-replace library over ANSI and UTF-8 text.
//!
//! It provides the core logic for the `rerep` command-line tool but can also be used
//! as a standalone library. The main components are:
//!
//! - `encoding`: Iterates logical characters of ANSI (one byte) or UTF-8 text,
//!   reporting byte offsets and malformed input.
//! - `pattern`: Compiles patterns with `Flags`, including literal mode.
//! - `matches`: The `Match` capability shared by both encodings, with per-group
//!   `GroupDetail` spans in byte offsets.
//! - `template`: Parses and expands replacement templates (`\1`, `${name}`, ...).
//! - `search`: Drives a compiled pattern across a buffer, one match at a time.
//! - `replacer`: Turns matches into ordered, non-overlapping `ReplaceEntry` edits.
//! - `file_processor`: Applies rule sets to files with backups and dry runs.
//!
//! Offsets are always byte offsets into the original buffer, whatever the encoding.

pub mod cli;
pub mod config;
pub mod encoding;
pub mod errors;
pub mod file_processor;
pub mod logging;
pub mod matches;
pub mod output_formatter;
pub mod pattern;
pub mod replacer;
pub mod search;
pub mod template;

// Re-export main types for easier access by library users.
pub use encoding::Encoding;
pub use errors::{Error, Result};
pub use matches::{GroupDetail, Match};
pub use output_formatter::{OutputFormat, OutputFormatter};
pub use pattern::{Flags, Pattern};
pub use replacer::{ReplaceEntry, ReplaceOutcome, Replacer};
pub use search::{CancelFlag, Searcher};
pub use template::Template;
