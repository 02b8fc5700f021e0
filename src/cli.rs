use crate::encoding::Encoding;
use crate::pattern::Flags;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Regex search and replace over ANSI or UTF-8 text.
///
/// `rerep` finds every match of a pattern, turns each one into an edit
/// against the original bytes, and applies the edits in one pass.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Regex search and replace over ANSI or UTF-8 text",
    long_about = "rerep - search and replace with capture groups, templates and literal mode.

Byte offsets always refer to the original file, whatever its encoding.

QUICK EXAMPLES:
  rerep search 'TODO|FIXME' src/                 # List matches
  rerep replace -p '(\\w+)@(\\w+)' -r '\\2@\\1' .   # Swap around '@'
  rerep replace -F -p 'a.b' -r 'x' --dry-run .   # Literal pattern, preview only
  rerep apply -c rules.yaml .                    # Run a rule file
  rerep undo -d .                                # Restore from backups

For detailed help on any command, use: rerep <command> --help"
)]
pub struct Args {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Pattern flags shared by `search` and `replace`.
#[derive(ClapArgs, Debug, Clone)]
pub struct FlagArgs {
    /// Match case-insensitively.
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Make `^` and `$` match at line boundaries.
    #[arg(short = 'm', long)]
    pub multiline: bool,

    /// Let `.` match newlines.
    #[arg(short = 's', long)]
    pub dotall: bool,

    /// Treat the pattern as literal text, not a regex.
    #[arg(short = 'F', long)]
    pub literal: bool,

    /// Locale-aware classes (accepted for compatibility, no effect).
    #[arg(long)]
    pub locale: bool,

    /// Encoding of the files.
    #[arg(long, value_enum, default_value_t = Encoding::Utf8, env = "REREP_ENCODING")]
    pub encoding: Encoding,
}

impl FlagArgs {
    pub fn flags(&self) -> Flags {
        let mut flags = Flags::NORMAL;
        flags.set(Flags::IGNORECASE, self.ignore_case);
        flags.set(Flags::MULTILINE, self.multiline);
        flags.set(Flags::DOTALL, self.dotall);
        flags.set(Flags::LITERAL, self.literal);
        flags.set(Flags::LOCALE, self.locale);
        flags
    }
}

/// File selection shared by the walking commands.
#[derive(ClapArgs, Debug, Clone)]
pub struct WalkArgs {
    /// A comma-separated list of file extensions to include.
    #[arg(short = 'x', long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// A comma-separated list of directory names to exclude.
    #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// The number of parallel worker threads to use.
    #[arg(short, long, env = "REREP_WORKERS")]
    pub workers: Option<usize>,
}

/// The set of available commands for the `rerep` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every match of a pattern
    ///
    /// EXAMPLES:
    ///   rerep search 'TODO|FIXME' src/
    ///   rerep search -i -f json 'password' .
    Search {
        /// The pattern to search for.
        pattern: String,

        /// Files or directories to search.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        flags: FlagArgs,

        #[command(flatten)]
        walk: WalkArgs,

        /// Output format: `text`, `json` or `csv`.
        #[arg(short = 'f', long = "format", default_value = "text")]
        format: String,

        /// Write results to this file instead of standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace every match of a pattern (with automatic backups)
    ///
    /// Template syntax: \1 or $1, \g<name> or ${name}, $& for the whole
    /// match, \\ and $$ for literal markers, \n \r \t.
    ///
    /// EXAMPLES:
    ///   rerep replace -p '(\w+)@(\w+)' -r '\2@\1' .
    ///   rerep replace -F -p '1.0' -r '2.0' --dry-run .
    Replace {
        /// The pattern to search for.
        #[arg(short, long)]
        pattern: String,

        /// The replacement template.
        #[arg(short, long, default_value = "")]
        replacement: String,

        /// Files or directories to process.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        flags: FlagArgs,

        #[command(flatten)]
        walk: WalkArgs,

        /// Disable the creation of backup files (`.bak`).
        #[arg(long)]
        no_backup: bool,

        /// Preview the edits without modifying any files.
        #[arg(long)]
        dry_run: bool,

        /// Format of the edit report: `text`, `json` or `csv`.
        #[arg(short = 'f', long = "format", default_value = "text")]
        format: String,
    },

    /// Apply the rules of a YAML rule file
    ///
    /// Rule file format (rules.yaml):
    ///   encoding: utf8
    ///   rules:
    ///     - pattern: '(\w+)@(\w+)'
    ///       replacement: '\2@\1'
    ///       flags: [ignorecase]
    ///     - pattern: 'a.b'
    ///       replacement: 'x'
    ///       literal: true
    Apply {
        /// Path to the YAML rule file.
        #[arg(short, long, required = true)]
        config: PathBuf,

        /// Files or directories to process.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        walk: WalkArgs,

        /// Disable the creation of backup files (`.bak`).
        #[arg(long)]
        no_backup: bool,

        /// Preview the edits without modifying any files.
        #[arg(long)]
        dry_run: bool,

        /// Format of the edit report: `text`, `json` or `csv`.
        #[arg(short = 'f', long = "format", default_value = "text")]
        format: String,
    },

    /// Restore files from backups (undo replacements)
    Undo {
        /// The directory where the replacement was run.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Keep the backup files after restoring the original files.
        #[arg(long)]
        keep_backups: bool,
    },
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
