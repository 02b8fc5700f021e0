use thiserror::Error;

/// The primary error type for all operations in `rerep`.
///
/// The first group of variants belongs to the matching engine itself; the rest
/// wrap failures from the file and configuration layers built around it.
#[derive(Error, Debug)]
pub enum Error {
    /// The pattern is not valid syntax for the selected mode and flags.
    #[error("Pattern compilation failed: {0}")]
    PatternCompile(#[from] regex::Error),

    /// A pattern character cannot be represented in single-byte text.
    #[error("Pattern compilation failed: {ch:?} cannot be matched in single-byte text")]
    UnsupportedPatternChar { ch: char },

    /// A malformed byte sequence was found while decoding the text.
    #[error("Malformed {encoding} sequence at byte offset {offset}")]
    Encoding {
        encoding: &'static str,
        offset: usize,
    },

    /// A group lookup referenced a name or index the pattern does not define.
    #[error("No such group: {0}")]
    GroupNotFound(String),

    /// A replacement template is malformed or references an undefined group.
    #[error("Template expansion failed: {0}")]
    Expansion(String),

    /// A conversion function produced an entry that breaks edit ordering.
    #[error("Replace entry {start}..{end} overlaps or precedes the previous edit ending at {previous_end}")]
    EntryOrder {
        start: usize,
        end: usize,
        previous_end: usize,
    },

    /// An error related to file system I/O.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred while parsing a YAML rule file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A general configuration-related error.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the `ignore` crate, which is used for directory traversal.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An error related to persisting a temporary file.
    #[error("Tempfile error: {0}")]
    TempFile(#[from] tempfile::PersistError),

    /// An error related to CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenient type alias for `Result<T, rerep::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}
