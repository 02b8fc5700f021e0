use crate::encoding::Encoding;
use crate::errors::Result;
use crate::pattern::Flags;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One search-and-replace rule.
#[derive(Debug, Deserialize, Clone)]
pub struct Rule {
    /// The regex (or literal) pattern to search for.
    pub pattern: String,
    /// The replacement template. See `template` for the syntax.
    #[serde(default)]
    pub replacement: String,
    /// Flag names: `ignorecase`, `locale`, `multiline`, `dotall`, `literal`.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Shorthand for adding `literal` to `flags`.
    #[serde(default)]
    pub literal: bool,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            flags: Vec::new(),
            literal: false,
        }
    }

    /// Resolves the rule's flag names into a flag set.
    pub fn flags(&self) -> Result<Flags> {
        let mut flags = if self.literal { Flags::LITERAL } else { Flags::NORMAL };
        for name in &self.flags {
            let flag = Flags::from_rule_name(name)
                .ok_or_else(|| format!("Unknown flag '{}' in rule for pattern '{}'", name, self.pattern))?;
            flags |= flag;
        }
        Ok(flags)
    }
}

/// An ordered list of rules plus the file selection they apply to.
#[derive(Debug, Deserialize, Clone)]
pub struct RuleSet {
    /// Encoding of the files the rules run against.
    #[serde(default)]
    pub encoding: Encoding,
    /// Rules, applied one after another to each file.
    pub rules: Vec<Rule>,
    /// An optional list of file extensions to include in the operation.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// An optional list of directory names to exclude from the operation.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

impl RuleSet {
    /// A rule set holding a single rule, as built from command-line arguments.
    pub fn single(encoding: Encoding, pattern: String, replacement: String, flags: Flags) -> Self {
        let mut rule = Rule::new(pattern, replacement);
        rule.literal = flags.contains(Flags::LITERAL);
        rule.flags = flag_names(flags - Flags::LITERAL);
        Self {
            encoding,
            rules: vec![rule],
            extensions: None,
            exclude: None,
        }
    }
}

fn flag_names(flags: Flags) -> Vec<String> {
    flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect()
}

/// A utility for locating and loading rule files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds a rule file, trying the path as given and then relative to `working_dir`.
    pub fn find_config(config_path: &Path, working_dir: &Path) -> Result<PathBuf> {
        if config_path.exists() {
            return Ok(config_path.to_path_buf());
        }

        let in_working_dir = working_dir.join(config_path);
        if in_working_dir.exists() {
            return Ok(in_working_dir);
        }

        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}\n  - {}",
            config_path.display(),
            config_path.display(),
            in_working_dir.display()
        )
        .into())
    }

    /// Loads a `RuleSet` from a YAML file, checking every rule's flags.
    pub fn load_rules(path: &Path) -> Result<RuleSet> {
        let file = File::open(path)?;
        let rules: RuleSet = serde_yaml::from_reader(file)?;
        for rule in &rules.rules {
            rule.flags()?;
        }
        Ok(rules)
    }
}
