use crate::config::RuleSet;
use crate::encoding::Encoding;
use crate::errors::Result;
use crate::output_formatter::{Edit, Hit, OutputFormat, OutputFormatter};
use crate::pattern::{Flags, Pattern};
use crate::replacer::{self, Replacer, expand_match};
use crate::search::Searcher;
use crate::template::Template;
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

struct CompiledRule {
    pattern: Pattern,
    template: Template,
}

/// Applies a rule set to files on disk.
///
/// Every rule is compiled once up front, and each template is checked against
/// its pattern's groups, so a bad rule fails before any file is touched.
pub struct FileProcessor {
    encoding: Encoding,
    rules: Vec<CompiledRule>,
}

/// Options for processing a file.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// If `true`, a `.bak` file will be created before modifying a file.
    pub create_backup: bool,
    /// If `true`, changes will be calculated but not written to disk.
    pub dry_run: bool,
}

/// The result of processing a single file.
pub struct ProcessResult {
    /// The total number of edits made across all rules.
    pub changes: usize,
    /// `true` if the file content changed.
    pub modified: bool,
    /// Every edit, in rule order.
    pub edits: Vec<Edit>,
}

/// Statistics from an `undo` operation.
pub struct UndoStats {
    /// The number of backup files found.
    pub found: usize,
    /// The number of files successfully restored from backups.
    pub restored: usize,
}

impl FileProcessor {
    pub fn new(rule_set: &RuleSet) -> Result<Self> {
        let encoding = rule_set.encoding;
        let rules = rule_set
            .rules
            .iter()
            .map(|rule| {
                let pattern = Pattern::compile(&rule.pattern, rule.flags()?, encoding)?;
                let template = Template::parse_for(&rule.replacement, encoding)?;
                template.validate_against(&pattern)?;
                Ok(CompiledRule { pattern, template })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { encoding, rules })
    }

    /// Runs every rule over `content` in order, each on the output of the last.
    pub fn transform(&self, path: &Path, content: &[u8]) -> Result<(Vec<u8>, Vec<Edit>)> {
        let mut current = content.to_vec();
        let mut edits = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let replacer = Replacer::new(self.encoding, rule.pattern.flags());
            let outcome = replacer.replace_compiled(&current, &rule.pattern, |_, m| expand_match(m, &rule.template))?;
            let entries = outcome.into_entries();
            if entries.is_empty() {
                continue;
            }

            edits.extend(entries.iter().map(|entry| Edit {
                file: path.to_path_buf(),
                rule: index,
                start: entry.start,
                end: entry.end,
                replacement: String::from_utf8_lossy(&entry.replacement).into_owned(),
            }));
            current = replacer::apply_entries(&current, &entries);
        }

        Ok((current, edits))
    }

    /// Processes a single file, applying all rules.
    ///
    /// If any edit changed the content and `dry_run` is false, the new content
    /// is written atomically, after an optional `.bak` copy of the original.
    pub fn process_file(&self, path: &Path, options: ProcessOptions) -> Result<ProcessResult> {
        let content = fs::read(path)?;
        let (new_content, edits) = self.transform(path, &content)?;
        let modified = new_content != content;

        if modified && !options.dry_run {
            if options.create_backup {
                fs::copy(path, backup_path(path))?;
            }
            write_atomically(path, &new_content)?;
        }

        Ok(ProcessResult {
            changes: edits.len(),
            modified,
            edits,
        })
    }

    /// Scans a directory for `.bak` files and restores them.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory to scan for backup files.
    /// * `keep_backups` - If `false`, the `.bak` files will be deleted after being restored.
    pub fn undo(dir: &Path, keep_backups: bool) -> Result<UndoStats> {
        let mut found = 0;
        let mut restored = 0;

        for entry in WalkBuilder::new(dir).standard_filters(false).build() {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("bak") {
                found += 1;
                let original_path = path.with_extension("");
                fs::copy(path, &original_path)?;
                if !keep_backups {
                    fs::remove_file(path)?;
                }
                restored += 1;
                tracing::info!(path = %original_path.display(), "restored from backup");
            }
        }

        Ok(UndoStats { found, restored })
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(format!("Could not get parent directory for {}", path.display()).into()),
    };
    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(content)?;

    // Preserve file permissions
    let perms = fs::metadata(path)?.permissions();
    fs::set_permissions(temp_file.path(), perms)?;

    temp_file.persist(path)?;
    Ok(())
}

/// Options shared by the directory-walking commands.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub workers: Option<usize>,
}

/// Collects the files under `inputs` that pass the extension and exclude filters.
pub fn collect_files(inputs: &[PathBuf], extensions: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let exts: Vec<String> = extensions
        .iter()
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .collect();

    let mut all_files = Vec::new();
    for input in inputs {
        let mut walker = WalkBuilder::new(input);
        walker.standard_filters(true); // Respect .gitignore

        for entry in walker.build() {
            let entry = entry?;
            let path = entry.path();

            let should_exclude = exclude
                .iter()
                .any(|ex| path.components().any(|c| c.as_os_str() == ex.as_str()));

            if !should_exclude && path.is_file() && should_process_file(path, &exts) {
                all_files.push(path.to_path_buf());
            }
        }
    }
    all_files.sort();
    Ok(all_files)
}

/// Determines if a file should be processed based on its extension.
fn should_process_file(path: &Path, extensions: &[String]) -> bool {
    if path.extension().and_then(|s| s.to_str()) == Some("bak") {
        return false;
    }
    if extensions.is_empty() {
        return true;
    }

    path.extension()
        .and_then(|os| os.to_str())
        .map(|s| extensions.contains(&s.to_lowercase()))
        .unwrap_or(false)
}

fn build_pool(workers: Option<usize>) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or_else(num_cpus::get))
        .build()?)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    })
}

/// The main entry point for the `search` command.
///
/// Binary files (a NUL byte in the first 1KB) are skipped when searching
/// UTF-8 text.
pub fn run_search(
    pattern: &str,
    flags: Flags,
    encoding: Encoding,
    inputs: Vec<PathBuf>,
    walk: WalkOptions,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let searcher = Searcher::new(encoding, flags);
    // Compiled once, before the walk, and shared by every worker.
    let compiled = searcher.compile(pattern)?;

    let files = collect_files(&inputs, &walk.extensions, &walk.exclude)?;
    let pool = build_pool(walk.workers)?;
    let failures = AtomicUsize::new(0);

    let mut hits: Vec<Hit> = pool.install(|| {
        files
            .par_iter()
            .flat_map_iter(|path| {
                let found = fs::read(path).map_err(Into::into).and_then(|content| {
                    if encoding == Encoding::Utf8 && content.iter().take(1024).any(|&b| b == 0) {
                        return Ok(Vec::new());
                    }
                    searcher.find_all_compiled(&content, &compiled)
                });
                match found {
                    Ok(spans) => spans
                        .into_iter()
                        .map(|s| Hit {
                            file: path.clone(),
                            line: s.line,
                            start: s.start,
                            end: s.end,
                            text: String::from_utf8_lossy(&s.text).into_owned(),
                        })
                        .collect(),
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(path = %path.display(), error = %e, "search failed");
                        Vec::new()
                    }
                }
            })
            .collect()
    });
    hits.sort_by(|a, b| a.file.cmp(&b.file).then(a.start.cmp(&b.start)));

    let mut writer = open_output(output.as_deref())?;
    OutputFormatter::new(format).write_hits(&mut writer, &hits)?;
    writer.flush()?;

    tracing::info!(
        files = files.len(),
        hits = hits.len(),
        failures = failures.load(Ordering::Relaxed),
        "search finished"
    );
    Ok(())
}

/// The main entry point for the `replace` and `apply` commands.
///
/// Files are processed in parallel; a failure in one file is logged and
/// counted without stopping the others.
pub fn run_replace(
    rules: RuleSet,
    inputs: Vec<PathBuf>,
    mut walk: WalkOptions,
    options: ProcessOptions,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let processor = FileProcessor::new(&rules)?;

    if walk.extensions.is_empty() {
        walk.extensions = rules.extensions.clone().unwrap_or_default();
    }
    if walk.exclude.is_empty() {
        walk.exclude = rules.exclude.clone().unwrap_or_default();
    }
    let files = collect_files(&inputs, &walk.extensions, &walk.exclude)?;

    let processed = AtomicUsize::new(0);
    let modified = AtomicUsize::new(0);
    let total_changes = AtomicUsize::new(0);
    let failures = AtomicUsize::new(0);
    let edits = Mutex::new(Vec::new());
    let report = verbose || options.dry_run;

    let pool = build_pool(walk.workers)?;
    let pb = progress_bar(files.len());
    pool.install(|| {
        files.par_iter().for_each(|path| {
            pb.inc(1);
            match processor.process_file(path, options) {
                Ok(result) => {
                    processed.fetch_add(1, Ordering::Relaxed);
                    if result.modified {
                        modified.fetch_add(1, Ordering::Relaxed);
                        total_changes.fetch_add(result.changes, Ordering::Relaxed);
                        tracing::debug!(path = %path.display(), changes = result.changes, "modified");
                        if report {
                            if let Ok(mut all) = edits.lock() {
                                all.extend(result.edits);
                            }
                        }
                    }
                }
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(path = %path.display(), error = %e, "processing failed");
                }
            }
        });
    });
    pb.finish_and_clear();

    if report {
        let mut edits = edits.into_inner().unwrap_or_default();
        edits.sort_by(|a, b| a.file.cmp(&b.file).then(a.rule.cmp(&b.rule)).then(a.start.cmp(&b.start)));
        let mut stdout = std::io::stdout();
        OutputFormatter::new(format).write_edits(&mut stdout, &edits)?;
    }

    let prefix = if options.dry_run { "DRY " } else { "" };
    println!("\n{}", "-".repeat(50));
    println!("{prefix}Files scanned : {}", processed.load(Ordering::Relaxed));
    println!("{prefix}Files changed : {}", modified.load(Ordering::Relaxed));
    println!("{prefix}Total edits   : {}", total_changes.load(Ordering::Relaxed));
    let failed = failures.load(Ordering::Relaxed);
    if failed > 0 {
        println!("{prefix}Failed files  : {failed}");
    }

    Ok(())
}

/// The main entry point for the `undo` command.
pub fn run_undo(dir: PathBuf, keep_backups: bool) -> Result<()> {
    let stats = FileProcessor::undo(&dir, keep_backups)?;
    println!(
        "\nBackups found: {}, restored: {}",
        stats.found, stats.restored
    );
    Ok(())
}
