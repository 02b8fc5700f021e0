//! The main entry point for the `rerep` command-line application.
//!
//! Parses command-line arguments, installs logging and dispatches to the
//! command drivers in the `rerep` library.

use rerep::cli::{self, Commands, WalkArgs};
use rerep::config::{ConfigLoader, RuleSet};
use rerep::errors::Result;
use rerep::file_processor::{self, ProcessOptions, WalkOptions};
use rerep::{OutputFormat, logging};
use std::env;
use std::path::Path;
use std::process;

fn walk_options(walk: WalkArgs) -> WalkOptions {
    WalkOptions {
        extensions: walk.extensions,
        exclude: walk.exclude,
        workers: walk.workers,
    }
}

fn main() -> Result<()> {
    let args_vec: Vec<String> = env::args().collect();
    if args_vec.len() == 1 {
        println!("Regex search and replace over ANSI or UTF-8 text\n");
        println!("QUICK START EXAMPLES:");
        println!("  rerep search 'TODO|FIXME' .                    # List matches");
        println!("  rerep replace -p 'colour' -r 'color' .         # Simple replacement");
        println!("  rerep replace -p '(\\w+)@(\\w+)' -r '\\2@\\1' .   # Use capture groups");
        println!("  rerep apply -c rules.yaml --dry-run .          # Preview a rule file");
        println!("  rerep undo -d .                                # Restore from backups\n");
        println!("Run 'rerep --help' for full command list");
        println!("Run 'rerep <command> --help' for detailed command help");
        process::exit(0);
    }

    let args = cli::parse_args();
    logging::init(args.verbose);

    match args.command {
        Commands::Search {
            pattern,
            inputs,
            flags,
            walk,
            format,
            output,
        } => file_processor::run_search(
            &pattern,
            flags.flags(),
            flags.encoding,
            inputs,
            walk_options(walk),
            OutputFormat::from(format.as_str()),
            output,
        ),
        Commands::Replace {
            pattern,
            replacement,
            inputs,
            flags,
            walk,
            no_backup,
            dry_run,
            format,
        } => {
            let rules = RuleSet::single(flags.encoding, pattern, replacement, flags.flags());
            let options = ProcessOptions {
                create_backup: !no_backup,
                dry_run,
            };
            file_processor::run_replace(
                rules,
                inputs,
                walk_options(walk),
                options,
                OutputFormat::from(format.as_str()),
                args.verbose,
            )
        }
        Commands::Apply {
            config,
            inputs,
            walk,
            no_backup,
            dry_run,
            format,
        } => {
            let working_dir = inputs.first().map(|p| p.as_path()).unwrap_or(Path::new("."));
            let path = ConfigLoader::find_config(&config, working_dir)?;
            let rules = ConfigLoader::load_rules(&path)?;
            let options = ProcessOptions {
                create_backup: !no_backup,
                dry_run,
            };
            file_processor::run_replace(
                rules,
                inputs,
                walk_options(walk),
                options,
                OutputFormat::from(format.as_str()),
                args.verbose,
            )
        }
        Commands::Undo { dir, keep_backups } => file_processor::run_undo(dir, keep_backups),
    }
}
