// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Spell check PO files containing reStructuredText.

use anyhow::{bail, Context as _};
use clap::Parser;
use pospell::catalog::render;
use pospell::clean::default_drop_capitalized;
use pospell::hunspell::{install_hint, Hunspell};
use pospell::{Error, Options};
use regex::Regex;
use std::path::PathBuf;
use std::process::{Command, ExitCode};
use std::thread;
use walkdir::WalkDir;

/// Exit code used when the hunspell dictionary is missing.
const MISSING_DICTIONARY: u8 = 2;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Cli {
    /// PO files to check.
    #[arg(value_name = "file.po")]
    po_files: Vec<PathBuf>,
    /// Also check the files matching this pattern, like "**/*.po".
    #[arg(long)]
    glob: Option<String>,
    /// Also check the PO files modified according to `git status`.
    #[arg(long)]
    modified: bool,
    /// Language of the translations, as a hunspell dictionary name.
    #[arg(short, long, default_value = "fr")]
    language: String,
    /// Personal dictionary, one accepted word per line.
    #[arg(short, long, value_name = "dict.txt")]
    personal_dict: Option<PathBuf>,
    /// Drop capitalized words found mid-sentence.
    #[arg(long, conflicts_with = "no_drop_capitalized")]
    drop_capitalized: bool,
    /// Keep capitalized words found mid-sentence.
    #[arg(long)]
    no_drop_capitalized: bool,
    /// Log more, can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Print the text sent to hunspell instead of checking it.
    #[arg(long)]
    debug: bool,
    /// Number of parallel jobs, defaults to the number of CPUs.
    #[arg(short, long)]
    jobs: Option<usize>,
}

impl Cli {
    fn drop_capitalized(&self) -> bool {
        if self.drop_capitalized {
            true
        } else if self.no_drop_capitalized {
            false
        } else {
            default_drop_capitalized(&self.language)
        }
    }

    fn jobs(&self) -> usize {
        self.jobs
            .or_else(|| thread::available_parallelism().ok().map(usize::from))
            .unwrap_or(1)
            .max(1)
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// All the files to check, in a stable order without duplicates.
    fn po_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = self.po_files.clone();
        if let Some(pattern) = &self.glob {
            files.extend(glob_files(pattern)?);
        }
        if self.modified {
            files.extend(modified_po_files()?);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

/// Translate a shell glob to an anchored regex on `/`-separated paths.
fn glob_to_regex(pattern: &str) -> anyhow::Result<Regex> {
    let mut regex = String::from("^");
    let mut rest = pattern;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("**/") {
            regex.push_str("(?:.*/)?");
            rest = tail;
            continue;
        }
        match c {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            _ => regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        rest = &rest[c.len_utf8()..];
    }
    regex.push('$');
    Regex::new(&regex).with_context(|| format!("Invalid glob pattern {pattern:?}"))
}

/// The directory to search for `pattern`: its components before the
/// first wildcard.
fn glob_root(pattern: &str) -> PathBuf {
    let root = pattern
        .split('/')
        .take_while(|component| !component.contains(['*', '?']))
        .collect::<Vec<_>>()
        .join("/");
    if root.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(root)
    }
}

fn glob_files(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let regex = glob_to_regex(pattern)?;
    let root = glob_root(pattern);
    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Could not walk {root:?}"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().strip_prefix(".").unwrap_or(entry.path());
        let name = path.to_string_lossy().replace('\\', "/");
        if regex.is_match(&name) {
            files.push(path.to_path_buf());
        }
    }
    log::info!("{} files match {pattern:?}", files.len());
    Ok(files)
}

/// PO files listed in `git status --porcelain` output, deletions aside.
fn modified_po_paths(porcelain: &str) -> Vec<PathBuf> {
    porcelain
        .lines()
        .filter_map(|line| line.get(..2).zip(line.get(3..)))
        .filter(|(status, _)| !status.contains('D'))
        .map(|(_, path)| path.trim_matches('"'))
        .filter(|path| path.ends_with(".po"))
        .map(PathBuf::from)
        .collect()
}

fn modified_po_files() -> anyhow::Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["status", "--porcelain", "--no-renames"])
        .output()
        .context("Could not run git status")?;
    if !output.status.success() {
        bail!(
            "git status failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(modified_po_paths(&String::from_utf8_lossy(&output.stdout)))
}

#[allow(clippy::print_stdout)]
fn print_projections(files: &[PathBuf], options: &Options) -> anyhow::Result<()> {
    let projections = pospell::project_all(files, options.drop_capitalized, options.jobs)?;
    for lines in &projections {
        println!("{}", render(lines));
    }
    Ok(())
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    env_logger::init_from_env(env_logger::Env::default().filter_or("RUST_LOG", cli.log_level()));

    if cli.po_files.is_empty() && cli.glob.is_none() && !cli.modified {
        bail!("Nothing to check, give PO files, --glob or --modified");
    }
    let files = cli.po_files()?;
    let options = Options {
        drop_capitalized: cli.drop_capitalized(),
        jobs: cli.jobs(),
    };
    log::info!(
        "Checking {} files in {:?}, drop capitalized words: {}",
        files.len(),
        cli.language,
        options.drop_capitalized
    );

    if cli.debug {
        print_projections(&files, &options)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut checker = Hunspell::new(&cli.language);
    if let Some(dict) = &cli.personal_dict {
        checker = checker.with_personal_dict(dict);
    }

    let records = match pospell::spell_check(&files, &options, &checker) {
        Ok(records) => records,
        Err(Error::Checker(err)) => {
            if !checker.dictionary_installed() {
                eprintln!("{}", install_hint(&cli.language));
                return Ok(ExitCode::from(MISSING_DICTIONARY));
            }
            return Err(err).context("Spell checking failed");
        }
        Err(err) => return Err(err.into()),
    };

    for record in &records {
        println!("{record}");
    }
    log::info!("Found {} misspelled words", records.len());
    Ok(if records.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
